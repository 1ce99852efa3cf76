//! Paths and environment variables produced by installs
//!
//! Installs never touch the process environment. They record what later
//! steps need here, and the CLI applies the result once at the end.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallationContext {
    /// Directories to put on `PATH`, in the order they were added
    pub paths: Vec<PathBuf>,
    pub variables: IndexMap<String, String>,
}

impl InstallationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.paths.retain(|p| *p != path);
        self.paths.push(path);
    }

    pub fn export_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    /// `PATH` for child processes: the most recently added path first,
    /// followed by `base`
    pub fn path_env(&self, base: Option<OsString>) -> OsString {
        let mut paths: Vec<PathBuf> = self.paths.iter().rev().cloned().collect();
        if let Some(base) = base {
            paths.extend(std::env::split_paths(&base));
        }
        std::env::join_paths(paths).unwrap_or_default()
    }

    /// Environment for child processes: the exported variables plus `PATH`
    pub fn command_env(&self) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = self
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let path = self.path_env(std::env::var_os("PATH"));
        env.push(("PATH".to_string(), path.to_string_lossy().into_owned()));
        env
    }

    /// Append the paths to a `GITHUB_PATH`-style file, one per line. The
    /// runner prepends each line, so the last one written wins.
    pub fn append_path_file(&self, file: &Path) -> io::Result<()> {
        let mut out = OpenOptions::new().create(true).append(true).open(file)?;
        for path in &self.paths {
            writeln!(out, "{}", path.display())?;
        }
        Ok(())
    }

    /// Append the variables to a `GITHUB_ENV`-style file as `NAME=value`
    pub fn append_env_file(&self, file: &Path) -> io::Result<()> {
        let mut out = OpenOptions::new().create(true).append(true).open(file)?;
        for (name, value) in &self.variables {
            writeln!(out, "{}={}", name, value)?;
        }
        Ok(())
    }
}
