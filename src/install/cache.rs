//! On-disk cache of downloaded and extracted toolchains
//!
//! Layout: `<root>/<tool>/<key>/` holds the artifact and
//! `<root>/<tool>/<key>.complete` marks it as fully written. Entries without
//! a marker are leftovers of an interrupted run and are replaced.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::tool::Tool;

const COMPLETE_MARKER_EXTENSION: &str = "complete";

#[derive(Debug, Clone)]
pub struct ToolCache {
    root: PathBuf,
}

impl ToolCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a completed entry, if there is one
    pub fn find(&self, tool: Tool, key: &str) -> Option<PathBuf> {
        let dir = self.entry_dir(tool, key);
        (self.marker(tool, key).is_file() && dir.is_dir()).then_some(dir)
    }

    /// Move the contents of `source` into the entry for `key` and mark it
    /// complete. Any previous entry for the key is replaced.
    pub fn store(&self, source: &Path, tool: Tool, key: &str) -> io::Result<PathBuf> {
        let dir = self.entry_dir(tool, key);
        let marker = self.marker(tool, key);

        if marker.exists() {
            fs::remove_file(&marker)?;
        }
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent)?;
        }

        if fs::rename(source, &dir).is_err() {
            copy_dir_all(source, &dir)?;
            fs::remove_dir_all(source)?;
        }
        fs::write(&marker, b"")?;
        debug!("Cached {} {} at {:?}", tool, key, dir);

        Ok(dir)
    }

    /// Drop the entry for `key`; a missing entry is not an error
    pub fn remove(&self, tool: Tool, key: &str) -> io::Result<()> {
        let marker = self.marker(tool, key);
        if marker.exists() {
            fs::remove_file(&marker)?;
        }
        let dir = self.entry_dir(tool, key);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        debug!("Removed {} {} from cache", tool, key);
        Ok(())
    }

    /// Scratch directory for building the entry for `key`
    pub fn staging_dir(&self, tool: Tool, key: &str) -> PathBuf {
        self.root
            .join(".staging")
            .join(format!("{}-{}", tool.as_str(), key))
    }

    fn entry_dir(&self, tool: Tool, key: &str) -> PathBuf {
        self.root.join(tool.as_str()).join(key)
    }

    fn marker(&self, tool: Tool, key: &str) -> PathBuf {
        self.root
            .join(tool.as_str())
            .join(format!("{}.{}", key, COMPLETE_MARKER_EXTENSION))
    }
}

/// Recursively copy `source` into `dest`, keeping symlinks as symlinks on unix
pub fn copy_dir_all(source: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = dest.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else if file_type.is_symlink() {
            copy_symlink(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(source)?, target)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    fs::copy(source, target).map(|_| ())
}
