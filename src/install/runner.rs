//! Subprocess execution for installer scripts and version checks

use std::path::PathBuf;

#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::debug;

use crate::install::error::InstallError;

/// A command to run: program, arguments and extra environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    pub fn envs(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// `program arg1 arg2`, for logs and errors
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs commands on behalf of the installer
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` to completion
    ///
    /// # Returns
    /// * `Ok(String)` - Trimmed stdout of a successful run
    /// * `Err(InstallError::Command)` - If it could not start or exited non-zero
    async fn run(&self, command: &ToolCommand) -> Result<String, InstallError>;
}

/// Runs commands as child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

#[async_trait::async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand) -> Result<String, InstallError> {
        debug!("Running {}", command.display());

        let mut process = Command::new(&command.program);
        process.args(&command.args);
        process.envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(cwd) = &command.cwd {
            process.current_dir(cwd);
        }

        let output = process.output().await.map_err(|e| InstallError::Command {
            program: command.display(),
            details: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InstallError::Command {
                program: command.display(),
                details: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        debug!("{} printed: {}", command.program, stdout);

        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let command = ToolCommand::new("mix").args(["local.hex", "--force"]);
        assert_eq!(command.display(), "mix local.hex --force");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_runner_returns_trimmed_stdout_and_passes_env() {
        let command = ToolCommand::new("sh")
            .arg("-c")
            .arg("echo \"$HEX_MIRROR\"")
            .env("HEX_MIRROR", "https://cdn.jsdelivr.net/hex");

        let stdout = ProcessRunner.run(&command).await.unwrap();

        assert_eq!(stdout, "https://cdn.jsdelivr.net/hex");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_runner_reports_non_zero_exit() {
        let command = ToolCommand::new("sh").arg("-c").arg("echo boom >&2; exit 3");

        let result = ProcessRunner.run(&command).await;

        match result {
            Err(InstallError::Command { program, details }) => {
                assert_eq!(program, "sh -c echo boom >&2; exit 3");
                assert!(details.contains("boom"));
            }
            other => panic!("expected command error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn process_runner_reports_missing_program() {
        let command = ToolCommand::new("definitely-not-a-real-program-setup-beam");
        let result = ProcessRunner.run(&command).await;
        assert!(matches!(result, Err(InstallError::Command { .. })));
    }
}
