//! Command runner that records instead of spawning

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use setup_beam::install::error::InstallError;
use setup_beam::install::runner::{CommandRunner, ToolCommand};

type FailWhen = Arc<dyn Fn(&ToolCommand) -> bool + Send + Sync>;

/// Records every command and answers version checks with canned output.
/// Commands matching the `fail_when` predicate exit with an error.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    commands: Arc<Mutex<Vec<ToolCommand>>>,
    fail_when: Option<FailWhen>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_when(predicate: impl Fn(&ToolCommand) -> bool + Send + Sync + 'static) -> Self {
        Self {
            fail_when: Some(Arc::new(predicate)),
            ..Self::default()
        }
    }

    /// Fails every command run with `HEX_MIRROR` set to `mirror`
    pub fn failing_on_mirror(mirror: impl Into<String>) -> Self {
        let mirror = mirror.into();
        Self::failing_when(move |command| {
            command
                .env
                .iter()
                .any(|(name, value)| name == "HEX_MIRROR" && *value == mirror)
        })
    }

    pub fn commands(&self) -> Vec<ToolCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// `program arg...` of every recorded command, in order
    pub fn displayed(&self) -> Vec<String> {
        self.commands().iter().map(ToolCommand::display).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &ToolCommand) -> Result<String, InstallError> {
        self.commands.lock().unwrap().push(command.clone());

        if self.fail_when.as_ref().is_some_and(|fail| fail(command)) {
            return Err(InstallError::Command {
                program: command.display(),
                details: "exit status: 1".to_string(),
            });
        }

        let reply = match command.program.as_str() {
            "erl" => "23",
            "elixir" => "Elixir 1.10.4 (compiled with Erlang/OTP 23)",
            "gleam" => "gleam 0.13.2",
            "rebar3" => "rebar 3.10.0 on Erlang/OTP 23 Erts 11.2",
            _ => "",
        };
        Ok(reply.to_string())
    }
}
