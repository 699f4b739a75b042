//! Control interface of the supervised process
//!
//! Wraps the process's own command-line tool, e.g. `openclaw gateway restart`.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use std::time::Duration;

use super::{run_command, CommandOutcome, DEFAULT_COMMAND_TIMEOUT};

/// Restart/start operations offered by the supervised process's tooling.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Name of the control tool, used in logs and errors
    fn tool_name(&self) -> String;

    /// Issue a restart. May be a no-op when the process is not running.
    async fn restart(&self) -> CommandOutcome;

    /// Issue an explicit start.
    async fn start(&self) -> CommandOutcome;
}

/// `ProcessControl` backed by an external CLI.
#[derive(Debug, Clone)]
pub struct CliProcessControl {
    program: String,
    base_args: Vec<String>,
    timeout: Duration,
}

impl CliProcessControl {
    /// Build from a command line such as `["openclaw", "gateway"]`.
    ///
    /// Returns `None` when the command line is empty.
    pub fn new(command: &[String]) -> Option<Self> {
        let (program, base_args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            base_args: base_args.to_vec(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn args_for(&self, action: &str) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push(action.to_string());
        args
    }
}

#[async_trait]
impl ProcessControl for CliProcessControl {
    fn tool_name(&self) -> String {
        self.program.clone()
    }

    async fn restart(&self) -> CommandOutcome {
        run_command(&self.program, &self.args_for("restart"), self.timeout).await
    }

    async fn start(&self) -> CommandOutcome {
        run_command(&self.program, &self.args_for("start"), self.timeout).await
    }
}
