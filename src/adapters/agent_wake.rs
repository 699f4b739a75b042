//! Agent wake channel
//!
//! Hands a system notice to the supervising agent through its CLI,
//! e.g. `openclaw system event --mode now --text "<message>"`.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use std::time::Duration;

use super::{run_command, CommandOutcome, DEFAULT_COMMAND_TIMEOUT};

/// A channel that wakes the agent with a text message.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WakeChannel: Send + Sync {
    async fn wake(&self, message: &str) -> CommandOutcome;
}

/// Wake channel that runs a command with the message as its last argument
#[derive(Debug, Clone)]
pub struct CommandWakeChannel {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandWakeChannel {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl WakeChannel for CommandWakeChannel {
    async fn wake(&self, message: &str) -> CommandOutcome {
        let Some((program, base_args)) = self.command.split_first() else {
            return CommandOutcome::Unavailable;
        };

        let mut args = base_args.to_vec();
        args.push(message.to_string());
        run_command(program, &args, self.timeout).await
    }
}
