//! Adapters for the watchdog's external collaborators
//!
//! - Process control tool (`restart` / `start` subcommands)
//! - Desktop notifications
//! - Agent wake channel

pub mod agent_wake;
pub mod control;
pub mod desktop;

pub use agent_wake::{CommandWakeChannel, WakeChannel};
pub use control::{CliProcessControl, ProcessControl};
pub use desktop::{DesktopChannel, DesktopNotifier, Urgency};

use std::io::ErrorKind;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Upper bound on one control or wake command unless configured otherwise
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of invoking an external command or delivery channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Command ran and reported success
    Ok,
    /// Command ran but failed
    Failed(String),
    /// Command could not be invoked at all (missing tool, no channel)
    Unavailable,
}

impl CommandOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, CommandOutcome::Ok)
    }
}

impl std::fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandOutcome::Ok => write!(f, "ok"),
            CommandOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            CommandOutcome::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Run `program args...` to completion and classify the result. A command
/// still running after `limit` is killed and reported as failed.
pub(crate) async fn run_command(
    program: &str,
    args: &[String],
    limit: Duration,
) -> CommandOutcome {
    debug!("Running {} {}", program, args.join(" "));

    let output = Command::new(program).args(args).kill_on_drop(true).output();
    let Ok(result) = timeout(limit, output).await else {
        return CommandOutcome::Failed(format!("timed out after {}s", limit.as_secs_f64()));
    };

    match result {
        Ok(output) if output.status.success() => CommandOutcome::Ok,
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = match stderr.trim() {
                "" => format!("exited with {}", output.status),
                text => format!("exited with {}: {}", output.status, text),
            };
            CommandOutcome::Failed(reason)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => CommandOutcome::Unavailable,
        Err(e) => CommandOutcome::Failed(e.to_string()),
    }
}
