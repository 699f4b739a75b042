//! Recovery Controller
//!
//! Drives the supervised process back up through its control tool:
//! restart, wait, verify, then explicit start, wait, verify, for up to
//! `max_attempts` attempts.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::adapters::{CommandOutcome, ProcessControl};
use crate::error::{Result, WatchdogError};
use crate::services::LivenessProbe;

/// Outcome of a restart ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartReport {
    pub recovered: bool,
    /// Attempt on which the process came back, or `max_attempts` on failure
    pub attempts_used: u32,
}

pub struct RecoveryController {
    control: Arc<dyn ProcessControl>,
    probe: Arc<dyn LivenessProbe>,
}

impl RecoveryController {
    pub fn new(control: Arc<dyn ProcessControl>, probe: Arc<dyn LivenessProbe>) -> Self {
        Self { control, probe }
    }

    pub fn tool_name(&self) -> String {
        self.control.tool_name()
    }

    /// Restart with up to `max_attempts` attempts.
    ///
    /// Returns `Err(ControlUnavailable)` as soon as the control tool cannot
    /// be invoked; that never consumes an attempt.
    pub async fn restart(&self, max_attempts: u32, delay: Duration) -> Result<RestartReport> {
        for attempt in 1..=max_attempts {
            info!("Restart attempt {}/{}", attempt, max_attempts);

            match self.control.restart().await {
                CommandOutcome::Ok => info!("Restart command issued"),
                CommandOutcome::Failed(reason) => {
                    warn!("Restart command failed: {}", reason)
                }
                CommandOutcome::Unavailable => return Err(self.unavailable()),
            }

            tokio::time::sleep(delay).await;

            if self.probe.is_alive().await {
                info!("Process running after attempt {}", attempt);
                return Ok(RestartReport {
                    recovered: true,
                    attempts_used: attempt,
                });
            }

            // `restart` can be a no-op when nothing was running
            warn!("Process still down after restart, issuing explicit start");
            match self.control.start().await {
                CommandOutcome::Ok => info!("Start command issued"),
                CommandOutcome::Failed(reason) => warn!("Start command failed: {}", reason),
                CommandOutcome::Unavailable => return Err(self.unavailable()),
            }

            tokio::time::sleep(delay).await;

            if self.probe.is_alive().await {
                info!("Process running after start on attempt {}", attempt);
                return Ok(RestartReport {
                    recovered: true,
                    attempts_used: attempt,
                });
            }

            warn!("Attempt {}/{} did not bring the process up", attempt, max_attempts);
        }

        error!("Restart attempts exhausted ({})", max_attempts);
        Ok(RestartReport {
            recovered: false,
            attempts_used: max_attempts,
        })
    }

    /// One unconditional restart, wait, and liveness check. No retries.
    pub async fn gentle_restart(&self, delay: Duration) -> Result<bool> {
        info!("Gentle restart");

        match self.control.restart().await {
            CommandOutcome::Ok => info!("Restart command issued"),
            CommandOutcome::Failed(reason) => warn!("Restart command failed: {}", reason),
            CommandOutcome::Unavailable => return Err(self.unavailable()),
        }

        tokio::time::sleep(delay).await;
        Ok(self.probe.is_alive().await)
    }

    fn unavailable(&self) -> WatchdogError {
        let tool = self.control.tool_name();
        error!("Control tool '{}' cannot be invoked", tool);
        WatchdogError::ControlUnavailable { tool }
    }
}
