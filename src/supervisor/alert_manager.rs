//! Alert Manager for desktop and agent-wake notifications
//!
//! Every alert is written to the run log at NOTIFY level first, then handed
//! to the delivery channels. Delivery problems are logged and swallowed so a
//! missing notifier never fails the health check.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapters::{CommandOutcome, DesktopChannel, Urgency, WakeChannel};
use crate::config::WatchdogConfig;

/// Configuration for alert manager
#[derive(Debug, Clone)]
pub struct AlertManagerConfig {
    /// Surface successful recoveries on the desktop (default: false)
    pub notify_on_success: bool,
    /// Wake the agent on errors (default: true)
    pub wake_on_error: bool,
    /// Agent named in wake messages
    pub agent_name: String,
}

impl Default for AlertManagerConfig {
    fn default() -> Self {
        Self {
            notify_on_success: false,
            wake_on_error: true,
            agent_name: "main".to_string(),
        }
    }
}

impl From<&WatchdogConfig> for AlertManagerConfig {
    fn from(config: &WatchdogConfig) -> Self {
        Self {
            notify_on_success: config.notify_on_success,
            wake_on_error: config.wake_on_error,
            agent_name: config.agent_name.clone(),
        }
    }
}

/// Alert Manager for coordinating notifications
pub struct AlertManager {
    config: AlertManagerConfig,
    desktop: Option<Arc<dyn DesktopChannel>>,
    wake: Option<Arc<dyn WakeChannel>>,
}

impl AlertManager {
    /// Create a new alert manager with no delivery channels
    pub fn new(config: AlertManagerConfig) -> Self {
        Self {
            config,
            desktop: None,
            wake: None,
        }
    }

    /// Set desktop channel for user notifications
    pub fn with_desktop(mut self, desktop: Arc<dyn DesktopChannel>) -> Self {
        self.desktop = Some(desktop);
        self
    }

    /// Set agent wake channel
    pub fn with_wake(mut self, wake: Arc<dyn WakeChannel>) -> Self {
        self.wake = Some(wake);
        self
    }

    /// Notify the local user. Never fails the caller.
    pub async fn notify(&self, title: &str, message: &str, urgency: Urgency) -> CommandOutcome {
        info!(target: "notify", "[{}] {}: {}", urgency, title, message);

        let Some(ref desktop) = self.desktop else {
            debug!("No desktop notifier configured");
            return CommandOutcome::Unavailable;
        };

        let outcome = desktop.send(title, message, urgency).await;
        match &outcome {
            CommandOutcome::Ok => {}
            CommandOutcome::Failed(reason) => {
                warn!("Desktop notification failed: {}", reason)
            }
            CommandOutcome::Unavailable => warn!("Desktop notifier unavailable"),
        }
        outcome
    }

    /// Wake the agent with a system notice. A guaranteed no-op when waking
    /// is disabled; the skip is still logged.
    pub async fn wake(&self, reason: &str, context: Option<&str>) -> CommandOutcome {
        let message = compose_wake_message(&self.config.agent_name, reason, context);

        if !self.config.wake_on_error {
            info!("Agent wake skipped (disabled): {}", message);
            return CommandOutcome::Unavailable;
        }

        info!(target: "notify", "Waking agent: {}", message);

        let Some(ref wake) = self.wake else {
            warn!("No agent wake channel configured");
            return CommandOutcome::Unavailable;
        };

        let outcome = wake.wake(&message).await;
        match &outcome {
            CommandOutcome::Ok => debug!("Agent wake delivered"),
            CommandOutcome::Failed(reason) => warn!("Agent wake failed: {}", reason),
            CommandOutcome::Unavailable => warn!("Agent wake tool unavailable"),
        }
        outcome
    }

    /// Report a successful recovery: a desktop notification when enabled,
    /// otherwise a log line only.
    pub async fn recovered(&self, title: &str, message: &str) {
        if self.config.notify_on_success {
            self.notify(title, message, Urgency::Normal).await;
        } else {
            info!("{}: {}", title, message);
        }
    }

    /// Critical alert plus agent wake, used when automated recovery gives up.
    pub async fn escalate(&self, title: &str, reason: &str, context: Option<&str>) {
        let message = match context {
            Some(context) => format!("{}. {}", reason, context),
            None => reason.to_string(),
        };
        self.notify(title, &message, Urgency::Critical).await;
        self.wake(reason, context).await;
    }
}

/// `System Notice: <agent> - <reason>[. Context: <context>]`
pub fn compose_wake_message(agent: &str, reason: &str, context: Option<&str>) -> String {
    match context {
        Some(context) if !context.is_empty() => {
            format!("System Notice: {} - {}. Context: {}", agent, reason, context)
        }
        _ => format!("System Notice: {} - {}", agent, reason),
    }
}
