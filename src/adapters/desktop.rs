//! Desktop notifications
//!
//! Delivers alerts through the local notification daemon via `notify-rust`.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use super::CommandOutcome;

/// Urgency of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    Low,
    Normal,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A channel that can show a notification to the local user.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DesktopChannel: Send + Sync {
    async fn send(&self, title: &str, message: &str, urgency: Urgency) -> CommandOutcome;
}

/// Desktop notifier backed by the platform notification service
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new("gateway-watchdog")
    }
}

#[async_trait]
impl DesktopChannel for DesktopNotifier {
    async fn send(&self, title: &str, message: &str, urgency: Urgency) -> CommandOutcome {
        let mut notification = notify_rust::Notification::new();
        notification
            .appname(&self.app_name)
            .summary(title)
            .body(message);

        #[cfg(all(unix, not(target_os = "macos")))]
        notification.urgency(match urgency {
            Urgency::Low => notify_rust::Urgency::Low,
            Urgency::Normal => notify_rust::Urgency::Normal,
            Urgency::Critical => notify_rust::Urgency::Critical,
        });

        #[cfg(not(all(unix, not(target_os = "macos"))))]
        let _ = urgency;

        match notification.show() {
            Ok(_) => {
                debug!("Desktop notification delivered");
                CommandOutcome::Ok
            }
            Err(e) => CommandOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_ordering() {
        assert!(Urgency::Low < Urgency::Normal);
        assert!(Urgency::Normal < Urgency::Critical);
        assert_eq!(Urgency::Critical.to_string(), "critical");
    }
}
