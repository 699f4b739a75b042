//! Supervisor layer
//!
//! - Watchdog: one health-check run across the three gates
//! - Recovery controller: restart ladder and gentle restart
//! - Alert manager: desktop notifications and agent wake

pub mod alert_manager;
pub mod recovery;
pub mod watchdog;

pub use alert_manager::{compose_wake_message, AlertManager, AlertManagerConfig};
pub use recovery::{RecoveryController, RestartReport};
pub use watchdog::{
    CheckReport, HealthStatus, RecoveryAction, RunOutcome, Watchdog, WatchdogSettings,
};
