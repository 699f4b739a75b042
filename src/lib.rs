pub mod adapters;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod services;
pub mod supervisor;

pub use adapters::{CommandOutcome, Urgency};
pub use config::WatchdogConfig;
pub use error::{Result, WatchdogError};
pub use supervisor::{
    AlertManager, CheckReport, HealthStatus, RecoveryAction, RecoveryController, RunOutcome,
    Watchdog, WatchdogSettings,
};
