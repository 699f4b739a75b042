//! Gateway watchdog CLI
//!
//! Commands:
//! - `gateway-watchdog check` - run one health check (default)
//! - `gateway-watchdog status` - show liveness, configuration and log tail
//! - `gateway-watchdog recover` - restart the process only if it is down

pub mod status;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::{CliProcessControl, CommandWakeChannel, DesktopNotifier};
use crate::config::{expand_home, WatchdogConfig};
use crate::services::{ConnectivityProbe, LivenessProbe, LogScanner, SystemProcessProbe};
use crate::supervisor::{AlertManager, RecoveryController, Watchdog, WatchdogSettings};

pub const DEFAULT_CONFIG_PATH: &str = "~/.gateway-watchdog/watchdog.conf";
pub const DEFAULT_SECRETS_PATH: &str = "~/.gateway-watchdog/secrets.env";

/// Gateway Watchdog CLI
#[derive(Parser, Debug)]
#[command(name = "gateway-watchdog")]
#[command(author, version, about = "Health-check and recovery watchdog for a supervised gateway process")]
pub struct Cli {
    /// Key=value configuration file
    #[arg(long, env = "WATCHDOG_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Key=value secrets file, exported into the environment
    #[arg(long, env = "WATCHDOG_SECRETS", global = true)]
    pub secrets: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the full health check and recover if needed
    Check,

    /// Show process liveness, configuration and recent log lines
    Status,

    /// Force one restart cycle if the process is not running
    Recover,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Check)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| expand_home(DEFAULT_CONFIG_PATH))
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.secrets
            .clone()
            .unwrap_or_else(|| expand_home(DEFAULT_SECRETS_PATH))
    }
}

/// Wire the production adapters into a watchdog.
pub fn build_watchdog(config: &WatchdogConfig) -> Result<Watchdog> {
    let control = CliProcessControl::new(&config.control_command)
        .ok_or_else(|| anyhow!("control_command is empty"))?
        .with_timeout(config.command_timeout());

    let probe: Arc<dyn LivenessProbe> =
        Arc::new(SystemProcessProbe::new(&config.process_pattern));
    let recovery = RecoveryController::new(Arc::new(control), probe.clone());

    let alerts = AlertManager::new(config.into())
        .with_desktop(Arc::new(DesktopNotifier::default()))
        .with_wake(Arc::new(
            CommandWakeChannel::new(config.wake_command.clone())
                .with_timeout(config.command_timeout()),
        ));

    Ok(Watchdog::new(
        WatchdogSettings::from(config),
        probe,
        Arc::new(ConnectivityProbe::from_config(config)),
        Arc::new(LogScanner::from_config(config)),
        recovery,
        alerts,
    ))
}

/// Dispatch a command. Returns whether the run succeeded.
pub async fn run(command: Commands, config: &WatchdogConfig) -> Result<bool> {
    match command {
        Commands::Check => {
            let watchdog = build_watchdog(config)?;
            Ok(watchdog.run_check().await.is_success())
        }
        Commands::Status => {
            status::show_status(config).await?;
            Ok(true)
        }
        Commands::Recover => {
            let watchdog = build_watchdog(config)?;
            Ok(watchdog.force_recover(1).await.is_success())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_check() {
        let cli = Cli::try_parse_from(["gateway-watchdog"]).unwrap();
        assert_eq!(cli.command(), Commands::Check);
    }

    #[test]
    fn test_subcommands_and_paths() {
        let cli = Cli::try_parse_from([
            "gateway-watchdog",
            "recover",
            "--config",
            "/tmp/w.conf",
        ])
        .unwrap();
        assert_eq!(cli.command(), Commands::Recover);
        assert_eq!(cli.config_path(), PathBuf::from("/tmp/w.conf"));
    }

    #[test]
    fn test_unknown_subcommand_is_an_error() {
        let err = Cli::try_parse_from(["gateway-watchdog", "reboot"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_help_is_not_an_error_exit() {
        let err = Cli::try_parse_from(["gateway-watchdog", "--help"]).unwrap_err();
        assert!(!err.use_stderr());
    }
}
