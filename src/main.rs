mod main_runtime;

use clap::Parser;
use gateway_watchdog::cli::{self, Cli, Commands};
use gateway_watchdog::config::load_secrets;
use gateway_watchdog::WatchdogConfig;
use std::process::ExitCode;
use tracing::{debug, error, warn};

use main_runtime::{init_logging, init_logging_simple};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Secrets must be in the environment before the config reads the token
    let secrets_path = cli.secrets_path();
    let secrets = load_secrets(&secrets_path);

    let config = match WatchdogConfig::load(Some(&cli.config_path())) {
        Ok(config) => config,
        Err(e) => {
            init_logging_simple();
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let command = cli.command();

    // status is read-only and stays out of the run log
    let _guard = match command {
        Commands::Status => {
            init_logging_simple();
            None
        }
        Commands::Check | Commands::Recover => init_logging(&config),
    };

    match secrets {
        Ok(count) => debug!("Exported {} secret(s) from {}", count, secrets_path.display()),
        Err(e) => warn!(
            "Could not read secrets file {}: {}",
            secrets_path.display(),
            e
        ),
    }

    match cli::run(command, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
