use gateway_watchdog::logging::RunLogFormat;
use gateway_watchdog::WatchdogConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Console plus append-only file logging.
///
/// The returned guard must live until the run ends so buffered lines reach
/// the log file.
pub fn init_logging(config: &WatchdogConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_dir = &config.log_dir;

    // `tracing_appender::rolling` panics if it can't create the log file, so
    // preflight writability.
    let mut guard = None;
    let file_layer = if std::fs::create_dir_all(log_dir).is_ok() {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.log_file())
        {
            Ok(_) => {
                let file_appender = tracing_appender::rolling::never(log_dir, "watchdog.log");
                let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
                guard = Some(worker_guard);

                Some(
                    tracing_subscriber::fmt::layer()
                        .event_format(RunLogFormat)
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log file {} ({}), file logging disabled",
                    config.log_file().display(),
                    e
                );
                None
            }
        }
    } else {
        eprintln!(
            "Warning: Could not create log directory {}, file logging disabled",
            log_dir.display()
        );
        None
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .event_format(RunLogFormat)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}

/// Minimal stderr logging for runs that fail before configuration loads
pub fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .event_format(RunLogFormat)
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
