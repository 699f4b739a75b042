pub mod connectivity;
pub mod log_scanner;
pub mod process_probe;
pub mod rate_limit;

pub use connectivity::{ConnectivityCheck, ConnectivityOutcome, ConnectivityProbe};
pub use log_scanner::{latest_session_log, ErrorScanner, LogScanner, ScanReport};
pub use process_probe::{format_uptime, LivenessProbe, ProcessInfo, SystemProcessProbe};
pub use rate_limit::RateLimitStore;
