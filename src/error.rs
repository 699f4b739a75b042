use thiserror::Error;

/// Main error type for the watchdog
#[derive(Error, Debug)]
pub enum WatchdogError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Recovery errors
    /// The supervised process's control tool cannot be invoked at all.
    /// Never retried.
    #[error("Control tool unavailable: {tool}")]
    ControlUnavailable { tool: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchdogError {
    /// True for failures that retrying cannot fix.
    pub fn is_non_retryable(&self) -> bool {
        matches!(self, WatchdogError::ControlUnavailable { .. })
    }
}

/// Result type alias for WatchdogError
pub type Result<T> = std::result::Result<T, WatchdogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_unavailable_is_non_retryable() {
        let err = WatchdogError::ControlUnavailable {
            tool: "openclaw".to_string(),
        };
        assert!(err.is_non_retryable());
        assert_eq!(err.to_string(), "Control tool unavailable: openclaw");

        let io = WatchdogError::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(!io.is_non_retryable());
    }
}
