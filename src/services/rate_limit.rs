//! Persisted cooldown for deep connectivity probes
//!
//! A single Unix timestamp in a small file. Single writer assumed: the file
//! is read-modify-written without a lock, which is only safe while
//! invocations do not overlap.

use chrono::Utc;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::error::Result;

/// Last-check timestamp store
#[derive(Debug, Clone)]
pub struct RateLimitStore {
    path: PathBuf,
}

impl RateLimitStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last recorded check (Unix seconds). Missing or unreadable state reads
    /// as "never checked".
    pub fn last_check(&self) -> Option<i64> {
        match fs::read_to_string(&self.path) {
            Ok(content) => match content.trim().parse::<i64>() {
                Ok(ts) => Some(ts),
                Err(_) => {
                    warn!(
                        "Ignoring malformed rate-limit state in {}",
                        self.path.display()
                    );
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Cannot read {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Whether `now` is still inside the cooldown window.
    pub fn in_cooldown(&self, now: i64, min_interval: Duration) -> bool {
        match self.last_check() {
            Some(last) => now.saturating_sub(last) < min_interval.as_secs() as i64,
            None => false,
        }
    }

    /// Record a check at `now`. The stored value never moves backwards.
    pub fn record(&self, now: i64) -> Result<i64> {
        let value = match self.last_check() {
            Some(last) if last > now => last,
            _ => now,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format!("{}\n", value))?;
        Ok(value)
    }

    pub fn now() -> i64 {
        Utc::now().timestamp()
    }
}
