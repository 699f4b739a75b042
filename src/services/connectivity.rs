//! Deep connectivity probe
//!
//! Catches a process that is alive but unreachable: probes the local gateway
//! port and, when a token is configured, an external API. Rate-limited by a
//! persisted cooldown so slow probes don't run on every tick.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::rate_limit::RateLimitStore;
use crate::config::WatchdogConfig;

/// Result of one connectivity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityOutcome {
    /// Deep checks are turned off
    Disabled,
    /// Inside the cooldown window, no probe ran
    Skipped,
    /// Probes ran and passed
    Passed,
    /// A probe ran and failed
    Failed(String),
}

impl ConnectivityOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ConnectivityOutcome::Failed(_))
    }
}

/// Seam used by the watchdog
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConnectivityCheck: Send + Sync {
    async fn check(&self) -> ConnectivityOutcome;

    async fn check_connectivity(&self) -> bool {
        self.check().await.is_success()
    }
}

/// Local port + external API probe
pub struct ConnectivityProbe {
    enabled: bool,
    port: u16,
    probe_timeout: Duration,
    min_interval: Duration,
    api_url: String,
    api_token: Option<String>,
    store: RateLimitStore,
    client: Client,
}

impl ConnectivityProbe {
    pub fn from_config(config: &WatchdogConfig) -> Self {
        Self {
            enabled: config.deep_check_enabled,
            port: config.gateway_port,
            probe_timeout: config.connectivity_timeout(),
            min_interval: config.connectivity_check_interval(),
            api_url: config.api_probe_url.clone(),
            api_token: config.api_token.clone(),
            store: RateLimitStore::new(config.rate_limit_file()),
            client: Client::new(),
        }
    }

    pub fn store(&self) -> &RateLimitStore {
        &self.store
    }

    /// Connect to the local port within the probe timeout.
    async fn probe_local_port(&self) -> Result<(), String> {
        match timeout(self.probe_timeout, TcpStream::connect(("127.0.0.1", self.port))).await {
            Ok(Ok(_)) => {
                debug!("Local port {} reachable", self.port);
                Ok(())
            }
            Ok(Err(e)) => Err(format!("port {} unreachable: {}", self.port, e)),
            Err(_) => Err(format!(
                "port {} timed out after {}s",
                self.port,
                self.probe_timeout.as_secs()
            )),
        }
    }

    /// Call the external API with the bearer token. `{token}` in the URL is
    /// replaced with the token as well, for APIs that carry it in the path.
    async fn probe_api(&self, token: &str) -> Result<(), String> {
        let url = self.api_url.replace("{token}", token);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| format!("API request failed: {}", e.to_string().replace(token, "***")))?;

        if response.status().is_success() {
            debug!("External API reachable");
            Ok(())
        } else {
            Err(format!("API returned HTTP {}", response.status()))
        }
    }
}

#[async_trait]
impl ConnectivityCheck for ConnectivityProbe {
    async fn check(&self) -> ConnectivityOutcome {
        if !self.enabled {
            return ConnectivityOutcome::Disabled;
        }

        let now = RateLimitStore::now();
        if self.store.in_cooldown(now, self.min_interval) {
            debug!(
                "Connectivity check skipped (last check < {}s ago)",
                self.min_interval.as_secs()
            );
            return ConnectivityOutcome::Skipped;
        }

        // Record before probing so a slow or failing probe can't re-fire
        // on the next tick.
        if let Err(e) = self.store.record(now) {
            warn!("Failed to persist connectivity check time: {}", e);
        }

        info!("Running deep connectivity check");

        if let Err(reason) = self.probe_local_port().await {
            warn!("Connectivity check failed: {}", reason);
            return ConnectivityOutcome::Failed(reason);
        }

        if let Some(token) = self.api_token.as_deref() {
            if let Err(reason) = self.probe_api(token).await {
                warn!("Connectivity check failed: {}", reason);
                return ConnectivityOutcome::Failed(reason);
            }
        }

        info!("Connectivity check passed");
        ConnectivityOutcome::Passed
    }
}
