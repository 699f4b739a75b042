//! Watchdog health check
//!
//! One tick of supervision: liveness gate, connectivity gate, soft-error
//! gate. Any gate that cannot recover escalates and ends the run; the next
//! scheduled tick starts from scratch.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::alert_manager::AlertManager;
use super::recovery::RecoveryController;
use crate::config::WatchdogConfig;
use crate::error::WatchdogError;
use crate::services::{ConnectivityCheck, ConnectivityOutcome, ErrorScanner, LivenessProbe};

/// Transient health status of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Recovering,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Recovering => write!(f, "recovering"),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing needed doing
    Healthy,
    /// A problem was found and fixed
    Resolved,
    /// Automated recovery failed and a human/agent was alerted
    Escalated,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Healthy => write!(f, "healthy"),
            RunOutcome::Resolved => write!(f, "resolved"),
            RunOutcome::Escalated => write!(f, "escalated"),
        }
    }
}

/// Actions recorded during a run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    GatewayRestartSuccess,
    GatewayRestartFailed,
    ControlUnavailable,
    ConnectivityIssue,
    ConnectivityRestartSuccess,
    ConnectivityRestartFailed,
    ErrorsDetected,
    ErrorRecoverySuccess,
    ErrorRecoveryFailed,
}

impl RecoveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryAction::GatewayRestartSuccess => "gateway_restart_success",
            RecoveryAction::GatewayRestartFailed => "gateway_restart_failed",
            RecoveryAction::ControlUnavailable => "control_unavailable",
            RecoveryAction::ConnectivityIssue => "connectivity_issue",
            RecoveryAction::ConnectivityRestartSuccess => "connectivity_restart_success",
            RecoveryAction::ConnectivityRestartFailed => "connectivity_restart_failed",
            RecoveryAction::ErrorsDetected => "errors_detected",
            RecoveryAction::ErrorRecoverySuccess => "error_recovery_success",
            RecoveryAction::ErrorRecoveryFailed => "error_recovery_failed",
        }
    }
}

impl std::fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub status: HealthStatus,
    pub outcome: RunOutcome,
    pub actions: Vec<RecoveryAction>,
}

impl CheckReport {
    pub fn is_success(&self) -> bool {
        self.outcome != RunOutcome::Escalated
    }

    pub fn summary(&self) -> String {
        let actions: Vec<&str> = self.actions.iter().map(RecoveryAction::as_str).collect();
        format!(
            "status={} outcome={} actions=[{}]",
            self.status,
            self.outcome,
            actions.join(",")
        )
    }
}

/// Which gate a liveness ladder runs for
#[derive(Debug, Clone, Copy)]
enum Gate {
    Liveness,
    Connectivity,
}

/// Mutable state of a single run
struct Run {
    status: HealthStatus,
    actions: Vec<RecoveryAction>,
}

impl Run {
    fn new() -> Self {
        Self {
            status: HealthStatus::Healthy,
            actions: Vec::new(),
        }
    }

    fn record(&mut self, action: RecoveryAction) {
        self.actions.push(action);
    }

    fn finish(self, escalated: bool) -> CheckReport {
        let outcome = if escalated {
            RunOutcome::Escalated
        } else if self.actions.is_empty() {
            RunOutcome::Healthy
        } else {
            RunOutcome::Resolved
        };

        let report = CheckReport {
            status: self.status,
            outcome,
            actions: self.actions,
        };
        if escalated {
            error!("Health check complete: {}", report.summary());
        } else {
            info!("Health check complete: {}", report.summary());
        }
        report
    }
}

/// Settings the watchdog reads on every run
#[derive(Debug, Clone)]
pub struct WatchdogSettings {
    pub max_restart_attempts: u32,
    pub restart_delay: Duration,
    pub stabilization_delay: Duration,
    pub process_pattern: String,
}

impl From<&WatchdogConfig> for WatchdogSettings {
    fn from(config: &WatchdogConfig) -> Self {
        Self {
            max_restart_attempts: config.max_restart_attempts,
            restart_delay: config.restart_delay(),
            stabilization_delay: config.stabilization_delay(),
            process_pattern: config.process_pattern.clone(),
        }
    }
}

/// Health-check orchestrator
pub struct Watchdog {
    settings: WatchdogSettings,
    probe: Arc<dyn LivenessProbe>,
    connectivity: Arc<dyn ConnectivityCheck>,
    scanner: Arc<dyn ErrorScanner>,
    recovery: RecoveryController,
    alerts: AlertManager,
}

impl Watchdog {
    pub fn new(
        settings: WatchdogSettings,
        probe: Arc<dyn LivenessProbe>,
        connectivity: Arc<dyn ConnectivityCheck>,
        scanner: Arc<dyn ErrorScanner>,
        recovery: RecoveryController,
        alerts: AlertManager,
    ) -> Self {
        Self {
            settings,
            probe,
            connectivity,
            scanner,
            recovery,
            alerts,
        }
    }

    /// Run the full health check: liveness, connectivity, then soft errors.
    pub async fn run_check(&self) -> CheckReport {
        info!("Starting health check");
        let mut run = Run::new();

        // Liveness gate
        if !self.probe.is_alive().await {
            warn!(
                "Process matching '{}' is not running",
                self.settings.process_pattern
            );
            let max_attempts = self.settings.max_restart_attempts;
            if !self.recover(&mut run, Gate::Liveness, max_attempts, None).await {
                return run.finish(true);
            }
        } else {
            info!("Process is running");
        }

        // Connectivity gate
        match self.connectivity.check().await {
            ConnectivityOutcome::Failed(reason) => {
                warn!("Connectivity issue detected: {}", reason);
                run.record(RecoveryAction::ConnectivityIssue);
                let max_attempts = self.settings.max_restart_attempts;
                if !self
                    .recover(&mut run, Gate::Connectivity, max_attempts, Some(&reason))
                    .await
                {
                    return run.finish(true);
                }
            }
            ConnectivityOutcome::Passed => info!("Connectivity OK"),
            ConnectivityOutcome::Skipped | ConnectivityOutcome::Disabled => {}
        }

        // Soft-error gate
        let scan = self.scanner.scan();
        if scan.has_errors() {
            warn!(
                "Detected {} recent error entries in the last {} session log lines",
                scan.matches, scan.lines_scanned
            );
            run.record(RecoveryAction::ErrorsDetected);
            if !self.recover_from_errors(&mut run, scan.matches).await {
                return run.finish(true);
            }
        } else {
            info!("No recent errors in session log");
        }

        run.finish(false)
    }

    /// Restart the process if it is down, otherwise do nothing.
    pub async fn force_recover(&self, max_attempts: u32) -> CheckReport {
        let mut run = Run::new();

        if self.probe.is_alive().await {
            info!("Process already running, nothing to recover");
            return run.finish(false);
        }

        warn!(
            "Process matching '{}' is not running, forcing recovery",
            self.settings.process_pattern
        );
        let recovered = self
            .recover(&mut run, Gate::Liveness, max_attempts, None)
            .await;
        run.finish(!recovered)
    }

    /// Restart ladder for a hard failure. Returns false after escalating.
    async fn recover(
        &self,
        run: &mut Run,
        gate: Gate,
        max_attempts: u32,
        failure: Option<&str>,
    ) -> bool {
        run.status = HealthStatus::Recovering;

        let result = self
            .recovery
            .restart(max_attempts, self.settings.restart_delay)
            .await;

        match (gate, result) {
            (Gate::Liveness, Ok(report)) if report.recovered => {
                info!(
                    "Process restarted after {} attempt(s)",
                    report.attempts_used
                );
                run.record(RecoveryAction::GatewayRestartSuccess);
                self.alerts
                    .recovered(
                        "Gateway Recovered",
                        &format!("Restarted after {} attempt(s)", report.attempts_used),
                    )
                    .await;
                self.stabilize(run).await;
                true
            }
            (Gate::Connectivity, Ok(report)) if report.recovered => {
                info!("Connectivity issue fixed by restart");
                run.record(RecoveryAction::ConnectivityRestartSuccess);
                self.alerts
                    .recovered("Gateway Recovered", "Connectivity restored by restart")
                    .await;
                self.stabilize(run).await;
                true
            }
            (Gate::Liveness, Ok(report)) => {
                error!(
                    "Process failed to start after {} attempts",
                    report.attempts_used
                );
                run.record(RecoveryAction::GatewayRestartFailed);
                let context = format!(
                    "process '{}' is down; control tool '{}'",
                    self.settings.process_pattern,
                    self.recovery.tool_name()
                );
                self.alerts
                    .escalate(
                        "Gateway Down",
                        &format!("restart failed after {} attempts", report.attempts_used),
                        Some(&context),
                    )
                    .await;
                false
            }
            (Gate::Connectivity, Ok(_)) => {
                error!("Connectivity failed and restart failed");
                run.record(RecoveryAction::ConnectivityRestartFailed);
                self.alerts
                    .escalate(
                        "Gateway Unreachable",
                        "connectivity failed and restart failed",
                        failure,
                    )
                    .await;
                false
            }
            (_, Err(e)) => {
                self.escalate_error(run, e).await;
                false
            }
        }
    }

    /// Single gentle restart for soft errors. Returns false after escalating.
    async fn recover_from_errors(&self, run: &mut Run, matches: usize) -> bool {
        run.status = HealthStatus::Recovering;

        match self
            .recovery
            .gentle_restart(self.settings.restart_delay)
            .await
        {
            Ok(true) => {
                info!("Recovered from error state");
                run.record(RecoveryAction::ErrorRecoverySuccess);
                run.status = HealthStatus::Healthy;
                let context = format!("{} recent error entries", matches);
                self.alerts
                    .recovered(
                        "Gateway Recovered",
                        &format!("Recovered from error state ({})", context),
                    )
                    .await;
                self.alerts
                    .wake("recovered from error state", Some(&context))
                    .await;
                true
            }
            Ok(false) => {
                error!("Error recovery failed: process not running after restart");
                run.record(RecoveryAction::ErrorRecoveryFailed);
                self.alerts
                    .escalate(
                        "Gateway Error Recovery Failed",
                        "error recovery failed",
                        Some(&format!(
                            "{} recent error entries; process not running after restart",
                            matches
                        )),
                    )
                    .await;
                false
            }
            Err(e) => {
                self.escalate_error(run, e).await;
                false
            }
        }
    }

    async fn escalate_error(&self, run: &mut Run, err: WatchdogError) {
        error!("Recovery aborted: {}", err);
        let reason = if err.is_non_retryable() {
            run.record(RecoveryAction::ControlUnavailable);
            "control tool unavailable"
        } else {
            "recovery aborted"
        };
        self.alerts
            .escalate("Gateway Watchdog Error", reason, Some(&err.to_string()))
            .await;
    }

    async fn stabilize(&self, run: &mut Run) {
        tokio::time::sleep(self.settings.stabilization_delay).await;
        run.status = HealthStatus::Healthy;
    }
}
