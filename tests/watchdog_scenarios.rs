//! End-to-end health check runs against in-memory fakes.

use async_trait::async_trait;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gateway_watchdog::adapters::{
    CommandOutcome, DesktopChannel, ProcessControl, Urgency, WakeChannel,
};
use gateway_watchdog::services::{
    ConnectivityCheck, ConnectivityOutcome, ErrorScanner, LivenessProbe, LogScanner, ProcessInfo,
    ScanReport,
};
use gateway_watchdog::supervisor::{AlertManager, AlertManagerConfig, RecoveryController};
use gateway_watchdog::{HealthStatus, RecoveryAction, RunOutcome, Watchdog, WatchdogSettings};

/// Supervised process: optionally comes up on the Nth restart command.
struct FakeGateway {
    alive: AtomicBool,
    up_on_restart: Option<u32>,
    restarts: AtomicU32,
    starts: AtomicU32,
}

impl FakeGateway {
    fn running() -> Arc<Self> {
        Arc::new(Self {
            alive: AtomicBool::new(true),
            up_on_restart: None,
            restarts: AtomicU32::new(0),
            starts: AtomicU32::new(0),
        })
    }

    fn down(up_on_restart: Option<u32>) -> Arc<Self> {
        Arc::new(Self {
            alive: AtomicBool::new(false),
            up_on_restart,
            restarts: AtomicU32::new(0),
            starts: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl LivenessProbe for FakeGateway {
    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn describe(&self) -> ProcessInfo {
        if self.alive.load(Ordering::SeqCst) {
            ProcessInfo {
                pid: Some(4242),
                uptime: Some(Duration::from_secs(60)),
            }
        } else {
            ProcessInfo::not_running()
        }
    }
}

#[async_trait]
impl ProcessControl for FakeGateway {
    fn tool_name(&self) -> String {
        "fake-gateway".to_string()
    }

    async fn restart(&self) -> CommandOutcome {
        let n = self.restarts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.up_on_restart == Some(n) {
            self.alive.store(true, Ordering::SeqCst);
        }
        CommandOutcome::Ok
    }

    async fn start(&self) -> CommandOutcome {
        self.starts.fetch_add(1, Ordering::SeqCst);
        CommandOutcome::Ok
    }
}

struct FixedConnectivity(ConnectivityOutcome);

#[async_trait]
impl ConnectivityCheck for FixedConnectivity {
    async fn check(&self) -> ConnectivityOutcome {
        self.0.clone()
    }
}

struct CleanLog;

impl ErrorScanner for CleanLog {
    fn scan(&self) -> ScanReport {
        ScanReport::default()
    }
}

#[derive(Default)]
struct Outbox {
    desktop: Mutex<Vec<(String, Urgency)>>,
    wakes: Mutex<Vec<String>>,
}

#[async_trait]
impl DesktopChannel for Outbox {
    async fn send(&self, title: &str, _message: &str, urgency: Urgency) -> CommandOutcome {
        self.desktop.lock().unwrap().push((title.to_string(), urgency));
        CommandOutcome::Ok
    }
}

#[async_trait]
impl WakeChannel for Outbox {
    async fn wake(&self, message: &str) -> CommandOutcome {
        self.wakes.lock().unwrap().push(message.to_string());
        CommandOutcome::Ok
    }
}

fn settings(max_restart_attempts: u32) -> WatchdogSettings {
    WatchdogSettings {
        max_restart_attempts,
        restart_delay: Duration::from_secs(10),
        stabilization_delay: Duration::from_secs(5),
        process_pattern: "openclaw-gateway".to_string(),
    }
}

fn watchdog(
    max_attempts: u32,
    gateway: Arc<FakeGateway>,
    connectivity: ConnectivityOutcome,
    scanner: Arc<dyn ErrorScanner>,
    outbox: Arc<Outbox>,
) -> Watchdog {
    let recovery = RecoveryController::new(gateway.clone(), gateway.clone());
    let alerts = AlertManager::new(AlertManagerConfig::default())
        .with_desktop(outbox.clone())
        .with_wake(outbox);

    Watchdog::new(
        settings(max_attempts),
        gateway,
        Arc::new(FixedConnectivity(connectivity)),
        scanner,
        recovery,
        alerts,
    )
}

#[tokio::test(start_paused = true)]
async fn healthy_run_sends_nothing() {
    let gateway = FakeGateway::running();
    let outbox = Arc::new(Outbox::default());
    let watchdog = watchdog(
        3,
        gateway.clone(),
        ConnectivityOutcome::Disabled,
        Arc::new(CleanLog),
        outbox.clone(),
    );

    let report = watchdog.run_check().await;

    assert!(report.is_success());
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.outcome, RunOutcome::Healthy);
    assert!(report.actions.is_empty());
    assert!(outbox.desktop.lock().unwrap().is_empty());
    assert!(outbox.wakes.lock().unwrap().is_empty());
    assert_eq!(gateway.restarts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn restart_succeeds_on_second_attempt() {
    let gateway = FakeGateway::down(Some(2));
    let outbox = Arc::new(Outbox::default());
    let watchdog = watchdog(
        3,
        gateway.clone(),
        ConnectivityOutcome::Disabled,
        Arc::new(CleanLog),
        outbox.clone(),
    );

    let started = tokio::time::Instant::now();
    let report = watchdog.run_check().await;

    assert!(report.is_success());
    assert_eq!(report.outcome, RunOutcome::Resolved);
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.actions, vec![RecoveryAction::GatewayRestartSuccess]);

    // attempt 1: restart + start, attempt 2: restart
    assert_eq!(gateway.restarts.load(Ordering::SeqCst), 2);
    assert_eq!(gateway.starts.load(Ordering::SeqCst), 1);
    // three restart delays plus the stabilization pause
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(35) && elapsed < Duration::from_secs(36));

    // successes are not surfaced unless notify_on_success is set
    assert!(outbox.desktop.lock().unwrap().is_empty());
    assert!(outbox.wakes.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_restarts_escalate_once() {
    let gateway = FakeGateway::down(None);
    let outbox = Arc::new(Outbox::default());
    let watchdog = watchdog(
        2,
        gateway.clone(),
        ConnectivityOutcome::Passed,
        Arc::new(CleanLog),
        outbox.clone(),
    );

    let report = watchdog.run_check().await;

    assert!(!report.is_success());
    assert_eq!(report.outcome, RunOutcome::Escalated);
    assert_eq!(report.actions, vec![RecoveryAction::GatewayRestartFailed]);
    assert_eq!(gateway.restarts.load(Ordering::SeqCst), 2);

    let desktop = outbox.desktop.lock().unwrap();
    assert_eq!(desktop.len(), 1);
    assert_eq!(desktop[0].1, Urgency::Critical);

    let wakes = outbox.wakes.lock().unwrap();
    assert_eq!(wakes.len(), 1);
    assert!(wakes[0].starts_with("System Notice: main - "));
    assert!(wakes[0].contains("restart failed after 2 attempts"));
}

#[tokio::test(start_paused = true)]
async fn connectivity_failure_fixed_by_restart() {
    let gateway = FakeGateway::running();
    let outbox = Arc::new(Outbox::default());
    let watchdog = watchdog(
        3,
        gateway.clone(),
        ConnectivityOutcome::Failed("local port 18789 refused connection".to_string()),
        Arc::new(CleanLog),
        outbox.clone(),
    );

    let report = watchdog.run_check().await;

    assert!(report.is_success());
    assert_eq!(report.outcome, RunOutcome::Resolved);
    assert_eq!(
        report.actions,
        vec![
            RecoveryAction::ConnectivityIssue,
            RecoveryAction::ConnectivityRestartSuccess
        ]
    );
    assert_eq!(gateway.restarts.load(Ordering::SeqCst), 1);
    assert!(outbox.wakes.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn session_log_errors_trigger_gentle_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = std::fs::File::create(dir.path().join("session.jsonl")).unwrap();
    writeln!(log, r#"{{"role":"user","content":"hello"}}"#).unwrap();
    writeln!(
        log,
        r#"{{"message":{{"role":"assistant","content":[{{"type":"text","text":"Request failed: ECONNREFUSED"}}]}}}}"#
    )
    .unwrap();

    let patterns = vec!["error".to_string(), "ECONNREFUSED".to_string()];
    let scanner = LogScanner::new(dir.path().to_path_buf(), "assistant", 50, &patterns);

    let gateway = FakeGateway::running();
    let outbox = Arc::new(Outbox::default());
    let watchdog = watchdog(
        3,
        gateway.clone(),
        ConnectivityOutcome::Skipped,
        Arc::new(scanner),
        outbox.clone(),
    );

    let report = watchdog.run_check().await;

    assert!(report.is_success());
    assert_eq!(
        report.actions,
        vec![
            RecoveryAction::ErrorsDetected,
            RecoveryAction::ErrorRecoverySuccess
        ]
    );
    // one gentle cycle, no explicit start
    assert_eq!(gateway.restarts.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.starts.load(Ordering::SeqCst), 0);

    let wakes = outbox.wakes.lock().unwrap();
    assert_eq!(wakes.len(), 1);
    assert!(wakes[0].contains("recovered from error state"));
    assert!(outbox.desktop.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn recover_is_noop_when_alive() {
    let gateway = FakeGateway::running();
    let outbox = Arc::new(Outbox::default());
    let watchdog = watchdog(
        3,
        gateway.clone(),
        ConnectivityOutcome::Disabled,
        Arc::new(CleanLog),
        outbox.clone(),
    );

    let report = watchdog.force_recover(1).await;

    assert!(report.is_success());
    assert!(report.actions.is_empty());
    assert_eq!(gateway.restarts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn recover_uses_a_single_attempt() {
    let gateway = FakeGateway::down(None);
    let outbox = Arc::new(Outbox::default());
    let watchdog = watchdog(
        3,
        gateway.clone(),
        ConnectivityOutcome::Disabled,
        Arc::new(CleanLog),
        outbox.clone(),
    );

    let report = watchdog.force_recover(1).await;

    assert_eq!(report.outcome, RunOutcome::Escalated);
    assert_eq!(gateway.restarts.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.starts.load(Ordering::SeqCst), 1);
    assert_eq!(outbox.wakes.lock().unwrap().len(), 1);
}
