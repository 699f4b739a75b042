//! Read-only status report

use anyhow::Result;
use chrono::{Local, TimeZone};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use crate::config::WatchdogConfig;
use crate::services::{LivenessProbe, ProcessInfo, RateLimitStore, SystemProcessProbe};

/// Print liveness, effective configuration, rate-limit state and log tail.
pub async fn show_status(config: &WatchdogConfig) -> Result<()> {
    let info = SystemProcessProbe::new(&config.process_pattern)
        .describe()
        .await;
    let last_check = RateLimitStore::new(config.rate_limit_file()).last_check();
    let tail = tail_file(&config.log_file(), config.status_tail_lines)?;

    print!(
        "{}",
        render_status(config, &info, last_check, RateLimitStore::now(), &tail)
    );
    Ok(())
}

pub fn render_status(
    config: &WatchdogConfig,
    info: &ProcessInfo,
    last_check: Option<i64>,
    now: i64,
    tail: &[String],
) -> String {
    let mut lines = Vec::new();

    lines.push(String::new());
    lines.push("=".repeat(60));
    lines.push("  GATEWAY WATCHDOG STATUS".to_string());
    lines.push("=".repeat(60));
    lines.push(String::new());

    let state = if info.pid.is_some() { "running" } else { "stopped" };
    lines.push(format!("  {:<15} {:<12} {:<10} {}", "PROCESS", "STATUS", "PID", "UPTIME"));
    lines.push(format!("  {}", "-".repeat(55)));
    lines.push(format!(
        "  {:<15} {:<12} {:<10} {}",
        truncate(&config.process_pattern, 15),
        state,
        info.pid_display(),
        info.uptime_display()
    ));

    lines.push(String::new());
    lines.push("  Configuration".to_string());
    lines.push(format!("  {}", "-".repeat(55)));
    for (key, value) in config_rows(config) {
        lines.push(format!("  {:<34} {}", key, value));
    }

    lines.push(String::new());
    lines.push("  Deep connectivity check".to_string());
    lines.push(format!("  {}", "-".repeat(55)));
    let rate_limit = rate_limit_line(
        config.deep_check_enabled,
        last_check,
        now,
        config.connectivity_check_interval_secs,
    );
    lines.push(format!("  {}", rate_limit));

    lines.push(String::new());
    lines.push(format!(
        "  Last {} log lines ({})",
        config.status_tail_lines,
        config.log_file().display()
    ));
    lines.push(format!("  {}", "-".repeat(55)));
    if tail.is_empty() {
        lines.push("  (no log entries)".to_string());
    } else {
        lines.extend(tail.iter().map(|line| format!("  {}", line)));
    }

    lines.push(String::new());
    lines.push("=".repeat(60));
    lines.push(String::new());

    lines.join("\n")
}

fn config_rows(config: &WatchdogConfig) -> Vec<(&'static str, String)> {
    let token = match config.api_token {
        Some(_) => format!("{} (set, redacted)", config.api_token_env),
        None => format!("{} (not set)", config.api_token_env),
    };

    vec![
        ("max_restart_attempts", config.max_restart_attempts.to_string()),
        ("restart_delay_secs", config.restart_delay_secs.to_string()),
        ("stabilization_delay_secs", config.stabilization_delay_secs.to_string()),
        ("health_check_interval_secs", config.health_check_interval_secs.to_string()),
        ("notify_on_success", config.notify_on_success.to_string()),
        ("wake_on_error", config.wake_on_error.to_string()),
        ("agent_name", config.agent_name.clone()),
        ("monitored_role", config.monitored_role.clone()),
        ("deep_check_enabled", config.deep_check_enabled.to_string()),
        ("connectivity_timeout_secs", config.connectivity_timeout_secs.to_string()),
        (
            "connectivity_check_interval_secs",
            config.connectivity_check_interval_secs.to_string(),
        ),
        ("gateway_port", config.gateway_port.to_string()),
        ("api_probe_url", config.api_probe_url.clone()),
        ("api_token", token),
        ("error_check_lines", config.error_check_lines.to_string()),
        ("error_patterns", config.error_patterns.join(",")),
        ("process_pattern", config.process_pattern.clone()),
        ("control_command", config.control_command.join(" ")),
        ("command_timeout_secs", config.command_timeout_secs.to_string()),
        ("wake_command", config.wake_command.join(" ")),
        ("log_dir", config.log_dir.display().to_string()),
        ("state_dir", config.state_dir.display().to_string()),
        ("session_dir", config.session_dir.display().to_string()),
    ]
}

fn rate_limit_line(enabled: bool, last_check: Option<i64>, now: i64, interval_secs: u64) -> String {
    if !enabled {
        return "disabled".to_string();
    }

    let Some(last) = last_check else {
        return "never run; due on next check".to_string();
    };

    let when = Local
        .timestamp_opt(last, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| last.to_string());

    let next = last.saturating_add(interval_secs as i64);
    if now >= next {
        format!("last run {}; due on next check", when)
    } else {
        format!("last run {}; next allowed in {}s", when, next - now)
    }
}

/// Last `n` lines of a file; a missing file has no lines.
pub fn tail_file(path: &Path, n: usize) -> std::io::Result<Vec<String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut window = VecDeque::with_capacity(n);
    for line in BufReader::new(file).lines() {
        let line = line?;
        if window.len() == n {
            window.pop_front();
        }
        if n > 0 {
            window.push_back(line);
        }
    }
    Ok(window.into())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(2)).collect();
        format!("{}..", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn config() -> WatchdogConfig {
        let mut config = {
            let _env = crate::config::env_lock();
            WatchdogConfig::default_config().unwrap()
        };
        config.api_token = Some("123456:SECRET-token".to_string());
        config
    }

    #[test]
    fn test_token_is_redacted() {
        let info = ProcessInfo {
            pid: Some(4242),
            uptime: Some(Duration::from_secs(3723)),
        };
        let out = render_status(&config(), &info, None, 0, &[]);

        assert!(!out.contains("SECRET"));
        assert!(out.contains("TELEGRAM_BOT_TOKEN (set, redacted)"));
        assert!(out.contains("4242"));
        assert!(out.contains("1h 02m 03s"));
        assert!(out.contains("running"));
        assert!(out.contains("(no log entries)"));
    }

    #[test]
    fn test_not_running() {
        let out = render_status(&config(), &ProcessInfo::not_running(), None, 0, &[]);
        assert!(out.contains("stopped"));
        assert!(out.contains("not running"));
        assert!(out.contains("unknown"));
    }

    #[test]
    fn test_rate_limit_line() {
        assert_eq!(rate_limit_line(false, Some(10), 20, 900), "disabled");
        assert_eq!(
            rate_limit_line(true, None, 20, 900),
            "never run; due on next check"
        );
        assert!(rate_limit_line(true, Some(1_000), 1_100, 900).ends_with("next allowed in 800s"));
        assert!(rate_limit_line(true, Some(1_000), 1_900, 900).ends_with("due on next check"));
    }

    #[test]
    fn test_tail_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..30 {
            writeln!(file, "line {}", i).unwrap();
        }

        let tail = tail_file(file.path(), 3).unwrap();
        assert_eq!(tail, vec!["line 27", "line 28", "line 29"]);

        let dir = tempfile::tempdir().unwrap();
        assert!(tail_file(&dir.path().join("absent.log"), 5).unwrap().is_empty());
    }
}
