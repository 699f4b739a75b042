//! Process liveness probe
//!
//! Looks the supervised process up in the OS process table by command-line
//! substring, the way `pgrep -f` does.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::time::Duration;
use sysinfo::{Pid, System};
use tracing::debug;

/// Snapshot of the supervised process for status reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    /// PID of the first matching process, `None` when not running
    pub pid: Option<u32>,
    /// Time since the process started, `None` when unknown
    pub uptime: Option<Duration>,
}

impl ProcessInfo {
    pub fn not_running() -> Self {
        Self {
            pid: None,
            uptime: None,
        }
    }

    pub fn pid_display(&self) -> String {
        self.pid
            .map(|pid| pid.to_string())
            .unwrap_or_else(|| "not running".to_string())
    }

    pub fn uptime_display(&self) -> String {
        self.uptime
            .map(format_uptime)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Answers "is the supervised process alive".
///
/// Absence is a normal `false`, never an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_alive(&self) -> bool;

    async fn describe(&self) -> ProcessInfo;
}

/// `LivenessProbe` over the live OS process table
#[derive(Debug, Clone)]
pub struct SystemProcessProbe {
    pattern: String,
}

impl SystemProcessProbe {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
        }
    }

    /// Find the first process whose command line contains the pattern.
    fn find(&self) -> Option<ProcessInfo> {
        let mut system = System::new();
        system.refresh_processes();

        let own_pid = sysinfo::get_current_pid().ok();

        let mut matches: Vec<(Pid, Option<Duration>)> = system
            .processes()
            .iter()
            .filter(|(pid, _)| Some(**pid) != own_pid)
            .filter(|(_, process)| {
                let cmdline = process.cmd().join(" ");
                let haystack = if cmdline.is_empty() {
                    process.name()
                } else {
                    cmdline.as_str()
                };
                haystack.contains(&self.pattern)
            })
            .map(|(pid, process)| {
                let uptime = if process.start_time() == 0 {
                    None
                } else {
                    Some(Duration::from_secs(process.run_time()))
                };
                (*pid, uptime)
            })
            .collect();

        // Lowest PID first so repeated lookups report the same process
        matches.sort_by_key(|(pid, _)| pid.as_u32());

        matches.into_iter().next().map(|(pid, uptime)| {
            debug!("Process matching '{}' found: pid {}", self.pattern, pid);
            ProcessInfo {
                pid: Some(pid.as_u32()),
                uptime,
            }
        })
    }
}

#[async_trait]
impl LivenessProbe for SystemProcessProbe {
    async fn is_alive(&self) -> bool {
        self.find().is_some()
    }

    async fn describe(&self) -> ProcessInfo {
        self.find().unwrap_or_else(ProcessInfo::not_running)
    }
}

/// Format an uptime as `1h 02m 03s`, dropping leading zero units.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (days, hours, mins, secs) = (
        secs / 86_400,
        (secs % 86_400) / 3_600,
        (secs % 3_600) / 60,
        secs % 60,
    );

    if days > 0 {
        format!("{}d {:02}h {:02}m", days, hours, mins)
    } else if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
