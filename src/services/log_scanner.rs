//! Session log scanner
//!
//! Tails the supervised agent's structured (JSONL) session log and counts
//! recent entries from the monitored role that match an error pattern.

#[cfg(test)]
use mockall::automock;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::WatchdogConfig;

/// Result of scanning the trailing window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Lines read from the trailing window
    pub lines_scanned: usize,
    /// Role-matching lines that hit an error pattern
    pub matches: usize,
}

impl ScanReport {
    pub fn has_errors(&self) -> bool {
        self.matches > 0
    }
}

/// Seam used by the watchdog
#[cfg_attr(test, automock)]
pub trait ErrorScanner: Send + Sync {
    fn scan(&self) -> ScanReport;

    fn has_recent_errors(&self) -> bool {
        self.scan().has_errors()
    }
}

/// Scanner over the newest session log in a directory
#[derive(Debug, Clone)]
pub struct LogScanner {
    session_dir: PathBuf,
    role: String,
    window_lines: usize,
    patterns: Vec<Regex>,
}

impl LogScanner {
    pub fn new(session_dir: PathBuf, role: &str, window_lines: usize, patterns: &[String]) -> Self {
        Self {
            session_dir,
            role: role.to_string(),
            window_lines,
            patterns: compile_patterns(patterns),
        }
    }

    pub fn from_config(config: &WatchdogConfig) -> Self {
        Self::new(
            config.session_dir.clone(),
            &config.monitored_role,
            config.error_check_lines,
            &config.error_patterns,
        )
    }

    /// Scan the trailing window of `path`. A missing file yields an empty
    /// report.
    pub fn scan_file(&self, path: &Path) -> ScanReport {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                debug!("Session log {} not readable: {}", path.display(), e);
                return ScanReport::default();
            }
        };

        let window = tail_lines(BufReader::new(file), self.window_lines);
        let matches = window
            .iter()
            .filter(|line| self.line_matches(line))
            .count();

        ScanReport {
            lines_scanned: window.len(),
            matches,
        }
    }

    pub fn has_recent_errors(&self, path: &Path) -> bool {
        self.scan_file(path).has_errors()
    }

    fn line_matches(&self, line: &str) -> bool {
        let record: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(_) => return false,
        };

        if entry_role(&record) != Some(self.role.as_str()) {
            return false;
        }

        let mut text = String::new();
        collect_text(&record, &mut text);
        self.patterns.iter().any(|re| re.is_match(&text))
    }
}

impl ErrorScanner for LogScanner {
    fn scan(&self) -> ScanReport {
        match latest_session_log(&self.session_dir) {
            Some(path) => {
                let report = self.scan_file(&path);
                debug!(
                    "Scanned {} lines of {}: {} error matches",
                    report.lines_scanned,
                    path.display(),
                    report.matches
                );
                report
            }
            None => {
                debug!("No session log in {}", self.session_dir.display());
                ScanReport::default()
            }
        }
    }
}

/// Most recently modified `*.jsonl` file in `dir`.
pub fn latest_session_log(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("jsonl"))
        .filter_map(|path| {
            let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
}

/// Case-insensitive patterns; invalid regexes match literally.
fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .filter_map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .or_else(|_| {
                    RegexBuilder::new(&regex::escape(pattern))
                        .case_insensitive(true)
                        .build()
                })
                .map_err(|e| warn!("Dropping error pattern '{}': {}", pattern, e))
                .ok()
        })
        .collect()
}

fn tail_lines<R: BufRead>(reader: R, window: usize) -> VecDeque<String> {
    let mut lines = VecDeque::with_capacity(window);
    if window == 0 {
        return lines;
    }

    for chunk in reader.split(b'\n') {
        let Ok(bytes) = chunk else { break };
        if lines.len() == window {
            lines.pop_front();
        }
        lines.push_back(String::from_utf8_lossy(&bytes).into_owned());
    }

    lines
}

/// Role of an entry: top-level `role` or nested `message.role`.
fn entry_role(record: &Value) -> Option<&str> {
    record
        .get("role")
        .and_then(Value::as_str)
        .or_else(|| {
            record
                .get("message")
                .and_then(|m| m.get("role"))
                .and_then(Value::as_str)
        })
}

/// Every string leaf except `role` values, space separated.
fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        Value::Array(items) => items.iter().for_each(|item| collect_text(item, out)),
        Value::Object(map) => map
            .iter()
            .filter(|(key, _)| key.as_str() != "role")
            .for_each(|(_, v)| collect_text(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scanner(dir: &Path, window: usize) -> LogScanner {
        LogScanner::new(
            dir.to_path_buf(),
            "assistant",
            window,
            &["error".to_string(), "timed? ?out".to_string()],
        )
    }

    fn write_log(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn test_missing_file_has_no_errors() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = scanner(dir.path(), 50);
        assert!(!scanner.has_recent_errors(&dir.path().join("absent.jsonl")));
        assert_eq!(scanner.scan(), ScanReport::default());
    }

    #[test]
    fn test_empty_file_has_no_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "s.jsonl", &[]);
        assert!(!scanner(dir.path(), 50).has_recent_errors(&path));
    }

    #[test]
    fn test_matching_role_and_pattern_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(
            dir.path(),
            "s.jsonl",
            &[
                r#"{"role":"user","content":"hello"}"#,
                r#"{"type":"message","message":{"role":"assistant","content":[{"type":"text","text":"Provider ERROR: overloaded"}]}}"#,
            ],
        );

        let report = scanner(dir.path(), 50).scan_file(&path);
        assert_eq!(report.lines_scanned, 2);
        assert_eq!(report.matches, 1);
    }

    #[test]
    fn test_other_roles_never_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(
            dir.path(),
            "s.jsonl",
            &[r#"{"role":"user","content":"I saw an error"}"#],
        );
        assert!(!scanner(dir.path(), 50).has_recent_errors(&path));
    }

    #[test]
    fn test_lines_outside_window_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(
            dir.path(),
            "s.jsonl",
            &[
                r#"{"role":"assistant","content":"request timed out"}"#,
                r#"{"role":"assistant","content":"all good"}"#,
                r#"{"role":"assistant","content":"done"}"#,
            ],
        );

        assert!(!scanner(dir.path(), 2).has_recent_errors(&path));
        assert!(scanner(dir.path(), 3).has_recent_errors(&path));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(
            dir.path(),
            "s.jsonl",
            &[
                "error: this is not json",
                r#"{"role":"assistant""#,
                r#"{"role":"assistant","content":"fatal error in tool"}"#,
            ],
        );

        let report = scanner(dir.path(), 50).scan_file(&path);
        assert_eq!(report.lines_scanned, 3);
        assert_eq!(report.matches, 1);
    }

    #[test]
    fn test_role_value_is_not_searched() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = LogScanner::new(
            dir.path().to_path_buf(),
            "error-bot",
            50,
            &["error".to_string()],
        );
        let path = write_log(
            dir.path(),
            "s.jsonl",
            &[r#"{"role":"error-bot","content":"fine"}"#],
        );
        assert!(!scanner.has_recent_errors(&path));
    }

    #[test]
    fn test_invalid_regex_matches_literally() {
        let patterns = compile_patterns(&["fail(".to_string()]);
        assert_eq!(patterns.len(), 1);
        assert!(patterns[0].is_match("call FAIL( here"));
    }

    #[test]
    fn test_latest_session_log_picks_newest_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let old = write_log(dir.path(), "old.jsonl", &[]);
        let an_hour_ago = std::time::SystemTime::now() - std::time::Duration::from_secs(3_600);
        File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(an_hour_ago)
            .unwrap();
        let newest = write_log(dir.path(), "new.jsonl", &[]);
        write_log(dir.path(), "notes.txt", &[]);

        assert_eq!(latest_session_log(dir.path()), Some(newest));
        assert_eq!(latest_session_log(&dir.path().join("missing")), None);
    }
}
