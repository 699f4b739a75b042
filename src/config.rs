use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, Map, Source, Value};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, WatchdogError};

/// Raw settings as read from defaults, the key=value file and the environment.
///
/// Keys are case-insensitive, so `MAX_RESTART_ATTEMPTS=3` in the file maps
/// to `max_restart_attempts`.
#[derive(Debug, Clone, Deserialize)]
struct Settings {
    max_restart_attempts: u32,
    restart_delay_secs: u64,
    stabilization_delay_secs: u64,
    health_check_interval_secs: u64,
    notify_on_success: bool,
    wake_on_error: bool,
    agent_name: String,
    monitored_role: String,
    deep_check_enabled: bool,
    connectivity_timeout_secs: u64,
    connectivity_check_interval_secs: u64,
    gateway_port: u16,
    api_probe_url: String,
    api_token_env: String,
    error_check_lines: usize,
    error_patterns: String,
    process_pattern: String,
    control_command: String,
    command_timeout_secs: u64,
    wake_command: String,
    log_dir: String,
    state_dir: String,
    #[serde(default)]
    session_dir: Option<String>,
    status_tail_lines: usize,
}

/// Immutable configuration for one watchdog invocation.
///
/// Built once at startup and passed by reference to every component.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Restart attempts in the liveness ladder (default: 3)
    pub max_restart_attempts: u32,
    /// Wait after each restart/start command before verifying (default: 10s)
    pub restart_delay_secs: u64,
    /// Pause after a successful recovery before the next gate (default: 5s)
    pub stabilization_delay_secs: u64,
    /// Scheduling interval, informational only (default: 300s)
    pub health_check_interval_secs: u64,
    pub notify_on_success: bool,
    pub wake_on_error: bool,
    pub agent_name: String,
    /// Role whose session-log entries are scanned for errors
    pub monitored_role: String,
    pub deep_check_enabled: bool,
    pub connectivity_timeout_secs: u64,
    /// Minimum spacing between deep probes (default: 900s)
    pub connectivity_check_interval_secs: u64,
    pub gateway_port: u16,
    pub api_probe_url: String,
    /// Name of the environment variable holding the API token
    pub api_token_env: String,
    /// Bearer token for the external API probe, if configured
    pub api_token: Option<String>,
    pub error_check_lines: usize,
    pub error_patterns: Vec<String>,
    /// Command-line substring identifying the supervised process
    pub process_pattern: String,
    /// Control tool and leading arguments, e.g. `openclaw gateway`
    pub control_command: Vec<String>,
    /// Upper bound on a single control or wake command (default: 60s)
    pub command_timeout_secs: u64,
    /// Agent wake tool and leading arguments; the message is appended
    pub wake_command: Vec<String>,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
    pub session_dir: PathBuf,
    pub status_tail_lines: usize,
}

impl WatchdogConfig {
    /// Load configuration from an optional key=value file and `WATCHDOG_*`
    /// environment overrides.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Self::defaults()?;

        if let Some(path) = config_file {
            builder = builder.add_source(KeyValueFile::new(path));
        }

        // Override with environment variables (WATCHDOG_MAX_RESTART_ATTEMPTS, etc.)
        builder = builder.add_source(Environment::with_prefix("WATCHDOG").try_parsing(true));

        let settings: Settings = builder.build()?.try_deserialize()?;
        let config = Self::from_settings(settings);

        config
            .validate()
            .map_err(|errors| WatchdogError::InvalidConfig(errors.join("; ")))?;

        Ok(config)
    }

    /// Built-in defaults only, ignoring files and environment.
    pub fn default_config() -> Result<Self> {
        let settings: Settings = Self::defaults()?.build()?.try_deserialize()?;
        Ok(Self::from_settings(settings))
    }

    fn defaults() -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("max_restart_attempts", 3)?
            .set_default("restart_delay_secs", 10)?
            .set_default("stabilization_delay_secs", 5)?
            .set_default("health_check_interval_secs", 300)?
            .set_default("notify_on_success", false)?
            .set_default("wake_on_error", true)?
            .set_default("agent_name", "main")?
            .set_default("monitored_role", "assistant")?
            .set_default("deep_check_enabled", false)?
            .set_default("connectivity_timeout_secs", 5)?
            .set_default("connectivity_check_interval_secs", 900)?
            .set_default("gateway_port", 18789)?
            .set_default("api_probe_url", "https://api.telegram.org/bot{token}/getMe")?
            .set_default("api_token_env", "TELEGRAM_BOT_TOKEN")?
            .set_default("error_check_lines", 50)?
            .set_default("error_patterns", "error,exception,failed,timeout,ECONNREFUSED")?
            .set_default("process_pattern", "openclaw-gateway")?
            .set_default("control_command", "openclaw gateway")?
            .set_default("command_timeout_secs", 60)?
            .set_default("wake_command", "openclaw system event --mode now --text")?
            .set_default("log_dir", "~/.gateway-watchdog/logs")?
            .set_default("state_dir", "~/.gateway-watchdog")?
            .set_default("status_tail_lines", 20)
    }

    fn from_settings(settings: Settings) -> Self {
        let session_dir = match settings.session_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => expand_home(dir),
            _ => expand_home(&format!(
                "~/.openclaw/agents/{}/sessions",
                settings.agent_name
            )),
        };

        let api_token = std::env::var(&settings.api_token_env)
            .ok()
            .filter(|token| !token.trim().is_empty());

        Self {
            max_restart_attempts: settings.max_restart_attempts,
            restart_delay_secs: settings.restart_delay_secs,
            stabilization_delay_secs: settings.stabilization_delay_secs,
            health_check_interval_secs: settings.health_check_interval_secs,
            notify_on_success: settings.notify_on_success,
            wake_on_error: settings.wake_on_error,
            agent_name: settings.agent_name,
            monitored_role: settings.monitored_role,
            deep_check_enabled: settings.deep_check_enabled,
            connectivity_timeout_secs: settings.connectivity_timeout_secs,
            connectivity_check_interval_secs: settings.connectivity_check_interval_secs,
            gateway_port: settings.gateway_port,
            api_probe_url: settings.api_probe_url,
            api_token_env: settings.api_token_env,
            api_token,
            error_check_lines: settings.error_check_lines,
            error_patterns: split_list(&settings.error_patterns),
            process_pattern: settings.process_pattern,
            control_command: split_words(&settings.control_command),
            command_timeout_secs: settings.command_timeout_secs,
            wake_command: split_words(&settings.wake_command),
            log_dir: expand_home(&settings.log_dir),
            state_dir: expand_home(&settings.state_dir),
            session_dir,
            status_tail_lines: settings.status_tail_lines,
        }
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    pub fn stabilization_delay(&self) -> Duration {
        Duration::from_secs(self.stabilization_delay_secs)
    }

    pub fn connectivity_timeout(&self) -> Duration {
        Duration::from_secs(self.connectivity_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn connectivity_check_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity_check_interval_secs)
    }

    /// Persisted timestamp of the last deep connectivity probe
    pub fn rate_limit_file(&self) -> PathBuf {
        self.state_dir.join("last_connectivity_check")
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join("watchdog.log")
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.control_command.is_empty() {
            errors.push("control_command must not be empty".to_string());
        }

        if self.process_pattern.trim().is_empty() {
            errors.push("process_pattern must not be empty".to_string());
        }

        if self.connectivity_timeout_secs == 0 {
            errors.push("connectivity_timeout_secs must be positive".to_string());
        }

        if self.command_timeout_secs == 0 {
            errors.push("command_timeout_secs must be positive".to_string());
        }

        if self.agent_name.trim().is_empty() {
            errors.push("agent_name must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Optional shell-style `KEY=value` file as a configuration source.
///
/// Keys are lowercased so the file may use either case; blank lines and
/// `#` comments are skipped.
#[derive(Debug, Clone)]
pub struct KeyValueFile {
    path: PathBuf,
}

impl KeyValueFile {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl Source for KeyValueFile {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> std::result::Result<Map<String, Value>, ConfigError> {
        let mut map = Map::new();
        let entries = read_env_file(&self.path).map_err(|e| ConfigError::Foreign(Box::new(e)))?;
        let Some(entries) = entries else {
            return Ok(map);
        };

        let origin = self.path.display().to_string();
        for (key, value) in entries {
            map.insert(key.to_lowercase(), Value::new(Some(&origin), value));
        }

        Ok(map)
    }
}

/// Load a key=value secrets file and export every pair into the process
/// environment, overriding existing values. A missing file is not an error.
///
/// Returns the number of variables exported.
pub fn load_secrets(path: &Path) -> Result<usize> {
    let Some(entries) = read_env_file(path)? else {
        return Ok(0);
    };

    let exported = entries.len();
    for (key, value) in entries {
        std::env::set_var(key, value);
    }

    Ok(exported)
}

/// Read a shell-style env file. `None` when the file does not exist.
fn read_env_file(path: &Path) -> std::io::Result<Option<Vec<(String, String)>>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(parse_env_lines(&content))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parse `KEY=value` lines.
///
/// Blank lines, `#` comments and lines without `=` are skipped. An optional
/// `export ` prefix is dropped. Values may contain spaces unquoted; one
/// level of matching single or double quotes is stripped, and ` #` starts
/// a trailing comment only outside quotes.
pub fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() || key.starts_with('#') {
                return None;
            }
            Some((key.to_string(), unquote(value.trim())))
        })
        .collect()
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    match value.find(" #") {
        Some(idx) => value[..idx].trim_end().to_string(),
        None => value.to_string(),
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw));
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_words(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Serializes tests that read or mutate the process environment.
#[cfg(test)]
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
