//! Configuration loading from TOML files and environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub activity: ActivityConfig,
    #[serde(default)]
    pub idle: IdleConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub flags: FlagsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Reminder thresholds and the activity poll cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Seconds between two reads of the idle flags.
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    /// Send a break reminder after this many active minutes.
    #[serde(default = "default_notify_after_active_minutes")]
    pub notify_after_active_minutes: u64,
    /// Send a resume reminder after this many idle minutes.
    #[serde(default = "default_notify_after_idle_minutes")]
    pub notify_after_idle_minutes: u64,
    /// Value the idle accumulator returns to while the user is active.
    #[serde(default)]
    pub idle_reset: IdleReset,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval_seconds(),
            notify_after_active_minutes: default_notify_after_active_minutes(),
            notify_after_idle_minutes: default_notify_after_idle_minutes(),
            idle_reset: IdleReset::default(),
        }
    }
}

/// Reset policy for the idle accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdleReset {
    /// Reset to the idle detection threshold, since that much idle time has
    /// already passed by the time the idle flag appears.
    #[default]
    Threshold,
    /// Reset to zero.
    Zero,
}

/// Idle detection thresholds and backend cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleConfig {
    /// Seconds without input before the idle flag is set.
    #[serde(default = "default_idle_threshold")]
    pub threshold_seconds: u64,
    /// Seconds without input before the pre-idle flag is set.
    #[serde(default = "default_pre_idle_threshold")]
    pub pre_idle_threshold_seconds: u64,
    /// Polling backend query interval in milliseconds.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    /// Delay before retrying a failed idle query, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            threshold_seconds: default_idle_threshold(),
            pre_idle_threshold_seconds: default_pre_idle_threshold(),
            check_interval_ms: default_check_interval_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl IdleConfig {
    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_seconds)
    }

    pub fn pre_idle_threshold(&self) -> Duration {
        Duration::from_secs(self.pre_idle_threshold_seconds)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// External idle detection programs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Event-driven watcher used on Wayland.
    #[serde(default = "default_watcher")]
    pub watcher: String,
    /// Idle milliseconds query used on X11.
    #[serde(default = "default_query")]
    pub query: String,
    /// How idle time is read on X11.
    #[serde(default)]
    pub x11_source: X11Source,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            watcher: default_watcher(),
            query: default_query(),
            x11_source: X11Source::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum X11Source {
    /// Run the `backend.query` command.
    #[default]
    Command,
    /// Ask the MIT-SCREEN-SAVER extension directly.
    Screensaver,
}

/// Notification command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "default_notifier_program")]
    pub program: String,
    /// Arguments placed before the message.
    #[serde(default = "default_notifier_args")]
    pub args: Vec<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            program: default_notifier_program(),
            args: default_notifier_args(),
        }
    }
}

/// Sentinel files mirroring the idle flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagsConfig {
    /// Mirror each flag to a sentinel file whose existence means idle.
    #[serde(default)]
    pub mirror: bool,
    #[serde(default = "default_idle_path")]
    pub idle_path: PathBuf,
    #[serde(default = "default_pre_idle_path")]
    pub pre_idle_path: PathBuf,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            mirror: false,
            idle_path: default_idle_path(),
            pre_idle_path: default_pre_idle_path(),
        }
    }
}

impl FlagsConfig {
    pub fn idle_sentinel(&self) -> Option<PathBuf> {
        self.mirror.then(|| self.idle_path.clone())
    }

    pub fn pre_idle_sentinel(&self) -> Option<PathBuf> {
        self.mirror.then(|| self.pre_idle_path.clone())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Data directory for the reminder journal.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Console log format.
    #[serde(default)]
    pub format: LogFormat,
    /// Append reminders and idle episodes to a daily JSONL journal.
    #[serde(default)]
    pub journal: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            level: default_log_level(),
            format: LogFormat::default(),
            journal: false,
        }
    }
}

impl LoggingConfig {
    /// Returns the journal directory path.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

// Default value functions
fn default_poll_interval_seconds() -> u64 {
    60
}

fn default_notify_after_active_minutes() -> u64 {
    30
}

fn default_notify_after_idle_minutes() -> u64 {
    60
}

fn default_idle_threshold() -> u64 {
    7 * 30
}

fn default_pre_idle_threshold() -> u64 {
    30
}

fn default_check_interval_ms() -> u64 {
    1000
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_watcher() -> String {
    "swayidle".to_string()
}

fn default_query() -> String {
    "xprintidle".to_string()
}

fn default_notifier_program() -> String {
    "notifyme".to_string()
}

fn default_notifier_args() -> Vec<String> {
    vec!["-p".to_string(), "-m".to_string()]
}

fn default_idle_path() -> PathBuf {
    PathBuf::from("/tmp/user_idle_state")
}

fn default_pre_idle_path() -> PathBuf {
    PathBuf::from("/tmp/user_pre_idle_state")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".breakminder"))
        .unwrap_or_else(|| PathBuf::from(".breakminder"))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::from_file(path)?
        } else {
            // Try default config locations
            let default_paths = [
                PathBuf::from("config/default.toml"),
                dirs::config_dir()
                    .map(|d| d.join("breakminder/config.toml"))
                    .unwrap_or_default(),
            ];

            let mut loaded = None;
            for path in &default_paths {
                if path.exists() {
                    loaded = Some(Self::from_file(path)?);
                    break;
                }
            }
            loaded.unwrap_or_default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());

        config.logging.data_dir = expand_tilde(&config.logging.data_dir);

        Ok(config)
    }

    /// Apply `BREAKMINDER_*` overrides from the given variable lookup.
    fn apply_env_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| var(key).and_then(|v| v.parse::<u64>().ok());

        if let Some(v) = parsed("BREAKMINDER_POLL_INTERVAL") {
            self.activity.poll_interval_seconds = v;
        }
        if let Some(v) = parsed("BREAKMINDER_ACTIVE_MINUTES") {
            self.activity.notify_after_active_minutes = v;
        }
        if let Some(v) = parsed("BREAKMINDER_IDLE_MINUTES") {
            self.activity.notify_after_idle_minutes = v;
        }
        if let Some(v) = parsed("BREAKMINDER_IDLE_THRESHOLD") {
            self.idle.threshold_seconds = v;
        }
        if let Some(v) = parsed("BREAKMINDER_PRE_IDLE_THRESHOLD") {
            self.idle.pre_idle_threshold_seconds = v;
        }
        if let Some(val) = var("BREAKMINDER_NOTIFIER") {
            self.notifier.program = val;
        }
        if let Some(val) = var("BREAKMINDER_DATA_DIR") {
            self.logging.data_dir = PathBuf::from(val);
        }
        if let Some(val) = var("BREAKMINDER_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.activity.poll_interval_seconds == 0 {
            anyhow::bail!("Poll interval must be greater than 0");
        }
        if self.activity.notify_after_active_minutes == 0 {
            anyhow::bail!("Active reminder threshold must be greater than 0");
        }
        if self.activity.notify_after_idle_minutes == 0 {
            anyhow::bail!("Idle reminder threshold must be greater than 0");
        }
        if self.activity.notify_after_active_minutes.checked_mul(60).is_none()
            || self.activity.notify_after_idle_minutes.checked_mul(60).is_none()
        {
            anyhow::bail!("Reminder thresholds are too large");
        }
        if self.idle.threshold_seconds == 0 || self.idle.pre_idle_threshold_seconds == 0 {
            anyhow::bail!("Idle thresholds must be greater than 0");
        }
        if self.idle.pre_idle_threshold_seconds >= self.idle.threshold_seconds {
            anyhow::bail!("Pre-idle threshold must be shorter than the idle threshold");
        }
        if self.idle.check_interval_ms == 0 {
            anyhow::bail!("Idle check interval must be greater than 0");
        }
        if self.idle.retry_backoff_ms == 0 {
            anyhow::bail!("Idle retry backoff must be greater than 0");
        }
        if self.notifier.program.is_empty() {
            anyhow::bail!("Notifier program cannot be empty");
        }
        Ok(())
    }
}

/// Expand ~ to home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(rest) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
    }
    path.to_path_buf()
}
