//! Configuration module for Syncward.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Syncward.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sessions: SessionsConfig,
    pub scheduler: SchedulerConfig,
    pub executor: ExecutorConfig,
    pub logging: LoggingConfig,
}

/// Where the session collection lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Path of the flat JSON array of sessions.
    pub file: PathBuf,
}

/// Trigger engine timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between wall-clock checks for schedule triggers (1..=60).
    pub schedule_check_secs: u64,
    /// Seconds between network identity samples for WiFi triggers.
    pub wifi_poll_secs: u64,
}

/// External rsync invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// rsync binary name or absolute path.
    pub rsync_binary: String,
    /// Environment variable through which the daemon password is passed.
    pub password_env: String,
    /// Additional arguments appended after the generated option flags.
    pub extra_args: Vec<String>,
}

/// Logging / tracing and audit log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Console format: `pretty` or `json`.
    pub format: String,
    /// Directory holding the rotated sync audit logs.
    pub audit_dir: PathBuf,
    /// Maximum size of a single audit log file (in MiB) before rotation.
    pub max_size_mb: u64,
    /// Maximum number of rotated audit log files to keep.
    pub max_files: u32,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/syncward/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        config_dir().join("config.yaml")
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("syncward")
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            file: config_dir().join("sessions.json"),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            schedule_check_secs: 30,
            wifi_poll_secs: 10,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            rsync_binary: "rsync".to_string(),
            password_env: "RSYNC_PASSWORD".to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("syncward");
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            audit_dir: data_dir.join("logs"),
            max_size_mb: 10,
            max_files: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"scheduler.wifi_poll_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["pretty", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            })
        };

        // --- sessions ---
        if self.sessions.file.as_os_str().is_empty() {
            push("sessions.file", "must not be empty".into());
        }

        // --- scheduler ---
        if self.scheduler.schedule_check_secs == 0 || self.scheduler.schedule_check_secs > 60 {
            push("scheduler.schedule_check_secs", "must be in range 1..=60".into());
        }
        if self.scheduler.wifi_poll_secs == 0 {
            push("scheduler.wifi_poll_secs", "must be greater than 0".into());
        }

        // --- executor ---
        if self.executor.rsync_binary.trim().is_empty() {
            push("executor.rsync_binary", "must not be empty".into());
        }
        let env = &self.executor.password_env;
        if env.is_empty() || !env.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            push(
                "executor.password_env",
                format!("'{env}' is not a valid environment variable name"),
            );
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            push(
                "logging.format",
                format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            );
        }
        if self.logging.max_size_mb == 0 {
            push("logging.max_size_mb", "must be greater than 0".into());
        }
        if self.logging.max_files == 0 {
            push("logging.max_files", "must be greater than 0".into());
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use syncward_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sessions_file(PathBuf::from("/tmp/sessions.json"))
///     .wifi_poll_secs(5)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn sessions_file(mut self, file: PathBuf) -> Self {
        self.config.sessions.file = file;
        self
    }

    pub fn schedule_check_secs(mut self, secs: u64) -> Self {
        self.config.scheduler.schedule_check_secs = secs;
        self
    }

    pub fn wifi_poll_secs(mut self, secs: u64) -> Self {
        self.config.scheduler.wifi_poll_secs = secs;
        self
    }

    pub fn rsync_binary(mut self, binary: impl Into<String>) -> Self {
        self.config.executor.rsync_binary = binary.into();
        self
    }

    pub fn password_env(mut self, name: impl Into<String>) -> Self {
        self.config.executor.password_env = name.into();
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    pub fn audit_dir(mut self, dir: PathBuf) -> Self {
        self.config.logging.audit_dir = dir;
        self
    }

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
