//! Scheduler configuration.
//!
//! Configuration is read from a TOML file:
//!
//! ```toml
//! [scheduler]
//! poll_interval_ms = 1000
//! callback_timeout_ms = 5000
//!
//! [[phases]]
//! name = "introduction"
//! duration_minutes = 5
//!
//! [[phases]]
//! name = "system design"
//! duration_minutes = 40
//! is_skippable = true
//! ```
//!
//! Every field is optional. Lookup order for the file is the explicit path,
//! then `PACER_CONFIG`, then `<config dir>/pacer/config.toml`; if none
//! exists the defaults apply. `PACER_POLL_INTERVAL_MS` overrides the poll
//! interval after loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use pacer_core::{build_custom_schedule, DomainResult, PhaseInput, Schedule};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PACER_CONFIG";

/// Environment variable overriding `scheduler.poll_interval_ms`.
pub const POLL_INTERVAL_ENV: &str = "PACER_POLL_INTERVAL_MS";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_CALLBACK_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_NOTIFY_QUEUE_CAPACITY: usize = 32;
pub const DEFAULT_COMMAND_BUFFER: usize = 32;
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime tuning for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How often each session's monitor checks its deadline
    pub poll_interval_ms: u64,
    /// Upper bound on a single transition callback
    pub callback_timeout_ms: u64,
    /// Pending notifications buffered per session before new ones are dropped
    pub notify_queue_capacity: usize,
    /// Pending commands buffered per session actor
    pub command_buffer: usize,
    pub max_sessions: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            callback_timeout_ms: DEFAULT_CALLBACK_TIMEOUT_MS,
            notify_queue_capacity: DEFAULT_NOTIFY_QUEUE_CAPACITY,
            command_buffer: DEFAULT_COMMAND_BUFFER,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Rejects values that would stall or disable the runtime.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first zero-valued field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("poll_interval_ms", self.poll_interval_ms == 0),
            ("callback_timeout_ms", self.callback_timeout_ms == 0),
            ("notify_queue_capacity", self.notify_queue_capacity == 0),
            ("command_buffer", self.command_buffer == 0),
            ("max_sessions", self.max_sessions == 0),
        ];
        match checks.iter().find(|(_, is_zero)| *is_zero) {
            Some((field, _)) => Err(ConfigError::Invalid(format!("{field} must be positive"))),
            None => Ok(()),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerConfig {
    pub scheduler: SchedulerConfig,
    /// Custom phases; `None` selects the built-in schedule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phases: Option<Vec<PhaseInput>>,
}

impl PacerConfig {
    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and
    /// `ConfigError::Invalid` for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.scheduler.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&text)
    }

    /// Resolves the config file location and loads it, then applies
    /// environment overrides.
    ///
    /// An explicit path or `PACER_CONFIG` must exist; the default location
    /// is optional.
    ///
    /// # Errors
    ///
    /// Propagates load and override errors.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::load(&path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::load(&path)?,
                None => Self::default(),
            },
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides from a key lookup (normally the process environment).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if an override does not parse or
    /// produces an invalid configuration.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(POLL_INTERVAL_ENV) {
            self.scheduler.poll_interval_ms = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{POLL_INTERVAL_ENV}: not a number: {raw}"))
            })?;
        }
        self.scheduler.validate()
    }

    /// Builds the configured schedule.
    ///
    /// An explicit but empty `phases` list is rejected rather than silently
    /// replaced by the default schedule.
    ///
    /// # Errors
    ///
    /// Propagates schedule validation errors.
    pub fn schedule(&self) -> DomainResult<Schedule> {
        match &self.phases {
            Some(phases) => build_custom_schedule(phases),
            None => Ok(Schedule::default_schedule()),
        }
    }
}

/// Default location of the config file, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pacer").join("config.toml"))
}
