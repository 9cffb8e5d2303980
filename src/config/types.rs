//! Struct definitions and serde defaults for moku configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or persisting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but is not valid TOML.
    #[error("malformed config at {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// A `:config get`/`set` named a key the store does not recognize.
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    /// The given value cannot be coerced to the key's type.
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    /// The platform config directory could not be determined.
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Logging verbosity, mapped onto a tracing filter at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// The tracing filter directive this level corresponds to.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Per-model overrides for generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelEntry {
    /// Sampling temperature for this model.
    pub temperature: Option<f64>,
    /// Request timeout in seconds, overriding the global default.
    pub timeout_secs: Option<u64>,
}

/// Root configuration for moku, deserialized from `config.toml`.
///
/// Fields use serde defaults so moku can run with sensible defaults when no
/// config file exists. `api_url` and `default_model` are therefore always
/// present after a successful load.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Generation endpoint the model client posts to.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Model identifier used when none is specified.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Root directory under which projects are created.
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    /// Logging verbosity.
    #[serde(default)]
    pub log_level: LogLevel,
    /// Whether git operations run automatically after file mutations.
    #[serde(default)]
    pub git_integration: bool,
    /// Whether edits copy the original file aside before overwriting.
    #[serde(default = "default_true")]
    pub backup_files: bool,
    /// Global request timeout for the model endpoint, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum number of context files attached to a request.
    #[serde(default = "default_max_context_files")]
    pub max_context_files: usize,
    /// Maximum number of conversation exchanges kept in memory.
    #[serde(default = "default_max_history_entries")]
    pub max_history_entries: usize,
    /// Command used by `:test` to run a test file.
    #[serde(default = "default_test_command")]
    pub test_command: String,
    /// Per-model parameter overrides, keyed by model identifier.
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
}

pub(super) fn default_api_url() -> String {
    crate::constants::DEFAULT_API_URL.to_string()
}

pub(super) fn default_model() -> String {
    crate::constants::DEFAULT_MODEL.to_string()
}

fn default_working_dir() -> String {
    crate::constants::DEFAULT_WORKING_DIR.to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    crate::constants::DEFAULT_TIMEOUT_SECS
}

fn default_max_context_files() -> usize {
    crate::constants::MAX_CONTEXT_FILES
}

fn default_max_history_entries() -> usize {
    crate::constants::MAX_HISTORY_ENTRIES
}

fn default_test_command() -> String {
    crate::constants::DEFAULT_TEST_COMMAND.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            default_model: default_model(),
            working_dir: default_working_dir(),
            log_level: LogLevel::default(),
            git_integration: false,
            backup_files: true,
            timeout_secs: default_timeout_secs(),
            max_context_files: default_max_context_files(),
            max_history_entries: default_max_history_entries(),
            test_command: default_test_command(),
            models: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Temperature to use for `model`, falling back to the global default.
    pub fn temperature_for(&self, model: &str) -> f64 {
        self.models
            .get(model)
            .and_then(|m| m.temperature)
            .unwrap_or(crate::constants::DEFAULT_TEMPERATURE)
    }

    /// Request timeout to use for `model`, falling back to the global default.
    pub fn timeout_for(&self, model: &str) -> std::time::Duration {
        let secs = self
            .models
            .get(model)
            .and_then(|m| m.timeout_secs)
            .unwrap_or(self.timeout_secs);
        std::time::Duration::from_secs(secs)
    }
}
