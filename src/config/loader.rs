//! File loading, key access, and persistence for moku configuration.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::types::{ConfigError, Settings};

impl Settings {
    /// Loads the config from `~/.config/moku/config.toml`.
    ///
    /// If no config file exists, one is written with defaults and returned.
    /// A file that exists but fails to parse is a hard error — the caller
    /// treats it as fatal at startup.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads the config from an explicit path. Split out from [`Settings::load`]
    /// so tests can point at a temp directory.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let settings = Settings::default();
            settings.save_to(path)?;
            info!(path = %path.display(), "wrote default config");
            return Ok(settings);
        }

        let contents = fs::read_to_string(path)?;
        let settings: Settings =
            toml::from_str(&contents).map_err(|source| ConfigError::Malformed {
                path: path.display().to_string(),
                source,
            })?;
        debug!(path = %path.display(), "config loaded");
        Ok(settings)
    }

    /// Persists this snapshot to the default config path.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Persists this snapshot to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str)?;
        Ok(())
    }

    /// Returns the value of a recognized key, rendered as a string.
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        let value = match key {
            "api_url" => self.api_url.clone(),
            "default_model" => self.default_model.clone(),
            "working_dir" => self.working_dir.clone(),
            "log_level" => self.log_level.as_filter().to_string(),
            "git_integration" => self.git_integration.to_string(),
            "backup_files" => self.backup_files.to_string(),
            "timeout_secs" => self.timeout_secs.to_string(),
            "max_context_files" => self.max_context_files.to_string(),
            "max_history_entries" => self.max_history_entries.to_string(),
            "test_command" => self.test_command.clone(),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        };
        Ok(value)
    }

    /// Returns a new snapshot with `key` set to `value`, coerced to the
    /// field's type. The previous snapshot is left untouched; the caller
    /// decides whether to persist the result.
    pub fn with_value(&self, key: &str, value: &str) -> Result<Settings, ConfigError> {
        let mut next = self.clone();
        match key {
            "api_url" => next.api_url = value.to_string(),
            "default_model" => next.default_model = value.to_string(),
            "working_dir" => next.working_dir = value.to_string(),
            "test_command" => next.test_command = value.to_string(),
            "log_level" => {
                next.log_level = value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?
            }
            "git_integration" => next.git_integration = parse_bool(key, value)?,
            "backup_files" => next.backup_files = parse_bool(key, value)?,
            "timeout_secs" => next.timeout_secs = parse_num(key, value)?,
            "max_context_files" => next.max_context_files = parse_num(key, value)?,
            "max_history_entries" => next.max_history_entries = parse_num(key, value)?,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(next)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
