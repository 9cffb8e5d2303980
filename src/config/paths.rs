//! XDG path resolution for moku configuration and cache directories.

use std::path::PathBuf;

use super::types::{ConfigError, Settings};

impl Settings {
    /// Returns the platform-specific configuration directory for moku.
    ///
    /// Returns `~/.config/moku/` on Linux (`XDG_CONFIG_HOME/moku`).
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join(crate::constants::APP_NAME);
        Ok(dir)
    }

    /// Returns the platform-specific cache directory for moku.
    ///
    /// Returns `~/.cache/moku/` on Linux. Used for readline history.
    pub fn cache_dir() -> Result<PathBuf, ConfigError> {
        let dir = dirs::cache_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join(crate::constants::APP_NAME);
        Ok(dir)
    }

    /// Returns the full path to the moku configuration file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(crate::constants::CONFIG_FILENAME))
    }
}
