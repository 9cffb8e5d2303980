//! Configuration types and path resolution for moku.
//!
//! Moku stores its settings as TOML at the platform's XDG config path
//! (e.g. `~/.config/moku/config.toml` on Linux). Settings are immutable for
//! the duration of a session; `:config set` produces a new snapshot and
//! persists it rather than mutating in place.

mod loader;
mod paths;
mod types;

pub use types::Settings;

#[cfg(test)]
mod tests {
    use super::types::ConfigError;
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_config(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("moku_cfg_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join("config.toml")
    }

    #[test]
    fn missing_file_writes_defaults() {
        let path = temp_config("defaults");
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.api_url, crate::constants::DEFAULT_API_URL);
        assert_eq!(settings.default_model, crate::constants::DEFAULT_MODEL);
        assert!(path.exists());
        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = temp_config("malformed");
        fs::write(&path, "api_url = [not toml").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = temp_config("partial");
        fs::write(&path, "default_model = \"m1\"\n").unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.default_model, "m1");
        // Required keys are always present after load.
        assert_eq!(settings.api_url, crate::constants::DEFAULT_API_URL);
        assert!(settings.backup_files);
        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn with_value_returns_a_new_snapshot() {
        let settings = Settings::default();
        let next = settings.with_value("git_integration", "true").unwrap();
        assert!(next.git_integration);
        assert!(!settings.git_integration);
    }

    #[test]
    fn with_value_coerces_numbers() {
        let settings = Settings::default();
        let next = settings.with_value("timeout_secs", "120").unwrap();
        assert_eq!(next.timeout_secs, 120);
        assert!(matches!(
            settings.with_value("timeout_secs", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let settings = Settings::default();
        assert!(matches!(
            settings.get("no_such_key"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            settings.with_value("no_such_key", "x"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn per_model_overrides_apply() {
        let path = temp_config("models");
        fs::write(
            &path,
            "timeout_secs = 30\n\n[models.\"slow:latest\"]\ntemperature = 0.9\ntimeout_secs = 90\n",
        )
        .unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(
            settings.timeout_for("slow:latest"),
            std::time::Duration::from_secs(90)
        );
        assert_eq!(
            settings.timeout_for("other"),
            std::time::Duration::from_secs(30)
        );
        assert!((settings.temperature_for("slow:latest") - 0.9).abs() < f64::EPSILON);
        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
