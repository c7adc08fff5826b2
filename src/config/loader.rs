//! Configuration Loader
//!
//! Layers an optional TOML file under environment variables using the `config`
//! crate. Nested keys use a double underscore:
//! `FLEETOPS__SCHEDULER__RETENTION_DAYS=14`. `DATABASE_URL`, when set, wins
//! over `database.url`.

use super::error::{ConfigResult, ConfigurationError};
use super::FleetConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_PATH_ENV: &str = "FLEETOPS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/fleetops.toml";
pub const ENV_PREFIX: &str = "FLEETOPS";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: FleetConfig,
    source: PathBuf,
}

impl ConfigManager {
    /// Load from `FLEETOPS_CONFIG_PATH` (or the default path). A missing file is
    /// not an error; defaults and the environment still apply.
    pub fn load() -> ConfigResult<ConfigManager> {
        let path = env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_with(&path, false)
    }

    /// Load from an explicit file, which must exist.
    pub fn load_from_path(path: &Path) -> ConfigResult<ConfigManager> {
        Self::load_with(path, true)
    }

    fn load_with(path: &Path, required: bool) -> ConfigResult<ConfigManager> {
        debug!(path = %path.display(), required = required, "Loading configuration");

        let settings = Config::builder()
            .add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(path.display().to_string(), e))?;

        let mut config: FleetConfig = settings
            .try_deserialize()
            .map_err(|e| ConfigurationError::load_error(path.display().to_string(), e))?;

        if let Ok(url) = env::var("DATABASE_URL") {
            config.database.url = url;
        }

        config.validate()?;

        info!(
            source = %path.display(),
            max_connections = config.database.max_connections,
            scheduler_enabled = config.scheduler.enabled,
            policies = config.scheduler.policies.len(),
            "Configuration loaded successfully"
        );

        Ok(ConfigManager {
            config,
            source: path.to_path_buf(),
        })
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn into_config(self) -> FleetConfig {
        self.config
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TaskType;
    use crate::scheduler::cadence::Cadence;
    use crate::scheduler::policy::{DueOffset, PolicyScope};
    use chrono::Weekday;
    use std::io::Write;

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[database]
url = "postgresql://localhost/fleetops_test"
max_connections = 4

[scheduler]
retention_days = 14

[scheduler.retention_cadence]
kind = "weekly"
weekday = "Sat"
at = "04:30:00"

[[scheduler.policies]]
task_type = "cleaning"
scope = "machine"
offset = {{ days = 14 }}
title = "Fortnightly cleaning"
priority = "low"
"#
        )
        .unwrap();

        let manager = ConfigManager::load_from_path(file.path()).unwrap();
        let config = manager.config();

        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.scheduler.retention_days, 14);
        assert_eq!(
            config.scheduler.retention_cadence,
            Cadence::weekly(Weekday::Sat, 4, 30)
        );
        assert_eq!(config.scheduler.policies.len(), 1);
        let policy = &config.scheduler.policies[0];
        assert_eq!(policy.task_type, TaskType::Cleaning);
        assert_eq!(policy.scope, PolicyScope::Machine);
        assert_eq!(policy.offset, DueOffset::Days(14));
        // Untouched sections keep their defaults
        assert_eq!(config.web.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_missing_required_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigManager::load_from_path(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigurationError::LoadError { .. })));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[scheduler]\nretention_days = 0").unwrap();

        let result = ConfigManager::load_from_path(file.path());
        assert!(matches!(result, Err(ConfigurationError::InvalidValue { .. })));
    }
}
