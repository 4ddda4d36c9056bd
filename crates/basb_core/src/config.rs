//! Runtime configuration for hosts embedding the core.
//!
//! # Responsibility
//! - Resolve database path, log level, log directory and list page size.
//! - Read overrides from `BASB_*` environment variables.
//!
//! # Invariants
//! - A validated config has an absolute log directory (when set), a
//!   supported log level and a list limit within `1..=100`.

use crate::logging::{default_log_level, normalize_level};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DB_PATH_ENV: &str = "BASB_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "BASB_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "BASB_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "basb.sqlite3";
const DEFAULT_LIST_LIMIT: u32 = 20;
const MAX_LIST_LIMIT: u32 = 100;

/// Configuration rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyDbPath,
    UnsupportedLogLevel(String),
    RelativeLogDir(PathBuf),
    ListLimitOutOfRange(u32),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDbPath => write!(f, "database path cannot be empty"),
            Self::UnsupportedLogLevel(level) => write!(f, "unsupported log level `{level}`"),
            Self::RelativeLogDir(path) => {
                write!(f, "log directory must be absolute, got `{}`", path.display())
            }
            Self::ListLimitOutOfRange(limit) => {
                write!(f, "list limit {limit} outside 1..={MAX_LIST_LIMIT}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Core runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// File logging is disabled when unset.
    pub log_dir: Option<PathBuf>,
    pub list_limit: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl CoreConfig {
    /// Defaults overridden by the process environment, then validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through `lookup`; blank values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = read(DB_PATH_ENV) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = read(LOG_LEVEL_ENV) {
            config.log_level = level;
        }
        if let Some(dir) = read(LOG_DIR_ENV) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDbPath);
        }
        normalize_level(&self.log_level)
            .map_err(|_| ConfigError::UnsupportedLogLevel(self.log_level.clone()))?;
        if let Some(dir) = self.log_dir.as_deref().filter(|dir| !dir.is_absolute()) {
            return Err(ConfigError::RelativeLogDir(dir.to_path_buf()));
        }
        if !(1..=MAX_LIST_LIMIT).contains(&self.list_limit) {
            return Err(ConfigError::ListLimitOutOfRange(self.list_limit));
        }
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, DB_PATH_ENV, LOG_DIR_ENV, LOG_LEVEL_ENV};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = CoreConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.list_limit, 20);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn environment_overrides_defaults() {
        let log_dir = std::env::temp_dir().join("basb-config-logs");
        let config = CoreConfig::from_lookup(lookup(&[
            (DB_PATH_ENV, "/tmp/notes.sqlite3"),
            (LOG_LEVEL_ENV, "warn"),
            (LOG_DIR_ENV, log_dir.to_str().unwrap()),
        ]))
        .unwrap();

        assert_eq!(config.db_path(), PathBuf::from("/tmp/notes.sqlite3").as_path());
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(log_dir));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[(DB_PATH_ENV, "   ")])).unwrap();
        assert_eq!(config.db_path, CoreConfig::default().db_path);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert_eq!(
            CoreConfig::from_lookup(lookup(&[(LOG_LEVEL_ENV, "loud")])),
            Err(ConfigError::UnsupportedLogLevel("loud".to_string()))
        );
        assert_eq!(
            CoreConfig::from_lookup(lookup(&[(LOG_DIR_ENV, "logs")])),
            Err(ConfigError::RelativeLogDir(PathBuf::from("logs")))
        );

        let config = CoreConfig {
            list_limit: 0,
            ..CoreConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ListLimitOutOfRange(0)));
    }
}
