//! Engine settings and their on-disk persistence.

use std::{
    env,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::{DEFAULT_MINOR_DIGITS, MAX_PROJECTED_OCCURRENCES};

const DEFAULT_DIR_NAME: &str = "recurring_core";
const CONFIG_FILE: &str = "config.json";
const HOME_OVERRIDE: &str = "RECURRING_CORE_HOME";
const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serde(String),
}

/// Tunables shared by projection, materialization and reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_currency")]
    pub currency: String,
    #[serde(default = "EngineConfig::default_minor_unit_digits")]
    pub minor_unit_digits: u32,
    #[serde(default = "EngineConfig::default_max_occurrences")]
    pub max_occurrences_per_rule: usize,
    #[serde(default = "EngineConfig::default_upcoming_days")]
    pub upcoming_days: u32,
    #[serde(default = "EngineConfig::default_retry_limit")]
    pub materialize_retry_limit: u32,
    #[serde(default = "EngineConfig::default_uncategorized_label")]
    pub uncategorized_label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: Self::default_currency(),
            minor_unit_digits: Self::default_minor_unit_digits(),
            max_occurrences_per_rule: Self::default_max_occurrences(),
            upcoming_days: Self::default_upcoming_days(),
            materialize_retry_limit: Self::default_retry_limit(),
            uncategorized_label: Self::default_uncategorized_label(),
        }
    }
}

impl EngineConfig {
    pub fn default_currency() -> String {
        "USD".into()
    }

    pub fn default_minor_unit_digits() -> u32 {
        DEFAULT_MINOR_DIGITS
    }

    pub fn default_max_occurrences() -> usize {
        MAX_PROJECTED_OCCURRENCES
    }

    pub fn default_upcoming_days() -> u32 {
        30
    }

    pub fn default_retry_limit() -> u32 {
        3
    }

    pub fn default_uncategorized_label() -> String {
        "Uncategorized".into()
    }
}

/// Loads and saves [`EngineConfig`] under a base directory.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self, ConfigError> {
        fs::create_dir_all(&base)?;
        Ok(Self::new(base.join(CONFIG_FILE)))
    }

    /// Config file under [`default_base_dir`]. Nothing is created until `save`.
    pub fn at_default_location() -> Self {
        Self::new(default_base_dir().join(CONFIG_FILE))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Returns defaults when no file has been written yet.
    pub fn load(&self) -> Result<EngineConfig, ConfigError> {
        if self.config_path.exists() {
            let data = fs::read_to_string(&self.config_path)?;
            serde_json::from_str(&data).map_err(|err| ConfigError::Serde(err.to_string()))
        } else {
            Ok(EngineConfig::default())
        }
    }

    pub fn save(&self, config: &EngineConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(config)
            .map_err(|err| ConfigError::Serde(err.to_string()))?;
        let tmp = tmp_path(&self.config_path);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, &self.config_path)?;
        tracing::debug!(path = %self.config_path.display(), "saved engine config");
        Ok(())
    }
}

/// `$RECURRING_CORE_HOME` when set, otherwise the platform config directory.
pub fn default_base_dir() -> PathBuf {
    if let Some(custom) = env::var_os(HOME_OVERRIDE) {
        return PathBuf::from(custom);
    }
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), ConfigError> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::with_base_dir(dir.path().join("base")).unwrap();
        assert_eq!(manager.load().unwrap(), EngineConfig::default());
        assert!(!manager.config_path().exists());
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().join("config.json"));
        fs::write(manager.config_path(), r#"{ "currency": "EUR", "upcoming_days": 7 }"#).unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.upcoming_days, 7);
        assert_eq!(config.max_occurrences_per_rule, MAX_PROJECTED_OCCURRENCES);
        assert_eq!(config.uncategorized_label, "Uncategorized");
    }

    #[test]
    fn malformed_file_reports_serde_error() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().join("config.json"));
        fs::write(manager.config_path(), "{ not json").unwrap();
        assert!(matches!(manager.load(), Err(ConfigError::Serde(_))));
    }
}
