//! Configuration management for the patrol binary

use crate::error::ConfigError;
use crate::patrol::{default_feature_list, Patrol, DEFAULT_MODEL_PATH, DEFAULT_THRESHOLD};
use crate::types::TransactionTable;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/patrol.toml";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scoring model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Path to an `.onnx` or `.json` model artifact
    #[serde(default = "default_model_path")]
    pub path: String,
}

fn default_model_path() -> String {
    DEFAULT_MODEL_PATH.to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

/// Decision configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Probability at or above which a transaction is locked
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Columns fed to the model, in model order
    #[serde(default = "default_feature_list")]
    pub features: Vec<String>,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            features: default_feature_list(),
        }
    }
}

/// Transaction data configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataConfig {
    /// JSON table of transactions
    pub path: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a specific path, with `PATROL__SECTION__KEY`
    /// environment variables taking precedence over the file
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env<P: AsRef<Path>>(path: P, env: Environment) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(env)
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Build a patrol from this configuration
    pub fn build_patrol(&self) -> Result<Patrol, ConfigError> {
        let data_path = self.data.path.as_ref().ok_or(ConfigError::MissingData)?;
        let data = TransactionTable::from_json_file(data_path)?;

        Patrol::builder()
            .model_path(&self.model.path)
            .data(data)
            .feature_list(self.detection.features.iter().cloned())
            .threshold(self.detection.threshold)
            .build()
    }
}

/// `PATROL__*` overrides; `PATROL__DETECTION__FEATURES` takes a
/// comma-separated list
fn environment() -> Environment {
    Environment::with_prefix("PATROL")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("detection.features")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.model.path, DEFAULT_MODEL_PATH);
        assert_eq!(config.detection.threshold, 0.2810381);
        assert_eq!(config.detection.features.len(), 10);
        assert_eq!(config.detection.features[0], "tr_type");
        assert!(config.data.path.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[model]
path = "models/custom.json"

[detection]
threshold = 0.4
features = ["amount", "age"]

[data]
path = "data/transactions.json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.model.path, "models/custom.json");
        assert_eq!(config.detection.threshold, 0.4);
        assert_eq!(config.detection.features, vec!["amount", "age"]);
        assert_eq!(config.data.path.as_deref(), Some("data/transactions.json"));
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_env_overrides_feature_list_and_threshold() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[detection]
threshold = 0.4
features = ["tr_type"]
"#
        )
        .unwrap();

        let vars = config::Map::from([
            ("PATROL__DETECTION__FEATURES".to_string(), "amount,age".to_string()),
            ("PATROL__DETECTION__THRESHOLD".to_string(), "0.7".to_string()),
        ]);
        let config = AppConfig::load_with_env(file.path(), environment().source(Some(vars))).unwrap();

        assert_eq!(config.detection.features, vec!["amount", "age"]);
        assert_eq!(config.detection.threshold, 0.7);
    }

    #[test]
    fn test_build_patrol_requires_data_path() {
        let err = AppConfig::default().build_patrol().unwrap_err();
        assert_eq!(err, ConfigError::MissingData);
    }
}
