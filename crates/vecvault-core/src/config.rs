//! vecvault Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with sensible defaults for a single-process store.

use crate::similarity::DEFAULT_SPARSE_EPSILON;
use crate::IndexKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Vector store configuration
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        self.validate()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = std::env::var("VECVAULT_SIMILARITY_THRESHOLD") {
            self.store.similarity_threshold =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "VECVAULT_SIMILARITY_THRESHOLD".to_string(),
                    value,
                })?;
        }
        if let Ok(value) = std::env::var("VECVAULT_DIMENSION") {
            self.store.dimension = Some(value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "VECVAULT_DIMENSION".to_string(),
                value,
            })?);
        }
        if let Ok(kind) = std::env::var("VECVAULT_INDEX_KIND") {
            self.store.index_kind = kind.parse()?;
        }
        if let Ok(path) = std::env::var("VECVAULT_SNAPSHOT_PATH") {
            self.store.snapshot_path = Some(PathBuf::from(path));
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(())
    }

    /// Reject values the store cannot operate with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Cosine similarity at or above which a new vector is a duplicate
    pub similarity_threshold: f64,

    /// Fixed dimension; inferred from the first insert when unset
    pub dimension: Option<usize>,

    /// Index storage strategy
    pub index_kind: IndexKind,

    /// Sparse index drop threshold
    pub sparse_epsilon: f64,

    /// Snapshot file used by front-ends for explicit import/export
    pub snapshot_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.95,
            dimension: None,
            index_kind: IndexKind::Dense,
            sparse_epsilon: DEFAULT_SPARSE_EPSILON,
            snapshot_path: None,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "similarity_threshold".to_string(),
                value: self.similarity_threshold.to_string(),
            });
        }
        if self.dimension == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "dimension".to_string(),
                value: "0".to_string(),
            });
        }
        if self.sparse_epsilon.is_nan() || self.sparse_epsilon < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "sparse_epsilon".to_string(),
                value: self.sparse_epsilon.to_string(),
            });
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.store.similarity_threshold, 0.95);
        assert_eq!(config.store.dimension, None);
        assert_eq!(config.store.index_kind, IndexKind::Dense);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_threshold_range() {
        let mut config = StoreConfig::default();
        config.similarity_threshold = 1.5;
        assert!(config.validate().is_err());

        config.similarity_threshold = -0.1;
        assert!(config.validate().is_err());

        config.similarity_threshold = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_dimension_and_epsilon() {
        let config = StoreConfig {
            dimension: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StoreConfig {
            sparse_epsilon: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[store]
similarity_threshold = 0.9
dimension = 384
index_kind = "sparse"

[logging]
json_format = true
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.store.similarity_threshold, 0.9);
        assert_eq!(config.store.dimension, Some(384));
        assert_eq!(config.store.index_kind, IndexKind::Sparse);
        assert_eq!(config.store.sparse_epsilon, DEFAULT_SPARSE_EPSILON);
        assert!(config.logging.json_format);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file_rejects_invalid_threshold() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\nsimilarity_threshold = 2.0").unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/nonexistent/vecvault.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }

    #[test]
    fn test_from_file_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store\nsimilarity_threshold = ").unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
