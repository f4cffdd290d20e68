//! Service configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::Duration;

use skylog_types::{TemperatureUnit, Thresholds};

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Retention window and housekeeping.
    pub retention: RetentionConfig,
    /// Display preferences.
    pub display: DisplayConfig,
    /// Temperature alert bounds.
    pub alerts: Thresholds,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Storage path is not empty
    /// - Retention window is between one minute and 30 days
    /// - Housekeeping interval is disabled (0) or at least 10 seconds
    /// - Alert lower bound is below the upper bound
    ///
    /// # Example
    ///
    /// ```
    /// use skylog_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.storage.validate());
        errors.extend(self.retention.validate());
        errors.extend(validate_alerts(&self.alerts));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one history file per entity.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: skylog_store::default_store_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "history directory cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Minimum retention window in seconds (1 minute).
pub const MIN_WINDOW_SECS: u64 = 60;
/// Maximum retention window in seconds (30 days).
pub const MAX_WINDOW_SECS: u64 = 30 * 24 * 3600;
/// Minimum housekeeping interval in seconds, when enabled.
pub const MIN_HOUSEKEEPING_SECS: u64 = 10;

/// Retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Length of the statistics window in seconds.
    pub window_secs: u64,
    /// How often stale samples are pruned with no new sample arriving.
    /// Zero disables housekeeping.
    pub housekeeping_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            window_secs: 24 * 3600,
            housekeeping_interval_secs: 600,
        }
    }
}

impl RetentionConfig {
    /// The retention window.
    pub fn window(&self) -> Duration {
        Duration::seconds(self.window_secs.min(MAX_WINDOW_SECS) as i64)
    }

    /// The housekeeping interval, or `None` when disabled.
    pub fn housekeeping_interval(&self) -> Option<std::time::Duration> {
        (self.housekeeping_interval_secs > 0)
            .then(|| std::time::Duration::from_secs(self.housekeeping_interval_secs))
    }

    /// Validate retention configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !(MIN_WINDOW_SECS..=MAX_WINDOW_SECS).contains(&self.window_secs) {
            errors.push(ValidationError {
                field: "retention.window_secs".to_string(),
                message: format!(
                    "window {}s is out of range ({}-{})",
                    self.window_secs, MIN_WINDOW_SECS, MAX_WINDOW_SECS
                ),
            });
        }

        if self.housekeeping_interval_secs != 0
            && self.housekeeping_interval_secs < MIN_HOUSEKEEPING_SECS
        {
            errors.push(ValidationError {
                field: "retention.housekeeping_interval_secs".to_string(),
                message: format!(
                    "interval must be 0 (disabled) or at least {}s",
                    MIN_HOUSEKEEPING_SECS
                ),
            });
        }

        errors
    }
}

/// Display preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Unit statistics are reported in.
    pub unit: TemperatureUnit,
}

fn validate_alerts(alerts: &Thresholds) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (field, bound) in [("alerts.lower", alerts.lower), ("alerts.upper", alerts.upper)] {
        if bound.is_some_and(|b| !b.is_finite()) {
            errors.push(ValidationError {
                field: field.to_string(),
                message: "bound must be a finite number".to_string(),
            });
        }
    }

    if let (Some(lower), Some(upper)) = (alerts.lower, alerts.upper) {
        if lower >= upper {
            errors.push(ValidationError {
                field: "alerts".to_string(),
                message: format!("lower bound {} must be below upper bound {}", lower, upper),
            });
        }
    }

    errors
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `retention.window_secs`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skylog")
        .join("service.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.retention.window_secs, 86400);
        assert_eq!(config.retention.window(), Duration::hours(24));
        assert_eq!(config.display.unit, TemperatureUnit::Celsius);
        assert!(config.alerts.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.path, skylog_store::default_store_path());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [storage]
            path = "/var/lib/skylog"

            [retention]
            window_secs = 3600
            housekeeping_interval_secs = 0

            [display]
            unit = "fahrenheit"

            [alerts]
            lower = 50.0
            upper = 86.0
            unit = "fahrenheit"
        "#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.storage.path, PathBuf::from("/var/lib/skylog"));
        assert_eq!(config.retention.window(), Duration::hours(1));
        assert_eq!(config.retention.housekeeping_interval(), None);
        assert_eq!(config.display.unit, TemperatureUnit::Fahrenheit);
        assert_eq!(config.alerts.lower, Some(50.0));
        assert_eq!(config.alerts.upper, Some(86.0));
        assert_eq!(config.alerts.unit, TemperatureUnit::Fahrenheit);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[display]\nunit = \"kelvin\"\n").unwrap();
        assert_eq!(config.display.unit, TemperatureUnit::Kelvin);
        assert_eq!(config.retention.window_secs, 86400);
        assert_eq!(
            config.retention.housekeeping_interval(),
            Some(std::time::Duration::from_secs(600))
        );
    }

    #[test]
    fn test_unknown_unit_is_parse_error() {
        assert!(toml::from_str::<Config>("[display]\nunit = \"rankine\"\n").is_err());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = Config::default();
        config.storage.path = PathBuf::new();
        config.retention.window_secs = 5;
        config.retention.housekeeping_interval_secs = 3;
        config.alerts = Thresholds::new(TemperatureUnit::Celsius).lower(30.0).upper(10.0);

        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation errors");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "storage.path",
                "retention.window_secs",
                "retention.housekeeping_interval_secs",
                "alerts"
            ]
        );
    }

    #[test]
    fn test_validation_error_display() {
        let mut config = Config::default();
        config.retention.window_secs = MAX_WINDOW_SECS + 1;
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("retention.window_secs"));
        assert!(msg.starts_with("Configuration validation failed:"));
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("service.toml");

        let config = Config {
            storage: StorageConfig {
                path: PathBuf::from("/tmp/skylog"),
            },
            retention: RetentionConfig {
                window_secs: 7200,
                housekeeping_interval_secs: 60,
            },
            display: DisplayConfig {
                unit: TemperatureUnit::Kelvin,
            },
            alerts: Thresholds::new(TemperatureUnit::Celsius).upper(40.0),
        };

        config.save(&config_path).unwrap();
        let loaded = Config::load_validated(&config_path).unwrap();

        assert_eq!(loaded.storage.path, config.storage.path);
        assert_eq!(loaded.retention.window_secs, 7200);
        assert_eq!(loaded.display.unit, TemperatureUnit::Kelvin);
        assert_eq!(loaded.alerts, config.alerts);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/skylog/service.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
