//! Configuration types for Tessera.
//!
//! Configuration is loaded from a TOML file and then overridden by command
//! line flags or `TESSERA__*` environment variables. Config structs validate
//! their values at construction time via fallible builders;
//! post-deserialization validation is available via `validate()`.

// The schemars `JsonSchema` derive expands to code using `.unwrap()`.
#![allow(clippy::unwrap_used)]

use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::error::{CodedError, ErrorCode};

/// Configuration error.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[snafu(display("invalid config: {message}"))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// The config file could not be read.
    #[snafu(display("failed to read config file {}: {source}", path.display()))]
    Read {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`Config`].
    #[snafu(display("failed to parse config file {}: {source}", path.display()))]
    Parse {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

impl CodedError for ConfigError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } | Self::Parse { .. } => ErrorCode::Invalid,
            Self::Read { .. } => ErrorCode::Internal,
        }
    }
}

/// Shortest migration timeout accepted.
const MIN_MIGRATION_TIMEOUT: Duration = Duration::from_secs(1);

fn default_sync_on_commit() -> bool {
    true
}

fn default_auto_migrate() -> bool {
    true
}

fn default_migration_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Store location and durability.
    pub storage: StorageConfig,
    /// Startup migration behaviour.
    pub migration: MigrationConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl Config {
    /// Reads and validates a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`], [`ConfigError::Parse`], or a validation
    /// error from [`Config::validate`].
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).context(ReadSnafu { path: path.clone() })?;
        Self::from_toml_str(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse { path, source },
            other => other,
        })
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Validation`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).context(ParseSnafu { path: PathBuf::from("<inline>") })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Validation`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.migration.validate()?;
        self.logging.validate()
    }
}

/// Store configuration.
///
/// # Validation Rules
///
/// - `path`, when set, must not be empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StorageConfig {
    /// Database file. Unset means an in-memory store.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Whether every commit is flushed to disk before it is acknowledged.
    #[serde(default = "default_sync_on_commit")]
    pub sync_on_commit: bool,
}

#[bon::bon]
impl StorageConfig {
    /// Creates a storage configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `path` is empty.
    #[builder]
    pub fn new(
        #[builder(into)] path: Option<PathBuf>,
        #[builder(default = default_sync_on_commit())] sync_on_commit: bool,
    ) -> Result<Self, ConfigError> {
        let config = Self { path, sync_on_commit };
        config.validate()?;
        Ok(config)
    }
}

impl StorageConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            return Err(ConfigError::Validation {
                message: "storage.path must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Whether the store lives only in memory.
    pub fn is_ephemeral(&self) -> bool {
        self.path.is_none()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: None, sync_on_commit: default_sync_on_commit() }
    }
}

/// Migration configuration.
///
/// # Validation Rules
///
/// - `timeout` must be >= 1s
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MigrationConfig {
    /// Convert legacy records at startup when the dataset is not migrated.
    #[serde(default = "default_auto_migrate")]
    pub auto_migrate: bool,
    /// Deadline for one conversion run.
    #[serde(default = "default_migration_timeout", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub timeout: Duration,
}

#[bon::bon]
impl MigrationConfig {
    /// Creates a migration configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `timeout` < 1s.
    #[builder]
    pub fn new(
        #[builder(default = default_auto_migrate())] auto_migrate: bool,
        #[builder(default = default_migration_timeout())] timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { auto_migrate, timeout };
        config.validate()?;
        Ok(config)
    }
}

impl MigrationConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout < MIN_MIGRATION_TIMEOUT {
            return Err(ConfigError::Validation {
                message: format!(
                    "migration.timeout must be >= {}, got {}",
                    humantime::format_duration(MIN_MIGRATION_TIMEOUT),
                    humantime::format_duration(self.timeout)
                ),
            });
        }
        Ok(())
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self { auto_migrate: default_auto_migrate(), timeout: default_migration_timeout() }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON when stdout is not a terminal, text otherwise.
    #[default]
    Auto,
    /// Human-readable text.
    Text,
    /// One JSON object per event.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Text => "text",
            Self::Json => "json",
        })
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation {
                message: format!("unknown log format {other:?}, expected auto, text, or json"),
            }),
        }
    }
}

/// Logging configuration.
///
/// # Validation Rules
///
/// - `filter` must not be empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Default filter directive, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl LoggingConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filter.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "logging.filter must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { format: LogFormat::default(), filter: default_log_filter() }
    }
}

/// JSON Schema of [`Config`], pretty-printed.
pub fn config_schema() -> String {
    let schema = schemars::schema_for!(Config);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// Example config file with every default spelled out.
pub fn config_example() -> String {
    toml::to_string_pretty(&Config::default()).unwrap_or_default()
}

/// Duration serialization using humantime format.
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.storage.is_ephemeral());
        assert!(config.storage.sync_on_commit);
        assert!(config.migration.auto_migrate);
        assert_eq!(config.migration.timeout, Duration::from_secs(300));
        assert_eq!(config.logging.format, LogFormat::Auto);
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml_str(
            r#"
            [storage]
            path = "/var/lib/tessera/tessera.db"
            sync_on_commit = false

            [migration]
            auto_migrate = false
            timeout = "90s"

            [logging]
            format = "json"
            filter = "tessera_kv=debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.path, Some(PathBuf::from("/var/lib/tessera/tessera.db")));
        assert!(!config.storage.sync_on_commit);
        assert!(!config.migration.auto_migrate);
        assert_eq!(config.migration.timeout, Duration::from_secs(90));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_short_migration_timeout_is_rejected() {
        let err = Config::from_toml_str("[migration]\ntimeout = \"10ms\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        assert!(err.to_string().contains("migration.timeout"));
        assert_eq!(err.code(), ErrorCode::Invalid);
    }

    #[test]
    fn test_malformed_toml() {
        let err = Config::from_toml_str("[storage\npath =").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_builders_validate() {
        assert!(StorageConfig::builder().path("").build().is_err());
        assert!(StorageConfig::builder().path("/tmp/t.db").build().is_ok());
        assert!(MigrationConfig::builder().timeout(Duration::from_millis(5)).build().is_err());
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::Text.to_string(), "text");
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_example_parses_back() {
        let example = config_example();
        assert_eq!(Config::from_toml_str(&example).unwrap(), Config::default());
    }

    #[test]
    fn test_schema_names_sections() {
        let schema = config_schema();
        assert!(schema.contains("storage"));
        assert!(schema.contains("migration"));
    }
}
