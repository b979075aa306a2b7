//! Configuration management for affiliate-export
//!
//! This module handles loading and parsing configuration:
//! - Configuration files (TOML format)
//! - The data source registry (named remote databases selectable per request)
//! - Export and writer knobs (output directory, file prefix, timeouts)
//!
//! The registry is read-only during a pipeline run. Lookup by id falls back
//! to the default entry, then to the first registered entry; an empty
//! registry is a configuration error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Export pipeline configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Data source registry
    #[serde(default)]
    pub sources: Vec<DataSourceConfig>,
}

/// Export pipeline and writer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory where generated workbooks are placed
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// File name prefix for generated workbooks
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Worksheet name for the exported rows
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,

    /// Cell text for boolean true values
    #[serde(default = "default_true_label")]
    pub true_label: String,

    /// Cell text for boolean false values
    #[serde(default = "default_false_label")]
    pub false_label: String,

    /// Upper bound for autosized column widths, in characters
    #[serde(default = "default_max_column_width")]
    pub max_column_width: f64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Query timeout in seconds. The hierarchical query may legitimately
    /// run for many minutes over large trees, so this is generous.
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,

    /// Age in seconds after which stale files in the export directory are
    /// swept
    #[serde(default = "default_stale_after")]
    pub stale_after: u64,
}

/// A named remote database endpoint selectable per request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Registry identifier
    pub id: String,

    /// Human-readable name, used in progress messages
    pub display_name: String,

    /// Database server host
    pub host: String,

    /// Database server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name
    pub database: String,

    /// Login username
    pub username: String,

    /// Login password
    pub password: String,

    /// Server-side set-returning routine executed for the hierarchical
    /// query. Spliced into the statement text, so it must be a plain SQL
    /// identifier (see [`DataSourceConfig::validate_routine`]).
    #[serde(default = "default_routine")]
    pub routine: String,

    /// Whether this entry is the registry default
    #[serde(default)]
    pub is_default: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_export_dir() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("affiliate_exports")
}

fn default_file_prefix() -> String {
    "affiliates".to_string()
}

fn default_sheet_name() -> String {
    "Players".to_string()
}

fn default_true_label() -> String {
    "Yes".to_string()
}

fn default_false_label() -> String {
    "No".to_string()
}

fn default_max_column_width() -> f64 {
    100.0
}

fn default_connect_timeout() -> u64 {
    60
}

fn default_query_timeout() -> u64 {
    1200
}

fn default_stale_after() -> u64 {
    3600
}

fn default_port() -> u16 {
    5432
}

fn default_routine() -> String {
    "get_hierarchical_players_email_verified".to_string()
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

impl Default for Config {
    fn default() -> Self {
        Self {
            export: ExportConfig::default(),
            logging: LoggingConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
            file_prefix: default_file_prefix(),
            sheet_name: default_sheet_name(),
            true_label: default_true_label(),
            false_label: default_false_label(),
            max_column_width: default_max_column_width(),
            connect_timeout: default_connect_timeout(),
            query_timeout: default_query_timeout(),
            stale_after: default_stale_after(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string())
            } else {
                ConfigError::InvalidFormat(e.to_string())
            }
        })?;

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".affiliate-export")
            .join("config.toml")
    }

    /// Resolve a data source from the registry.
    ///
    /// An explicit id wins when it matches; otherwise the default entry is
    /// used, then the first registered entry. An id that matches nothing
    /// falls through the same chain rather than erroring, so a stale saved
    /// id still exports against a sane database.
    ///
    /// # Arguments
    /// * `id` - Optional explicit data source id from the request
    ///
    /// # Returns
    /// * `Result<&DataSourceConfig>` - Resolved entry, or an error when the
    ///   registry is empty
    pub fn resolve_source(&self, id: Option<&str>) -> Result<&DataSourceConfig> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoDataSources.into());
        }

        if let Some(id) = id
            && let Some(source) = self.sources.iter().find(|s| s.id == id)
        {
            return Ok(source);
        }

        Ok(self
            .sources
            .iter()
            .find(|s| s.is_default)
            .unwrap_or(&self.sources[0]))
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.export.connect_timeout)
    }

    /// Get query timeout as Duration
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.export.query_timeout)
    }

    /// Get the stale-file sweep threshold as Duration
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.export.stale_after)
    }
}

impl DataSourceConfig {
    /// Validate that the configured routine is a plain SQL identifier.
    ///
    /// The routine name is spliced into the query text, so it must start
    /// with a letter or underscore and contain only alphanumerics and
    /// underscores.
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate_routine(&self) -> Result<()> {
        let mut chars = self.routine.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_alphabetic() || first == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            None => false,
        };

        if valid {
            Ok(())
        } else {
            Err(ConfigError::InvalidRoutine(self.routine.clone()).into())
        }
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str, is_default: bool) -> DataSourceConfig {
        DataSourceConfig {
            id: id.to_string(),
            display_name: format!("{id} affiliates"),
            host: "db.example.com".to_string(),
            port: 5432,
            database: "affiliates".to_string(),
            username: "export".to_string(),
            password: "secret".to_string(),
            routine: default_routine(),
            is_default,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.export.file_prefix, "affiliates");
        assert_eq!(config.export.query_timeout, 1200);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_resolve_explicit_id() {
        let mut config = Config::default();
        config.sources = vec![source("alpha", false), source("beta", true)];

        let resolved = config.resolve_source(Some("alpha")).unwrap();
        assert_eq!(resolved.id, "alpha");
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let mut config = Config::default();
        config.sources = vec![source("alpha", false), source("beta", true)];

        assert_eq!(config.resolve_source(None).unwrap().id, "beta");
        // Unknown explicit id falls through the same chain
        assert_eq!(config.resolve_source(Some("gamma")).unwrap().id, "beta");
    }

    #[test]
    fn test_resolve_falls_back_to_first_without_default() {
        let mut config = Config::default();
        config.sources = vec![source("alpha", false), source("beta", false)];

        assert_eq!(config.resolve_source(None).unwrap().id, "alpha");
    }

    #[test]
    fn test_resolve_empty_registry_errors() {
        let config = Config::default();
        assert!(config.resolve_source(None).is_err());
    }

    #[test]
    fn test_routine_validation() {
        let mut s = source("alpha", false);
        assert!(s.validate_routine().is_ok());

        s.routine = "get_players; drop table users".to_string();
        assert!(s.validate_routine().is_err());

        s.routine = String::new();
        assert!(s.validate_routine().is_err());

        s.routine = "9starts_with_digit".to_string();
        assert!(s.validate_routine().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [export]
            export_dir = "/tmp/exports"
            file_prefix = "players"

            [logging]
            level = "debug"

            [[sources]]
            id = "main"
            display_name = "Main affiliates"
            host = "db.internal"
            database = "affiliates"
            username = "export"
            password = "secret"
            is_default = true
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.export.file_prefix, "players");
        assert_eq!(config.export.sheet_name, "Players"); // default preserved
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].port, 5432);
        assert!(config.sources[0].is_default);
    }

    #[test]
    fn test_timeout_accessors() {
        let config = Config::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(60));
        assert_eq!(config.query_timeout(), Duration::from_secs(1200));
        assert_eq!(config.stale_after(), Duration::from_secs(3600));
    }
}
