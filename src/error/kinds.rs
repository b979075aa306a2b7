use std::{fmt, io};

use crate::error::sql::sqlx_error_message;

/// Crate-wide `Result` type using [`ExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum ExportError {
    /// Request validation errors, rejected before the pipeline starts.
    Validation(ValidationError),

    /// Configuration errors.
    Config(ConfigError),

    /// Row source errors (connect, query, decode).
    Source(SourceError),

    /// Spreadsheet generation and save errors.
    Write(WriteError),

    /// I/O errors.
    Io(io::Error),

    /// SQL driver errors.
    Sql(sqlx::Error),

    /// The run was cancelled by the caller. Distinct from a failure:
    /// partial output has already been cleaned up when this is returned.
    Cancelled,
}

impl ExportError {
    /// Whether this error represents a cooperative cancellation rather
    /// than a genuine failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExportError::Cancelled)
    }
}

/// Request validation errors.
#[derive(Debug)]
pub enum ValidationError {
    /// The root key was empty or whitespace-only.
    BlankRootKey,
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// The data source registry is empty.
    NoDataSources,

    /// The configured query routine is not a plain SQL identifier.
    InvalidRoutine(String),
}

/// Row source errors.
#[derive(Debug)]
pub enum SourceError {
    /// Failed to establish a connection.
    ConnectFailed(String),

    /// The hierarchical query failed on the server.
    QueryFailed(String),

    /// The connect or query deadline elapsed.
    Timeout { seconds: u64 },
}

/// Spreadsheet writer errors.
#[derive(Debug)]
pub enum WriteError {
    /// The export directory could not be created.
    CreateDirFailed(String),

    /// Workbook generation failed.
    Workbook(String),

    /// The workbook could not be persisted to disk.
    SaveFailed(String),
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Validation(e) => write!(f, "Validation error: {e}"),
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Source(e) => write!(f, "Source error: {e}"),
            ExportError::Write(e) => write!(f, "Write error: {e}"),
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
            ExportError::Sql(e) => write!(f, "Database error: {}", sqlx_error_message(e)),
            ExportError::Cancelled => write!(f, "Export cancelled"),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::BlankRootKey => write!(f, "Root affiliate key must not be blank"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::NoDataSources => write!(f, "No data sources configured"),
            ConfigError::InvalidRoutine(name) => {
                write!(f, "Invalid query routine name: {name}")
            }
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::ConnectFailed(msg) => write!(f, "Failed to connect: {msg}"),
            SourceError::QueryFailed(msg) => write!(f, "Query failed: {msg}"),
            SourceError::Timeout { seconds } => {
                write!(f, "Operation timed out after {seconds}s")
            }
        }
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::CreateDirFailed(msg) => {
                write!(f, "Failed to create export directory: {msg}")
            }
            WriteError::Workbook(msg) => write!(f, "Workbook generation failed: {msg}"),
            WriteError::SaveFailed(msg) => write!(f, "Failed to save workbook: {msg}"),
        }
    }
}

impl std::error::Error for ExportError {}
impl std::error::Error for ValidationError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for SourceError {}
impl std::error::Error for WriteError {}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<sqlx::Error> for ExportError {
    fn from(err: sqlx::Error) -> Self {
        ExportError::Sql(err)
    }
}

impl From<ValidationError> for ExportError {
    fn from(err: ValidationError) -> Self {
        ExportError::Validation(err)
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<SourceError> for ExportError {
    fn from(err: SourceError) -> Self {
        ExportError::Source(err)
    }
}

impl From<WriteError> for ExportError {
    fn from(err: WriteError) -> Self {
        ExportError::Write(err)
    }
}

impl From<rust_xlsxwriter::XlsxError> for ExportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ExportError::Write(WriteError::Workbook(err.to_string()))
    }
}

impl From<toml::de::Error> for ExportError {
    fn from(err: toml::de::Error) -> Self {
        ExportError::Config(ConfigError::InvalidFormat(err.to_string()))
    }
}
