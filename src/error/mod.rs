//! Error handling module for export operations.
//!
//! This module provides the error types used across the pipeline:
//! - A single top-level error type wrapping more specific kinds
//! - A crate-wide `Result` alias
//! - Concise message extraction from `sqlx` driver errors
//!
//! # Example
//!
//! ```rust,no_run
//! use affiliate_export::error::{ExportError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     // Pipeline operations convert their failures into ExportError
//!     Ok(())
//! }
//!
//! fn handle_error(err: &ExportError) {
//!     if err.is_cancelled() {
//!         println!("run was cancelled");
//!     }
//! }
//! ```

pub mod kinds;
pub mod sql;

// Re-export commonly used types
pub use kinds::{ConfigError, ExportError, Result, SourceError, ValidationError, WriteError};
pub use sql::sqlx_error_message;
