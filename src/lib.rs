//! Affiliate Tree Export Library
//!
//! This library provides the core functionality for exporting an affiliate
//! hierarchy from a relational data source into a formatted XLSX workbook.
//! It can be embedded by other front ends (HTTP handlers, UI event
//! handlers) that supply a root key and a cancellation signal and consume
//! the ordered progress stream.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and progress rendering
//! - `config`: Configuration and the data source registry
//! - `error`: Error types and handling
//! - `export`: Pipeline coordination, progress channel, spreadsheet writer
//! - `source`: Remote hierarchical query and the synthetic progress ticker
//! - `utils`: Utility functions and helpers
//!
//! # Example
//!
//! ```no_run
//! use affiliate_export::config::Config;
//! use affiliate_export::export::{ExportCoordinator, ExportRequest, ProgressSender};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.toml")?;
//!     let (progress, mut events) = ProgressSender::channel();
//!
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             println!("[{:>3}%] {}", event.percent, event.message);
//!         }
//!     });
//!
//!     let request = ExportRequest {
//!         root_key: "acme01".to_string(),
//!         data_source_id: None,
//!     };
//!     let coordinator =
//!         ExportCoordinator::from_config(&config, request.data_source_id.as_deref(), progress)?;
//!
//!     let outcome = coordinator.run(&request, &CancellationToken::new()).await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod source;
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DataSourceConfig};
pub use error::{ExportError, Result};
pub use export::{
    ExportCoordinator, ExportOutcome, ExportPhase, ExportRequest, ExportResult, ProgressEvent,
    ProgressSender, SheetWriter,
};
pub use source::{CellValue, Row, RowSource, SqlRowSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
