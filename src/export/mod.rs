//! Export pipeline: coordination, progress, writing, housekeeping.
//!
//! The pipeline for one run is small and strictly one-directional:
//!
//! 1. **ProgressSender** carries the ordered event stream to the observer
//! 2. **RowSource** (in [`crate::source`]) fetches the affiliate tree
//! 3. **SheetWriter** turns the row set into a formatted workbook
//! 4. **ExportCoordinator** sequences the two and returns the outcome
//!
//! Rows flow source → writer; progress events flow the other way on a
//! channel that never blocks the producers. Housekeeping sweeps stale
//! artifacts out of the export directory around runs.
//!
//! # Example
//!
//! ```no_run
//! use affiliate_export::config::Config;
//! use affiliate_export::export::{ExportCoordinator, ExportRequest, ProgressSender};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> affiliate_export::error::Result<()> {
//! let config = Config::from_file("config.toml")?;
//! let (progress, mut events) = ProgressSender::channel();
//!
//! let request = ExportRequest {
//!     root_key: "acme01".to_string(),
//!     data_source_id: None,
//! };
//!
//! let coordinator =
//!     ExportCoordinator::from_config(&config, request.data_source_id.as_deref(), progress)?;
//!
//! let cancel = CancellationToken::new();
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         println!("{} {}%", event.message, event.percent);
//!     }
//! });
//!
//! let outcome = coordinator.run(&request, &cancel).await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod housekeeping;
pub mod progress;
pub mod writer;

pub use coordinator::{ExportCoordinator, ExportOutcome, ExportRequest, ExportResult};
pub use housekeeping::sweep_stale_exports;
pub use progress::{ExportPhase, ProgressEvent, ProgressSender};
pub use writer::{SheetWriter, WriteOutput};
