//! Export coordinator for orchestrating export runs.
//!
//! This module provides the coordinator that sequences the row source and
//! the spreadsheet writer for one run, pushing both components' progress
//! through a single channel so the observer sees one ordered stream. The
//! coordinator validates the request before the pipeline starts, decides
//! how an empty tree is reported, and returns the final artifact details to
//! the caller.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::{Result, ValidationError};
use crate::export::housekeeping;
use crate::export::progress::{ExportPhase, ProgressEvent, ProgressSender};
use crate::export::writer::SheetWriter;
use crate::source::{RowSource, SqlRowSource};

/// An export request supplied by the external caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Identifier of the top-level affiliate whose tree is exported
    pub root_key: String,

    /// Optional registry id of the data source to query
    #[serde(default)]
    pub data_source_id: Option<String>,
}

/// Result of a successful export run.
#[derive(Debug)]
pub struct ExportResult {
    /// Generated file name
    pub file_name: String,
    /// Absolute path of the generated file
    pub file_path: PathBuf,
    /// File size in bytes
    pub file_size_bytes: u64,
    /// Number of records exported
    pub row_count: u64,
    /// Total wall-clock time for the run
    pub processing_time: Duration,
}

/// Terminal outcome of a run that did not fail.
///
/// An empty tree is not an error: it terminates with an informational
/// Completed event and this distinct variant, so the caller can present
/// "no data" rather than a failure.
#[derive(Debug)]
pub enum ExportOutcome {
    /// A workbook was produced
    Completed(ExportResult),
    /// The query returned no records; the writer was never invoked
    NoData,
}

/// Coordinator for export runs.
///
/// Owns the row source and writer for one configuration and runs one
/// request at a time; independent coordinators may run concurrently.
pub struct ExportCoordinator {
    /// Row source for the hierarchical query
    source: Box<dyn RowSource>,
    /// Writer producing the output workbook
    writer: SheetWriter,
    /// Progress channel shared by both components
    progress: ProgressSender,
    /// Export directory and stale-age threshold for the post-run sweep
    housekeeping: Option<(PathBuf, Duration)>,
}

impl ExportCoordinator {
    /// Create a coordinator from pre-built components.
    pub fn new(source: Box<dyn RowSource>, writer: SheetWriter, progress: ProgressSender) -> Self {
        Self {
            source,
            writer,
            progress,
            housekeeping: None,
        }
    }

    /// Create a coordinator for a request against a loaded configuration.
    ///
    /// Resolves the data source from the registry (explicit id → default →
    /// first) and wires up the production source and writer, including the
    /// post-run stale-file sweep.
    pub fn from_config(
        config: &Config,
        data_source_id: Option<&str>,
        progress: ProgressSender,
    ) -> Result<Self> {
        let entry = config.resolve_source(data_source_id)?.clone();
        let source = SqlRowSource::new(entry, config)?;

        Ok(Self {
            source: Box::new(source),
            writer: SheetWriter::new(config.export.clone()),
            progress,
            housekeeping: Some((config.export.export_dir.clone(), config.stale_after())),
        })
    }

    /// Execute one export run.
    ///
    /// Validates the root key, fetches the affiliate tree, short-circuits
    /// on an empty result, and otherwise writes the workbook. Every
    /// progress event from both components is relayed in receipt order on
    /// the shared channel; failures keep the terminal event emitted at the
    /// component boundary and propagate here unchanged.
    pub async fn run(
        &self,
        request: &ExportRequest,
        cancel: &CancellationToken,
    ) -> Result<ExportOutcome> {
        let started = Instant::now();

        let root_key = request.root_key.trim();
        if root_key.is_empty() {
            let err = ValidationError::BlankRootKey;
            self.progress
                .emit(ProgressEvent::new(ExportPhase::Error, err.to_string(), 0));
            return Err(err.into());
        }

        info!(root_key, "starting export run");

        let rows = self.source.fetch(root_key, &self.progress, cancel).await?;

        if rows.is_empty() {
            info!(root_key, "query returned no records");
            self.progress.emit(
                ProgressEvent::new(
                    ExportPhase::Completed,
                    "No records found for the requested affiliate",
                    100,
                )
                .with_elapsed(started.elapsed()),
            );
            return Ok(ExportOutcome::NoData);
        }

        let row_count = rows.len() as u64;
        let output = self
            .writer
            .write(rows, root_key, &self.progress, cancel)
            .await?;

        if let Some((dir, max_age)) = &self.housekeeping {
            housekeeping::sweep_stale_exports(dir, *max_age);
        }

        let processing_time = started.elapsed();
        info!(
            root_key,
            rows = row_count,
            file = %output.file_path.display(),
            elapsed_ms = processing_time.as_millis() as u64,
            "export run completed"
        );

        Ok(ExportOutcome::Completed(ExportResult {
            file_name: output.file_name,
            file_path: output.file_path,
            file_size_bytes: output.file_size_bytes,
            row_count,
            processing_time,
        }))
    }
}
