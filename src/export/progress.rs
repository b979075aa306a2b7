//! Progress events and the channel the pipeline reports through.
//!
//! Every run pushes an ordered stream of [`ProgressEvent`] values to a
//! single consumer (CLI renderer, socket push, test harness). The channel is
//! unbounded and sends are fire-and-forget: producers never block on the
//! observer, and a consumer that went away is not an error. Within one run
//! the stream is strictly FIFO and ends with exactly one terminal event.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

/// Pipeline phase carried by every progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPhase {
    /// Opening the database connection
    Connecting,
    /// Remote hierarchical query outstanding (includes synthetic ticks)
    Executing,
    /// Query returned; full row set in memory
    DataLoaded,
    /// Workbook and header being prepared
    GeneratingSheet,
    /// Data rows being written
    WritingSheet,
    /// Workbook being persisted to disk
    SavingSheet,
    /// Terminal: run finished (also used for the informational
    /// no-data outcome)
    Completed,
    /// Terminal: run failed
    Error,
    /// Terminal: run cancelled by the caller
    Cancelled,
}

impl ExportPhase {
    /// Whether no further events may follow this phase.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExportPhase::Completed | ExportPhase::Error | ExportPhase::Cancelled
        )
    }
}

/// One unit of the ordered status stream for a run.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// Current pipeline phase
    pub phase: ExportPhase,

    /// Human-readable status line
    pub message: String,

    /// Rows processed so far (0 when not applicable)
    pub rows_processed: u64,

    /// Total rows for the run (0 until known)
    pub rows_total: u64,

    /// Completion percentage in [0, 100]
    pub percent: u8,

    /// Wall-clock time since the run (or phase) started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<Duration>,

    /// Generated file name; present only on Completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file_name: Option<String>,

    /// Absolute path of the generated file; present only on Completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file_path: Option<String>,

    /// Generated file size in MB, rounded to 2 decimals; present only on
    /// Completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_size_mb: Option<f64>,

    /// Whether this event reports a failure
    pub error: bool,
}

impl ProgressEvent {
    /// Create an event for a phase. The error flag is derived from the
    /// phase; optional fields start unset.
    pub fn new(phase: ExportPhase, message: impl Into<String>, percent: u8) -> Self {
        Self {
            phase,
            message: message.into(),
            rows_processed: 0,
            rows_total: 0,
            percent,
            elapsed: None,
            output_file_name: None,
            output_file_path: None,
            output_size_mb: None,
            error: phase == ExportPhase::Error,
        }
    }

    /// Attach row counts to this event.
    pub fn with_rows(mut self, processed: u64, total: u64) -> Self {
        self.rows_processed = processed;
        self.rows_total = total;
        self
    }

    /// Attach elapsed wall-clock time to this event.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    /// Attach the output artifact details (Completed events only).
    pub fn with_output(
        mut self,
        file_name: impl Into<String>,
        file_path: impl Into<String>,
        size_mb: f64,
    ) -> Self {
        self.output_file_name = Some(file_name.into());
        self.output_file_path = Some(file_path.into());
        self.output_size_mb = Some(size_mb);
        self
    }
}

/// Sending half of a run's progress channel.
///
/// Cloneable so the row source, the ticker task and the writer can all push
/// into the same FIFO stream. `emit` never blocks and never fails from the
/// producer's point of view.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSender {
    /// Create a progress channel for one run.
    ///
    /// # Returns
    /// * `(ProgressSender, UnboundedReceiver<ProgressEvent>)` - Sender for
    ///   the pipeline and receiver for the observer
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Push an event to the observer. A dropped receiver is ignored.
    pub fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}
