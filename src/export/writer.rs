//! Spreadsheet writer for export operations.
//!
//! This module turns a fetched row set into a formatted .xlsx workbook:
//! - Column schema inferred once from the first row; every later row is
//!   projected onto it (missing keys become blank cells, extra keys are
//!   ignored)
//! - Bold, filled, centered header with a thin border
//! - Type-directed cell formatting (date-time format for timestamps,
//!   two-decimal numeric format for floats, yes/no labels for booleans)
//! - Per-row cancellation polling and progress events on a 5% cadence
//! - Bounded column autosizing and an autofilter over the used range
//! - Atomic persistence: the workbook is saved to a `.tmp` sibling and
//!   renamed into place
//!
//! Workbook generation is synchronous CPU/IO work, so the whole pass runs
//! on a blocking thread; progress emission is fire-and-forget and never
//! stalls it.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Local;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ExportConfig;
use crate::error::{ExportError, Result, WriteError};
use crate::export::progress::{ExportPhase, ProgressEvent, ProgressSender};
use crate::source::row::{CellValue, Row};
use crate::utils::{convert, fs as fsutil, string};

/// Cell format applied to timestamp values.
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Cell format applied to floating-point values.
const FLOAT_FORMAT: &str = "#,##0.00";

/// Header fill color.
const HEADER_FILL: u32 = 0x90EE90;

/// Extra width added to the longest cell so content is not flush against
/// the column edge.
const COLUMN_PADDING: f64 = 1.0;

/// Result of a successful write.
#[derive(Debug)]
pub struct WriteOutput {
    /// Generated file name (no directory)
    pub file_name: String,
    /// Absolute path of the generated file
    pub file_path: PathBuf,
    /// File size in bytes
    pub file_size_bytes: u64,
    /// Time taken for generation and save
    pub elapsed: Duration,
}

/// Writer that persists a row set as a formatted workbook.
pub struct SheetWriter {
    config: ExportConfig,
}

impl SheetWriter {
    /// Create a writer with the given export configuration.
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Write `rows` to a new workbook named for `root_key`.
    ///
    /// Emits GeneratingSheet → WritingSheet (one or more) → SavingSheet →
    /// Completed on success. On failure the partial output is removed, an
    /// Error event is emitted and the error is returned; on cancellation
    /// the same cleanup happens with a Cancelled event and
    /// [`ExportError::Cancelled`].
    pub async fn write(
        &self,
        rows: Vec<Row>,
        root_key: &str,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<WriteOutput> {
        let config = self.config.clone();
        let root_key = root_key.to_string();
        let task_progress = progress.clone();
        let cancel = cancel.clone();

        let joined = tokio::task::spawn_blocking(move || {
            generate_workbook(&config, rows, &root_key, &task_progress, &cancel)
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(e) => {
                let message = format!("writer task failed: {e}");
                warn!("{message}");
                progress.emit(ProgressEvent::new(
                    ExportPhase::Error,
                    format!("Error generating spreadsheet: {message}"),
                    60,
                ));
                Err(WriteError::Workbook(message).into())
            }
        }
    }
}

fn generate_workbook(
    config: &ExportConfig,
    rows: Vec<Row>,
    root_key: &str,
    progress: &ProgressSender,
    cancel: &CancellationToken,
) -> Result<WriteOutput> {
    let started = Instant::now();

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let file_name = format!(
        "{}_{}_{}.xlsx",
        config.file_prefix,
        string::sanitize_component(root_key),
        timestamp
    );

    let file_path = config.export_dir.join(&file_name);
    let tmp_path = config.export_dir.join(format!("{file_name}.tmp"));

    let total = rows.len() as u64;
    let result = fsutil::ensure_dir_exists(&config.export_dir)
        .map_err(|e| WriteError::CreateDirFailed(e.to_string()).into())
        .and_then(|_| {
            progress.emit(ProgressEvent::new(
                ExportPhase::GeneratingSheet,
                "Generating spreadsheet...",
                60,
            ));
            build_and_save(config, rows, progress, cancel, &tmp_path, &file_path)
        });

    let file_size_bytes = match result {
        Ok(size) => size,
        Err(e) => {
            remove_partial(&tmp_path);
            match &e {
                ExportError::Cancelled => {
                    info!("spreadsheet generation cancelled, partial output discarded");
                    progress.emit(ProgressEvent::new(
                        ExportPhase::Cancelled,
                        "Export cancelled",
                        0,
                    ));
                }
                other => {
                    warn!("spreadsheet generation failed: {other}");
                    progress.emit(ProgressEvent::new(
                        ExportPhase::Error,
                        format!("Error generating spreadsheet: {other}"),
                        60,
                    ));
                }
            }
            return Err(e);
        }
    };

    // The observer gets an absolute path even when the configured export
    // directory is relative
    let file_path = file_path.canonicalize().unwrap_or(file_path);

    let elapsed = started.elapsed();
    let size_mb = convert::bytes_to_mb(file_size_bytes);

    info!(
        file = %file_path.display(),
        size_bytes = file_size_bytes,
        elapsed_ms = elapsed.as_millis() as u64,
        "export file generated"
    );

    progress.emit(
        ProgressEvent::new(
            ExportPhase::Completed,
            "Export file generated successfully",
            100,
        )
        .with_rows(total, total)
        .with_elapsed(elapsed)
        .with_output(&file_name, file_path.display().to_string(), size_mb),
    );

    Ok(WriteOutput {
        file_name,
        file_path,
        file_size_bytes,
        elapsed,
    })
}

/// Populate the workbook, persist it, and return the final file size.
fn build_and_save(
    config: &ExportConfig,
    rows: Vec<Row>,
    progress: &ProgressSender,
    cancel: &CancellationToken,
    tmp_path: &Path,
    file_path: &Path,
) -> Result<u64> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&config.sheet_name)?;

    if !rows.is_empty() {
        // Schema is the ordered key set of the first row, fixed once chosen
        let columns: Vec<String> = rows[0].columns().map(str::to_string).collect();

        write_header(worksheet, &columns)?;

        let mut widths: Vec<f64> = columns.iter().map(|c| c.chars().count() as f64).collect();

        let total = rows.len() as u64;
        let report_interval = (total / 20).max(1);

        for (i, row) in rows.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ExportError::Cancelled);
            }

            let sheet_row = i as u32 + 1;
            for (col, name) in columns.iter().enumerate() {
                let value = row.get(name).unwrap_or(&CellValue::Null);
                let width = write_cell(worksheet, config, sheet_row, col as u16, value)?;
                if width > widths[col] {
                    widths[col] = width;
                }
            }

            let processed = i as u64 + 1;
            if processed % report_interval == 0 || processed == total {
                let percent = 60 + (processed * 35 / total) as u8;
                progress.emit(
                    ProgressEvent::new(
                        ExportPhase::WritingSheet,
                        format!("Writing rows: {processed} / {total}"),
                        percent,
                    )
                    .with_rows(processed, total),
                );
            }
        }

        for (col, width) in widths.iter().enumerate() {
            let bounded = (width + COLUMN_PADDING).min(config.max_column_width);
            worksheet.set_column_width(col as u16, bounded)?;
        }

        worksheet.autofilter(0, 0, rows.len() as u32, columns.len() as u16 - 1)?;
        debug!(rows = rows.len(), columns = columns.len(), "worksheet populated");
    }

    if cancel.is_cancelled() {
        return Err(ExportError::Cancelled);
    }

    progress.emit(ProgressEvent::new(
        ExportPhase::SavingSheet,
        "Saving spreadsheet...",
        95,
    ));

    // Save to a sibling temp file, then publish with a rename
    workbook
        .save(tmp_path)
        .map_err(|e| WriteError::SaveFailed(e.to_string()))?;
    std::fs::rename(tmp_path, file_path).map_err(|e| WriteError::SaveFailed(e.to_string()))?;

    let size = std::fs::metadata(file_path)
        .map_err(|e| WriteError::SaveFailed(e.to_string()))?
        .len();

    Ok(size)
}

fn write_header(worksheet: &mut Worksheet, columns: &[String]) -> Result<()> {
    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin);

    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, &header_format)?;
    }

    Ok(())
}

/// Write one typed cell and return its rendered width in characters.
fn write_cell(
    worksheet: &mut Worksheet,
    config: &ExportConfig,
    row: u32,
    col: u16,
    value: &CellValue,
) -> Result<f64> {
    let width = match value {
        CellValue::Null => 0.0,
        CellValue::Text(s) => {
            worksheet.write_string(row, col, s)?;
            s.chars().count() as f64
        }
        CellValue::Integer(v) => {
            worksheet.write_number(row, col, *v as f64)?;
            v.to_string().len() as f64
        }
        CellValue::Float(v) => {
            let format = Format::new().set_num_format(FLOAT_FORMAT);
            worksheet.write_number_with_format(row, col, *v, &format)?;
            format!("{v:.2}").len() as f64
        }
        CellValue::Bool(v) => {
            let label = if *v {
                &config.true_label
            } else {
                &config.false_label
            };
            worksheet.write_string(row, col, label)?;
            label.chars().count() as f64
        }
        CellValue::Timestamp(dt) => {
            let format = Format::new().set_num_format(DATETIME_FORMAT);
            worksheet.write_datetime_with_format(row, col, dt, &format)?;
            DATETIME_FORMAT.len() as f64
        }
    };

    Ok(width)
}

fn remove_partial(tmp_path: &Path) {
    if tmp_path.exists()
        && let Err(e) = std::fs::remove_file(tmp_path)
    {
        warn!(path = %tmp_path.display(), "could not remove partial file: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::progress::ProgressSender;
    use calamine::{Data, Reader, Xlsx, open_workbook};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> ExportConfig {
        ExportConfig {
            export_dir: dir.path().to_path_buf(),
            ..ExportConfig::default()
        }
    }

    fn sample_row() -> Row {
        let mut row = Row::new();
        row.push("id", CellValue::Integer(1));
        row.push("amount", CellValue::Float(12.3));
        row.push(
            "joined",
            CellValue::Timestamp(
                NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            ),
        );
        row.push("active", CellValue::Bool(true));
        row
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_write_roundtrip() {
        let dir = TempDir::new().unwrap();
        let writer = SheetWriter::new(test_config(&dir));
        let (tx, mut rx) = ProgressSender::channel();
        let cancel = CancellationToken::new();

        let output = writer
            .write(vec![sample_row()], "acme01", &tx, &cancel)
            .await
            .unwrap();

        assert!(output.file_name.starts_with("affiliates_acme01_"));
        assert!(output.file_name.ends_with(".xlsx"));
        assert!(output.file_size_bytes > 0);

        let mut workbook: Xlsx<_> = open_workbook(&output.file_path).unwrap();
        let range = workbook.worksheet_range("Players").unwrap();

        let header: Vec<String> = (0..4)
            .map(|c| range.get_value((0, c)).unwrap().to_string())
            .collect();
        assert_eq!(header, vec!["id", "amount", "joined", "active"]);

        assert_eq!(range.get_value((1, 0)), Some(&Data::Float(1.0)));
        assert_eq!(range.get_value((1, 1)), Some(&Data::Float(12.3)));
        assert!(matches!(range.get_value((1, 2)), Some(Data::DateTime(_))));
        assert_eq!(
            range.get_value((1, 3)),
            Some(&Data::String("Yes".to_string()))
        );

        let events = drain(&mut rx);
        let last = events.last().unwrap();
        assert_eq!(last.phase, ExportPhase::Completed);
        assert_eq!(last.percent, 100);
        assert!(last.output_size_mb.is_some());
    }

    #[tokio::test]
    async fn test_progress_cadence_and_mapping() {
        let dir = TempDir::new().unwrap();
        let writer = SheetWriter::new(test_config(&dir));
        let (tx, mut rx) = ProgressSender::channel();
        let cancel = CancellationToken::new();

        let rows: Vec<Row> = (0..100)
            .map(|i| {
                let mut row = Row::new();
                row.push("id", CellValue::Integer(i));
                row
            })
            .collect();

        writer.write(rows, "acme01", &tx, &cancel).await.unwrap();

        let events = drain(&mut rx);
        let writing: Vec<&ProgressEvent> = events
            .iter()
            .filter(|e| e.phase == ExportPhase::WritingSheet)
            .collect();

        // interval = max(1, 100/20) = 5, so one event per 5 rows
        assert_eq!(writing.len(), 20);
        assert_eq!(writing.last().unwrap().rows_processed, 100);

        for event in &writing {
            assert!(event.percent >= 60 && event.percent <= 95);
        }
        for pair in writing.windows(2) {
            assert!(pair[1].percent >= pair[0].percent);
        }
    }

    #[tokio::test]
    async fn test_last_row_always_reported() {
        let dir = TempDir::new().unwrap();
        let writer = SheetWriter::new(test_config(&dir));
        let (tx, mut rx) = ProgressSender::channel();
        let cancel = CancellationToken::new();

        // 23 rows: interval 1, but also check an off-interval count 7 rows
        for n in [7usize, 23] {
            let rows: Vec<Row> = (0..n)
                .map(|i| {
                    let mut row = Row::new();
                    row.push("id", CellValue::Integer(i as i64));
                    row
                })
                .collect();

            writer.write(rows, "acme01", &tx, &cancel).await.unwrap();

            let events = drain(&mut rx);
            let last_writing = events
                .iter()
                .filter(|e| e.phase == ExportPhase::WritingSheet)
                .next_back()
                .unwrap();
            assert_eq!(last_writing.rows_processed, n as u64);
        }
    }

    #[tokio::test]
    async fn test_cancelled_write_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let writer = SheetWriter::new(test_config(&dir));
        let (tx, mut rx) = ProgressSender::channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = writer.write(vec![sample_row()], "acme01", &tx, &cancel).await;

        assert!(matches!(result, Err(ExportError::Cancelled)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let events = drain(&mut rx);
        assert_eq!(events.last().unwrap().phase, ExportPhase::Cancelled);
    }

    #[tokio::test]
    async fn test_rows_projected_onto_first_row_schema() {
        let dir = TempDir::new().unwrap();
        let writer = SheetWriter::new(test_config(&dir));
        let (tx, _rx) = ProgressSender::channel();
        let cancel = CancellationToken::new();

        let mut first = Row::new();
        first.push("id", CellValue::Integer(1));
        first.push("name", CellValue::Text("alice".into()));

        // Missing "name", extra "age": projected to blank, ignored
        let mut second = Row::new();
        second.push("id", CellValue::Integer(2));
        second.push("age", CellValue::Integer(44));

        let output = writer
            .write(vec![first, second], "acme01", &tx, &cancel)
            .await
            .unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&output.file_path).unwrap();
        let range = workbook.worksheet_range("Players").unwrap();

        assert_eq!(range.width(), 2);
        assert_eq!(range.get_value((2, 0)), Some(&Data::Float(2.0)));
        // Projected blank for the missing column
        let name_cell = range.get_value((2, 1));
        assert!(name_cell.is_none() || name_cell == Some(&Data::Empty));
    }

    #[tokio::test]
    async fn test_save_failure_emits_error_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        // Point the export dir at a path that is a *file*, so the
        // directory creation fails
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        config.export_dir = blocker;

        let writer = SheetWriter::new(config);
        let (tx, _rx) = ProgressSender::channel();
        let cancel = CancellationToken::new();

        let result = writer.write(vec![sample_row()], "acme01", &tx, &cancel).await;
        assert!(result.is_err());
    }
}
