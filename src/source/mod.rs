//! Row source: the remote hierarchical query.
//!
//! This module performs the long-running fetch against a configured data
//! source and yields the full row set in memory:
//! - Connection establishment with its own timeout
//! - The hierarchical query with an extended timeout (large trees may
//!   legitimately run for many minutes)
//! - A synthetic progress ticker while the query is outstanding
//! - Cooperative cancellation before, during and after the remote call
//!
//! The [`RowSource`] trait is the seam the coordinator depends on;
//! [`SqlRowSource`] is the production implementation and tests substitute
//! mocks behind the same trait.

pub mod row;
pub mod ticker;

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection, Row as SqlxRow, TypeInfo};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, DataSourceConfig};
use crate::error::{ExportError, Result, SourceError, sqlx_error_message};
use crate::export::progress::{ExportPhase, ProgressEvent, ProgressSender};

pub use row::{CellValue, Row};
pub use ticker::{ProgressTicker, TickerConfig};

/// Trait for fetching the affiliate tree rooted at a key.
///
/// Implementations emit their own progress events, including the terminal
/// Error/Cancelled event for failures inside the fetch, and return the full
/// row set on success. An empty tree is `Ok(vec![])`, not an error; the
/// coordinator decides how to report it.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Fetch every descendant record of `root_key`.
    async fn fetch(
        &self,
        root_key: &str,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<Vec<Row>>;
}

/// Production row source backed by a Postgres data source.
pub struct SqlRowSource {
    source: DataSourceConfig,
    connect_timeout: Duration,
    query_timeout: Duration,
    ticker: TickerConfig,
}

impl SqlRowSource {
    /// Create a row source for a resolved registry entry.
    ///
    /// Fails if the entry's query routine is not a plain SQL identifier;
    /// the routine name is spliced into the statement text and is validated
    /// here, before any run starts.
    pub fn new(source: DataSourceConfig, config: &Config) -> Result<Self> {
        source.validate_routine()?;

        Ok(Self {
            source,
            connect_timeout: config.connect_timeout(),
            query_timeout: config.query_timeout(),
            ticker: TickerConfig::default(),
        })
    }

    /// Override the synthetic ticker schedule (used by tests).
    pub fn with_ticker(mut self, ticker: TickerConfig) -> Self {
        self.ticker = ticker;
        self
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.source.host)
            .port(self.source.port)
            .database(&self.source.database)
            .username(&self.source.username)
            .password(&self.source.password)
            .application_name("affiliate-export")
    }

    fn statement(&self) -> String {
        format!("SELECT * FROM {}($1)", self.source.routine)
    }
}

#[async_trait]
impl RowSource for SqlRowSource {
    async fn fetch(
        &self,
        root_key: &str,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<Vec<Row>> {
        let started = Instant::now();

        progress.emit(ProgressEvent::new(
            ExportPhase::Connecting,
            format!("Connecting to {}...", self.source.display_name),
            0,
        ));

        let connect_options = self.connect_options();
        let connect = PgConnection::connect_with(&connect_options);
        let mut conn = tokio::select! {
            result = tokio::time::timeout(self.connect_timeout, connect) => match result {
                Ok(Ok(conn)) => conn,
                Ok(Err(e)) => {
                    let message = sqlx_error_message(&e);
                    warn!(source = %self.source.id, "connect failed: {message}");
                    progress.emit(ProgressEvent::new(
                        ExportPhase::Error,
                        format!("Database error: {message}"),
                        0,
                    ));
                    return Err(SourceError::ConnectFailed(message).into());
                }
                Err(_) => {
                    let seconds = self.connect_timeout.as_secs();
                    progress.emit(ProgressEvent::new(
                        ExportPhase::Error,
                        format!("Database error: connection timed out after {seconds}s"),
                        0,
                    ));
                    return Err(SourceError::Timeout { seconds }.into());
                }
            },
            _ = cancel.cancelled() => {
                progress.emit(ProgressEvent::new(
                    ExportPhase::Cancelled,
                    "Export cancelled",
                    0,
                ));
                return Err(ExportError::Cancelled);
            }
        };

        progress.emit(ProgressEvent::new(
            ExportPhase::Executing,
            "Executing hierarchical query...",
            self.ticker.floor,
        ));

        // The query exposes no intermediate progress. Share a percent
        // counter with a ticker task and join it before anything after the
        // fetch is reported, so the event stream never interleaves a late
        // tick behind DataLoaded.
        let percent = Arc::new(AtomicU8::new(self.ticker.floor));
        let ticker = ProgressTicker::spawn(
            progress.clone(),
            percent.clone(),
            started,
            self.ticker.clone(),
        );

        let statement = self.statement();
        debug!(source = %self.source.id, %statement, "running hierarchical query");

        let outcome = tokio::select! {
            result = tokio::time::timeout(
                self.query_timeout,
                collect_rows(&mut conn, &statement, root_key),
            ) => result,
            _ = cancel.cancelled() => {
                // Dropping the query future aborts the in-flight call
                ticker.stop().await;
                progress.emit(ProgressEvent::new(
                    ExportPhase::Cancelled,
                    "Export cancelled",
                    percent.load(Ordering::Relaxed),
                ));
                return Err(ExportError::Cancelled);
            }
        };

        ticker.stop().await;

        let rows = match outcome {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => {
                let message = match &e {
                    ExportError::Sql(sql_err) => sqlx_error_message(sql_err),
                    other => other.to_string(),
                };
                warn!(source = %self.source.id, "query failed: {message}");
                progress.emit(ProgressEvent::new(
                    ExportPhase::Error,
                    format!("Database error: {message}"),
                    percent.load(Ordering::Relaxed),
                ));
                return Err(SourceError::QueryFailed(message).into());
            }
            Err(_) => {
                let seconds = self.query_timeout.as_secs();
                progress.emit(ProgressEvent::new(
                    ExportPhase::Error,
                    format!("Database error: query timed out after {seconds}s"),
                    percent.load(Ordering::Relaxed),
                ));
                return Err(SourceError::Timeout { seconds }.into());
            }
        };

        let elapsed = started.elapsed();
        let total = rows.len() as u64;
        info!(
            source = %self.source.id,
            rows = total,
            elapsed_ms = elapsed.as_millis() as u64,
            "hierarchical query finished"
        );

        progress.emit(
            ProgressEvent::new(
                ExportPhase::DataLoaded,
                format!("Data loaded: {total} records"),
                50,
            )
            .with_rows(total, total)
            .with_elapsed(elapsed),
        );

        Ok(rows)
    }
}

/// Drain the query stream, decoding each record as it arrives.
async fn collect_rows(
    conn: &mut PgConnection,
    statement: &str,
    root_key: &str,
) -> Result<Vec<Row>> {
    let mut stream = sqlx::query(statement).bind(root_key).fetch(conn);

    let mut rows = Vec::new();
    while let Some(pg_row) = stream.try_next().await? {
        rows.push(decode_row(&pg_row));
    }

    Ok(rows)
}

/// Decode one driver row into the cell model.
///
/// Decoding is driven by the Postgres type name, with a conservative
/// fallback chain for types outside the known set. A cell that cannot be
/// decoded at all becomes Null rather than failing the whole fetch.
fn decode_row(pg_row: &PgRow) -> Row {
    pg_row
        .columns()
        .iter()
        .map(|column| {
            let value = decode_cell(pg_row, column.ordinal(), column.type_info().name());
            (column.name().to_string(), value)
        })
        .collect()
}

fn decode_cell(pg_row: &PgRow, idx: usize, type_name: &str) -> CellValue {
    match type_name {
        "BOOL" => pg_row
            .try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::Bool)
            .unwrap_or(CellValue::Null),
        "INT2" => pg_row
            .try_get::<Option<i16>, _>(idx)
            .ok()
            .flatten()
            .map(|v| CellValue::Integer(i64::from(v)))
            .unwrap_or(CellValue::Null),
        "INT4" => pg_row
            .try_get::<Option<i32>, _>(idx)
            .ok()
            .flatten()
            .map(|v| CellValue::Integer(i64::from(v)))
            .unwrap_or(CellValue::Null),
        "INT8" => pg_row
            .try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::Integer)
            .unwrap_or(CellValue::Null),
        "FLOAT4" => pg_row
            .try_get::<Option<f32>, _>(idx)
            .ok()
            .flatten()
            .map(|v| CellValue::Float(f64::from(v)))
            .unwrap_or(CellValue::Null),
        "FLOAT8" => pg_row
            .try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::Float)
            .unwrap_or(CellValue::Null),
        "DATE" => pg_row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .ok()
            .flatten()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(CellValue::Timestamp)
            .unwrap_or(CellValue::Null),
        "TIMESTAMP" => pg_row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::Timestamp)
            .unwrap_or(CellValue::Null),
        "TIMESTAMPTZ" => pg_row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .ok()
            .flatten()
            .map(|dt| CellValue::Timestamp(dt.naive_utc()))
            .unwrap_or(CellValue::Null),
        _ => {
            // Unknown type: attempt a few common decodes before giving up
            if let Ok(Some(v)) = pg_row.try_get::<Option<String>, _>(idx) {
                return CellValue::Text(v);
            }
            if let Ok(Some(v)) = pg_row.try_get::<Option<i64>, _>(idx) {
                return CellValue::Integer(v);
            }
            if let Ok(Some(v)) = pg_row.try_get::<Option<f64>, _>(idx) {
                return CellValue::Float(v);
            }
            if let Ok(Some(v)) = pg_row.try_get::<Option<bool>, _>(idx) {
                return CellValue::Bool(v);
            }
            CellValue::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_source() -> DataSourceConfig {
        DataSourceConfig {
            id: "main".to_string(),
            display_name: "Main affiliates".to_string(),
            host: "db.internal".to_string(),
            port: 5433,
            database: "affiliates".to_string(),
            username: "export".to_string(),
            password: "secret".to_string(),
            routine: "get_hierarchical_players_email_verified".to_string(),
            is_default: true,
        }
    }

    #[test]
    fn test_row_source_trait_object() {
        // Verify we can use RowSource as a trait object
        fn _accepts_row_source(_source: Box<dyn RowSource>) {}
    }

    #[test]
    fn test_new_rejects_invalid_routine() {
        let mut source = test_source();
        source.routine = "players(); drop table users".to_string();

        let result = SqlRowSource::new(source, &Config::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_statement_binds_root_key_as_parameter() {
        let source = SqlRowSource::new(test_source(), &Config::default()).unwrap();
        assert_eq!(
            source.statement(),
            "SELECT * FROM get_hierarchical_players_email_verified($1)"
        );
    }

    #[test]
    fn test_connect_options_from_registry_entry() {
        let source = SqlRowSource::new(test_source(), &Config::default()).unwrap();
        let options = source.connect_options();

        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("affiliates"));
        assert_eq!(options.get_username(), "export");
    }
}
