//! Affiliate Tree Exporter
//!
//! Exports the full descendant hierarchy of an affiliate from a configured
//! relational data source into a formatted XLSX workbook.
//!
//! # Features
//!
//! - Long-running hierarchical query with synthetic progress estimation
//! - Type-directed cell formatting (dates, numerics, yes/no booleans)
//! - Live progress rendering, or JSON event lines for scripting
//! - Cooperative Ctrl-C cancellation with partial-output cleanup
//! - Stale export sweeping around runs
//!
//! # Usage
//!
//! ```bash
//! # Export against the default data source
//! affiliate-export acme01
//!
//! # Pick a data source and stream events as JSON lines
//! affiliate-export acme01 --source staging --json
//! ```

use tokio_util::sync::CancellationToken;
use tracing::debug;

mod cli;
mod config;
mod error;
mod export;
mod source;
mod utils;

use cli::{CliInterface, ProgressRenderer};
use error::Result;
use export::{
    ExportCoordinator, ExportOutcome, ExportRequest, ProgressSender, sweep_stale_exports,
};

/// Application entry point
#[tokio::main]
async fn main() {
    // Initialize the application and handle any errors
    if let Err(e) = run().await {
        if e.is_cancelled() {
            eprintln!("Export cancelled");
            std::process::exit(130);
        }
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// This function orchestrates the application startup:
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Sweep stale artifacts from the export directory
/// 4. Run the export pipeline with progress rendering and Ctrl-C handling
///
/// # Returns
/// * `Result<()>` - Success or error
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    sweep_stale_exports(&cli.config().export.export_dir, cli.config().stale_after());

    let (progress, mut events) = ProgressSender::channel();

    let renderer = ProgressRenderer::new(cli.args().json, cli.args().quiet);
    let consumer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            renderer.render(&event);
        }
    });

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("ctrl-c received, cancelling export");
            signal_cancel.cancel();
        }
    });

    let request = ExportRequest {
        root_key: cli.args().root_key.clone(),
        data_source_id: cli.args().data_source.clone(),
    };

    let coordinator =
        ExportCoordinator::from_config(cli.config(), request.data_source_id.as_deref(), progress)?;
    let outcome = coordinator.run(&request, &cancel).await;

    // Drop the pipeline's sender so the consumer sees end-of-stream
    drop(coordinator);
    let _ = consumer.await;

    match outcome? {
        ExportOutcome::Completed(result) => {
            println!(
                "Exported {} rows to {} ({}, {})",
                result.row_count,
                result.file_path.display(),
                utils::convert::format_bytes(result.file_size_bytes),
                utils::time::format_duration(result.processing_time),
            );
        }
        ExportOutcome::NoData => {
            println!("No records found for the requested affiliate");
        }
    }

    Ok(())
}

/// Initialize logging based on configuration and verbosity
fn initialize_logging(cli: &CliInterface) {
    let level = cli.tracing_level();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("affiliate_export={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
