//! Command-line interface for affiliate-export
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading
//! - Progress rendering (interactive bar or JSON lines for scripting)
//!
//! The binary is thin orchestration around the export pipeline: it supplies
//! the root key and cancellation signal, and consumes the progress stream.

use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Config;
use crate::error::Result;
use crate::export::ProgressEvent;

/// Affiliate tree exporter
#[derive(Parser, Debug)]
#[command(
    name = "affiliate-export",
    version,
    about = "Export an affiliate tree to a formatted XLSX workbook",
    long_about = "Exports the full descendant hierarchy of an affiliate from a configured
data source into a formatted spreadsheet, with live progress and Ctrl-C
cancellation."
)]
pub struct CliArgs {
    /// Root affiliate key whose full tree is exported
    #[arg(value_name = "ROOT_KEY")]
    pub root_key: String,

    /// Data source id from the registry
    ///
    /// Falls back to the registry default when omitted or unknown.
    #[arg(short = 'd', long = "source", value_name = "ID")]
    pub data_source: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Override the export output directory
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Emit progress events as JSON lines instead of a progress bar
    #[arg(long)]
    pub json: bool,

    /// Quiet mode (no progress rendering)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        let args = CliArgs::parse();
        let config = Self::load_config(&args)?;

        Ok(Self { args, config })
    }

    /// Load configuration and apply argument overrides
    ///
    /// An explicit `--config` path must exist; without one, the default
    /// path is used when present and built-in defaults otherwise.
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = match &args.config_file {
            Some(path) => Config::from_file(path)?,
            None => {
                let default_path = Config::default_path();
                if default_path.exists() {
                    Config::from_file(default_path)?
                } else {
                    Config::default()
                }
            }
        };

        if let Some(dir) = &args.output_dir {
            config.export.export_dir = dir.clone();
        }

        Ok(config)
    }

    /// Get parsed arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Get loaded configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Effective tracing level: `--verbose` wins over the config file
    pub fn tracing_level(&self) -> tracing::Level {
        if self.args.verbose {
            tracing::Level::DEBUG
        } else {
            self.config.logging.level.to_tracing_level()
        }
    }
}

/// Renderer for the progress event stream.
///
/// Interactive runs get an indicatif percent bar; `--json` prints one
/// serialized event per line for scripting; `--quiet` renders nothing.
pub struct ProgressRenderer {
    bar: Option<ProgressBar>,
    json: bool,
}

impl ProgressRenderer {
    /// Create a renderer for the selected output mode.
    pub fn new(json: bool, quiet: bool) -> Self {
        let bar = if json || quiet {
            None
        } else {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(bar)
        };

        Self { bar, json }
    }

    /// Render one event.
    pub fn render(&self, event: &ProgressEvent) {
        if self.json {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
            return;
        }

        if let Some(bar) = &self.bar {
            bar.set_position(u64::from(event.percent));
            bar.set_message(event.message.clone());

            if event.phase.is_terminal() {
                bar.finish_and_clear();
            }
        }
    }
}
