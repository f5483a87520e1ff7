//! Command-line argument structures.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use pickflow_observability::LogFormat;
use pickflow_picking::BatchState;

/// Warehouse batch picking reports
#[derive(Debug, Parser)]
#[command(name = "pickflow")]
#[command(about = "pickflow - batch statistics and zone overviews from the record store", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Log line format on stderr
    #[arg(long, global = true, default_value = "json", value_parser = parse_log_format)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print per-batch statistics as JSON
    #[command(name = "report")]
    Report {
        /// Only batches scheduled on this day (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        date: Option<NaiveDate>,

        /// Only batches in this state (draft, in_progress, done, cancel)
        #[arg(long, value_parser = parse_state)]
        state: Option<BatchState>,

        /// Maximum number of batches
        #[arg(long)]
        limit: Option<usize>,

        /// Batches aggregated concurrently (overrides PICKFLOW_MAX_IN_FLIGHT)
        #[arg(long)]
        max_in_flight: Option<usize>,
    },

    /// Print the zone overview of one batch as JSON
    #[command(name = "zones")]
    Zones {
        /// Batch id in the record store
        batch: u64,

        /// Include completed zones and locations
        #[arg(long)]
        all: bool,
    },
}

fn parse_state(raw: &str) -> Result<BatchState, String> {
    BatchState::parse(raw).map_err(|e| e.to_string())
}

fn parse_log_format(raw: &str) -> Result<LogFormat, String> {
    raw.parse()
}
