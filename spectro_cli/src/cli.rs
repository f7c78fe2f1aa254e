//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "spectro", version, about = "Spectral juice classifier host")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/spectro.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty; print stats and errors as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify samples streamed by the sensor until Ctrl-C
    Run {
        /// Override [serial].port
        #[arg(long, value_name = "PORT")]
        port: Option<String>,
        /// Override [serial].baud
        #[arg(long, value_name = "BAUD")]
        baud: Option<u32>,
        /// Stop after this many completed cycles (successful or failed)
        #[arg(long, value_name = "K")]
        max_cycles: Option<u64>,
        /// Use the simulated sensor instead of a serial port
        #[arg(long, action = ArgAction::SetTrue)]
        sim: bool,
    },
    /// Load config and both model bundles, then print what would run
    Check,
    /// Validate offline dataset CSV files and print label counts
    Dataset {
        /// CSV files with the timestamp,juice_type,concentration,avg_ch1..avg_ch12 header
        #[arg(required = true, value_name = "CSV")]
        files: Vec<PathBuf>,
    },
}
