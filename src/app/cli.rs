//! Command-line argument surface

use clap::Parser;
use std::path::PathBuf;

/// Global arguments structure with all command-line options
///
/// Flags mirror the config file; anything given here overrides the file
/// value during the merge in `AppConfig::apply_cli`.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "backrelay")]
#[command(about = "Streaming full-data backup orchestrator over a byte-pipe relay")]
#[command(version)]
pub struct Args {
    /// Source files or directories to back up
    #[arg(value_name = "SOURCE")]
    pub sources: Vec<PathBuf>,

    /// Destination directory for the backup store
    #[arg(short = 'd', long = "dest", value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Per-producer byte quota enforced by the store
    #[arg(short = 'q', long = "quota", value_name = "BYTES")]
    pub quota: Option<u64>,

    /// Bytes relayed per pump iteration
    #[arg(long = "chunk-size", value_name = "BYTES")]
    pub chunk_size: Option<usize>,

    /// Preflight backstop timeout in seconds
    #[arg(long = "preflight-timeout", value_name = "SECONDS")]
    pub preflight_timeout: Option<u64>,

    /// Transfer-join backstop timeout in seconds
    #[arg(long = "transfer-timeout", value_name = "SECONDS")]
    pub transfer_timeout: Option<u64>,

    /// Mark this run as explicitly user initiated
    #[arg(short = 'u', long = "user-initiated")]
    pub user_initiated: bool,

    /// Skip reschedule bookkeeping after the run
    #[arg(long = "no-update-schedule")]
    pub no_update_schedule: bool,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "json"])]
    pub log_format: Option<String>,

    /// Log file path (default: stderr)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}
