//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Captin - fan one event out to every configured destination
#[derive(Parser, Debug)]
#[command(
    name = "captin",
    author,
    version,
    about = "Event fan-out dispatcher",
    long_about = "Delivers a domain event to every destination subscribed to its key.\n\n\
                  Applies per-destination throttling, payload and document shaping, \n\
                  filters, and pluggable transports (http, log, beanstalkd)."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CAPTIN_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "CAPTIN_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispatch events to their destinations
    Dispatch(DispatchArgs),

    /// Validate a destination file without dispatching
    Validate(ValidateArgs),

    /// Display destination policies
    Info(InfoArgs),
}

/// Arguments for the `dispatch` command
#[derive(Parser, Debug, Clone)]
pub struct DispatchArgs {
    /// Destination file (JSON or TOML)
    #[arg(short, long, default_value = "hooks.json", env = "CAPTIN_CONFIG")]
    pub config: PathBuf,

    /// Event JSON file (one event or an array), `-` for stdin
    #[arg(short, long, default_value = "-")]
    pub event: PathBuf,

    /// Target documents: JSON array of {target_type, target_id, document}
    #[arg(long, env = "CAPTIN_DOCUMENTS")]
    pub documents: Option<PathBuf>,

    /// Wait for trailing and delayed sends before exiting
    #[arg(long)]
    pub wait: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "CAPTIN_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Destination file to validate
    #[arg(short, long, default_value = "hooks.json")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Destination file
    #[arg(short, long, default_value = "hooks.json")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
