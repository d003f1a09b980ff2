//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Dashcam - camera capture module on the dashcam message bus
#[derive(Parser, Debug)]
#[command(
    name = "dashcam",
    author,
    version,
    about = "Dashcam camera capture module",
    long_about = "Runs the camera capture module on the dashcam message bus.\n\n\
                  Opens the camera, publishes calibrated frames at the configured rate, \n\
                  listens for configuration updates and reports heartbeats and status."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "DASHCAM_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "DASHCAM_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the camera capture module
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); missing file means defaults
    #[arg(short, long, default_value = "dashcam.toml", env = "DASHCAM_CONFIG")]
    pub config: PathBuf,

    /// key=value settings file overriding module_id / domain_id / verbosity
    #[arg(long, env = "DASHCAM_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Override module id from configuration
    #[arg(long, env = "DASHCAM_MODULE_ID")]
    pub module_id: Option<String>,

    /// Override bus domain from configuration
    #[arg(long, env = "DASHCAM_DOMAIN_ID")]
    pub domain_id: Option<u32>,

    /// Stop after this many seconds (0 = run until signalled)
    #[arg(long, default_value = "0", env = "DASHCAM_DURATION")]
    pub duration: u64,

    /// Resolve configuration and exit without opening the camera
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "DASHCAM_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "dashcam.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "dashcam.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show every camera setting
    #[arg(long)]
    pub camera: bool,

    /// Load and show the calibration record
    #[arg(long)]
    pub calibration: bool,
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
