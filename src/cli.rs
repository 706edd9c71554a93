use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config;

#[derive(Debug, Parser)]
#[command(
    name = "netwatch",
    version,
    about = "Network traffic baseline monitor, chat console and host utilities"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Calibrate a traffic baseline on first run, check against it afterwards
    Monitor(MonitorArgs),

    /// Delete the persisted baseline so the next run recalibrates
    ResetBaseline {
        /// Baseline file
        #[arg(long, default_value = config::BASELINE_FILE_NAME)]
        baseline: PathBuf,
    },

    /// Open the interactive chat console
    Chat(ChatArgs),

    /// Write a default client config file (does not overwrite unless --force)
    InitConfig {
        /// Path to client config file (JSON)
        #[arg(long, default_value = config::CLIENT_CONFIG_FILE_NAME)]
        config: PathBuf,

        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Print the client config file path that `chat` would read
    PrintConfigPath {
        /// Path to client config file (JSON)
        #[arg(long, default_value = config::CLIENT_CONFIG_FILE_NAME)]
        config: PathBuf,
    },

    /// List local TCP ports in the LISTEN state
    OpenPorts,

    /// Drop inbound TCP traffic to a port (requires sudo)
    BlockPort {
        /// Port to block
        port: String,

        /// Only block this source address (default: all)
        #[arg(long)]
        source: Option<String>,

        /// Print the firewall command instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Start or stop the local web server
    Service {
        #[arg(value_enum)]
        action: ServiceActionArg,

        /// Server control program (default: apachectl, or httpd.exe on Windows)
        #[arg(long)]
        program: Option<String>,
    },

    /// Power off this machine immediately
    Shutdown {
        /// Confirm the shutdown
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Baseline file
    #[arg(long, default_value = config::BASELINE_FILE_NAME)]
    pub baseline: PathBuf,

    /// Width of each measurement window in seconds
    #[arg(long, default_value_t = config::DEFAULT_INTERVAL_SECS)]
    pub interval: f64,

    /// Number of windows averaged during calibration
    #[arg(long, default_value_t = config::DEFAULT_SAMPLE_COUNT)]
    pub samples: u32,

    /// Anomaly when a rate exceeds baseline times this multiplier
    #[arg(long, default_value_t = config::DEFAULT_THRESHOLD_MULTIPLIER)]
    pub threshold: f64,

    /// Only calibrate (fails if a baseline exists)
    #[arg(long, conflicts_with = "check")]
    pub calibrate: bool,

    /// Only check (fails if no baseline exists)
    #[arg(long)]
    pub check: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ChatArgs {
    /// Path to client config file (JSON)
    #[arg(long, default_value = config::CLIENT_CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Override the server host from the config file
    #[arg(long)]
    pub host: Option<String>,

    /// Override the server port from the config file
    #[arg(long)]
    pub port: Option<u16>,

    /// Connect immediately instead of waiting for /connect
    #[arg(long)]
    pub connect: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceActionArg {
    Start,
    Stop,
}
