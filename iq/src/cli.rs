//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Profile;

/// idlequeue - idle-aware deferred task scheduler
#[derive(Parser)]
#[command(
    name = "iq",
    about = "Idle-aware, label-keyed deferred task scheduler",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    pub stderr: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the effective configuration as YAML
    Config {
        /// Show the defaults of a profile instead of the loaded config
        #[arg(short, long)]
        profile: Option<Profile>,
    },

    /// List configuration profiles and their defaults
    Profiles,

    /// Run a scripted workload on a simulated clock
    Simulate {
        /// Profile to simulate; defaults to the loaded config
        #[arg(short, long)]
        profile: Option<Profile>,

        /// Simulated duration in milliseconds
        #[arg(short, long, default_value = "10000")]
        duration_ms: u64,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Drive the real engine actor with a small workload
    Run {
        /// How long to run, in seconds
        #[arg(short, long, default_value = "3")]
        seconds: u64,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for commands that report results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Get the path to the idlequeue log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("idlequeue")
        .join("logs")
        .join("idlequeue.log")
}
