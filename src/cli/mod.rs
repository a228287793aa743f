//! CLI module for Samtale.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{format_duration, format_size, Output};

use clap::{Parser, Subcommand};

/// Samtale - two-host podcast audio from dialogue scripts
///
/// Turns a `Speaker: text` script into a single WAV file with two voices.
/// The name "Samtale" is Norwegian for "conversation."
#[derive(Parser, Debug)]
#[command(name = "samtale")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synthesize a dialogue script into a podcast WAV file
    Podcast {
        /// Script file, or '-' to read from stdin
        script: String,

        /// Output WAV file (default: podcast-<timestamp>.wav in the output directory)
        #[arg(short, long)]
        output: Option<String>,

        /// Synthesis backend (openai, espeak)
        #[arg(short, long)]
        backend: Option<String>,

        /// Send utterances to the backend exactly as written
        #[arg(long)]
        no_sanitize: bool,

        /// Number of segments synthesized at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Show how a script is split into segments and which voice each gets
    Parse {
        /// Script file, or '-' to read from stdin
        script: String,

        /// Print segments as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "pipeline.max_concurrent")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
