//! Command-line interface for tts-mirror
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Mirror a device's TTS stream to MQTT and speak it locally
#[derive(Parser, Debug)]
#[command(
    name = "tts-mirror",
    version,
    about = "Mirror a device's TTS stream to MQTT and speak it locally"
)]
pub struct Cli {
    /// Subcommand to execute (default: run)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the relay service (foreground process for systemd)
    Run {
        /// Disable local playback
        #[arg(long)]
        no_playback: bool,

        /// Disable the HTTP monitor
        #[arg(long)]
        no_monitor: bool,
    },

    /// Connect, mirror one text to the mirror topic and exit
    Relay {
        /// Text to mirror
        text: String,
    },

    /// Synthesize and play one text locally
    Say {
        /// Text to speak
        text: String,
    },

    /// Print how a text would be chunked, one chunk per line
    Chunk {
        /// Text to split
        text: String,

        /// Maximum characters per chunk (default: relay.max_chunk_size)
        #[arg(long, short = 'm', value_name = "N")]
        max_size: Option<usize>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration inspection actions
#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigAction {
    /// Print the effective configuration (file, defaults and environment)
    Show,
    /// Print the configuration file path
    Path,
}

/// Log filter directive for the given flags.
pub fn log_filter(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "tts_mirror=warn,warn";
    }
    match verbose {
        0 => "tts_mirror=info,warn",
        1 => "tts_mirror=debug,info",
        _ => "tts_mirror=trace,debug",
    }
}
