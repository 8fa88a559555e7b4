use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI surface. Every subcommand shares the global
/// `--config` and `--verbose` flags.
#[derive(Parser)]
#[command(name = "streamladder")]
#[command(author, version)]
#[command(about = "streamladder: resumable multi-quality HLS transcoding service")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Turn on debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (runs the startup recovery scan first)
    Start {
        /// Host address to bind
        #[arg(long, value_name = "ADDR", default_value = "0.0.0.0")]
        host: String,

        /// TCP port to listen on
        #[arg(short, long, value_name = "PORT", default_value = "8080")]
        port: u16,
    },

    /// Transcode one registered video and block until it settles
    Transcode {
        /// Id of the registered video
        #[arg(value_name = "VIDEO_ID")]
        video_id: String,
    },

    /// Probe a media file and display its properties
    Probe {
        /// Media file to inspect
        file: PathBuf,

        /// Print the raw probe result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify that ffmpeg and ffprobe are installed and runnable
    CheckTools,

    /// Validate a configuration file without starting anything; checks the
    /// built-in defaults when no file is given
    Validate { config: Option<PathBuf> },

    /// Print the version and exit
    Version,
}
