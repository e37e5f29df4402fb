//! Confplay CLI - Headless Video Window Driver
//!
//! Runs one window controller against the simulated media backend:
//! - Recording playback with resume, progress and transcript sync
//! - Live playback with stream selection and ready-to-play start
//! - Float-on-top preference handling
//! - `zerovolume` launch hook

use clap::{Args, Parser, Subcommand};
use confplay_core::{FloatOnTopStyle, PlatformVersion};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

/// Confplay CLI - conference video window driver
#[derive(Parser)]
#[command(name = "confplay-cli")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Drive a conference video window over a simulated backend", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every playback command
#[derive(Args, Debug, Clone)]
pub struct RunOptions {
    /// Preferences file (JSON); created on first change
    #[arg(long)]
    pub prefs: Option<PathBuf>,

    /// Controller configuration file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the float-on-top preference (never, always, while-playing)
    #[arg(long)]
    pub float: Option<FloatOnTopStyle>,

    /// Simulated platform version
    #[arg(long, default_value = "10.11.0")]
    pub platform: PlatformVersion,

    /// Wall-clock seconds to keep the window open
    #[arg(long, default_value = "3")]
    pub play_for: f64,

    /// Media seconds simulated per wall-clock second
    #[arg(long, default_value = "10")]
    pub speed: f64,

    /// Launch arguments passed through to the controller (e.g. zerovolume)
    #[arg(last = true)]
    pub launch: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a recorded session
    Recording {
        /// Media URL
        url: String,

        /// Session title
        #[arg(short, long, default_value = "Platforms State of the Union")]
        title: String,

        /// Conference year
        #[arg(short, long, default_value = "2015")]
        year: u32,

        /// Saved resume position in seconds
        #[arg(short, long, default_value = "0")]
        position: f64,

        /// Simulated duration in seconds
        #[arg(short, long, default_value = "3600")]
        duration: f64,

        /// Open the transcript panel with a line every N seconds
        #[arg(long)]
        transcript_every: Option<f64>,

        #[command(flatten)]
        run: RunOptions,
    },

    /// Play a live event
    Live {
        /// Event title
        #[arg(short, long, default_value = "Keynote")]
        title: String,

        /// Primary stream URL
        #[arg(long)]
        stream: Option<String>,

        /// Enhanced stream URL
        #[arg(long)]
        stream2: Option<String>,

        /// Fail loading of the playable key with this reason
        #[arg(long)]
        fail_playable: Option<String>,

        #[command(flatten)]
        run: RunOptions,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if cli.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    confplay_core::init();

    let summary = match cli.command {
        Commands::Recording {
            url,
            title,
            year,
            position,
            duration,
            transcript_every,
            run,
        } => {
            let recording = commands::RecordingArgs {
                url,
                title,
                year,
                position,
                duration,
                transcript_every,
            };
            commands::play_recording(recording, &run).await?
        }
        Commands::Live {
            title,
            stream,
            stream2,
            fail_playable,
            run,
        } => commands::play_live(title, stream, stream2, fail_playable, &run).await?,
    };

    println!("{}", output::format_output(&summary, &cli.format));
    Ok(())
}
