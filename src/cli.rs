use clap::{Parser, Subcommand};
use gifcut_common::FilterKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gifcut")]
#[command(author, version, about = "Trim, filter and convert video clips into animated GIFs")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert one video into a GIF
    Convert {
        /// Input video
        #[arg(required = true)]
        input: PathBuf,

        /// Trim start in seconds
        #[arg(long)]
        start: Option<f64>,

        /// Trim end in seconds (defaults to 5 seconds after the start)
        #[arg(long)]
        end: Option<f64>,

        /// Output width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Quality from 1 (best) to 31 (smallest)
        #[arg(long)]
        quality: Option<u32>,

        /// Colour filter: none, grayscale, sepia, blur, brightness, contrast
        #[arg(long)]
        filter: Option<FilterKind>,

        /// Play the clip backwards
        #[arg(long)]
        reverse: bool,

        /// Output file (defaults to <input stem>.gif in the output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert several videos with the saved settings, one after another
    Batch {
        /// Input videos
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for the GIFs
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Show a video's duration and format
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or change the saved conversion settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses --config or the defaults if not specified)
        #[arg(value_name = "CONFIG")]
        file: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Print the saved settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restore the defaults
    Reset,

    /// Change individual fields
    Set {
        #[arg(long)]
        start: Option<f64>,

        #[arg(long)]
        duration: Option<f64>,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        fps: Option<u32>,

        #[arg(long)]
        quality: Option<u32>,

        #[arg(long)]
        filter: Option<FilterKind>,

        #[arg(long)]
        reverse: Option<bool>,
    },
}
