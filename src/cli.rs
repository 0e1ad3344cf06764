//! CLI argument parsing with clap.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use text_to_video::request::{DEFAULT_DURATION, DEFAULT_FPS};

/// Generate short videos from text prompts with a hosted image model
#[derive(Parser, Debug)]
#[command(name = "text-to-video")]
#[command(version, about = "Generate short videos from text prompts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a video from a text prompt
    Generate {
        /// Text prompt describing the video
        prompt: String,

        /// Duration in seconds
        #[arg(long, short, default_value_t = DEFAULT_DURATION)]
        duration: u32,

        /// Frames per second
        #[arg(long, default_value_t = DEFAULT_FPS)]
        fps: u32,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List generated videos
    List,
    /// Print the full path of a generated video
    Locate {
        /// Video file name, e.g. video_1700000000.mp4
        filename: String,
    },
    /// Remove leftover scratch frames
    Clean,
}

impl Cli {
    /// Log filter implied by `-v` flags, if any were given.
    pub fn verbosity_level(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("info"),
            2 => Some("debug"),
            _ => Some("trace"),
        }
    }
}
