//! Command-line surface: thin `clap`-derive argument parsing over the
//! `teto` library.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "teto", version, about = "Compile and render declarative video scripts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile a script into one or more `Project`s without encoding.
    Compile {
        /// Path to the script JSON file.
        script: PathBuf,
        /// Directory to write generated narration assets into.
        #[arg(short, long, default_value = "out")]
        output_dir: PathBuf,
    },
    /// Compile and render a script to its final video file(s).
    Render {
        /// Path to the script JSON file.
        script: PathBuf,
        /// Directory to write rendered video(s) and generated assets into.
        #[arg(short, long, default_value = "out")]
        output_dir: PathBuf,
        /// Maximum number of outputs rendered concurrently.
        #[arg(short = 'j', long)]
        max_workers: Option<usize>,
        /// Print ffmpeg/ffprobe subprocess chatter.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Inspect or clear the content-addressed TTS cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Print entry count and bytes used.
    Info,
    /// Delete cache entries.
    Clear {
        /// Only remove entries older than this many days.
        #[arg(long)]
        older_than_days: Option<u64>,
    },
}
