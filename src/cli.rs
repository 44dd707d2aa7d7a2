//! Command-line interface for vidrelay, built on clap.
//!
//! Defines [`Cli`] with subcommands [`Command`] (submit, check) and global
//! flags (--config, --poll-interval, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::jobs::PerformanceLevel;

/// vidrelay: submit videos to a remote transcoding cluster and follow them.
#[derive(Debug, Parser)]
#[command(name = "vidrelay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file (defaults to ./vidrelay.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Seconds between two status polls, overriding the configuration.
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: Option<u64>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Performance level accepted by the CLI, mapped to [`PerformanceLevel`].
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum PerformanceArg {
    /// Cheapest settings, slowest turnaround.
    Economy,
    #[default]
    Standard,
    /// Fastest settings.
    Premium,
}

impl From<PerformanceArg> for PerformanceLevel {
    fn from(arg: PerformanceArg) -> Self {
        match arg {
            PerformanceArg::Economy => PerformanceLevel::Economy,
            PerformanceArg::Standard => PerformanceLevel::Standard,
            PerformanceArg::Premium => PerformanceLevel::Premium,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit an uploaded video and follow the job until it finishes.
    Submit {
        /// Object key of the uploaded video in the configured bucket.
        video_key: String,

        #[arg(long, value_enum, default_value_t = PerformanceArg::Standard)]
        performance: PerformanceArg,
    },

    /// Report whether the configuration is complete.
    Check,
}
