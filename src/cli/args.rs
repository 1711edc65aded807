//! CLI argument definitions.

use super::validators::{parse_duration, parse_strip, parse_threshold};
use crate::bids::{BidsFilters, parse_filter_file};
use crate::config::{OutputMode, SkullStrip};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// MIMoSA lesion segmentation BIDS App entrypoint.
#[derive(Debug, Parser)]
#[command(name = "mimosa")]
#[command(display_name = "MIMoSA", version = concat!("version ", env!("CARGO_PKG_VERSION")))]
#[command(author, about, long_about = None)]
#[command(subcommand_negates_reqs = true)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// The directory with the input dataset formatted according to the BIDS standard.
    #[arg(required = true)]
    pub bids_dir: Option<PathBuf>,

    /// The directory where the output files should be stored.
    #[arg(required = true)]
    pub output_dir: Option<PathBuf>,

    /// Level of the analysis that will be performed.
    /// Multiple participant level analyses can be run independently
    /// (in parallel) using the same `output_dir`.
    #[arg(required = true, value_enum)]
    pub analysis_level: Option<AnalysisLevel>,

    /// Options for participant-level analysis.
    #[command(flatten)]
    pub participant: ParticipantArgs,

    /// Configuration file (default: platform config directory).
    #[arg(long, env = "MIMOSA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Analysis levels defined by the BIDS App convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AnalysisLevel {
    /// Per-participant segmentation.
    Participant,
    /// Group-level analysis (not supported by MIMoSA).
    Group,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage configuration.
    Config {
        /// Configuration action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default configuration file.
    Init,
    /// Display current configuration.
    Show,
    /// Print configuration file path.
    Path,
}

/// Arguments for participant-level analysis.
#[derive(Debug, Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct ParticipantArgs {
    /// The label(s) of the participant(s) to analyze, with or without the
    /// "sub-" prefix. All participants are analyzed when omitted.
    #[arg(long = "participant_label", alias = "participant-label", num_args = 1..)]
    pub participant_label: Vec<String>,

    /// Skull strip inputs: 'bet', 'mass', or empty if inputs are already skull stripped.
    #[arg(long, num_args = 0..=1, default_missing_value = "", value_parser = parse_strip)]
    pub strip: Option<SkullStrip>,

    /// Threshold for the binary segmentation mask (0.0-1.0, default 0.2).
    #[arg(long, value_parser = parse_threshold, env = "MIMOSA_THRESH")]
    pub thresh: Option<f32>,

    /// N4 correct the inputs.
    #[arg(long)]
    pub n4: bool,

    /// Register FLAIR to T1.
    #[arg(long)]
    pub register: bool,

    /// Run WhiteStripe normalization.
    #[arg(long)]
    pub whitestripe: bool,

    /// Write out additional debug output and log each script invocation.
    #[arg(long)]
    pub debug: bool,

    /// JSON file describing custom BIDS input filters for "t1w" and "flair".
    #[arg(long = "bids-filter-file", value_name = "FILE", value_parser = parse_filter_file)]
    pub bids_filters: Option<BidsFilters>,

    /// Skip BIDS dataset validation.
    #[arg(long = "skip_bids_validator", alias = "skip-bids-validator")]
    pub skip_bids_validator: bool,

    /// Segmentation script (overrides config).
    #[arg(long, env = "MIMOSA_SCRIPT")]
    pub script: Option<PathBuf>,

    /// Discover and pair scans, print the commands, run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip pairs whose segmentation output already exists.
    #[arg(long)]
    pub skip_existing: bool,

    /// Reclaim scan locks older than this (e.g. 30m, 12h, 2d; default 24h).
    /// Locks of dead processes on this host are always reclaimed.
    #[arg(long, value_parser = parse_duration)]
    pub stale_lock_timeout: Option<Duration>,

    /// Pair what matches when a session has differing T1w and FLAIR counts.
    #[arg(long)]
    pub allow_unpaired: bool,

    /// Disable the progress bar.
    #[arg(long)]
    pub no_progress: bool,

    /// Output mode for the plan and run summary.
    #[arg(long, value_enum, default_value_t = OutputMode::Human)]
    pub output_mode: OutputMode,
}
