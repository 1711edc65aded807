//! mimosa-bids - BIDS App entrypoint for MIMoSA lesion segmentation.
//!
//! Discovers T1w and FLAIR scans in a BIDS dataset, pairs them by session
//! and run, and runs the MIMoSA segmentation script once per pair.

#![warn(missing_docs)]

pub mod bids;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod locking;
pub mod output;
pub mod pipeline;

use bids::BidsLayout;
use clap::Parser;
use cli::{AnalysisLevel, Cli, Command, ParticipantArgs};
use cli::validators::parse_duration;
use config::{Config, init_config, load_config, resolve_config_path};
use output::{PlanEntry, PlanPayload, ResultType, RunSummaryPayload, emit_json_result, progress};
use pipeline::{
    OutputStream, PlanOptions, PlannedRun, ProcessCheck, SegmentationOptions, build_plan,
    process_run, script_command, select_subjects, should_process, validate_dataset,
};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub use error::{Error, Result};

/// Main entry point for the mimosa CLI.
pub fn run() -> Result<()> {
    let mut cli = Cli::parse();

    let structured = cli.participant.output_mode.is_structured();
    init_logging(cli.verbose, cli.quiet, structured);

    // Remove held scan locks when interrupted
    if let Err(e) = ctrlc::set_handler(|| {
        locking::cleanup_all_locks();
        std::process::exit(130); // 128 + SIGINT(2)
    }) {
        warn!("Failed to install Ctrl+C handler: {e}");
    }

    if let Some(command) = cli.command {
        return handle_command(command, cli.config.as_deref());
    }

    if cli.quiet {
        cli.participant.no_progress = true;
    }

    let config = load_config(cli.config.as_deref())?;
    config::validate_config(&config)?;

    // Guaranteed by clap unless a subcommand was given
    let (Some(bids_dir), Some(output_dir), Some(level)) =
        (cli.bids_dir, cli.output_dir, cli.analysis_level)
    else {
        return Err(Error::ConfigValidation {
            message: "bids_dir, output_dir and analysis_level are required".to_string(),
        });
    };

    match level {
        AnalysisLevel::Participant => {
            analyze_participants(&bids_dir, &output_dir, &cli.participant, &config)
        }
        AnalysisLevel::Group => {
            warn!("MIMoSA only supports analysis_level=participant, nothing to do");
            Ok(())
        }
    }
}

/// Resolve segmentation options: CLI values win, boolean flags can only enable.
fn segmentation_options(args: &ParticipantArgs, config: &Config) -> SegmentationOptions {
    let defaults = &config.defaults;
    SegmentationOptions {
        strip: args.strip.unwrap_or(defaults.strip),
        thresh: args.thresh.unwrap_or(defaults.thresh),
        n4: args.n4 || defaults.n4,
        register: args.register || defaults.register,
        whitestripe: args.whitestripe || defaults.whitestripe,
        debug: args.debug,
    }
}

/// Lock age after which a leftover lock is reclaimed: CLI, then config.
fn stale_lock_timeout(args: &ParticipantArgs, config: &Config) -> Result<Duration> {
    if let Some(timeout) = args.stale_lock_timeout {
        return Ok(timeout);
    }
    parse_duration(&config.defaults.stale_lock_timeout)
        .map_err(|message| Error::ConfigValidation { message })
}

/// Run participant-level segmentation.
fn analyze_participants(
    bids_dir: &Path,
    output_dir: &Path,
    args: &ParticipantArgs,
    config: &Config,
) -> Result<()> {
    let total_start = Instant::now();
    let structured = args.output_mode.is_structured();

    let mut script = config.script.clone();
    if let Some(path) = &args.script {
        script.path.clone_from(path);
    }
    let options = segmentation_options(args, config);
    let stale_after = stale_lock_timeout(args, config)?;

    let layout = BidsLayout::index(bids_dir)?;

    if args.skip_bids_validator || args.dry_run {
        info!("Skipping BIDS validation");
    } else {
        validate_dataset(&config.validator, layout.root(), |stream, line| {
            progress::relay_line(None, stream, line, structured);
        })?;
    }

    let subjects = select_subjects(&layout, &args.participant_label)?;
    info!(
        "Analyzing {} participant(s): {}",
        subjects.len(),
        subjects.join(", ")
    );

    let plan_options = PlanOptions {
        filters: args.bids_filters.clone().unwrap_or_default(),
        allow_unpaired: args.allow_unpaired,
    };
    let plan = build_plan(&layout, &subjects, output_dir, &plan_options)?;

    if args.dry_run {
        return report_plan(&plan, &subjects, &script, &options, structured);
    }

    let progress_enabled = !structured && !args.no_progress && !args.debug;
    let pair_progress = progress::create_pair_progress(plan.len(), progress_enabled);

    let mut processed = 0;
    let mut skipped = 0;

    for run in &plan {
        progress::set_progress_message(pair_progress.as_ref(), &format!("sub-{}", run.subject));

        match should_process(run, args.skip_existing, stale_after) {
            ProcessCheck::SkipExists => {
                info!("Skipping (output exists): {}", run.output_file.display());
                skipped += 1;
                progress::inc_progress(pair_progress.as_ref());
                continue;
            }
            ProcessCheck::SkipLocked => {
                warn!("Skipping (locked by another run): {}", run.t1w.display());
                skipped += 1;
                progress::inc_progress(pair_progress.as_ref());
                continue;
            }
            ProcessCheck::Process => {}
        }

        info!(
            "Segmenting {} -> {}",
            run.t1w.display(),
            run.output_dir.display()
        );
        let relay = |stream: OutputStream, line: &str| {
            progress::relay_line(pair_progress.as_ref(), stream, line, structured);
        };

        match process_run(run, &script, &options, relay) {
            Ok(()) => processed += 1,
            Err(Error::FileLocked { path }) => {
                warn!("Skipping (locked by another run): {}", path.display());
                skipped += 1;
            }
            Err(e) => {
                progress::finish_progress(pair_progress, "Failed");
                return Err(e);
            }
        }
        progress::inc_progress(pair_progress.as_ref());
    }

    progress::finish_progress(pair_progress, "Complete");

    let duration = total_start.elapsed().as_secs_f64();
    info!(
        "Complete: {} segmented, {} skipped in {:.2}s",
        processed, skipped, duration
    );

    if structured {
        emit_json_result(RunSummaryPayload {
            result_type: ResultType::Run,
            subjects: subjects.len(),
            processed,
            skipped,
            duration_secs: duration,
        })?;
    }

    Ok(())
}

/// Print the planned commands without running them.
fn report_plan(
    plan: &[PlannedRun],
    subjects: &[String],
    script: &config::ScriptConfig,
    options: &SegmentationOptions,
    structured: bool,
) -> Result<()> {
    let entries = plan
        .iter()
        .map(|run| PlanEntry {
            run,
            command: script_command(script, run, options).to_string(),
        })
        .collect::<Vec<_>>();

    if structured {
        return emit_json_result(PlanPayload {
            result_type: ResultType::Plan,
            subjects,
            runs: entries,
        });
    }

    info!("Dry run: {} segmentation(s) planned", entries.len());
    for entry in &entries {
        println!("{}", entry.command);
    }
    Ok(())
}

fn init_logging(verbose: u8, quiet: bool, structured: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter_str = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    // Keep stdout clean for JSON results
    if structured {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

fn handle_command(command: Command, config_path: Option<&Path>) -> Result<()> {
    match command {
        Command::Config { action } => handle_config_command(action, config_path),
    }
}

fn handle_config_command(action: cli::ConfigAction, config_path: Option<&Path>) -> Result<()> {
    use cli::ConfigAction;

    match action {
        ConfigAction::Init => {
            let (path, created) = init_config(config_path)?;
            if created {
                println!("Created configuration file: {}", path.display());
            } else {
                println!("Configuration file already exists: {}", path.display());
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            println!("{config:#?}");
            Ok(())
        }
        ConfigAction::Path => {
            let path = resolve_config_path(config_path)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}
