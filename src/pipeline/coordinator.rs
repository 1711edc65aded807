//! Pipeline coordination: planning and running segmentations.

use super::command::{SegmentationOptions, script_command, validator_command};
use super::pairing::{output_dir_for, output_file_name, output_suffixes, pair_scans};
use super::runner::{OutputStream, run_streaming};
use crate::bids::{BidsFilters, BidsLayout, ScanKind, normalize_label};
use crate::config::{ScriptConfig, ValidatorConfig};
use crate::error::{Error, Result};
use crate::locking::{FileLock, LockInfo};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One segmentation to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedRun {
    /// Participant label.
    pub subject: String,
    /// Session label of the T1w scan.
    pub session: Option<String>,
    /// T1-weighted input.
    pub t1w: PathBuf,
    /// FLAIR input.
    pub flair: PathBuf,
    /// Directory the script writes to.
    pub output_dir: PathBuf,
    /// Expected segmentation output.
    pub output_file: PathBuf,
}

/// Settings for building a plan.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Filters refining the T1w/FLAIR queries.
    pub filters: BidsFilters,
    /// Pair what matches when counts differ instead of failing.
    pub allow_unpaired: bool,
}

/// Result of checking whether a planned run should execute.
#[derive(Debug, PartialEq, Eq)]
pub enum ProcessCheck {
    /// Run the segmentation.
    Process,
    /// Skip - output already exists.
    SkipExists,
    /// Skip - another process holds the lock.
    SkipLocked,
}

/// Resolve the participants to analyze.
///
/// Requested labels may carry the `sub-` prefix. With no request every
/// participant directory in the dataset is used.
pub fn select_subjects(layout: &BidsLayout, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        if layout.subjects().is_empty() {
            return Err(Error::NoParticipants {
                path: layout.root().to_path_buf(),
            });
        }
        return Ok(layout.subjects().to_vec());
    }

    let mut subjects = Vec::with_capacity(requested.len());
    for label in requested {
        let label = normalize_label(label);
        if !layout.has_subject(label) {
            return Err(Error::ParticipantNotFound {
                label: label.to_string(),
            });
        }
        if !subjects.iter().any(|s| s == label) {
            subjects.push(label.to_string());
        }
    }
    Ok(subjects)
}

/// Plan the segmentations for one participant.
pub fn plan_subject(
    layout: &BidsLayout,
    label: &str,
    output_root: &Path,
    options: &PlanOptions,
) -> Result<Vec<PlannedRun>> {
    let t1w = layout.get(label, &options.filters.query_for(ScanKind::T1w));
    let flair = layout.get(label, &options.filters.query_for(ScanKind::Flair));

    let pairs = pair_scans(label, &t1w, &flair, options.allow_unpaired)?;
    let suffixes = output_suffixes(&pairs);

    Ok(pairs
        .iter()
        .zip(suffixes)
        .map(|(pair, suffix)| {
            if pair.t1w.dir() != pair.flair.dir() {
                warn!(
                    "{} and {} are in different directories; the script reads both from {}",
                    pair.t1w.file_name(),
                    pair.flair.file_name(),
                    pair.t1w.dir().display()
                );
            }
            let output_dir = output_dir_for(output_root, &suffix);
            PlannedRun {
                subject: label.to_string(),
                session: pair.t1w.name.session().map(ToString::to_string),
                t1w: pair.t1w.path.clone(),
                flair: pair.flair.path.clone(),
                output_file: output_dir.join(output_file_name(&pair.t1w)),
                output_dir,
            }
        })
        .collect())
}

/// Plan every participant before anything runs, so pairing errors surface first.
pub fn build_plan(
    layout: &BidsLayout,
    subjects: &[String],
    output_root: &Path,
    options: &PlanOptions,
) -> Result<Vec<PlannedRun>> {
    let mut plan = Vec::new();
    for label in subjects {
        let runs = plan_subject(layout, label, output_root, options)?;
        info!("Participant {label}: {} scan pair(s)", runs.len());
        plan.extend(runs);
    }
    Ok(plan)
}

/// Check if a planned run should execute.
///
/// A lock left behind by a run that died is reclaimed once it is stale:
/// its holder on this host is gone, or it is older than `stale_after`.
pub fn should_process(
    run: &PlannedRun,
    skip_existing: bool,
    stale_after: Duration,
) -> ProcessCheck {
    if FileLock::is_locked(&run.t1w, &run.output_dir) {
        let lock_path = FileLock::lock_path_for(&run.t1w, &run.output_dir);
        if !FileLock::is_stale(&run.t1w, &run.output_dir, stale_after) {
            log_lock_holder(&lock_path);
            return ProcessCheck::SkipLocked;
        }

        warn!("Removing stale lock: {}", lock_path.display());
        if let Err(e) = FileLock::remove_stale(&run.t1w, &run.output_dir) {
            warn!("{e}");
            return ProcessCheck::SkipLocked;
        }
    }

    if skip_existing && run.output_file.exists() {
        return ProcessCheck::SkipExists;
    }

    ProcessCheck::Process
}

fn log_lock_holder(lock_path: &Path) {
    if let Some(holder) = LockInfo::read(lock_path) {
        debug!(
            "{} held by pid {} on {} since {}",
            lock_path.display(),
            holder.pid,
            holder.hostname,
            holder.started
        );
    }
}

/// Run the segmentation script for one planned pair.
///
/// Creates the output directory and holds the scan lock while the script runs.
pub fn process_run<F>(
    run: &PlannedRun,
    script: &ScriptConfig,
    options: &SegmentationOptions,
    on_line: F,
) -> Result<()>
where
    F: FnMut(OutputStream, &str),
{
    std::fs::create_dir_all(&run.output_dir).map_err(|e| Error::OutputDirCreateFailed {
        path: run.output_dir.clone(),
        source: e,
    })?;

    let lock = FileLock::acquire(&run.t1w, &run.output_dir)?;
    debug!("Acquired {}", lock.path().display());

    let cmd = script_command(script, run, options);
    if options.debug {
        info!("{cmd}");
    }
    run_streaming(&cmd, on_line)
}

/// Run the BIDS validator on a dataset.
pub fn validate_dataset<F>(validator: &ValidatorConfig, bids_dir: &Path, on_line: F) -> Result<()>
where
    F: FnMut(OutputStream, &str),
{
    let cmd = validator_command(validator, bids_dir);
    info!("Validating dataset: {cmd}");
    run_streaming(&cmd, on_line).map_err(|e| Error::ValidationFailed {
        path: bids_dir.to_path_buf(),
        source: Box::new(e),
    })
}
