//! T1w/FLAIR pairing and output naming.

use crate::bids::BidsFile;
use crate::constants::output::{MIMOSA_MARKER, T1W_MARKER};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One T1w scan matched with one FLAIR scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPair {
    /// T1-weighted scan.
    pub t1w: BidsFile,
    /// FLAIR scan.
    pub flair: BidsFile,
}

/// Pair a subject's T1w and FLAIR scans session by session.
///
/// Within a session both lists are ordered by run, highest first, and
/// matched index-wise. Files without a session form their own group,
/// ordered before named sessions.
pub fn pair_scans(
    label: &str,
    t1w: &[&BidsFile],
    flair: &[&BidsFile],
    allow_unpaired: bool,
) -> Result<Vec<ScanPair>> {
    if t1w.is_empty() {
        return Err(Error::NoT1wImages {
            label: label.to_string(),
        });
    }
    if flair.is_empty() {
        return Err(Error::NoFlairImages {
            label: label.to_string(),
        });
    }

    let mut sessions: BTreeMap<Option<&str>, (Vec<&BidsFile>, Vec<&BidsFile>)> = BTreeMap::new();
    for &file in t1w {
        sessions.entry(file.name.session()).or_default().0.push(file);
    }
    for &file in flair {
        sessions.entry(file.name.session()).or_default().1.push(file);
    }

    let mut pairs = Vec::new();
    for (session, (mut t1s, mut flairs)) in sessions {
        sort_by_run_descending(&mut t1s);
        sort_by_run_descending(&mut flairs);

        if t1s.len() != flairs.len() {
            let session_desc = session.map_or_else(String::new, |s| format!(" (ses-{s})"));
            if !allow_unpaired {
                return Err(Error::ScanCountMismatch {
                    label: label.to_string(),
                    session: session_desc,
                    t1w: t1s.len(),
                    flair: flairs.len(),
                });
            }
            let extra = if t1s.len() > flairs.len() {
                &t1s[flairs.len()..]
            } else {
                &flairs[t1s.len()..]
            };
            for file in extra {
                warn!(
                    "Participant {label}{session_desc}: leaving {} unpaired",
                    file.file_name()
                );
            }
        }

        for (t1, fl) in t1s.iter().zip(&flairs) {
            info!("Pairing {} with {}", t1.path.display(), fl.path.display());
            pairs.push(ScanPair {
                t1w: (*t1).clone(),
                flair: (*fl).clone(),
            });
        }
    }

    Ok(pairs)
}

/// Stable sort by run number, highest first. Files without a run count as run 0.
fn sort_by_run_descending(files: &mut [&BidsFile]) {
    files.sort_by(|a, b| b.name.run().cmp(&a.name.run()));
}

/// Output directory suffix for each pair of one subject.
///
/// A single pair writes to the bare output directory. With several pairs the
/// suffix names the T1w's session and run (`_ses-02_run-1`), or its index
/// when the T1w has no session. Duplicates get the index appended.
pub fn output_suffixes(pairs: &[ScanPair]) -> Vec<String> {
    if pairs.len() <= 1 {
        return vec![String::new(); pairs.len()];
    }

    let mut seen = HashSet::new();
    pairs
        .iter()
        .enumerate()
        .map(|(i, pair)| {
            let name = &pair.t1w.name;
            let mut suffix = name.session().map_or_else(
                || format!("_{i}"),
                |ses| {
                    let mut s = format!("_ses-{ses}");
                    if let Some(run) = name.entity("run") {
                        s.push_str(&format!("_run-{run}"));
                    }
                    s
                },
            );
            if !seen.insert(suffix.clone()) {
                suffix.push_str(&format!("_{i}"));
                seen.insert(suffix.clone());
            }
            suffix
        })
        .collect()
}

/// Append a suffix to the output directory name, producing a sibling directory.
pub fn output_dir_for(output_root: &Path, suffix: &str) -> PathBuf {
    if suffix.is_empty() {
        return output_root.to_path_buf();
    }

    output_root.file_name().map_or_else(
        || output_root.join(suffix.trim_start_matches('_')),
        |name| {
            let mut dir_name = name.to_os_string();
            dir_name.push(suffix);
            output_root.with_file_name(dir_name)
        },
    )
}

/// Name of the segmentation output expected for a T1w scan.
pub fn output_file_name(t1w: &BidsFile) -> String {
    t1w.file_name().replacen(T1W_MARKER, MIMOSA_MARKER, 1)
}
