//! BIDS dataset indexing.

use super::entities::BidsName;
use super::query::ScanQuery;
use crate::constants::bids::{DATASET_DESCRIPTION, SUBJECT_PREFIX};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A data file found in the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidsFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Parsed file name.
    pub name: BidsName,
    /// Datatype directory the file lives in (`anat`, `func`, ...).
    pub datatype: String,
}

impl BidsFile {
    /// File name component as a string.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
    }

    /// Directory containing the file.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Index of participant directories and their data files.
#[derive(Debug, Clone)]
pub struct BidsLayout {
    root: PathBuf,
    subjects: Vec<String>,
    files: Vec<BidsFile>,
}

impl BidsLayout {
    /// Index every `sub-*` directory below `root`.
    pub fn index(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::DatasetNotFound {
                path: root.to_path_buf(),
            });
        }
        let root = std::fs::canonicalize(root)?;

        if !root.join(DATASET_DESCRIPTION).is_file() {
            warn!(
                "{} missing from {}, this may not be a BIDS dataset",
                DATASET_DESCRIPTION,
                root.display()
            );
        }

        let mut subjects = Vec::new();
        let mut files = Vec::new();

        for entry in read_dir(&root)? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(label) = name.strip_prefix(SUBJECT_PREFIX)
                && path.is_dir()
                && !label.is_empty()
            {
                subjects.push(label.to_string());
                collect_files(&path, &mut files)?;
            }
        }

        subjects.sort();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(
            "Indexed {} subject(s), {} file(s) under {}",
            subjects.len(),
            files.len(),
            root.display()
        );

        Ok(Self {
            root,
            subjects,
            files,
        })
    }

    /// Absolute dataset root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted subject labels, without the `sub-` prefix.
    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    /// Whether a subject directory exists.
    pub fn has_subject(&self, label: &str) -> bool {
        self.subjects.iter().any(|s| s == label)
    }

    /// Files of a subject matching a query, sorted by path.
    pub fn get(&self, subject: &str, query: &ScanQuery) -> Vec<&BidsFile> {
        self.files
            .iter()
            .filter(|f| f.name.subject() == Some(subject))
            .filter(|f| query.matches(&f.name, &f.datatype))
            .collect()
    }
}

/// Strip an optional `sub-` prefix from a participant label.
pub fn normalize_label(label: &str) -> &str {
    label.strip_prefix(SUBJECT_PREFIX).unwrap_or(label)
}

fn read_dir(dir: &Path) -> Result<Vec<std::fs::DirEntry>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::DatasetIndex {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut list = entries
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::DatasetIndex {
            path: dir.to_path_buf(),
            source: e,
        })?;
    list.sort_by_key(std::fs::DirEntry::file_name);
    Ok(list)
}

/// Recursively collect parseable BIDS files from a directory.
fn collect_files(dir: &Path, files: &mut Vec<BidsFile>) -> Result<()> {
    for entry in read_dir(dir)? {
        let path = entry.path();
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if file_name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            collect_files(&path, files)?;
        } else if let Some(name) = BidsName::parse(&file_name) {
            let datatype = dir
                .file_name()
                .map_or_else(String::new, |d| d.to_string_lossy().into_owned());
            files.push(BidsFile {
                path,
                name,
                datatype,
            });
        }
    }

    Ok(())
}
