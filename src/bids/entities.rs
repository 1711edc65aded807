//! BIDS file name parsing.

use std::collections::BTreeMap;

/// Long entity names accepted in filters, mapped to their file name keys.
const ENTITY_ALIASES: &[(&str, &str)] = &[
    ("subject", "sub"),
    ("session", "ses"),
    ("sample", "sample"),
    ("task", "task"),
    ("tracksys", "tracksys"),
    ("acquisition", "acq"),
    ("ceagent", "ce"),
    ("staining", "stain"),
    ("tracer", "trc"),
    ("reconstruction", "rec"),
    ("direction", "dir"),
    ("run", "run"),
    ("modality", "mod"),
    ("echo", "echo"),
    ("flip", "flip"),
    ("inversion", "inv"),
    ("mtransfer", "mt"),
    ("part", "part"),
    ("processing", "proc"),
    ("hemisphere", "hemi"),
    ("space", "space"),
    ("split", "split"),
    ("recording", "recording"),
    ("chunk", "chunk"),
    ("resolution", "res"),
    ("density", "den"),
    ("label", "label"),
    ("description", "desc"),
];

/// Resolve a filter entity name to the key used in file names.
///
/// Long names (`session`) and short keys (`ses`) are both accepted; unknown
/// names pass through unchanged so custom entities still match.
pub fn entity_key(name: &str) -> &str {
    ENTITY_ALIASES
        .iter()
        .find(|(long, short)| *long == name || *short == name)
        .map_or(name, |(_, short)| short)
}

/// Components of a BIDS file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidsName {
    /// Key-value entities in file name order, keyed by short key.
    pub entities: BTreeMap<String, String>,
    /// Suffix, e.g. `T1w`.
    pub suffix: String,
    /// Extension including the leading dot, e.g. `.nii.gz`.
    pub extension: String,
}

impl BidsName {
    /// Parse a file name such as `sub-01_ses-a_run-2_FLAIR.nii.gz`.
    ///
    /// Returns `None` when the name has no suffix or a malformed entity.
    pub fn parse(file_name: &str) -> Option<Self> {
        let (stem, extension) = file_name
            .find('.')
            .map_or((file_name, ""), |dot| file_name.split_at(dot));

        let mut parts = stem.split('_').collect::<Vec<_>>();
        let suffix = parts.pop()?;
        if suffix.is_empty() || suffix.contains('-') {
            return None;
        }

        let mut entities = BTreeMap::new();
        for part in parts {
            let (key, value) = part.split_once('-')?;
            if key.is_empty() || value.is_empty() {
                return None;
            }
            entities.insert(key.to_string(), value.to_string());
        }

        Some(Self {
            entities,
            suffix: suffix.to_string(),
            extension: extension.to_string(),
        })
    }

    /// Value of an entity by long name or short key.
    pub fn entity(&self, name: &str) -> Option<&str> {
        self.entities.get(entity_key(name)).map(String::as_str)
    }

    /// Subject label.
    pub fn subject(&self) -> Option<&str> {
        self.entity("sub")
    }

    /// Session label.
    pub fn session(&self) -> Option<&str> {
        self.entity("ses")
    }

    /// Run number, `0` when absent or not numeric.
    pub fn run(&self) -> u32 {
        self.entity("run").and_then(parse_index).unwrap_or(0)
    }
}

/// Parse an index entity value (`01` → 1).
pub fn parse_index(value: &str) -> Option<u32> {
    value.parse().ok()
}

/// Compare an entity value with a requested value.
///
/// Index entities (`run`, `echo`, ...) compare numerically so `run-01`
/// matches a filter value of `1`.
pub fn entity_value_matches(key: &str, actual: &str, expected: &str) -> bool {
    if is_index_entity(key)
        && let (Some(a), Some(b)) = (parse_index(actual), parse_index(expected))
    {
        return a == b;
    }
    actual == expected
}

fn is_index_entity(key: &str) -> bool {
    matches!(key, "run" | "echo" | "flip" | "inv" | "split" | "chunk")
}
