//! Queries over indexed BIDS files.

use super::entities::{BidsName, entity_key, entity_value_matches};
use crate::constants::bids::{ANAT_DATATYPE, FLAIR_SUFFIX, NIFTI_EXTENSIONS, T1W_SUFFIX};
use std::collections::BTreeMap;

/// Scan kinds collected for segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScanKind {
    /// T1-weighted anatomical scan.
    T1w,
    /// FLAIR anatomical scan.
    Flair,
}

impl std::fmt::Display for ScanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::T1w => write!(f, "{T1W_SUFFIX}"),
            Self::Flair => write!(f, "{FLAIR_SUFFIX}"),
        }
    }
}

impl std::str::FromStr for ScanKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "t1w" => Ok(Self::T1w),
            "flair" => Ok(Self::Flair),
            other => Err(format!("unknown scan kind: {other}")),
        }
    }
}

/// Constraint on a single entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityQuery {
    /// Entity must equal the value.
    Equals(String),
    /// Entity must equal one of the values.
    OneOf(Vec<String>),
    /// Entity must not be present.
    Absent,
    /// Entity must be present with any value.
    Present,
}

impl EntityQuery {
    /// Check an entity value (or its absence) against this constraint.
    pub fn matches(&self, key: &str, value: Option<&str>) -> bool {
        match (self, value) {
            (Self::Absent, v) => v.is_none(),
            (Self::Present, v) => v.is_some(),
            (Self::Equals(expected), Some(v)) => entity_value_matches(key, v, expected),
            (Self::OneOf(options), Some(v)) => {
                options.iter().any(|o| entity_value_matches(key, v, o))
            }
            (Self::Equals(_) | Self::OneOf(_), None) => false,
        }
    }
}

/// Query selecting one kind of scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanQuery {
    /// Datatype directory constraint.
    pub datatype: EntityQuery,
    /// Suffix constraint.
    pub suffix: EntityQuery,
    /// Extension constraint (values carry the leading dot).
    pub extension: EntityQuery,
    /// Entity constraints keyed by short key.
    pub entities: BTreeMap<String, EntityQuery>,
}

impl ScanQuery {
    /// Base query for a scan kind: anatomical NIfTI with the kind's suffix.
    pub fn for_kind(kind: ScanKind) -> Self {
        let suffix = match kind {
            ScanKind::T1w => T1W_SUFFIX,
            ScanKind::Flair => FLAIR_SUFFIX,
        };
        Self {
            datatype: EntityQuery::Equals(ANAT_DATATYPE.to_string()),
            suffix: EntityQuery::Equals(suffix.to_string()),
            extension: EntityQuery::OneOf(
                NIFTI_EXTENSIONS.iter().map(ToString::to_string).collect(),
            ),
            entities: BTreeMap::new(),
        }
    }

    /// Apply one filter constraint.
    ///
    /// `datatype`, `suffix` and `extension` replace the base values; any
    /// other name constrains the entity it resolves to.
    pub fn apply(&mut self, name: &str, constraint: EntityQuery) {
        match name {
            "datatype" => self.datatype = constraint,
            "suffix" => self.suffix = constraint,
            "extension" => self.extension = normalize_extensions(constraint),
            other => {
                self.entities
                    .insert(entity_key(other).to_string(), constraint);
            }
        }
    }

    /// Check a parsed file name and its datatype against the query.
    pub fn matches(&self, name: &BidsName, datatype: &str) -> bool {
        let extension = (!name.extension.is_empty()).then_some(name.extension.as_str());

        self.datatype.matches("datatype", Some(datatype))
            && self.suffix.matches("suffix", Some(&name.suffix))
            && self.extension.matches("extension", extension)
            && self
                .entities
                .iter()
                .all(|(key, q)| q.matches(key, name.entities.get(key).map(String::as_str)))
    }
}

fn normalize_extensions(constraint: EntityQuery) -> EntityQuery {
    let dotted = |e: String| {
        if e.starts_with('.') {
            e
        } else {
            format!(".{e}")
        }
    };
    match constraint {
        EntityQuery::Equals(e) => EntityQuery::Equals(dotted(e)),
        EntityQuery::OneOf(list) => EntityQuery::OneOf(list.into_iter().map(dotted).collect()),
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn name(s: &str) -> BidsName {
        BidsName::parse(s).unwrap()
    }

    #[test]
    fn test_base_query_matches_nifti_only() {
        let q = ScanQuery::for_kind(ScanKind::T1w);
        assert!(q.matches(&name("sub-01_T1w.nii.gz"), "anat"));
        assert!(q.matches(&name("sub-01_T1w.nii"), "anat"));
        assert!(!q.matches(&name("sub-01_T1w.json"), "anat"));
        assert!(!q.matches(&name("sub-01_FLAIR.nii.gz"), "anat"));
        assert!(!q.matches(&name("sub-01_T1w.nii.gz"), "func"));
    }

    #[test]
    fn test_absent_and_present_constraints() {
        let mut q = ScanQuery::for_kind(ScanKind::Flair);
        q.apply("acquisition", EntityQuery::Absent);
        assert!(q.matches(&name("sub-01_FLAIR.nii.gz"), "anat"));
        assert!(!q.matches(&name("sub-01_acq-2d_FLAIR.nii.gz"), "anat"));

        q.apply("acq", EntityQuery::Present);
        assert!(!q.matches(&name("sub-01_FLAIR.nii.gz"), "anat"));
        assert!(q.matches(&name("sub-01_acq-2d_FLAIR.nii.gz"), "anat"));
    }

    #[test]
    fn test_one_of_run_numeric() {
        let mut q = ScanQuery::for_kind(ScanKind::T1w);
        q.apply("run", EntityQuery::OneOf(vec!["1".to_string(), "3".to_string()]));
        assert!(q.matches(&name("sub-01_run-01_T1w.nii.gz"), "anat"));
        assert!(!q.matches(&name("sub-01_run-02_T1w.nii.gz"), "anat"));
        assert!(!q.matches(&name("sub-01_T1w.nii.gz"), "anat"));
    }

    #[test]
    fn test_extension_override_adds_dot() {
        let mut q = ScanQuery::for_kind(ScanKind::T1w);
        q.apply("extension", EntityQuery::Equals("nii.gz".to_string()));
        assert!(q.matches(&name("sub-01_T1w.nii.gz"), "anat"));
        assert!(!q.matches(&name("sub-01_T1w.nii"), "anat"));
    }

    #[test]
    fn test_scan_kind_from_str() {
        assert_eq!("T1w".parse::<ScanKind>().ok(), Some(ScanKind::T1w));
        assert_eq!("flair".parse::<ScanKind>().ok(), Some(ScanKind::Flair));
        assert!("bold".parse::<ScanKind>().is_err());
    }
}
