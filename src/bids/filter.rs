//! BIDS filter file loading.
//!
//! A filter file refines the base query for each scan kind, in the format
//! used by fMRIPrep-style BIDS Apps:
//!
//! ```json
//! {
//!   "t1w":   { "acquisition": "mprage", "run": [1, 2] },
//!   "flair": { "session": "baseline", "reconstruction": null }
//! }
//! ```
//!
//! `null` requires the entity to be absent and `"*"` requires it to be
//! present. The serialised forms `"Query.NONE"` and `"Query.ANY"` are
//! accepted for files written by pybids tooling.

use super::query::{EntityQuery, ScanKind, ScanQuery};
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Per-scan-kind filter constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BidsFilters {
    constraints: BTreeMap<ScanKind, Vec<(String, EntityQuery)>>,
}

impl BidsFilters {
    /// Load filters from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::FilterFileNotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let value: Value =
            serde_json::from_str(&contents).map_err(|e| Error::FilterFileParse {
                path: path.to_path_buf(),
                source: e,
            })?;

        Self::from_value(&value)
    }

    /// Build filters from parsed JSON.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(kinds) = value else {
            return Err(invalid("top level must be an object keyed by scan kind"));
        };

        let mut constraints = BTreeMap::new();
        for (kind_key, entities) in kinds {
            let kind = kind_key.parse::<ScanKind>().map_err(|_| {
                invalid(&format!(
                    "unknown scan kind '{kind_key}' (expected 't1w' or 'flair')"
                ))
            })?;

            let Value::Object(entities) = entities else {
                return Err(invalid(&format!("filters for '{kind_key}' must be an object")));
            };

            let parsed = entities
                .iter()
                .map(|(name, v)| Ok((name.clone(), parse_constraint(name, v)?)))
                .collect::<Result<Vec<_>>>()?;

            constraints.insert(kind, parsed);
        }

        Ok(Self { constraints })
    }

    /// Build the query for a scan kind with these filters applied.
    pub fn query_for(&self, kind: ScanKind) -> ScanQuery {
        let mut query = ScanQuery::for_kind(kind);
        if let Some(list) = self.constraints.get(&kind) {
            for (name, constraint) in list {
                query.apply(name, constraint.clone());
            }
        }
        query
    }
}

/// Parse a `--bids-filter-file` argument.
pub fn parse_filter_file(s: &str) -> std::result::Result<BidsFilters, String> {
    BidsFilters::from_file(Path::new(s)).map_err(|e| {
        let mut message = e.to_string();
        if let Some(source) = std::error::Error::source(&e) {
            message.push_str(&format!(": {source}"));
        }
        message
    })
}

fn parse_constraint(name: &str, value: &Value) -> Result<EntityQuery> {
    match value {
        Value::Null => Ok(EntityQuery::Absent),
        Value::String(s) => Ok(match s.as_str() {
            "*" | "Query.ANY" => EntityQuery::Present,
            "Query.NONE" => EntityQuery::Absent,
            _ => EntityQuery::Equals(s.clone()),
        }),
        Value::Number(n) => Ok(EntityQuery::Equals(n.to_string())),
        Value::Array(items) => items
            .iter()
            .map(|item| scalar_string(name, item))
            .collect::<Result<Vec<_>>>()
            .map(EntityQuery::OneOf),
        Value::Bool(_) | Value::Object(_) => Err(invalid(&format!(
            "unsupported value for '{name}': {value}"
        ))),
    }
}

fn scalar_string(name: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(invalid(&format!(
            "list values for '{name}' must be strings or numbers, got {value}"
        ))),
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidFilter {
        message: message.to_string(),
    }
}
