//! JSON envelope types for CLI output.
//!
//! With `--output-mode json` the plan (on a dry run) or the run summary is
//! printed to stdout as a single envelope so pipelines can consume it.

use crate::error::{Error, Result};
use crate::pipeline::PlannedRun;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current spec version for JSON envelope.
pub const SPEC_VERSION: &str = "1.0";

/// JSON envelope wrapping CLI output.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct JsonEnvelope<T> {
    /// API specification version.
    pub spec_version: String,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
    /// Event type.
    pub event: EventType,
    /// Event-specific payload.
    pub payload: T,
}

impl<T: Serialize> JsonEnvelope<T> {
    /// Create a new envelope with the current timestamp.
    pub fn new(event: EventType, payload: T) -> Self {
        Self {
            spec_version: SPEC_VERSION.to_string(),
            timestamp: Utc::now(),
            event,
            payload,
        }
    }
}

/// Event types for JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Final result.
    Result,
}

/// Result type discriminator for result payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    /// Planned segmentations (dry run).
    Plan,
    /// Completed participant-level run.
    Run,
}

/// A planned segmentation with its command line.
#[derive(Debug, Serialize)]
pub struct PlanEntry<'a> {
    /// The planned pair.
    #[serde(flatten)]
    pub run: &'a PlannedRun,
    /// Command that would be executed.
    pub command: String,
}

/// Payload for a dry run.
#[derive(Debug, Serialize)]
pub struct PlanPayload<'a> {
    /// Result discriminator.
    pub result_type: ResultType,
    /// Participants included in the plan.
    pub subjects: &'a [String],
    /// Planned segmentations.
    pub runs: Vec<PlanEntry<'a>>,
}

/// Payload summarizing a completed run.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunSummaryPayload {
    /// Result discriminator.
    pub result_type: ResultType,
    /// Number of participants.
    pub subjects: usize,
    /// Segmentations executed.
    pub processed: usize,
    /// Segmentations skipped (existing output or locked).
    pub skipped: usize,
    /// Wall time in seconds.
    pub duration_secs: f64,
}

/// Print a result envelope to stdout.
pub fn emit_json_result<T: Serialize>(payload: T) -> Result<()> {
    let envelope = JsonEnvelope::new(EventType::Result, payload);
    let json = serde_json::to_string(&envelope).map_err(|e| Error::JsonSerialize { source: e })?;
    println!("{json}");
    Ok(())
}
