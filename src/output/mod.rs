//! User-facing output: progress, relayed script output and JSON results.

mod json_envelope;
pub mod progress;

pub use json_envelope::{
    EventType, JsonEnvelope, PlanEntry, PlanPayload, ResultType, RunSummaryPayload, SPEC_VERSION,
    emit_json_result,
};
