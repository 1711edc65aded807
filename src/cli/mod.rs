//! CLI argument parsing and command handling.

mod args;
pub mod validators;

pub use args::{AnalysisLevel, Cli, Command, ConfigAction, ParticipantArgs};
