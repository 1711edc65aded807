//! Processing pipeline components.

mod command;
mod coordinator;
mod pairing;
mod runner;

pub use command::{CommandSpec, SegmentationOptions, script_command, validator_command};
pub use coordinator::{
    PlanOptions, PlannedRun, ProcessCheck, build_plan, plan_subject, process_run,
    select_subjects, should_process, validate_dataset,
};
pub use pairing::{ScanPair, output_dir_for, output_file_name, output_suffixes, pair_scans};
pub use runner::{OutputStream, run_streaming};
