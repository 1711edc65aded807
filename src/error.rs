//! Error types for mimosa-bids.

use std::path::PathBuf;

/// Result type alias for mimosa-bids operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for mimosa-bids.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Failed to write configuration file.
    #[error("failed to write config file '{path}'")]
    ConfigWrite {
        /// Path to the config file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration.
    #[error("failed to serialize config")]
    ConfigSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// BIDS dataset directory is missing or not a directory.
    #[error("BIDS dataset directory does not exist: {path}")]
    DatasetNotFound {
        /// Path given as the dataset root.
        path: PathBuf,
    },

    /// Failed to read a directory while indexing the dataset.
    #[error("failed to index BIDS directory '{path}'")]
    DatasetIndex {
        /// Directory being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// BIDS filter file does not exist.
    #[error("unable to load BIDS filter file {path}")]
    FilterFileNotFound {
        /// Path to the filter file.
        path: PathBuf,
    },

    /// BIDS filter file is not valid JSON.
    #[error("unable to parse BIDS filter file '{path}', check that it is valid JSON")]
    FilterFileParse {
        /// Path to the filter file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// BIDS filter file is valid JSON but has an unexpected shape.
    #[error("invalid BIDS filter: {message}")]
    InvalidFilter {
        /// Description of the problem.
        message: String,
    },

    /// No participants to analyze.
    #[error("no participants found in '{path}'")]
    NoParticipants {
        /// Dataset root.
        path: PathBuf,
    },

    /// Requested participant has no directory in the dataset.
    #[error("participant '{label}' not found in the dataset")]
    ParticipantNotFound {
        /// Participant label without the `sub-` prefix.
        label: String,
    },

    /// No T1-weighted images for a participant.
    #[error("no T1w images found for participant {label}")]
    NoT1wImages {
        /// Participant label.
        label: String,
    },

    /// No FLAIR images for a participant.
    #[error("no FLAIR images found for participant {label}")]
    NoFlairImages {
        /// Participant label.
        label: String,
    },

    /// T1w and FLAIR counts differ within one session.
    #[error(
        "participant {label}{session}: found {t1w} T1w but {flair} FLAIR images (use --allow-unpaired to pair what matches)"
    )]
    ScanCountMismatch {
        /// Participant label.
        label: String,
        /// Session description, empty when the files carry no session.
        session: String,
        /// Number of T1w images.
        t1w: usize,
        /// Number of FLAIR images.
        flair: usize,
    },

    /// Failed to start an external program.
    #[error("failed to start '{program}'")]
    ProcessSpawn {
        /// Program that could not be started.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// External program exited unsuccessfully.
    #[error("'{program}' failed: {}", exit_description(.code))]
    NonZeroExit {
        /// Program that failed.
        program: String,
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
    },

    /// BIDS validator rejected the dataset.
    #[error("BIDS validation failed for '{path}'")]
    ValidationFailed {
        /// Dataset root.
        path: PathBuf,
        /// Underlying process error.
        #[source]
        source: Box<Self>,
    },

    /// Failed to acquire lock.
    #[error("scan is locked by another process: {path}")]
    FileLocked {
        /// Path to the lock file.
        path: PathBuf,
    },

    /// Failed to create lock file.
    #[error("failed to create lock file '{path}'")]
    LockCreate {
        /// Path to the lock file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to remove a stale lock file.
    #[error("failed to remove stale lock file '{path}'")]
    LockRemove {
        /// Path to the lock file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create output directory.
    #[error("failed to create output directory '{path}'")]
    OutputDirCreateFailed {
        /// Path to the output directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize JSON output.
    #[error("failed to serialize JSON output")]
    JsonSerialize {
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },
}

#[allow(clippy::ref_option)]
fn exit_description(code: &Option<i32>) -> String {
    code.map_or_else(
        || "terminated by signal".to_string(),
        |c| format!("non zero return code: {c}"),
    )
}
