//! Application-wide constants.

/// Application name used for config directories and user-facing messages.
pub const APP_NAME: &str = "mimosa-bids";

/// Default segmentation script inside the container image.
pub const DEFAULT_SCRIPT_PATH: &str = "/run.R";

/// Default BIDS validator executable.
pub const DEFAULT_VALIDATOR: &str = "bids-validator";

/// Default threshold for the binary segmentation mask.
pub const DEFAULT_THRESHOLD: f32 = 0.2;

/// Configuration file name inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default age after which an abandoned scan lock is reclaimed.
pub const DEFAULT_STALE_LOCK_TIMEOUT: &str = "24h";

/// Lock file extension.
pub const LOCK_FILE_EXTENSION: &str = ".mimosa.lock";

/// Threshold bounds.
pub mod threshold {
    /// Minimum valid threshold.
    pub const MIN: f32 = 0.0;
    /// Maximum valid threshold.
    pub const MAX: f32 = 1.0;
}

/// BIDS naming constants.
pub mod bids {
    /// Prefix of participant directories and labels.
    pub const SUBJECT_PREFIX: &str = "sub-";

    /// Dataset description file expected at the dataset root.
    pub const DATASET_DESCRIPTION: &str = "dataset_description.json";

    /// Datatype directory holding anatomical scans.
    pub const ANAT_DATATYPE: &str = "anat";

    /// Suffix of T1-weighted scans.
    pub const T1W_SUFFIX: &str = "T1w";

    /// Suffix of FLAIR scans.
    pub const FLAIR_SUFFIX: &str = "FLAIR";

    /// NIfTI extensions accepted as scan inputs.
    pub const NIFTI_EXTENSIONS: &[&str] = &[".nii", ".nii.gz"];
}

/// Output naming.
pub mod output {
    /// Marker in T1w file names replaced to form the output name.
    pub const T1W_MARKER: &str = "_T1w.";

    /// Replacement marker for segmentation outputs.
    pub const MIMOSA_MARKER: &str = "_mimosa.";
}
