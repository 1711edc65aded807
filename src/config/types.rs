//! Configuration type definitions.

use crate::constants::{
    DEFAULT_SCRIPT_PATH, DEFAULT_STALE_LOCK_TIMEOUT, DEFAULT_THRESHOLD, DEFAULT_VALIDATOR,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Segmentation script settings.
    pub script: ScriptConfig,

    /// BIDS validator settings.
    pub validator: ValidatorConfig,

    /// Default segmentation options.
    pub defaults: DefaultsConfig,
}

/// How the segmentation script is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Path to the segmentation script.
    pub path: PathBuf,

    /// Interpreter to run the script with (e.g. `Rscript`).
    /// When unset the script is executed directly.
    pub interpreter: Option<String>,

    /// Extra environment variables for the script.
    pub env: BTreeMap<String, String>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SCRIPT_PATH),
            interpreter: None,
            env: BTreeMap::new(),
        }
    }
}

/// How the BIDS validator is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Validator executable.
    pub command: String,

    /// Arguments placed before the dataset path.
    pub args: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_VALIDATOR.to_string(),
            args: Vec::new(),
        }
    }
}

/// Default segmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct DefaultsConfig {
    /// Skull stripping method.
    pub strip: SkullStrip,

    /// Threshold for the binary segmentation mask.
    pub thresh: f32,

    /// N4 bias field correction.
    pub n4: bool,

    /// Register FLAIR to T1.
    pub register: bool,

    /// WhiteStripe intensity normalization.
    pub whitestripe: bool,

    /// Age after which a scan lock left by a dead run is reclaimed (e.g. `24h`).
    pub stale_lock_timeout: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            strip: SkullStrip::default(),
            thresh: DEFAULT_THRESHOLD,
            n4: false,
            register: false,
            whitestripe: false,
            stale_lock_timeout: DEFAULT_STALE_LOCK_TIMEOUT.to_string(),
        }
    }
}

/// Skull stripping choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkullStrip {
    /// Inputs are already skull stripped.
    #[default]
    #[serde(alias = "")]
    None,
    /// FSL BET.
    Bet,
    /// Multi-atlas skull stripping.
    Mass,
}

impl SkullStrip {
    /// Value passed to the script's `--strip` option, if any.
    pub const fn script_value(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Bet => Some("bet"),
            Self::Mass => Some("mass"),
        }
    }
}

impl std::fmt::Display for SkullStrip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Bet => write!(f, "bet"),
            Self::Mass => write!(f, "mass"),
        }
    }
}

impl std::str::FromStr for SkullStrip {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "bet" => Ok(Self::Bet),
            "mass" => Ok(Self::Mass),
            other => Err(format!(
                "unknown skull stripping method '{other}' (expected 'bet', 'mass' or empty)"
            )),
        }
    }
}

/// How results are reported on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Human-readable log output.
    #[default]
    Human,
    /// JSON envelopes on stdout.
    Json,
}

impl OutputMode {
    /// Whether output is machine-readable.
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_skull_strip_from_str() {
        assert_eq!("".parse::<SkullStrip>().ok(), Some(SkullStrip::None));
        assert_eq!("bet".parse::<SkullStrip>().ok(), Some(SkullStrip::Bet));
        assert_eq!("MASS".parse::<SkullStrip>().ok(), Some(SkullStrip::Mass));
        assert!("robex".parse::<SkullStrip>().is_err());
    }

    #[test]
    fn test_skull_strip_script_value() {
        assert_eq!(SkullStrip::None.script_value(), None);
        assert_eq!(SkullStrip::Bet.script_value(), Some("bet"));
    }

    #[test]
    fn test_defaults_config_default_values() {
        let defaults = DefaultsConfig::default();
        assert_eq!(defaults.thresh, 0.2);
        assert_eq!(defaults.strip, SkullStrip::None);
        assert!(!defaults.n4);
        assert_eq!(defaults.stale_lock_timeout, "24h");
    }

    #[test]
    fn test_script_config_default_path() {
        let script = ScriptConfig::default();
        assert_eq!(script.path, PathBuf::from("/run.R"));
        assert!(script.interpreter.is_none());
    }
}
