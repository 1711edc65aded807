//! External command construction.

use crate::config::{ScriptConfig, SkullStrip, ValidatorConfig};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;

use super::PlannedRun;

/// A program invocation without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: OsString,
    /// Arguments, passed verbatim.
    pub args: Vec<OsString>,
    /// Variables added to the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    /// Create a command with no arguments.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Program name for messages.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", quote(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            write!(f, " {}", quote(&arg.to_string_lossy()))?;
        }
        Ok(())
    }
}

/// Quote an argument for display when it would not survive a shell as-is.
fn quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:+,@%".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Options forwarded to the segmentation script.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct SegmentationOptions {
    /// Skull stripping method.
    pub strip: SkullStrip,
    /// Threshold for the binary segmentation mask.
    pub thresh: f32,
    /// N4 bias field correction.
    pub n4: bool,
    /// Register FLAIR to T1.
    pub register: bool,
    /// WhiteStripe normalization.
    pub whitestripe: bool,
    /// Extra debug output.
    pub debug: bool,
}

/// Build the segmentation script invocation for one planned pair.
///
/// `<script> --outdir D --indir I --flair F --t1 T [--strip M] --thresh X [flags]`
pub fn script_command(
    script: &ScriptConfig,
    run: &PlannedRun,
    options: &SegmentationOptions,
) -> CommandSpec {
    let mut cmd = match &script.interpreter {
        Some(interpreter) => CommandSpec::new(interpreter).arg(&script.path),
        None => CommandSpec::new(&script.path),
    };
    cmd.env.clone_from(&script.env);

    let indir = run.t1w.parent().unwrap_or_else(|| Path::new("."));
    cmd = cmd
        .arg("--outdir")
        .arg(&run.output_dir)
        .arg("--indir")
        .arg(indir)
        .arg("--flair")
        .arg(file_name(&run.flair))
        .arg("--t1")
        .arg(file_name(&run.t1w));

    if let Some(method) = options.strip.script_value() {
        cmd = cmd.arg("--strip").arg(method);
    }
    cmd = cmd.arg("--thresh").arg(options.thresh.to_string());

    for (enabled, flag) in [
        (options.n4, "--n4"),
        (options.register, "--register"),
        (options.whitestripe, "--whitestripe"),
        (options.debug, "--debug"),
    ] {
        if enabled {
            cmd = cmd.arg(flag);
        }
    }

    cmd
}

/// Build the BIDS validator invocation for a dataset.
pub fn validator_command(validator: &ValidatorConfig, bids_dir: &Path) -> CommandSpec {
    let mut cmd = CommandSpec::new(&validator.command);
    for arg in &validator.args {
        cmd = cmd.arg(arg);
    }
    cmd.arg(bids_dir)
}

fn file_name(path: &Path) -> OsString {
    path.file_name()
        .map_or_else(|| path.as_os_str().to_os_string(), ToOwned::to_owned)
}
