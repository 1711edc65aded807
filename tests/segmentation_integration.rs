//! End-to-end runs against a stand-in segmentation script.

#![cfg(unix)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"").unwrap();
}

struct Fixture {
    data: TempDir,
    work: TempDir,
}

impl Fixture {
    /// Two runs in one session, plus a config pointing at `script_body`.
    fn new(script_body: &str) -> Self {
        let data = TempDir::new().unwrap();
        touch(data.path(), "dataset_description.json");
        touch(data.path(), "sub-01/ses-1/anat/sub-01_ses-1_run-1_T1w.nii.gz");
        touch(data.path(), "sub-01/ses-1/anat/sub-01_ses-1_run-1_FLAIR.nii.gz");
        touch(data.path(), "sub-01/ses-1/anat/sub-01_ses-1_run-2_T1w.nii.gz");
        touch(data.path(), "sub-01/ses-1/anat/sub-01_ses-1_run-2_FLAIR.nii.gz");

        let work = TempDir::new().unwrap();
        fs::write(work.path().join("run.sh"), script_body).unwrap();

        let config = format!(
            "[script]\npath = '{}'\ninterpreter = 'sh'\n\n[script.env]\nMIMOSA_ARGS_LOG = '{}'\n\n[validator]\ncommand = 'false'\n",
            work.path().join("run.sh").display(),
            work.path().join("args.log").display(),
        );
        fs::write(work.path().join("config.toml"), config).unwrap();

        Self { data, work }
    }

    fn config(&self) -> PathBuf {
        self.work.path().join("config.toml")
    }

    fn out(&self) -> PathBuf {
        self.work.path().join("mimosa")
    }

    fn args_log(&self) -> String {
        fs::read_to_string(self.work.path().join("args.log")).unwrap_or_default()
    }

    fn run_args(&self) -> Vec<std::ffi::OsString> {
        vec![
            self.data.path().into(),
            self.out().into(),
            "participant".into(),
            "--no-progress".into(),
            "--config".into(),
            self.config().into(),
        ]
    }

    fn command(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("mimosa");
        cmd.args(self.run_args());
        cmd
    }

    fn lock_files(&self, dir: &str) -> Vec<String> {
        fs::read_dir(self.work.path().join(dir))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".mimosa.lock"))
            .collect()
    }
}

const RECORDING_SCRIPT: &str = r#"printf '%s\n' "$@" >> "$MIMOSA_ARGS_LOG"
echo "segmenting $6"
echo "to stderr" >&2
"#;

#[test]
fn test_runs_script_once_per_pair() {
    let fx = Fixture::new(RECORDING_SCRIPT);

    fx.command()
        .arg("--skip_bids_validator")
        .arg("--register")
        .assert()
        .success()
        .stdout(predicate::str::contains("segmenting sub-01_ses-1_run-2_FLAIR.nii.gz"))
        .stdout(predicate::str::contains("segmenting sub-01_ses-1_run-1_FLAIR.nii.gz"))
        .stderr(predicate::str::contains("to stderr"));

    let log = fx.args_log();
    let lines: Vec<&str> = log.lines().collect();

    // Highest run first, each invocation has 11 arguments
    assert_eq!(lines.len(), 22);
    let first = &lines[..11];
    assert_eq!(first[0], "--outdir");
    assert!(first[1].ends_with("mimosa_ses-1_run-2"));
    assert_eq!(first[2], "--indir");
    assert!(first[3].ends_with("sub-01/ses-1/anat"));
    assert_eq!(
        &first[4..],
        [
            "--flair",
            "sub-01_ses-1_run-2_FLAIR.nii.gz",
            "--t1",
            "sub-01_ses-1_run-2_T1w.nii.gz",
            "--thresh",
            "0.2",
            "--register",
        ]
    );
    assert!(lines[12].ends_with("mimosa_ses-1_run-1"));
    assert_eq!(lines[20], "0.2");

    // Output directories are created before the script runs, locks released after
    assert!(fx.work.path().join("mimosa_ses-1_run-2").is_dir());
    assert!(fx.work.path().join("mimosa_ses-1_run-1").is_dir());
    assert!(fx.lock_files("mimosa_ses-1_run-1").is_empty());
}

#[test]
fn test_script_failure_is_fatal() {
    let fx = Fixture::new(
        r#"printf '%s\n' "$@" >> "$MIMOSA_ARGS_LOG"
exit 3
"#,
    );

    fx.command()
        .arg("--skip_bids_validator")
        .assert()
        .failure()
        .stderr(predicate::str::contains("non zero return code: 3"));

    // The second pair never runs
    assert_eq!(fx.args_log().lines().count(), 10);
}

#[test]
fn test_validator_failure_stops_before_segmentation() {
    let fx = Fixture::new(RECORDING_SCRIPT);

    fx.command()
        .assert()
        .failure()
        .stderr(predicate::str::contains("BIDS validation failed"));

    assert!(fx.args_log().is_empty());
}

#[test]
fn test_skip_existing_output() {
    let fx = Fixture::new(RECORDING_SCRIPT);
    touch(
        fx.work.path(),
        "mimosa_ses-1_run-2/sub-01_ses-1_run-2_mimosa.nii.gz",
    );

    fx.command()
        .arg("--skip_bids_validator")
        .arg("--skip-existing")
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipping (output exists)"));

    let log = fx.args_log();
    assert_eq!(log.lines().count(), 10);
    assert!(log.contains("sub-01_ses-1_run-1_T1w.nii.gz"));
    assert!(!log.contains("sub-01_ses-1_run-2_T1w.nii.gz"));
}

#[test]
fn test_json_mode_keeps_stdout_for_summary() {
    let fx = Fixture::new(RECORDING_SCRIPT);

    let assert = fx
        .command()
        .arg("--skip_bids_validator")
        .arg("--output-mode")
        .arg("json")
        .assert()
        .success()
        .stderr(predicate::str::contains("segmenting"));

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(json["payload"]["result_type"], "run");
    assert_eq!(json["payload"]["processed"], 2);
    assert_eq!(json["payload"]["skipped"], 0);
}

#[test]
fn test_abandoned_lock_is_reclaimed() {
    let fx = Fixture::new(RECORDING_SCRIPT);
    touch(fx.work.path(), "mimosa_ses-1_run-2/.keep");
    fs::write(
        fx.work
            .path()
            .join("mimosa_ses-1_run-2/sub-01_ses-1_run-2_T1w.nii.gz.mimosa.lock"),
        r#"{"pid":999999,"hostname":"crashed-node","started":"2020-01-01T00:00:00Z","input":"sub-01_ses-1_run-2_T1w.nii.gz"}"#,
    )
    .unwrap();

    fx.command()
        .arg("--skip_bids_validator")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removing stale lock"));

    let log = fx.args_log();
    assert_eq!(log.lines().count(), 20);
    assert!(log.contains("sub-01_ses-1_run-2_T1w.nii.gz"));
    assert!(fx.lock_files("mimosa_ses-1_run-2").is_empty());
}

#[test]
fn test_live_lock_is_skipped() {
    let fx = Fixture::new(RECORDING_SCRIPT);
    touch(fx.work.path(), "mimosa_ses-1_run-2/.keep");
    let started = chrono::Utc::now().to_rfc3339();
    fs::write(
        fx.work
            .path()
            .join("mimosa_ses-1_run-2/sub-01_ses-1_run-2_T1w.nii.gz.mimosa.lock"),
        format!(
            r#"{{"pid":1,"hostname":"busy-node","started":"{started}","input":"sub-01_ses-1_run-2_T1w.nii.gz"}}"#
        ),
    )
    .unwrap();

    fx.command()
        .arg("--skip_bids_validator")
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipping (locked by another run)"));

    let log = fx.args_log();
    assert_eq!(log.lines().count(), 10);
    assert!(!log.contains("sub-01_ses-1_run-2_T1w.nii.gz"));
    assert_eq!(fx.lock_files("mimosa_ses-1_run-2").len(), 1);
}

#[test]
fn test_interrupt_removes_lock_and_exits_130() {
    let fx = Fixture::new(
        r#"printf '%s\n' "$@" >> "$MIMOSA_ARGS_LOG"
sleep 5
"#,
    );

    let mut child = Command::new(env!("CARGO_BIN_EXE_mimosa"))
        .args(fx.run_args())
        .arg("--skip_bids_validator")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    // Wait until the first pair is running, with its lock held
    let deadline = Instant::now() + Duration::from_secs(20);
    while fx.args_log().is_empty() {
        assert!(Instant::now() < deadline, "segmentation never started");
        thread::sleep(Duration::from_millis(50));
    }
    assert_eq!(fx.lock_files("mimosa_ses-1_run-2").len(), 1);

    let status = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(130));
    assert!(fx.lock_files("mimosa_ses-1_run-2").is_empty());
    // The second pair never started
    assert_eq!(fx.args_log().lines().count(), 10);
}
