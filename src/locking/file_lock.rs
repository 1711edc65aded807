//! Per-scan lock files for participant runs sharing an output directory.
//!
//! The lock for a pair lives next to its results as
//! `<output_dir>/<t1w file name>.mimosa.lock` and is created with
//! `create_new`, so two processes can never segment the same scan into the
//! same directory at once. A lock whose holder died without cleaning up
//! (SIGKILL, OOM) is stale and may be reclaimed.

use crate::constants::LOCK_FILE_EXTENSION;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

/// Who holds a scan lock, written into the lock file.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process ID that holds the lock.
    pub pid: u32,
    /// Hostname of the machine.
    pub hostname: String,
    /// When the lock was acquired.
    pub started: DateTime<Utc>,
    /// T1w scan being segmented.
    pub input: PathBuf,
    /// Directory the segmentation writes to.
    #[serde(default)]
    pub output_dir: PathBuf,
}

fn current_hostname() -> String {
    hostname::get().map_or_else(
        |_| "unknown".to_string(),
        |h| h.to_string_lossy().into_owned(),
    )
}

/// Whether a process with this pid exists. Unknown off Linux, assumed alive.
fn process_alive(pid: u32) -> bool {
    if cfg!(target_os = "linux") {
        Path::new("/proc").join(pid.to_string()).exists()
    } else {
        true
    }
}

impl LockInfo {
    fn for_current_process(t1w: &Path, output_dir: &Path) -> Self {
        Self {
            pid: std::process::id(),
            hostname: current_hostname(),
            started: Utc::now(),
            input: t1w.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Read the holder of an existing lock file, if it is readable.
    pub fn read(lock_path: &Path) -> Option<Self> {
        let contents = fs::read_to_string(lock_path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Whether the holder is a process on this machine that no longer runs.
    pub fn holder_is_dead(&self) -> bool {
        self.hostname == current_hostname() && !process_alive(self.pid)
    }

    /// Time since the lock was taken.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.started).to_std().unwrap_or_default()
    }
}

/// Held lock on one T1w/output directory pair. Removed on drop.
#[derive(Debug)]
pub struct FileLock {
    lock_path: PathBuf,
}

impl FileLock {
    /// Take the lock for segmenting `t1w` into `output_dir`.
    ///
    /// Fails with [`Error::FileLocked`] when another run already holds it.
    pub fn acquire(t1w: &Path, output_dir: &Path) -> Result<Self> {
        let lock_path = Self::lock_path_for(t1w, output_dir);

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::FileLocked { path: lock_path });
            }
            Err(e) => {
                return Err(Error::LockCreate {
                    path: lock_path,
                    source: e,
                });
            }
        };

        // The lock is the file itself; its content is informational only
        let info = LockInfo::for_current_process(t1w, output_dir);
        if let Ok(json) = serde_json::to_vec_pretty(&info) {
            let _ = file.write_all(&json);
        }

        ACTIVE_LOCKS.track(&lock_path);
        Ok(Self { lock_path })
    }

    /// Lock file path for a scan segmented into `output_dir`.
    pub fn lock_path_for(t1w: &Path, output_dir: &Path) -> PathBuf {
        let mut name = t1w
            .file_name()
            .map_or_else(|| "scan".into(), ToOwned::to_owned);
        name.push(LOCK_FILE_EXTENSION);
        output_dir.join(name)
    }

    /// Whether some run currently holds the lock for this pair.
    pub fn is_locked(t1w: &Path, output_dir: &Path) -> bool {
        Self::lock_path_for(t1w, output_dir).exists()
    }

    /// Whether an existing lock was abandoned: its holder on this host is
    /// gone, or it is older than `max_age`. Unreadable locks are judged by
    /// file modification time.
    pub fn is_stale(t1w: &Path, output_dir: &Path, max_age: Duration) -> bool {
        let lock_path = Self::lock_path_for(t1w, output_dir);

        if let Some(info) = LockInfo::read(&lock_path) {
            return info.holder_is_dead() || info.age() > max_age;
        }
        if let Ok(metadata) = fs::metadata(&lock_path)
            && let Ok(modified) = metadata.modified()
        {
            return modified.elapsed().unwrap_or_default() > max_age;
        }
        false
    }

    /// Delete an abandoned lock so the pair can be segmented again.
    pub fn remove_stale(t1w: &Path, output_dir: &Path) -> Result<()> {
        let lock_path = Self::lock_path_for(t1w, output_dir);
        match fs::remove_file(&lock_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::LockRemove {
                path: lock_path,
                source: e,
            }),
        }
    }

    /// Path of the held lock file.
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
        ACTIVE_LOCKS.untrack(&self.lock_path);
    }
}

/// Lock files held by this process.
struct LockRegistry(Mutex<BTreeSet<PathBuf>>);

impl LockRegistry {
    fn track(&self, path: &Path) {
        if let Ok(mut held) = self.0.lock() {
            held.insert(path.to_path_buf());
        }
    }

    fn untrack(&self, path: &Path) {
        if let Ok(mut held) = self.0.lock() {
            held.remove(path);
        }
    }

    fn remove_all(&self) {
        if let Ok(mut held) = self.0.lock() {
            for path in std::mem::take(&mut *held) {
                let _ = fs::remove_file(path);
            }
        }
    }
}

static ACTIVE_LOCKS: LazyLock<LockRegistry> =
    LazyLock::new(|| LockRegistry(Mutex::new(BTreeSet::new())));

/// Delete every lock file this process holds. Called from the Ctrl+C handler.
pub fn cleanup_all_locks() {
    ACTIVE_LOCKS.remove_all();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_released_on_drop() {
        let out = TempDir::new().unwrap();
        let t1 = Path::new("/data/sub-01/anat/sub-01_T1w.nii.gz");

        let lock = FileLock::acquire(t1, out.path()).unwrap();
        assert!(FileLock::is_locked(t1, out.path()));
        assert!(lock.path().starts_with(out.path()));

        drop(lock);
        assert!(!FileLock::is_locked(t1, out.path()));
    }

    #[test]
    fn test_second_acquire_is_locked() {
        let out = TempDir::new().unwrap();
        let t1 = Path::new("sub-01_T1w.nii.gz");

        let _held = FileLock::acquire(t1, out.path()).unwrap();
        let second = FileLock::acquire(t1, out.path());
        assert!(matches!(second, Err(Error::FileLocked { .. })));
    }

    #[test]
    fn test_same_scan_different_output_dirs() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let t1 = Path::new("sub-01_T1w.nii.gz");

        let _first = FileLock::acquire(t1, a.path()).unwrap();
        assert!(FileLock::acquire(t1, b.path()).is_ok());
    }

    #[test]
    fn test_missing_output_dir_is_create_error() {
        let out = TempDir::new().unwrap();
        let result = FileLock::acquire(
            Path::new("sub-01_T1w.nii.gz"),
            &out.path().join("not-created"),
        );
        assert!(matches!(result, Err(Error::LockCreate { .. })));
    }

    #[test]
    fn test_lock_file_records_holder() {
        let out = TempDir::new().unwrap();
        let t1 = Path::new("/data/sub-02_T1w.nii");
        let lock = FileLock::acquire(t1, out.path()).unwrap();

        let info = LockInfo::read(lock.path()).unwrap();
        assert_eq!(info.pid, std::process::id());
        assert_eq!(info.input, t1);
        assert_eq!(info.output_dir, out.path());
    }

    fn write_foreign_lock(out: &Path, t1: &Path, info: &LockInfo) {
        let path = FileLock::lock_path_for(t1, out);
        fs::write(path, serde_json::to_vec(info).unwrap()).unwrap();
    }

    #[test]
    fn test_fresh_own_lock_is_not_stale() {
        let out = TempDir::new().unwrap();
        let t1 = Path::new("sub-05_T1w.nii.gz");
        let _lock = FileLock::acquire(t1, out.path()).unwrap();

        assert!(!FileLock::is_stale(t1, out.path(), Duration::from_secs(3600)));
    }

    #[test]
    fn test_old_lock_is_stale() {
        let out = TempDir::new().unwrap();
        let t1 = Path::new("sub-06_T1w.nii.gz");
        let info = LockInfo {
            pid: 1,
            hostname: "another-node".to_string(),
            started: "2020-01-01T00:00:00Z".parse().unwrap(),
            input: t1.to_path_buf(),
            output_dir: out.path().to_path_buf(),
        };
        write_foreign_lock(out.path(), t1, &info);

        assert!(FileLock::is_stale(t1, out.path(), Duration::from_secs(86_400)));

        FileLock::remove_stale(t1, out.path()).unwrap();
        assert!(!FileLock::is_locked(t1, out.path()));
        assert!(FileLock::acquire(t1, out.path()).is_ok());
    }

    #[test]
    fn test_recent_lock_on_other_host_is_held() {
        let out = TempDir::new().unwrap();
        let t1 = Path::new("sub-07_T1w.nii.gz");
        let info = LockInfo {
            pid: 1,
            hostname: "another-node".to_string(),
            started: Utc::now(),
            input: t1.to_path_buf(),
            output_dir: out.path().to_path_buf(),
        };
        write_foreign_lock(out.path(), t1, &info);

        assert!(!FileLock::is_stale(t1, out.path(), Duration::from_secs(86_400)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_lock_of_dead_local_process_is_stale() {
        let out = TempDir::new().unwrap();
        let t1 = Path::new("sub-08_T1w.nii.gz");
        // Above the kernel's pid_max, so never a live process
        let info = LockInfo {
            pid: 999_999_999,
            hostname: current_hostname(),
            started: Utc::now(),
            input: t1.to_path_buf(),
            output_dir: out.path().to_path_buf(),
        };
        write_foreign_lock(out.path(), t1, &info);

        assert!(FileLock::is_stale(t1, out.path(), Duration::from_secs(86_400)));
    }

    #[test]
    fn test_unreadable_lock_judged_by_mtime() {
        let out = TempDir::new().unwrap();
        let t1 = Path::new("sub-09_T1w.nii.gz");
        fs::write(FileLock::lock_path_for(t1, out.path()), b"").unwrap();

        assert!(!FileLock::is_stale(t1, out.path(), Duration::from_secs(3600)));
    }

    #[test]
    fn test_remove_missing_stale_lock_is_ok() {
        let out = TempDir::new().unwrap();
        assert!(FileLock::remove_stale(Path::new("sub-10_T1w.nii.gz"), out.path()).is_ok());
    }

    #[test]
    fn test_lock_path_for_scan() {
        let path = FileLock::lock_path_for(
            Path::new("/data/sub-01_ses-a_T1w.nii.gz"),
            Path::new("/output"),
        );
        assert_eq!(
            path,
            PathBuf::from("/output/sub-01_ses-a_T1w.nii.gz.mimosa.lock")
        );
    }

    #[test]
    fn test_registry_removes_tracked_files() {
        let out = TempDir::new().unwrap();
        let registry = LockRegistry(Mutex::new(BTreeSet::new()));
        let held = out.path().join("sub-03_T1w.nii.gz.mimosa.lock");
        let released = out.path().join("sub-04_T1w.nii.gz.mimosa.lock");
        fs::write(&held, b"").unwrap();
        fs::write(&released, b"").unwrap();

        registry.track(&held);
        registry.track(&released);
        registry.untrack(&released);
        registry.remove_all();

        assert!(!held.exists());
        assert!(released.exists());
    }
}
