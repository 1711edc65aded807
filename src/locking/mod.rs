//! File locking for participant runs that share an output directory.

mod file_lock;

pub use file_lock::{FileLock, LockInfo, cleanup_all_locks};
