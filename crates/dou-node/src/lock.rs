// Host-wide single-instance guard.
//
// An exclusive NON-BLOCKING flock on <data_dir>/dou-node.lock. Advisory and
// host-local only — this is not a distributed mutual-exclusion primitive.
// The second process on the same host fails fast with AlreadyRunning before
// any socket is bound.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::NodeError;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

pub const LOCK_FILE_NAME: &str = "dou-node.lock";

/// Held for the lifetime of the process; dropping it (or process exit)
/// releases the flock via the closed file descriptor.
pub struct ProcessLock {
    _file: File,
    path: PathBuf,
}

impl ProcessLock {
    /// Acquire the exclusive lock, failing fast if another process holds it.
    pub fn acquire(data_dir: &Path) -> Result<Self, NodeError> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        Self::try_flock(&file, &path)?;

        Ok(Self { _file: file, path })
    }

    #[cfg(unix)]
    fn try_flock(file: &File, path: &Path) -> Result<(), NodeError> {
        // LOCK_EX | LOCK_NB: exclusive, non-blocking. WouldBlock means a
        // live process holds it; anything else is a real I/O failure.
        let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if ret == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::WouldBlock {
            Err(NodeError::AlreadyRunning(path.display().to_string()))
        } else {
            Err(NodeError::Io(err))
        }
    }

    #[cfg(not(unix))]
    fn try_flock(_file: &File, _path: &Path) -> Result<(), NodeError> {
        // Non-Unix: no advisory lock available; rely on the port bind to
        // surface a second instance.
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_second_lock_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let first = ProcessLock::acquire(dir.path()).expect("first lock");

        match ProcessLock::acquire(dir.path()) {
            Err(NodeError::AlreadyRunning(path)) => {
                assert!(path.ends_with(LOCK_FILE_NAME));
            }
            Err(e) => panic!("expected AlreadyRunning, got {}", e),
            Ok(_) => panic!("second lock unexpectedly succeeded"),
        }

        drop(first);
        // Released on drop — a new process (or this one) can re-acquire.
        ProcessLock::acquire(dir.path()).expect("re-acquire after release");
    }
}
