//! Run exclusivity lock
//!
//! At most one cleanup runs against a state directory. The lock file holds
//! the owner pid and start time while a run is active; a file left by a dead
//! process is taken over. The file is never unlinked, so every run locks the
//! same inode.

use crate::{CleanerError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// File name of the lock inside the state directory
pub const LOCK_FILE: &str = "cleaner.lock";

/// Held for the duration of a run, released on drop
pub struct RunLock {
    path: PathBuf,
    file: File,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LockOwner {
    pub pid: u32,
    pub started_at: i64,
}

impl RunLock {
    /// Take the lock, failing with `AlreadyRunning` while another run holds it
    pub fn acquire(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir)?;
        let path = state_dir.join(LOCK_FILE);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        // The kernel drops the flock with its holder, so a failure means a live run
        if !try_lock_exclusive(&file)? {
            let holder = read_owner(&mut file).map(|owner| owner.pid);
            tracing::debug!(lock = %path.display(), holder = ?holder, "Cleanup lock is held");
            return Err(CleanerError::AlreadyRunning);
        }

        if let Some(previous) = read_owner(&mut file) {
            if !is_process_alive(previous.pid) {
                tracing::warn!(lock = %path.display(), pid = previous.pid, "Taking over lock left by a dead process");
            }
        }
        write_owner(&mut file)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Emptied while the flock is still held; the unlock follows when `file` closes
        if let Err(e) = self.file.set_len(0) {
            tracing::debug!(lock = %self.path.display(), "Failed to clear lock owner: {}", e);
        }
    }
}

/// Owner of the lock in `state_dir`, if a run holds it
pub fn current_owner(state_dir: &Path) -> Option<LockOwner> {
    let content = std::fs::read_to_string(state_dir.join(LOCK_FILE)).ok()?;
    let owner: LockOwner = serde_json::from_str(&content).ok()?;
    is_process_alive(owner.pid).then_some(owner)
}

fn write_owner(file: &mut File) -> Result<()> {
    let owner = LockOwner {
        pid: std::process::id(),
        started_at: chrono::Utc::now().timestamp_millis(),
    };
    let serialized = serde_json::to_string(&owner)
        .map_err(|e| CleanerError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serialized.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn read_owner(file: &mut File) -> Option<LockOwner> {
    file.seek(SeekFrom::Start(0)).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    serde_json::from_str(&content).ok()
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(CleanerError::Io(e.into())),
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> Result<bool> {
    Ok(true)
}

#[cfg(target_os = "linux")]
fn is_process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(_) => true,
    }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_run_is_refused() {
        let temp_dir = TempDir::new().unwrap();

        let first = RunLock::acquire(temp_dir.path()).unwrap();
        assert!(matches!(
            RunLock::acquire(temp_dir.path()),
            Err(CleanerError::AlreadyRunning)
        ));
        assert_eq!(current_owner(temp_dir.path()).unwrap().pid, std::process::id());

        drop(first);
        assert!(current_owner(temp_dir.path()).is_none());
        assert!(RunLock::acquire(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_lock_file_emptied_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let lock = RunLock::acquire(temp_dir.path()).unwrap();
        let path = lock.path().to_path_buf();
        assert!(!std::fs::read_to_string(&path).unwrap().is_empty());
        drop(lock);

        assert!(path.exists());
        assert!(std::fs::read_to_string(&path).unwrap().is_empty());
        assert!(current_owner(temp_dir.path()).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_every_run_locks_the_same_inode() {
        use std::os::unix::fs::MetadataExt;

        let temp_dir = TempDir::new().unwrap();
        let first = RunLock::acquire(temp_dir.path()).unwrap();
        let inode = std::fs::metadata(first.path()).unwrap().ino();
        drop(first);

        let second = RunLock::acquire(temp_dir.path()).unwrap();
        assert_eq!(std::fs::metadata(second.path()).unwrap().ino(), inode);
        assert!(matches!(
            RunLock::acquire(temp_dir.path()),
            Err(CleanerError::AlreadyRunning)
        ));
    }

    #[test]
    fn test_leftover_file_without_flock_is_reused() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(LOCK_FILE),
            r#"{"pid":999999,"started_at":0}"#,
        )
        .unwrap();
        assert!(current_owner(temp_dir.path()).is_none());
        assert!(RunLock::acquire(temp_dir.path()).is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_liveness() {
        assert!(is_process_alive(std::process::id()));
        assert!(!is_process_alive(999_999));
    }
}
