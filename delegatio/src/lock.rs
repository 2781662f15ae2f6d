//! Exclusive ownership of a delegatio home directory.
//!
//! Two orchestrators driving the same libvirt resources would tear down each
//! other's nodes. The home directory is guarded by an advisory `flock` on
//! `<home>/.lock`, which also records the holder's process id so a rejected
//! caller can name it.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::filenames;
use delegatio_shared::{DelegatioError, DelegatioResult};

/// Held for the lifetime of an orchestrator. Released on drop or process exit.
#[derive(Debug)]
pub struct HostLock {
    file: File,
    path: PathBuf,
}

impl HostLock {
    /// Take the home-directory lock without waiting.
    ///
    /// # Arguments
    /// * `home_dir` - delegatio home; created with its parents if missing
    ///
    /// # Errors
    /// * `Storage` naming the holder's pid when another orchestrator owns
    ///   the directory
    /// * `Storage` when the directory or lock file cannot be created
    pub fn acquire(home_dir: &Path) -> DelegatioResult<Self> {
        std::fs::create_dir_all(home_dir).map_err(|e| {
            DelegatioError::Storage(format!(
                "cannot create home directory {}: {}",
                home_dir.display(),
                e
            ))
        })?;

        let path = home_dir.join(filenames::LOCK_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                DelegatioError::Storage(format!("cannot open {}: {}", path.display(), e))
            })?;

        if let Err(err) = try_exclusive(&file) {
            if err.kind() != std::io::ErrorKind::WouldBlock {
                return Err(DelegatioError::Storage(format!(
                    "cannot lock {}: {}",
                    path.display(),
                    err
                )));
            }
            let holder = std::fs::read_to_string(&path).unwrap_or_default();
            let holder = match holder.trim() {
                "" => String::new(),
                pid => format!(" (pid {})", pid),
            };
            return Err(DelegatioError::Storage(format!(
                "Another delegatio orchestrator is already using directory: {}{}",
                home_dir.display(),
                holder
            )));
        }

        record_holder(&mut file)
            .map_err(|e| DelegatioError::Storage(format!("cannot write {}: {}", path.display(), e)))?;
        tracing::debug!(lock_path = %path.display(), pid = std::process::id(), "home directory locked");

        Ok(HostLock { file, path })
    }

    /// Location of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn record_holder(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()
}

#[cfg(unix)]
fn try_exclusive(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_exclusive(_file: &File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    // SAFETY: as above.
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

impl Drop for HostLock {
    fn drop(&mut self) {
        // Forget the recorded pid before unlocking.
        let _ = self.file.set_len(0);
        #[cfg(unix)]
        unlock(&self.file);
        tracing::debug!(lock_path = %self.path.display(), "home directory unlocked");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_orchestrator_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let _held = HostLock::acquire(temp_dir.path()).unwrap();

        let err = HostLock::acquire(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("already using directory"));
    }

    #[test]
    fn rejection_names_the_holder() {
        let temp_dir = TempDir::new().unwrap();
        let _held = HostLock::acquire(temp_dir.path()).unwrap();

        let err = HostLock::acquire(temp_dir.path()).unwrap_err();
        assert!(
            err.to_string().contains(&format!("(pid {})", std::process::id())),
            "{err}"
        );
    }

    #[test]
    fn lock_released_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        {
            let lock = HostLock::acquire(temp_dir.path()).unwrap();
            assert_eq!(lock.path(), temp_dir.path().join(".lock"));
        }
        assert_eq!(std::fs::read_to_string(temp_dir.path().join(".lock")).unwrap(), "");
        let _again = HostLock::acquire(temp_dir.path()).unwrap();
    }

    #[test]
    fn creates_missing_home() {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path().join("nested").join("home");
        let _lock = HostLock::acquire(&home).unwrap();
        assert!(home.join(".lock").exists());
    }
}
