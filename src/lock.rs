use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    process,
};

use thiserror::Error;

use crate::{warn, DEBUG_NAME};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Another lifegrid process is already running (PID: {0})")]
    AlreadyRunning(u32),
    #[error("lock file error: {0}")]
    Io(#[from] io::Error),
}

/// Advisory single-instance lock. The exclusive create is the race breaker;
/// the pid-liveness probe only reclaims markers left by dead processes.
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        if path.exists() {
            match read_owner_pid(path) {
                Some(pid) if process_is_alive(pid) => {
                    return Err(LockError::AlreadyRunning(pid));
                }
                Some(pid) => {
                    warn!(
                        "[{}] Removing stale lock from dead process (PID: {})",
                        DEBUG_NAME, pid
                    );
                    let _ = fs::remove_file(path);
                }
                None => {
                    warn!("[{}] Removing corrupted lock file", DEBUG_NAME);
                    let _ = fs::remove_file(path);
                }
            }
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                // Another process won the create between our check and now.
                let pid = read_owner_pid(path).unwrap_or(0);
                return Err(LockError::AlreadyRunning(pid));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = file.write_all(process::id().to_string().as_bytes()) {
            drop(file);
            let _ = fs::remove_file(path);
            return Err(e.into());
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Best-effort delete; never raises.
    pub fn release(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release();
    }
}

fn read_owner_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    // A process can always signal itself.
    if pid == process::id() {
        return true;
    }

    // A missing /proc entry already means the pid is gone.
    if Path::new("/proc").is_dir() && !Path::new("/proc").join(pid.to_string()).exists() {
        return false;
    }

    // `kill -0` delivers no signal, only the existence/permission check; a
    // pid this user cannot signal reads as dead.
    process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(windows)]
fn process_is_alive(pid: u32) -> bool {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

    unsafe {
        match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false.into(), pid) {
            Ok(handle) => {
                let _ = CloseHandle(handle);
                true
            }
            Err(_) => false,
        }
    }
}
