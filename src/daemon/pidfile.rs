//! Pid file handling for the background daemon.
//!
//! `daemonize` writes the pid file on start and the daemon removes it after
//! draining. `stop` only signals and waits; it deletes the file only when the
//! process is already gone and left it behind.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial implementation

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process exited after SIGTERM.
    Stopped { pid: i32 },
    /// The pid file named a process that no longer exists.
    Stale { pid: i32 },
}

pub fn read_pid(path: &Path) -> Result<i32> {
    let pid_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pid file: {:?}", path))?;
    let pid: i32 = pid_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid pid file: {:?}", path))?;
    if pid <= 0 {
        return Err(anyhow!("Invalid pid {} in {:?}", pid, path));
    }
    Ok(pid)
}

pub fn process_alive(pid: i32) -> bool {
    // SAFETY: signal 0 performs the permission and existence check only.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Send SIGTERM to the pid in `pid_file` and wait up to `timeout` for it to
/// exit.
pub fn stop(pid_file: &Path, timeout: Duration) -> Result<StopOutcome> {
    let pid = read_pid(pid_file)?;

    // SAFETY: read_pid only returns positive pids, so this signals one process.
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            let _ = std::fs::remove_file(pid_file);
            return Ok(StopOutcome::Stale { pid });
        }
        return Err(err).with_context(|| format!("Failed to signal pid {}", pid));
    }

    let deadline = Instant::now() + timeout;
    while process_alive(pid) {
        if Instant::now() >= deadline {
            return Err(anyhow!(
                "Daemon (pid {}) did not exit within {}s",
                pid,
                timeout.as_secs()
            ));
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    // Left behind only if the daemon died without cleaning up.
    if read_pid(pid_file).ok() == Some(pid) {
        let _ = std::fs::remove_file(pid_file);
    }
    Ok(StopOutcome::Stopped { pid })
}
