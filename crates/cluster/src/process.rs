//! Signal delivery and bounded waits on child processes.

use std::{
    io,
    os::unix::ffi::OsStrExt,
    path::Path,
    process::ExitStatus,
    time::{Duration, Instant},
};

use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use tokio::process::Child;
use tracing::{debug, warn};

/// How a terminated child went away.
#[derive(Debug)]
pub(crate) enum Termination {
    /// Exited within the grace period.
    Exited(ExitStatus),
    /// Ignored the signal and was killed.
    ForceKilled,
}

/// Send `sig` to the child and wait up to `grace` for it to exit, then SIGKILL it.
pub(crate) async fn terminate(
    child: &mut Child,
    sig: Signal,
    grace: Duration,
) -> Result<Termination, TerminateError> {
    if let Some(status) = child.try_wait().map_err(TerminateError::Io)? {
        return Ok(Termination::Exited(status));
    }
    if let Some(pid) = child.id() {
        let target = signal_target(pid).ok_or(TerminateError::Signal(Errno::EINVAL))?;
        match signal::kill(target, sig) {
            // Already gone; the wait below reaps it.
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => return Err(TerminateError::Signal(e)),
        }
    }
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => {
            let status = status.map_err(TerminateError::Io)?;
            debug!(?status, "child exited");
            Ok(Termination::Exited(status))
        }
        Err(_) => {
            warn!(?grace, signal = ?sig, "child ignored signal, sending SIGKILL");
            child.kill().await.map_err(TerminateError::Io)?;
            Ok(Termination::ForceKilled)
        }
    }
}

/// The pid to signal. Out-of-range ids are refused rather than clamped onto
/// some other process.
fn signal_target(raw: u32) -> Option<Pid> {
    i32::try_from(raw).ok().filter(|pid| *pid > 0).map(Pid::from_raw)
}

/// File in a node's data directory holding the pid of its latest launch.
pub(crate) const PID_FILE: &str = "node.pid";

/// SIGKILL a node left running in `data_dir` by an earlier harness run and
/// wait up to `grace` for it to go away.
///
/// The recorded pid is only trusted while that process's command line still
/// names `data_dir`, so a recycled pid is never signalled. Returns the pid
/// that was killed.
pub(crate) async fn kill_leftover(data_dir: &Path, grace: Duration) -> io::Result<Option<u32>> {
    let recorded = match std::fs::read_to_string(data_dir.join(PID_FILE)) {
        Ok(recorded) => recorded,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let Some((raw, pid)) = recorded
        .trim()
        .parse::<u32>()
        .ok()
        .and_then(|raw| signal_target(raw).map(|pid| (raw, pid)))
    else {
        warn!(dir = %data_dir.display(), "ignoring malformed pid file");
        return Ok(None);
    };
    if !runs_in(raw, data_dir) {
        return Ok(None);
    }

    warn!(pid = raw, dir = %data_dir.display(), "killing node left over from an earlier run");
    match signal::kill(pid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => return Err(e.into()),
    }
    let deadline = Instant::now() + grace;
    while runs_in(raw, data_dir) {
        if Instant::now() >= deadline {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("leftover node {raw} survived SIGKILL"),
            ));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(Some(raw))
}

/// Whether process `pid` is alive with `data_dir` among its arguments.
/// Exited (including zombie) processes have an empty command line.
fn runs_in(pid: u32, data_dir: &Path) -> bool {
    let Ok(cmdline) = std::fs::read(format!("/proc/{pid}/cmdline")) else { return false };
    let needle = data_dir.as_os_str().as_bytes();
    cmdline.split(|b| *b == 0).any(|arg| arg == needle)
}

/// Failure while terminating a child.
#[derive(Debug)]
pub(crate) enum TerminateError {
    Signal(nix::Error),
    Io(std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_target_rejects_unrepresentable_pids() {
        assert_eq!(signal_target(4242), Some(Pid::from_raw(4242)));
        assert_eq!(signal_target(0), None);
        assert_eq!(signal_target(u32::MAX), None);
        assert_eq!(signal_target(i32::MAX as u32 + 1), None);
    }

    #[tokio::test]
    async fn test_stale_pid_file_is_not_trusted() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(kill_leftover(dir.path(), Duration::ZERO).await.unwrap(), None);

        // Our own pid is alive, but its command line does not name the directory.
        std::fs::write(dir.path().join(PID_FILE), std::process::id().to_string()).unwrap();
        assert_eq!(kill_leftover(dir.path(), Duration::ZERO).await.unwrap(), None);

        std::fs::write(dir.path().join(PID_FILE), "not a pid").unwrap();
        assert_eq!(kill_leftover(dir.path(), Duration::ZERO).await.unwrap(), None);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_leftover_running_in_data_dir_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("node_01");
        std::fs::create_dir_all(&data_dir).unwrap();
        let mut child = tokio::process::Command::new("/bin/sh")
            .arg("-c")
            .arg("while :; do sleep 1; done")
            .arg(&data_dir)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        std::fs::write(data_dir.join(PID_FILE), pid.to_string()).unwrap();

        let killed = kill_leftover(&data_dir, Duration::from_secs(5)).await.unwrap();
        assert_eq!(killed, Some(pid));
        assert!(!child.wait().await.unwrap().success());
    }
}
