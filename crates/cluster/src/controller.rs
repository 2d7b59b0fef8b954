//! Lifecycle control of a single node process.

use std::{
    fmt,
    fs::File,
    path::PathBuf,
    process::Stdio,
    time::Duration,
};

use nix::sys::signal::Signal;
use readmode_config::{Readiness, TimingConfig};
use readmode_domain::{FlagMutation, StatusSnapshot};
use tokio::{
    process::{Child, Command},
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    ControllerError, LifecycleEvent, LogScanner, NodeHandle, ProbeError, StatusProbe,
    process::{self, TerminateError, Termination},
};

/// How a launch attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaunchOutcome {
    /// The node passed its readiness check.
    Ready,
    /// The process exited before becoming ready; its stderr capture is kept.
    Exited {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
    },
    /// The process is still running but never became ready.
    TimedOut,
}

impl RelaunchOutcome {
    /// Whether the node came up.
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for RelaunchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("ready"),
            Self::Exited { code: Some(code) } => write!(f, "exited with code {code}"),
            Self::Exited { code: None } => f.write_str("terminated by signal"),
            Self::TimedOut => f.write_str("timed out waiting for readiness"),
        }
    }
}

/// Timing used by a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerTiming {
    /// Grace period between the termination signal and SIGKILL.
    pub kill_timeout: Duration,
    /// Interval between readiness checks.
    pub poll_interval: Duration,
    /// Readiness detection.
    pub readiness: Readiness,
}

impl From<&TimingConfig> for ControllerTiming {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            kill_timeout: timing.kill_timeout(),
            poll_interval: timing.poll_interval(),
            readiness: timing.readiness,
        }
    }
}

/// Owns one node process and its [`NodeHandle`].
///
/// Arguments are split in two: `fixed_args` (data directory, endpoints,
/// peers, producer settings) are set by the cluster and never change, while
/// the handle's flag set is what [`FlagMutation`]s edit.
#[derive(Debug)]
pub struct ProcessController {
    handle: NodeHandle,
    binary: PathBuf,
    fixed_args: Vec<String>,
    probe: StatusProbe,
    timing: ControllerTiming,
    child: Option<Child>,
    started_at: Option<Instant>,
    launches: u64,
}

impl ProcessController {
    /// Controller for a node that has not been launched.
    pub fn new(
        handle: NodeHandle,
        binary: PathBuf,
        fixed_args: Vec<String>,
        probe: StatusProbe,
        timing: ControllerTiming,
    ) -> Self {
        Self {
            handle,
            binary,
            fixed_args,
            probe,
            timing,
            child: None,
            started_at: None,
            launches: 0,
        }
    }

    /// The node's handle.
    pub const fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    /// Full argument list the next launch will use.
    pub fn command_line(&self) -> Vec<String> {
        let mut args = self.fixed_args.clone();
        args.extend(self.handle.flags.to_args());
        args
    }

    /// Launch the process without waiting for readiness.
    pub fn start(&mut self) -> Result<(), ControllerError> {
        let node = self.handle.id();
        if !self.handle.state().can_launch() {
            return Err(ControllerError::Lifecycle {
                node,
                source: crate::InvalidTransition {
                    from: self.handle.state(),
                    event: "spawned",
                },
            });
        }
        self.handle.flags.read_mode().map_err(|source| ControllerError::Flags { node, source })?;

        let data_dir = self.handle.data_dir().to_path_buf();
        let io = |source| ControllerError::Io { node, source };
        std::fs::create_dir_all(&data_dir).map_err(io)?;

        self.launches += 1;
        let token = LogScanner::capture_token(self.launches);
        let stderr = File::create(data_dir.join(LogScanner::capture_file_name(&token))).map_err(io)?;
        let stdout = File::create(data_dir.join(format!("stdout.{token}.txt"))).map_err(io)?;

        let args = self.command_line();
        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ControllerError::Spawn {
                node,
                binary: self.binary.clone(),
                source,
            })?;
        let pid = child.id().unwrap_or_default();
        std::fs::write(data_dir.join(process::PID_FILE), pid.to_string()).map_err(io)?;
        self.handle
            .lifecycle
            .apply(LifecycleEvent::Spawned(pid))
            .map_err(|source| ControllerError::Lifecycle { node, source })?;
        self.child = Some(child);
        self.started_at = Some(Instant::now());

        info!(%node, pid, flags = %self.handle.flags, "launched node");
        debug!(%node, ?args, "command line");
        Ok(())
    }

    /// Poll until the node is ready, exits, or `timeout` elapses.
    pub async fn wait_ready(&mut self, timeout: Duration) -> Result<RelaunchOutcome, ControllerError> {
        let node = self.handle.id();
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(code) = self.reap()? {
                warn!(%node, ?code, "node exited before becoming ready");
                return Ok(RelaunchOutcome::Exited { code });
            }
            if self.is_ready_now().await {
                self.handle
                    .lifecycle
                    .apply(LifecycleEvent::BecameReady)
                    .map_err(|source| ControllerError::Lifecycle { node, source })?;
                info!(%node, "node ready");
                return Ok(RelaunchOutcome::Ready);
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(%node, ?timeout, "node did not become ready");
                return Ok(RelaunchOutcome::TimedOut);
            }
            tokio::time::sleep(self.timing.poll_interval.min(deadline - now)).await;
        }
    }

    /// Apply `mutations` to the persisted flags, launch, and wait up to `timeout`.
    ///
    /// If the launch is rejected the flags are left as they were. Only valid
    /// from `Stopped` or `Killed`. On `TimedOut` the process is
    /// left running so the caller can decide whether to kill it.
    pub async fn relaunch(
        &mut self,
        mutations: &[FlagMutation],
        timeout: Duration,
    ) -> Result<RelaunchOutcome, ControllerError> {
        let node = self.handle.id();
        let state = self.handle.state();
        if !state.can_launch() {
            return Err(ControllerError::Lifecycle {
                node,
                source: crate::InvalidTransition { from: state, event: "spawned" },
            });
        }
        let mut flags = self.handle.flags.clone();
        for mutation in mutations {
            debug!(%node, %mutation, "mutating flags");
            flags.apply(mutation);
        }
        flags.read_mode().map_err(|source| ControllerError::Flags { node, source })?;

        // Mutations only persist once the node has actually been spawned with them.
        let previous = std::mem::replace(&mut self.handle.flags, flags);
        if let Err(e) = self.start() {
            self.handle.flags = previous;
            return Err(e);
        }
        self.wait_ready(timeout).await
    }

    /// Send `signal` and wait for the process to exit. No-op if it is not running.
    pub async fn kill(&mut self, signal: Signal) -> Result<(), ControllerError> {
        let node = self.handle.id();
        self.reap()?;
        let Some(mut child) = self.child.take() else {
            debug!(%node, state = %self.handle.state(), "kill on stopped node is a no-op");
            return Ok(());
        };
        let result = process::terminate(&mut child, signal, self.timing.kill_timeout).await;
        self.started_at = None;
        self.handle
            .lifecycle
            .apply(LifecycleEvent::Killed)
            .map_err(|source| ControllerError::Lifecycle { node, source })?;
        match result {
            Ok(Termination::Exited(status)) => info!(%node, ?status, "node stopped"),
            Ok(Termination::ForceKilled) => warn!(%node, "node force-killed"),
            Err(TerminateError::Signal(source)) => {
                return Err(ControllerError::Signal { node, source });
            }
            Err(TerminateError::Io(source)) => return Err(ControllerError::Io { node, source }),
        }
        Ok(())
    }

    /// Refresh liveness from the real process. Returns whether it is running.
    pub fn refresh(&mut self) -> Result<bool, ControllerError> {
        self.reap()?;
        Ok(self.handle.is_alive())
    }

    /// Restore the flags the node was first launched with.
    pub fn reset_flags(&mut self) {
        self.handle.flags = self.handle.baseline().clone();
    }

    /// Refresh liveness, then query status.
    pub async fn status(&mut self) -> Result<StatusSnapshot, ProbeError> {
        if let Err(e) = self.refresh() {
            warn!(node = %self.handle.id(), error = %e, "failed to refresh liveness");
        }
        self.probe.get_status(&self.handle).await
    }

    /// If the child has exited, record it and return its exit code.
    fn reap(&mut self) -> Result<Option<Option<i32>>, ControllerError> {
        let node = self.handle.id();
        let Some(child) = self.child.as_mut() else { return Ok(None) };
        let Some(status) = child.try_wait().map_err(|source| ControllerError::Io { node, source })?
        else {
            return Ok(None);
        };
        self.child = None;
        self.started_at = None;
        self.handle
            .lifecycle
            .apply(LifecycleEvent::Exited)
            .map_err(|source| ControllerError::Lifecycle { node, source })?;
        Ok(Some(status.code()))
    }

    async fn is_ready_now(&self) -> bool {
        match self.timing.readiness {
            Readiness::Status => self.probe.get_status(&self.handle).await.is_ok(),
            Readiness::Liveness { grace_ms } => self
                .started_at
                .is_some_and(|started| started.elapsed() >= Duration::from_millis(grace_ms)),
        }
    }
}
