//! Per-node process lifecycle.
//!
//! ```text
//! Stopped ──spawned──▶ Starting ──became-ready──▶ Ready
//!                         │                         │
//!                         └──▶ Killed ◀─────────────┘   (exited or killed)
//! Killed ──spawned──▶ Starting
//! ```
//!
//! A process id is held exactly while the node is `Starting` or `Ready`.

use std::fmt;

/// Lifecycle state of one node process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Never launched.
    #[default]
    Stopped,
    /// Launched, not yet ready.
    Starting,
    /// Launched and ready.
    Ready,
    /// Terminated by the harness or exited on its own.
    Killed,
}

impl LifecycleState {
    /// Whether a process is running in this state.
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Starting | Self::Ready)
    }

    /// Whether a relaunch may start from this state.
    pub const fn can_launch(self) -> bool {
        matches!(self, Self::Stopped | Self::Killed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Killed => "killed",
        };
        f.write_str(name)
    }
}

/// Something that happened to a node process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A process was spawned with this id.
    Spawned(u32),
    /// The process passed its readiness check.
    BecameReady,
    /// The process exited without being asked to.
    Exited,
    /// The harness terminated the process.
    Killed,
}

impl LifecycleEvent {
    const fn name(self) -> &'static str {
        match self {
            Self::Spawned(_) => "spawned",
            Self::BecameReady => "became-ready",
            Self::Exited => "exited",
            Self::Killed => "killed",
        }
    }
}

/// An event that is not valid in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {event} while {from}")]
pub struct InvalidTransition {
    /// State the event was applied to.
    pub from: LifecycleState,
    /// Name of the rejected event.
    pub event: &'static str,
}

/// Lifecycle state plus the id of the running process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lifecycle {
    state: LifecycleState,
    pid: Option<u32>,
}

impl Lifecycle {
    /// A node that has never been launched.
    pub const fn new() -> Self {
        Self { state: LifecycleState::Stopped, pid: None }
    }

    /// Current state.
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Id of the running process.
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether a process is running.
    pub const fn is_alive(&self) -> bool {
        self.pid.is_some()
    }

    /// Apply an event. Rejected events leave the lifecycle untouched.
    ///
    /// `Killed` on a node that is not running is a no-op.
    pub fn apply(&mut self, event: LifecycleEvent) -> Result<LifecycleState, InvalidTransition> {
        use LifecycleEvent as E;
        use LifecycleState as S;

        let (state, pid) = match (self.state, event) {
            (S::Stopped | S::Killed, E::Spawned(pid)) => (S::Starting, Some(pid)),
            (S::Starting, E::BecameReady) => (S::Ready, self.pid),
            (S::Starting | S::Ready, E::Exited | E::Killed) => (S::Killed, None),
            (S::Stopped | S::Killed, E::Killed) => (self.state, None),
            (from, event) => return Err(InvalidTransition { from, event: event.name() }),
        };
        self.state = state;
        self.pid = pid;
        Ok(state)
    }
}
