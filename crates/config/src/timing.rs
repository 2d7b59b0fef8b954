//! Timeouts, settle windows and readiness detection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default time a relaunched node has to become ready.
pub const DEFAULT_RELAUNCH_TIMEOUT_MS: u64 = 5_000;

/// Default multiple of the relaunch timeout granted to the initial fleet launch.
pub const DEFAULT_LAUNCH_TIMEOUT_MULTIPLIER: u32 = 4;

/// Default time a node has to exit after a termination signal.
pub const DEFAULT_KILL_TIMEOUT_MS: u64 = 10_000;

/// Default interval between readiness polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default timeout of a single status query.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

/// Default production time after launch, so LIB is advancing before scenarios start.
pub const DEFAULT_WARMUP_MS: u64 = 60_000;

/// Default wait after pausing production before LIB is treated as stable.
pub const DEFAULT_PAUSE_SETTLE_MS: u64 = 5_000;

/// Default wait for a replay to finish before probing.
pub const DEFAULT_REPLAY_SETTLE_MS: u64 = 10_000;

/// Default wait before checking the head moved under active production.
pub const DEFAULT_PRODUCTION_SETTLE_MS: u64 = 2_000;

/// How the harness decides a freshly launched node is ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Readiness {
    /// The node answers its status query.
    #[default]
    Status,
    /// The process is still running after a grace period.
    Liveness {
        /// Grace period in milliseconds.
        grace_ms: u64,
    },
}

/// Timing knobs for process control.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimingConfig {
    /// Time a relaunched node has to become ready, in milliseconds.
    #[serde(default = "default_relaunch_timeout_ms")]
    pub relaunch_timeout_ms: u64,

    /// Fleet launch deadline as a multiple of the relaunch timeout.
    #[serde(default = "default_launch_timeout_multiplier")]
    pub launch_timeout_multiplier: u32,

    /// Time a node has to exit after a termination signal, in milliseconds.
    #[serde(default = "default_kill_timeout_ms")]
    pub kill_timeout_ms: u64,

    /// Interval between readiness polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Timeout of a single status query, in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Production time after launch, in milliseconds.
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    /// Wait after pausing production, in milliseconds.
    #[serde(default = "default_pause_settle_ms")]
    pub pause_settle_ms: u64,

    /// Wait for a replay to finish, in milliseconds.
    #[serde(default = "default_replay_settle_ms")]
    pub replay_settle_ms: u64,

    /// Wait before checking progress under production, in milliseconds.
    #[serde(default = "default_production_settle_ms")]
    pub production_settle_ms: u64,

    /// Readiness detection.
    #[serde(default)]
    pub readiness: Readiness,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            relaunch_timeout_ms: DEFAULT_RELAUNCH_TIMEOUT_MS,
            launch_timeout_multiplier: DEFAULT_LAUNCH_TIMEOUT_MULTIPLIER,
            kill_timeout_ms: DEFAULT_KILL_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            warmup_ms: DEFAULT_WARMUP_MS,
            pause_settle_ms: DEFAULT_PAUSE_SETTLE_MS,
            replay_settle_ms: DEFAULT_REPLAY_SETTLE_MS,
            production_settle_ms: DEFAULT_PRODUCTION_SETTLE_MS,
            readiness: Readiness::default(),
        }
    }
}

impl TimingConfig {
    /// Time a relaunched node has to become ready.
    pub const fn relaunch_timeout(&self) -> Duration {
        Duration::from_millis(self.relaunch_timeout_ms)
    }

    /// Deadline for the whole fleet to become ready at launch.
    pub const fn launch_timeout(&self) -> Duration {
        Duration::from_millis(
            self.relaunch_timeout_ms.saturating_mul(self.launch_timeout_multiplier as u64),
        )
    }

    /// Time a node has to exit after a termination signal.
    pub const fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }

    /// Interval between readiness polls.
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Timeout of a single status query.
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Production time after launch.
    pub const fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    /// Wait after pausing production.
    pub const fn pause_settle(&self) -> Duration {
        Duration::from_millis(self.pause_settle_ms)
    }

    /// Wait for a replay to finish.
    pub const fn replay_settle(&self) -> Duration {
        Duration::from_millis(self.replay_settle_ms)
    }

    /// Wait before checking progress under production.
    pub const fn production_settle(&self) -> Duration {
        Duration::from_millis(self.production_settle_ms)
    }
}

const fn default_relaunch_timeout_ms() -> u64 {
    DEFAULT_RELAUNCH_TIMEOUT_MS
}

const fn default_launch_timeout_multiplier() -> u32 {
    DEFAULT_LAUNCH_TIMEOUT_MULTIPLIER
}

const fn default_kill_timeout_ms() -> u64 {
    DEFAULT_KILL_TIMEOUT_MS
}

const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

const fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

const fn default_warmup_ms() -> u64 {
    DEFAULT_WARMUP_MS
}

const fn default_pause_settle_ms() -> u64 {
    DEFAULT_PAUSE_SETTLE_MS
}

const fn default_replay_settle_ms() -> u64 {
    DEFAULT_REPLAY_SETTLE_MS
}

const fn default_production_settle_ms() -> u64 {
    DEFAULT_PRODUCTION_SETTLE_MS
}
