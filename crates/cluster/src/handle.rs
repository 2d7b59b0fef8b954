//! Node handle.

use std::path::{Path, PathBuf};

use readmode_domain::{FlagSet, NodeId, ReadMode};

use crate::{Lifecycle, LifecycleState};

/// Everything the harness knows about one node process.
///
/// The handle is owned by the node's [`ProcessController`](crate::ProcessController);
/// everyone else borrows it.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    id: NodeId,
    data_dir: PathBuf,
    status_url: String,
    pub(crate) flags: FlagSet,
    baseline: FlagSet,
    pub(crate) lifecycle: Lifecycle,
}

impl NodeHandle {
    /// Handle for a node that has not been launched yet.
    pub fn new(id: NodeId, data_dir: PathBuf, status_url: String, flags: FlagSet) -> Self {
        Self {
            id,
            data_dir,
            status_url,
            baseline: flags.clone(),
            flags,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Node id.
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// URL of the status endpoint.
    pub fn status_url(&self) -> &str {
        &self.status_url
    }

    /// Flags the next launch will use.
    pub const fn flags(&self) -> &FlagSet {
        &self.flags
    }

    /// Flags the node was first launched with.
    pub const fn baseline(&self) -> &FlagSet {
        &self.baseline
    }

    /// Read-mode of the current flags, if they name a valid one.
    pub fn read_mode(&self) -> Option<ReadMode> {
        self.flags.read_mode().ok()
    }

    /// Whether the process is running, as of the last refresh.
    pub const fn is_alive(&self) -> bool {
        self.lifecycle.is_alive()
    }

    /// Process id while running.
    pub const fn pid(&self) -> Option<u32> {
        self.lifecycle.pid()
    }

    /// Lifecycle state.
    pub const fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Path of the reversible block database.
    pub fn reversible_blocks_dir(&self) -> PathBuf {
        self.data_dir.join("blocks").join("reversible")
    }
}
