//! Error types for cluster and process control.

use std::path::PathBuf;

use readmode_config::ConfigError;
use readmode_domain::{FlagParseError, NodeId};

use crate::{InvalidTransition, RelaunchOutcome};

/// Errors from a single status query.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The handle says the process is not running.
    #[error("node {0} is not running")]
    NodeDown(NodeId),

    /// The request failed or timed out.
    #[error("status request to node {node} failed: {source}")]
    Transport {
        /// Node that was queried.
        node: NodeId,
        /// Underlying HTTP error.
        source: reqwest::Error,
    },

    /// The response was not a valid status document.
    #[error("status response from node {node} could not be decoded: {source}")]
    Decode {
        /// Node that was queried.
        node: NodeId,
        /// Underlying decode error.
        source: reqwest::Error,
    },

    /// The HTTP client could not be built.
    #[error("failed to build status client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Errors from controlling one node process.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The process could not be spawned.
    #[error("failed to spawn node {node} from {binary}: {source}")]
    Spawn {
        /// Node being launched.
        node: NodeId,
        /// Executable that failed to start.
        binary: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// A signal could not be delivered.
    #[error("failed to signal node {node}: {source}")]
    Signal {
        /// Node being signalled.
        node: NodeId,
        /// Underlying errno.
        source: nix::Error,
    },

    /// The requested operation is not valid in the node's current state.
    #[error("node {node}: {source}")]
    Lifecycle {
        /// Node whose lifecycle rejected the event.
        node: NodeId,
        /// Rejected transition.
        source: InvalidTransition,
    },

    /// The node's flags are malformed.
    #[error("node {node} has invalid flags: {source}")]
    Flags {
        /// Node with the malformed flags.
        node: NodeId,
        /// Parse failure.
        source: FlagParseError,
    },

    /// Filesystem or process IO failed.
    #[error("node {node}: {source}")]
    Io {
        /// Node being controlled.
        node: NodeId,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Errors from managing the fleet.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// The configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A node did not reach the ready state during fleet launch.
    #[error("node {node} did not become ready during launch: {outcome}")]
    Launch {
        /// Node that failed.
        node: NodeId,
        /// How the launch ended.
        outcome: RelaunchOutcome,
    },

    /// A node id outside the launched fleet.
    #[error("unknown node {node}; the cluster has {total} nodes")]
    UnknownNode {
        /// Requested id.
        node: NodeId,
        /// Number of launched nodes.
        total: usize,
    },

    /// A producer node failed to come back when production was resumed.
    #[error("producer node {node} did not come back: {outcome}")]
    ProductionResume {
        /// Producer node.
        node: NodeId,
        /// How the relaunch ended.
        outcome: RelaunchOutcome,
    },

    /// The operation needs the node to be stopped.
    #[error("node {0} is still running")]
    NodeRunning(NodeId),

    /// A status query failed.
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Process control failed.
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Filesystem IO failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

impl ClusterError {
    /// Whether the error comes from a status query.
    pub const fn is_probe(&self) -> bool {
        matches!(self, Self::Probe(_))
    }

    /// Wrap an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }
}
