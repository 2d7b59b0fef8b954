//! The surface scenarios drive.

use std::{future::Future, time::Duration};

use readmode_domain::{FAULT_SIGNATURES, FaultSignature, FlagMutation, NodeId, ReadMode, StatusSnapshot};

use crate::{ClusterError, RelaunchOutcome};

/// A launched set of nodes that can be killed, relaunched and probed.
///
/// Implemented by [`ClusterManager`](crate::ClusterManager) for real
/// processes. Every method taking a [`NodeId`] fails with
/// [`ClusterError::UnknownNode`] for ids outside the fleet.
pub trait Fleet: Send {
    /// Ids of every node in the fleet, in launch order.
    fn node_ids(&self) -> Vec<NodeId>;

    /// Whether `id` names a node in the fleet.
    fn contains(&self, id: NodeId) -> bool {
        self.node_ids().contains(&id)
    }

    /// Whether the node's process is running.
    fn is_alive(&mut self, id: NodeId) -> Result<bool, ClusterError>;

    /// Read-mode the node's current flags select.
    fn read_mode(&self, id: NodeId) -> Result<Option<ReadMode>, ClusterError>;

    /// Terminate the node. A node that is not running is left as is.
    fn kill(&mut self, id: NodeId) -> impl Future<Output = Result<(), ClusterError>> + Send;

    /// Apply `mutations` to the node's flags and launch it.
    ///
    /// The mutations persist for later relaunches. A node that exits or
    /// never becomes ready is reported through the outcome, not an error.
    fn relaunch(
        &mut self,
        id: NodeId,
        mutations: &[FlagMutation],
        timeout: Duration,
    ) -> impl Future<Output = Result<RelaunchOutcome, ClusterError>> + Send;

    /// Restore the flags the node was launched with at fleet start.
    fn reset_flags(&mut self, id: NodeId) -> Result<(), ClusterError>;

    /// Query the node's chain status.
    fn status(
        &mut self,
        id: NodeId,
    ) -> impl Future<Output = Result<StatusSnapshot, ClusterError>> + Send;

    /// Delete the node's reversible block database. The node must be stopped.
    fn purge_reversible_blocks(&mut self, id: NodeId) -> Result<(), ClusterError>;

    /// Whether the node's latest stderr capture contains `signature`.
    fn contains_signature(
        &self,
        id: NodeId,
        signature: &FaultSignature,
    ) -> Result<bool, ClusterError>;

    /// First registered fault signature in the node's latest stderr capture.
    fn classify_fault(&self, id: NodeId) -> Result<Option<FaultSignature>, ClusterError> {
        for signature in FAULT_SIGNATURES {
            if self.contains_signature(id, signature)? {
                return Ok(Some(*signature));
            }
        }
        Ok(None)
    }

    /// Stop block production. Returns whether anything changed.
    fn pause_production(&mut self) -> impl Future<Output = Result<bool, ClusterError>> + Send;

    /// Restart block production. Returns whether anything changed.
    fn resume_production(&mut self) -> impl Future<Output = Result<bool, ClusterError>> + Send;

    /// Let the fleet run for `duration`.
    fn settle(&mut self, duration: Duration) -> impl Future<Output = ()> + Send;
}
