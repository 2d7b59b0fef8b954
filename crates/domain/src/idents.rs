//! Identifiers

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
/// Index of a node within the launched cluster.
pub struct NodeId(pub usize);

impl NodeId {
    /// Name of the node's data directory under the cluster data root.
    pub fn dir_name(self) -> String {
        format!("node_{:02}", self.0)
    }

    /// Offset applied to per-node base ports.
    pub const fn port_offset(self) -> u16 {
        self.0 as u16
    }
}

impl From<usize> for NodeId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
