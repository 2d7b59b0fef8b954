//! Cluster topology configuration.

use readmode_domain::{FlagSet, NodeId};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default number of nodes in the cluster.
pub const DEFAULT_TOTAL_NODES: usize = 8;

/// Default number of nodes that run block producers.
pub const DEFAULT_PRODUCER_NODES: usize = 1;

/// Default number of producer names spread over the producer nodes.
pub const DEFAULT_PRODUCER_COUNT: usize = 4;

/// How nodes are wired to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyShape {
    /// Every node peers with every other node.
    #[default]
    Mesh,
    /// Every node peers with node 0.
    Star,
    /// Node `n` peers with node `n - 1`.
    Line,
}

impl TopologyShape {
    /// Peers node `id` dials in a cluster of `total` nodes.
    pub fn peers_of(self, id: NodeId, total: usize) -> Vec<NodeId> {
        match self {
            Self::Mesh => (0..total).map(NodeId).filter(|peer| *peer != id).collect(),
            Self::Star if id.0 == 0 => Vec::new(),
            Self::Star => vec![NodeId(0)],
            Self::Line if id.0 == 0 => Vec::new(),
            Self::Line => vec![NodeId(id.0 - 1)],
        }
    }
}

/// Extra flags for one node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeFlags {
    /// Node the flags apply to.
    pub node: NodeId,
    /// Flag string appended to that node's command line.
    pub flags: String,
}

/// Shape of the launched cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopologyConfig {
    /// Number of node processes.
    #[serde(default = "default_total_nodes")]
    pub total_nodes: usize,

    /// Nodes `0..producer_nodes` run block producers.
    #[serde(default = "default_producer_nodes")]
    pub producer_nodes: usize,

    /// Producer names distributed round-robin over the producer nodes.
    #[serde(default = "default_producer_count")]
    pub producer_count: usize,

    /// Peer wiring.
    #[serde(default)]
    pub shape: TopologyShape,

    /// Per-node extra flags.
    #[serde(default = "default_node_flags")]
    pub node_flags: Vec<NodeFlags>,

    /// Flags appended to every node's command line.
    #[serde(default)]
    pub extra_flags: String,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            total_nodes: DEFAULT_TOTAL_NODES,
            producer_nodes: DEFAULT_PRODUCER_NODES,
            producer_count: DEFAULT_PRODUCER_COUNT,
            shape: TopologyShape::default(),
            node_flags: default_node_flags(),
            extra_flags: String::new(),
        }
    }
}

impl TopologyConfig {
    /// Whether `id` runs a block producer.
    pub const fn is_producer(&self, id: NodeId) -> bool {
        id.0 < self.producer_nodes
    }

    /// Ids of all producer nodes.
    pub fn producers(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.producer_nodes.min(self.total_nodes)).map(NodeId)
    }

    /// Producer names assigned to node `id`, e.g. `defproducera`.
    pub fn producer_names(&self, id: NodeId) -> Vec<String> {
        if !self.is_producer(id) {
            return Vec::new();
        }
        (0..self.producer_count)
            .filter(|i| i % self.producer_nodes == id.0)
            .map(producer_name)
            .collect()
    }

    /// Extra flags configured for `id`, combined with the global extra flags.
    pub fn extra_flags_for(&self, id: NodeId) -> Result<FlagSet, ConfigError> {
        let mut flags = parse_flags(&self.extra_flags, "extra_flags")?;
        for entry in self.node_flags.iter().filter(|entry| entry.node == id) {
            flags.append(&parse_flags(&entry.flags, &format!("node {}", entry.node))?);
        }
        Ok(flags)
    }

    /// Check the topology is self-consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_nodes == 0 {
            return Err(ConfigError::Invalid("total_nodes must be at least 1".into()));
        }
        if self.producer_nodes > self.total_nodes {
            return Err(ConfigError::Invalid(format!(
                "producer_nodes ({}) exceeds total_nodes ({})",
                self.producer_nodes, self.total_nodes
            )));
        }
        if self.producer_nodes > 0 && self.producer_count < self.producer_nodes {
            return Err(ConfigError::Invalid(format!(
                "producer_count ({}) must cover every producer node ({})",
                self.producer_count, self.producer_nodes
            )));
        }
        if let Some(entry) = self.node_flags.iter().find(|entry| entry.node.0 >= self.total_nodes) {
            return Err(ConfigError::Invalid(format!(
                "node_flags references node {} but only {} nodes are launched",
                entry.node, self.total_nodes
            )));
        }
        for id in (0..self.total_nodes).map(NodeId) {
            self.extra_flags_for(id)?;
        }
        Ok(())
    }
}

fn parse_flags(flags: &str, context: &str) -> Result<FlagSet, ConfigError> {
    FlagSet::parse(flags)
        .map_err(|source| ConfigError::Flags { context: context.to_string(), source })
}

/// Producer names follow `defproducer` plus a base-26 suffix: `a`..`z`, `ba`, ...
fn producer_name(index: usize) -> String {
    let mut suffix = Vec::new();
    let mut n = index;
    loop {
        suffix.push(b'a' + (n % 26) as u8);
        n /= 26;
        if n == 0 {
            break;
        }
    }
    suffix.reverse();
    format!("defproducer{}", String::from_utf8_lossy(&suffix))
}

const fn default_total_nodes() -> usize {
    DEFAULT_TOTAL_NODES
}

const fn default_producer_nodes() -> usize {
    DEFAULT_PRODUCER_NODES
}

const fn default_producer_count() -> usize {
    DEFAULT_PRODUCER_COUNT
}

/// Nodes 4 and 6 start in irreversible mode so the irreversible-to-speculative
/// scenarios begin from a node that has always run irreversible.
fn default_node_flags() -> Vec<NodeFlags> {
    [4, 6]
        .into_iter()
        .map(|node| NodeFlags { node: NodeId(node), flags: "--read-mode irreversible".into() })
        .collect()
}
