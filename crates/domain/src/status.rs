//! Chain status as reported by a node.

use std::{fmt, time::Instant};

use serde::{Deserialize, Serialize};

/// Fields of the node's status response the harness relies on.
///
/// The node returns more than this; unknown fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Current head block number.
    pub head_block_num: u64,
    /// Last irreversible block number.
    pub last_irreversible_block_num: u64,
    /// Head of the fork database.
    pub fork_db_head_block_num: u64,
}

impl ChainInfo {
    /// Stamp the response with the time it was received.
    pub fn into_snapshot(self) -> StatusSnapshot {
        StatusSnapshot {
            head_block_num: self.head_block_num,
            last_irreversible_block_num: self.last_irreversible_block_num,
            fork_db_head_block_num: self.fork_db_head_block_num,
            taken_at: Instant::now(),
        }
    }
}

/// Point-in-time view of a node's chain position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Current head block number.
    pub head_block_num: u64,
    /// Last irreversible block number.
    pub last_irreversible_block_num: u64,
    /// Head of the fork database.
    pub fork_db_head_block_num: u64,
    /// When the snapshot was taken.
    pub taken_at: Instant,
}

impl StatusSnapshot {
    /// Snapshot taken now.
    pub fn new(head: u64, lib: u64, fork_db_head: u64) -> Self {
        ChainInfo {
            head_block_num: head,
            last_irreversible_block_num: lib,
            fork_db_head_block_num: fork_db_head,
        }
        .into_snapshot()
    }

    /// Head block number.
    pub const fn head(&self) -> u64 {
        self.head_block_num
    }

    /// Last irreversible block number.
    pub const fn lib(&self) -> u64 {
        self.last_irreversible_block_num
    }

    /// Fork database head block number.
    pub const fn fork_db_head(&self) -> u64 {
        self.fork_db_head_block_num
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "head={} lib={} fork_db_head={}",
            self.head_block_num, self.last_irreversible_block_num, self.fork_db_head_block_num
        )
    }
}
