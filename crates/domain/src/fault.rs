//! Known fault signatures found in captured node logs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A bug the harness knows how to recognise from a node's stderr.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KnownBug {
    /// Replaying reversible blocks under irreversible read-mode re-adds a block already applied.
    DuplicateBlock,
    /// A block was pushed whose timestamp does not move past the current head.
    BlockNotInFuture,
    /// A received block does not link to anything in the fork database.
    UnlinkableBlock,
}

impl KnownBug {
    /// Every known bug, in registry order.
    pub const ALL: [Self; 3] = [Self::DuplicateBlock, Self::BlockNotInFuture, Self::UnlinkableBlock];

    /// Stable identifier used in reports.
    pub const fn id(self) -> &'static str {
        match self {
            Self::DuplicateBlock => "duplicate-block",
            Self::BlockNotInFuture => "block-not-in-future",
            Self::UnlinkableBlock => "unlinkable-block",
        }
    }

    /// The log signature that fingerprints this bug.
    pub const fn signature(self) -> &'static FaultSignature {
        // Indices follow the registry order below.
        match self {
            Self::DuplicateBlock => &FAULT_SIGNATURES[0],
            Self::BlockNotInFuture => &FAULT_SIGNATURES[1],
            Self::UnlinkableBlock => &FAULT_SIGNATURES[2],
        }
    }
}

impl fmt::Display for KnownBug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A substring that, when present in captured stderr, confirms a known bug.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultSignature {
    /// Substring matched against individual log lines.
    pub pattern: &'static str,
    /// Bug confirmed by the pattern.
    pub bug: KnownBug,
}

impl FaultSignature {
    /// Whether a single log line carries this signature.
    pub fn matches(&self, line: &str) -> bool {
        line.contains(self.pattern)
    }
}

/// Registry of every known fault signature.
pub const FAULT_SIGNATURES: &[FaultSignature] = &[
    FaultSignature { pattern: "duplicate block added", bug: KnownBug::DuplicateBlock },
    FaultSignature { pattern: "next block must be in the future", bug: KnownBug::BlockNotInFuture },
    FaultSignature { pattern: "unlinkable block", bug: KnownBug::UnlinkableBlock },
];
