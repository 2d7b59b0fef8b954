//! Injectable node faults.

use std::{fmt, str::FromStr};

/// A misbehaviour the simulated node can be told to exhibit.
///
/// Each fault reproduces a defect the read-mode scenarios are meant to catch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SimFault {
    /// Replaying in irreversible mode with the reversible block database
    /// still present aborts with "duplicate block added".
    DuplicateBlockOnReplay,
    /// Replaying in irreversible mode without reversible blocks reports a
    /// LIB one below the real one.
    LibOneBehind,
    /// Switching read-mode drops the fork database and the node stops syncing.
    ForkDbLostOnSwitch,
    /// Switching read-mode keeps state but the node never syncs again.
    StallAfterSwitch,
    /// Switching read-mode while blocks are produced aborts with "unlinkable block".
    UnlinkableBlockOnSwitch,
}

impl SimFault {
    /// Every fault.
    pub const ALL: [Self; 5] = [
        Self::DuplicateBlockOnReplay,
        Self::LibOneBehind,
        Self::ForkDbLostOnSwitch,
        Self::StallAfterSwitch,
        Self::UnlinkableBlockOnSwitch,
    ];

    /// Name used on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            Self::DuplicateBlockOnReplay => "duplicate-block-on-replay",
            Self::LibOneBehind => "lib-one-behind",
            Self::ForkDbLostOnSwitch => "fork-db-lost-on-switch",
            Self::StallAfterSwitch => "stall-after-switch",
            Self::UnlinkableBlockOnSwitch => "unlinkable-block-on-switch",
        }
    }
}

impl fmt::Display for SimFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown fault name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown fault {0:?}")]
pub struct UnknownFault(pub String);

impl FromStr for SimFault {
    type Err = UnknownFault;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|fault| fault.name() == s).ok_or_else(|| UnknownFault(s.into()))
    }
}
