//! Value types shared across the read-mode harness.
//!
//! Nothing in this crate touches processes or the network. It holds the
//! node identifiers, the command-line flag model, chain status snapshots and
//! the registry of known fault signatures.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod fault;
pub use fault::{FAULT_SIGNATURES, FaultSignature, KnownBug};

mod flags;
pub use flags::{Flag, FlagMutation, FlagParseError, FlagSet, READ_MODE_FLAG, REPLAY_FLAG, ReadMode};

mod idents;
pub use idents::NodeId;

mod status;
pub use status::{ChainInfo, StatusSnapshot};
