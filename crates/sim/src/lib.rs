//! A simulated fleet for exercising read-mode scenarios without node binaries.
//!
//! [`SimFleet`] implements [`Fleet`](readmode_cluster::Fleet) over an
//! in-memory chain: a producing network whose head advances in virtual time,
//! and per-node state (fork database head, LIB, reversible block database,
//! read-mode of the last launch). Nodes in speculative mode report the fork
//! database head as their head; irreversible nodes report LIB.
//!
//! [`SimFault`]s reproduce known node defects so the scenario suite can be
//! checked for catching them.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod chain;
pub use chain::SimChainConfig;

mod fault;
pub use fault::{SimFault, UnknownFault};

mod fleet;
pub use fleet::SimFleet;
