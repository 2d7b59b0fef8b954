//! Process control for a cluster of ledger nodes under test.
//!
//! [`ClusterManager`] launches the fleet and owns one [`ProcessController`]
//! per node. Controllers kill and relaunch their node with mutated flags,
//! [`StatusProbe`] queries chain status, and [`LogScanner`] looks for known
//! fault signatures in captured stderr. The [`Fleet`] trait is the surface
//! scenario code drives, so it can run against real processes or a
//! simulation.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod controller;
pub use controller::{ControllerTiming, ProcessController, RelaunchOutcome};

mod error;
pub use error::{ClusterError, ControllerError, ProbeError};

mod fleet;
pub use fleet::Fleet;

mod handle;
pub use handle::NodeHandle;

mod lifecycle;
pub use lifecycle::{InvalidTransition, Lifecycle, LifecycleEvent, LifecycleState};

mod logs;
pub use logs::{DEFAULT_STDERR_FILE, LogScanner};

mod manager;
pub use manager::{ClusterManager, node_args};

mod probe;
pub use probe::StatusProbe;

mod process;
