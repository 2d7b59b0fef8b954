//! Configuration for the read-mode harness.
//!
//! Configuration is loaded from TOML or JSON, chosen by file extension, and
//! every field has a default so an empty file is a valid configuration.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod endpoints;
pub use endpoints::{
    DEFAULT_HOST, DEFAULT_HTTP_BASE_PORT, DEFAULT_P2P_BASE_PORT, DEFAULT_STATUS_PATH,
    EndpointConfig,
};

mod error;
pub use error::ConfigError;

mod harness;
pub use harness::{AuxiliaryService, DEFAULT_DATA_ROOT, DEFAULT_NODE_BINARY, HarnessConfig};

mod timing;
pub use timing::{Readiness, TimingConfig};

mod topology;
pub use topology::{NodeFlags, TopologyConfig, TopologyShape};
