//! Chain status queries.

use std::time::Duration;

use readmode_domain::{ChainInfo, NodeId, StatusSnapshot};
use tracing::trace;

use crate::{NodeHandle, ProbeError};

/// Issues one status query per call; retries are up to the caller.
#[derive(Debug, Clone)]
pub struct StatusProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl StatusProbe {
    /// Probe whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(ProbeError::Client)?;
        Ok(Self { client, timeout })
    }

    /// Per-request timeout.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Query a node's status.
    ///
    /// Fails with [`ProbeError::NodeDown`] without touching the network when
    /// the handle is not alive; callers refresh liveness first.
    pub async fn get_status(&self, node: &NodeHandle) -> Result<StatusSnapshot, ProbeError> {
        if !node.is_alive() {
            return Err(ProbeError::NodeDown(node.id()));
        }
        self.query(node.id(), node.status_url()).await
    }

    /// Query a status URL directly.
    pub async fn query(&self, node: NodeId, url: &str) -> Result<StatusSnapshot, ProbeError> {
        let response = self
            .client
            .post(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| ProbeError::Transport { node, source })?;
        let info: ChainInfo =
            response.json().await.map_err(|source| ProbeError::Decode { node, source })?;
        let snapshot = info.into_snapshot();
        trace!(%node, %snapshot, "status");
        Ok(snapshot)
    }
}
