//! Node endpoint configuration.

use serde::{Deserialize, Serialize};

/// Default host every node binds to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default HTTP port of node 0; node `n` listens on `base + n`.
pub const DEFAULT_HTTP_BASE_PORT: u16 = 8888;

/// Default p2p port of node 0; node `n` listens on `base + n`.
pub const DEFAULT_P2P_BASE_PORT: u16 = 9876;

/// Default path of the status endpoint.
pub const DEFAULT_STATUS_PATH: &str = "/v1/chain/get_info";

/// Where each node's HTTP and p2p endpoints live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Host for HTTP and p2p endpoints.
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port of node 0.
    #[serde(default = "default_http_base_port")]
    pub http_base_port: u16,

    /// P2P port of node 0.
    #[serde(default = "default_p2p_base_port")]
    pub p2p_base_port: u16,

    /// Path of the status query.
    #[serde(default = "default_status_path")]
    pub status_path: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            http_base_port: DEFAULT_HTTP_BASE_PORT,
            p2p_base_port: DEFAULT_P2P_BASE_PORT,
            status_path: DEFAULT_STATUS_PATH.to_string(),
        }
    }
}

impl EndpointConfig {
    /// `host:port` of a node's HTTP server.
    pub fn http_addr(&self, offset: u16) -> String {
        format!("{}:{}", self.host, self.http_base_port.saturating_add(offset))
    }

    /// `host:port` of a node's p2p listener.
    pub fn p2p_addr(&self, offset: u16) -> String {
        format!("{}:{}", self.host, self.p2p_base_port.saturating_add(offset))
    }

    /// Full URL of a node's status endpoint.
    pub fn status_url(&self, offset: u16) -> String {
        format!("http://{}{}", self.http_addr(offset), self.status_path)
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

const fn default_http_base_port() -> u16 {
    DEFAULT_HTTP_BASE_PORT
}

const fn default_p2p_base_port() -> u16 {
    DEFAULT_P2P_BASE_PORT
}

fn default_status_path() -> String {
    DEFAULT_STATUS_PATH.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses_offset_by_node() {
        let endpoints = EndpointConfig::default();
        assert_eq!(endpoints.http_addr(3), "127.0.0.1:8891");
        assert_eq!(endpoints.p2p_addr(0), "127.0.0.1:9876");
        assert_eq!(endpoints.status_url(1), "http://127.0.0.1:8889/v1/chain/get_info");
    }
}
