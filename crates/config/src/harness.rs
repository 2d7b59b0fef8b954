//! Top-level harness configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, EndpointConfig, TimingConfig, TopologyConfig};

/// Default node binary, resolved through `PATH`.
pub const DEFAULT_NODE_BINARY: &str = "nodeos";

/// Default root under which per-node data directories are created.
pub const DEFAULT_DATA_ROOT: &str = "var/lib/readmode";

/// A long-running helper process started before the nodes and stopped after them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuxiliaryService {
    /// Name used in logs.
    pub name: String,
    /// Executable to run.
    pub binary: PathBuf,
    /// Arguments passed verbatim.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Complete harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Node executable.
    #[serde(default = "default_node_binary")]
    pub node_binary: PathBuf,

    /// Root of the per-node data directories.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    /// Keep data directories after shutdown.
    #[serde(default)]
    pub keep_data: bool,

    /// Treat every failed relaunch as a scenario failure, even without a known signature.
    #[serde(default)]
    pub strict: bool,

    /// Cluster shape.
    #[serde(default)]
    pub topology: TopologyConfig,

    /// Node endpoints.
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Timeouts and settle windows.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Helper services such as a wallet daemon.
    #[serde(default)]
    pub auxiliary: Vec<AuxiliaryService>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            node_binary: PathBuf::from(DEFAULT_NODE_BINARY),
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            keep_data: false,
            strict: false,
            topology: TopologyConfig::default(),
            endpoints: EndpointConfig::default(),
            timing: TimingConfig::default(),
            auxiliary: Vec::new(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a file path, auto-detecting format by extension.
    ///
    /// If the path is `None`, returns the default configuration.
    /// Supported extensions: `.json` for JSON, all others default to TOML.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(
            || Ok(Self::default()),
            |p| {
                let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("toml");
                match ext {
                    "json" => Self::from_json_file(p),
                    _ => Self::from_toml_file(p),
                }
            },
        )
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read { path: path.into(), source: e })?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read { path: path.into(), source: e })?;
        Self::from_json(&contents)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Serialize configuration to a JSON string.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the configuration before anything is launched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.topology.validate()?;

        let span = u16::try_from(self.topology.total_nodes).unwrap_or(u16::MAX);
        for (name, base) in [
            ("http_base_port", self.endpoints.http_base_port),
            ("p2p_base_port", self.endpoints.p2p_base_port),
        ] {
            if base.checked_add(span).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{name} {base} leaves no room for {} nodes",
                    self.topology.total_nodes
                )));
            }
        }
        if self.timing.relaunch_timeout_ms == 0 {
            return Err(ConfigError::Invalid("relaunch_timeout_ms must be positive".into()));
        }
        if self.timing.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        if self.timing.launch_timeout_multiplier == 0 {
            return Err(ConfigError::Invalid("launch_timeout_multiplier must be positive".into()));
        }
        Ok(())
    }
}

fn default_node_binary() -> PathBuf {
    PathBuf::from(DEFAULT_NODE_BINARY)
}

fn default_data_root() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_ROOT)
}
