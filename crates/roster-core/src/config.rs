//! roster.toml configuration parser.
//!
//! ```toml
//! [node]
//! node_id = "n1"
//! coordinator_addr = "10.0.0.1:7700"
//! listen_addr = "0.0.0.0:0"
//! advertise_host = "10.0.0.5"
//!
//! [coordinator]
//! listen_addr = "0.0.0.0:7700"
//! liveness_timeout_ms = 10000
//! ```
//!
//! Every field has a default, so a file only needs the values it changes.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub node: NodeConfig,
    pub coordinator: CoordinatorConfig,
}

/// Settings for a node process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identifier announced to the coordinator and stamped on records.
    pub node_id: String,
    /// `host:port` of the coordinator's gRPC endpoint.
    pub coordinator_addr: String,
    /// Address the inbound gRPC listener binds. Port 0 picks a free port.
    pub listen_addr: SocketAddr,
    /// Host part of the address announced to the coordinator.
    pub advertise_host: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            coordinator_addr: "127.0.0.1:7700".to_string(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            advertise_host: "127.0.0.1".to_string(),
        }
    }
}

impl NodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.trim().is_empty() {
            return Err(ConfigError::Invalid("node.node_id must not be empty".into()));
        }
        if self.coordinator_addr.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "node.coordinator_addr must not be empty".into(),
            ));
        }
        if self.advertise_host.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "node.advertise_host must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Settings for the coordinator process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub listen_addr: SocketAddr,
    /// Liveness timeout granted to every node on registration.
    pub liveness_timeout_ms: u64,
    /// How often expired nodes are dropped from the registry.
    pub reap_interval_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 7700)),
            liveness_timeout_ms: 10_000,
            reap_interval_ms: 5_000,
        }
    }
}

impl CoordinatorConfig {
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.liveness_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "coordinator.liveness_timeout_ms must be positive".into(),
            ));
        }
        if self.reap_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "coordinator.reap_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl RosterConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path` when given, otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }
}
