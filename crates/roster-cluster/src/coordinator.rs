//! Coordinator client — the node's outbound channel.
//!
//! The lifecycle and heartbeat talk to the coordinator only through the
//! [`Coordinator`] trait, so the transport (or a retry policy) can be
//! swapped without touching them.

use std::time::Duration;

use thiserror::Error;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, warn};

use crate::proto;
use crate::proto::node_service_client::NodeServiceClient;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Error)]
pub enum CoordinatorError {
    #[error("cannot reach coordinator at {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("{rpc} rejected with {code:?}: {message}")]
    Rpc {
        rpc: &'static str,
        code: tonic::Code,
        message: String,
    },

    #[error("{rpc} got no answer within {after:?}")]
    Timeout { rpc: &'static str, after: Duration },

    #[error("coordinator granted an unusable liveness timeout ({0:?})")]
    InvalidTimeout(Duration),
}

impl CoordinatorError {
    fn rpc(rpc: &'static str, status: tonic::Status) -> Self {
        Self::Rpc {
            rpc,
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}

/// Calls a node makes to its coordinator.
#[tonic::async_trait]
pub trait Coordinator: Send + Sync {
    /// Announce this node; returns the granted liveness timeout.
    async fn add_node(&self, node_id: &str, address: &str) -> Result<Duration, CoordinatorError>;

    /// Report liveness.
    async fn ping(&self, node_id: &str) -> Result<(), CoordinatorError>;
}

/// [`Coordinator`] over a tonic channel.
#[derive(Clone)]
pub struct GrpcCoordinator {
    addr: String,
    client: NodeServiceClient<Channel>,
}

impl GrpcCoordinator {
    /// Open the channel. Fails if the coordinator is not reachable.
    pub async fn connect(addr: &str) -> Result<Self, CoordinatorError> {
        let uri = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.to_string()
        } else {
            format!("http://{addr}")
        };

        let connect_err = |reason: String| CoordinatorError::Connect {
            addr: addr.to_string(),
            reason,
        };

        let endpoint = Endpoint::from_shared(uri)
            .map_err(|e| connect_err(e.to_string()))?
            .connect_timeout(CONNECT_TIMEOUT);

        let channel = endpoint.connect().await.map_err(|e| {
            warn!(%addr, error = %e, "failed to connect to coordinator");
            connect_err(e.to_string())
        })?;

        debug!(%addr, "connected to coordinator");
        Ok(Self {
            addr: addr.to_string(),
            client: NodeServiceClient::new(channel),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[tonic::async_trait]
impl Coordinator for GrpcCoordinator {
    async fn add_node(&self, node_id: &str, address: &str) -> Result<Duration, CoordinatorError> {
        let mut client = self.client.clone();
        let grant = client
            .add_node(proto::NodeInfo {
                id: node_id.to_string(),
                source: address.to_string(),
            })
            .await
            .map_err(|s| CoordinatorError::rpc("AddNode", s))?
            .into_inner();
        Ok(Duration::from_millis(grant.timeout_ms))
    }

    async fn ping(&self, node_id: &str) -> Result<(), CoordinatorError> {
        let mut client = self.client.clone();
        client
            .ping(proto::PingMessage {
                id: node_id.to_string(),
            })
            .await
            .map_err(|s| CoordinatorError::rpc("Ping", s))?;
        Ok(())
    }
}
