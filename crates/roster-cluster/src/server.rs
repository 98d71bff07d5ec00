//! Coordinator gRPC server.
//!
//! Implements the `NodeService` interface nodes register and ping
//! against.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::info;

use crate::proto;
use crate::proto::node_service_server::NodeService;
use crate::registry::Registry;

/// gRPC implementation of the coordinator's node service.
pub struct RegistryServer {
    registry: Arc<Registry>,
}

impl RegistryServer {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Get the tonic service for mounting on a gRPC server.
    pub fn into_service(self) -> proto::node_service_server::NodeServiceServer<Self> {
        proto::node_service_server::NodeServiceServer::new(self)
    }
}

#[tonic::async_trait]
impl NodeService for RegistryServer {
    async fn add_node(
        &self,
        request: Request<proto::NodeInfo>,
    ) -> Result<Response<proto::NodeGrant>, Status> {
        let req = request.into_inner();
        if req.id.is_empty() {
            return Err(Status::invalid_argument("node id must not be empty"));
        }
        if req.source.is_empty() {
            return Err(Status::invalid_argument("node address must not be empty"));
        }

        let timeout = self.registry.add_node(&req.id, &req.source).await;
        info!(node_id = %req.id, address = %req.source, "node added via gRPC");

        Ok(Response::new(proto::NodeGrant {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }))
    }

    async fn ping(
        &self,
        request: Request<proto::PingMessage>,
    ) -> Result<Response<proto::Empty>, Status> {
        let id = request.into_inner().id;
        if self.registry.ping(&id).await {
            Ok(Response::new(proto::Empty {}))
        } else {
            Err(Status::not_found(format!("unknown node {id}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn server() -> RegistryServer {
        RegistryServer::new(Arc::new(Registry::new(Duration::from_millis(1500))))
    }

    #[tokio::test]
    async fn add_node_returns_timeout_in_millis() {
        let svc = server();
        let grant = svc
            .add_node(Request::new(proto::NodeInfo {
                id: "n1".into(),
                source: "h:5000".into(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(grant.timeout_ms, 1500);
    }

    #[tokio::test]
    async fn add_node_requires_id_and_address() {
        let svc = server();
        let status = svc
            .add_node(Request::new(proto::NodeInfo {
                id: String::new(),
                source: "h:5000".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status = svc
            .add_node(Request::new(proto::NodeInfo {
                id: "n1".into(),
                source: String::new(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn ping_unknown_node_is_not_found() {
        let svc = server();
        let status = svc
            .ping(Request::new(proto::PingMessage { id: "ghost".into() }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }
}
