//! Node lifecycle — init, connect, serve, stop.
//!
//! `NodeLifecycle` owns every resource a node holds: the person store,
//! the outbound coordinator channel, the inbound listener, and the two
//! background tasks (inbound server and heartbeat). Transitions only move
//! forward:
//!
//! ```text
//! Created → Initialized → Connected → Serving → Stopping → Stopped
//! ```
//!
//! Background failures are forwarded to [`NodeLifecycle::fatal`]; the
//! owner is expected to call [`NodeLifecycle::stop`] and exit.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use roster_core::NodeConfig;
use roster_store::PersonStore;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::{debug, error, info, warn};

use crate::coordinator::{Coordinator, CoordinatorError, GrpcCoordinator};
use crate::heartbeat::run_heartbeat;
use crate::registration::{register, LivenessContract};
use crate::service::PersonServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Initialized,
    Connected,
    Serving,
    Stopping,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Initialized => "initialized",
            Self::Connected => "connected",
            Self::Serving => "serving",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Every error here is fatal to the node.
#[derive(Debug, Clone, Error)]
pub enum NodeError {
    #[error("cannot {action} a node that is {state}")]
    InvalidTransition {
        action: &'static str,
        state: LifecycleState,
    },

    #[error("coordinator connection failed: {0}")]
    Connect(CoordinatorError),

    #[error("registration failed: {0}")]
    Registration(CoordinatorError),

    #[error("heartbeat failed: {0}")]
    Heartbeat(CoordinatorError),

    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },

    #[error("inbound server failed: {0}")]
    Serve(String),
}

/// Fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    pub node_id: String,
    /// Where the inbound listener binds; port 0 lets the OS choose.
    pub listen_addr: SocketAddr,
    /// Host announced to the coordinator together with the bound port.
    pub advertise_host: String,
    pub coordinator_addr: String,
}

impl From<&NodeConfig> for NodeIdentity {
    fn from(config: &NodeConfig) -> Self {
        Self {
            node_id: config.node_id.clone(),
            listen_addr: config.listen_addr,
            advertise_host: config.advertise_host.clone(),
            coordinator_addr: config.coordinator_addr.clone(),
        }
    }
}

pub struct NodeLifecycle {
    identity: NodeIdentity,
    state: LifecycleState,
    store: Option<PersonStore>,
    coordinator: Option<Arc<dyn Coordinator>>,
    contract: Option<LivenessContract>,
    local_addr: Option<SocketAddr>,
    advertised_addr: Option<String>,
    /// Cancellation for the heartbeat task.
    cancel_tx: watch::Sender<bool>,
    /// Stops the inbound server; fired before anything else on stop.
    server_shutdown: Option<oneshot::Sender<()>>,
    /// Completion barrier for all background tasks.
    tasks: JoinSet<Result<(), NodeError>>,
    fatal_tx: mpsc::UnboundedSender<NodeError>,
    fatal_rx: mpsc::UnboundedReceiver<NodeError>,
}

impl NodeLifecycle {
    pub fn new(identity: NodeIdentity) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        Self {
            identity,
            state: LifecycleState::Created,
            store: None,
            coordinator: None,
            contract: None,
            local_addr: None,
            advertised_addr: None,
            cancel_tx,
            server_shutdown: None,
            tasks: JoinSet::new(),
            fatal_tx,
            fatal_rx,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn node_id(&self) -> &str {
        &self.identity.node_id
    }

    pub fn store(&self) -> Option<&PersonStore> {
        self.store.as_ref()
    }

    /// Address the inbound listener is bound to (set once serving).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Address announced to the coordinator (set once serving).
    pub fn advertised_addr(&self) -> Option<&str> {
        self.advertised_addr.as_deref()
    }

    pub fn liveness(&self) -> Option<LivenessContract> {
        self.contract
    }

    fn require(&self, expected: LifecycleState, action: &'static str) -> Result<(), NodeError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(NodeError::InvalidTransition {
                action,
                state: self.state,
            })
        }
    }

    fn advance(&mut self, next: LifecycleState) {
        debug!(node_id = %self.identity.node_id, from = %self.state, to = %next, "lifecycle transition");
        self.state = next;
    }

    /// Created → Initialized: create the person store.
    pub fn init(&mut self) -> Result<(), NodeError> {
        self.require(LifecycleState::Created, "initialize")?;
        self.store = Some(PersonStore::new());
        self.advance(LifecycleState::Initialized);
        Ok(())
    }

    /// Initialized → Connected: open the gRPC channel to the coordinator.
    pub async fn connect(&mut self) -> Result<(), NodeError> {
        self.require(LifecycleState::Initialized, "connect")?;
        let coordinator = GrpcCoordinator::connect(&self.identity.coordinator_addr)
            .await
            .map_err(NodeError::Connect)?;
        info!(addr = %coordinator.addr(), "coordinator channel open");
        self.connect_with(Arc::new(coordinator))
    }

    /// Initialized → Connected with an already established channel.
    pub fn connect_with(&mut self, coordinator: Arc<dyn Coordinator>) -> Result<(), NodeError> {
        self.require(LifecycleState::Initialized, "connect")?;
        self.coordinator = Some(coordinator);
        self.advance(LifecycleState::Connected);
        Ok(())
    }

    /// Connected → Serving: bind, register, then start the heartbeat and
    /// the inbound server.
    pub async fn serve(&mut self) -> Result<(), NodeError> {
        self.require(LifecycleState::Connected, "serve")?;
        let (Some(store), Some(coordinator)) = (self.store.clone(), self.coordinator.clone()) else {
            return Err(NodeError::InvalidTransition {
                action: "serve",
                state: self.state,
            });
        };

        let listen_addr = self.identity.listen_addr;
        let listener = TcpListener::bind(listen_addr).await.map_err(|e| NodeError::Bind {
            addr: listen_addr,
            reason: e.to_string(),
        })?;
        let local_addr = listener.local_addr().map_err(|e| NodeError::Bind {
            addr: listen_addr,
            reason: e.to_string(),
        })?;
        let advertised = format!("{}:{}", self.identity.advertise_host, local_addr.port());
        info!(%local_addr, %advertised, "inbound listener bound");

        let node_id = self.identity.node_id.clone();
        let contract = register(coordinator.as_ref(), &node_id, &advertised)
            .await
            .map_err(NodeError::Registration)?;

        // Heartbeat only ever starts with a granted contract.
        let cancel_rx = self.cancel_tx.subscribe();
        let hb_node_id = node_id.clone();
        self.spawn_tracked("heartbeat", async move {
            run_heartbeat(coordinator, hb_node_id, contract, cancel_rx)
                .await
                .map_err(NodeError::Heartbeat)
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let service = PersonServer::new(node_id.clone(), store).into_service();
        self.spawn_tracked("inbound-server", async move {
            tonic::transport::Server::builder()
                .add_service(service)
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    let _ = shutdown_rx.await;
                })
                .await
                .map_err(|e| NodeError::Serve(e.to_string()))
        });

        self.server_shutdown = Some(shutdown_tx);
        self.contract = Some(contract);
        self.local_addr = Some(local_addr);
        self.advertised_addr = Some(advertised);
        self.advance(LifecycleState::Serving);
        info!(%node_id, %local_addr, "node serving");
        Ok(())
    }

    /// Resolves with the first error raised by a background task.
    pub async fn fatal(&mut self) -> NodeError {
        match self.fatal_rx.recv().await {
            Some(err) => err,
            // Unreachable while `self` holds a sender.
            None => std::future::pending().await,
        }
    }

    /// Serving → Stopped: stop serving and wait for every background task
    /// to exit.
    ///
    /// The inbound server is shut down first. The lifecycle then releases
    /// its handle on the coordinator channel and cancels the heartbeat; the
    /// channel itself closes once the heartbeat task, which holds the last
    /// handle, has exited. Returns after the task set is drained.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        self.require(LifecycleState::Serving, "stop")?;
        self.advance(LifecycleState::Stopping);

        if let Some(tx) = self.server_shutdown.take() {
            let _ = tx.send(());
        }
        self.coordinator = None;
        let _ = self.cancel_tx.send(true);

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "task had already failed"),
                Err(e) => warn!(error = %e, "background task panicked or was aborted"),
            }
        }

        self.advance(LifecycleState::Stopped);
        info!(node_id = %self.identity.node_id, "node stopped");
        Ok(())
    }

    fn spawn_tracked<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), NodeError>> + Send + 'static,
    {
        let fatal_tx = self.fatal_tx.clone();
        self.tasks.spawn(async move {
            let result = task.await;
            match &result {
                Ok(()) => debug!(task = name, "background task finished"),
                Err(e) => {
                    error!(task = name, error = %e, "background task failed");
                    let _ = fatal_tx.send(e.clone());
                }
            }
            result
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    struct FixedGrant(Duration);

    #[tonic::async_trait]
    impl Coordinator for FixedGrant {
        async fn add_node(&self, _: &str, _: &str) -> Result<Duration, CoordinatorError> {
            Ok(self.0)
        }

        async fn ping(&self, _: &str) -> Result<(), CoordinatorError> {
            Ok(())
        }
    }

    fn identity() -> NodeIdentity {
        NodeIdentity {
            node_id: "n1".into(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            advertise_host: "127.0.0.1".into(),
            coordinator_addr: "127.0.0.1:1".into(),
        }
    }

    #[test]
    fn identity_from_config() {
        let config = NodeConfig {
            node_id: "n9".into(),
            ..NodeConfig::default()
        };
        let id = NodeIdentity::from(&config);
        assert_eq!(id.node_id, "n9");
        assert_eq!(id.coordinator_addr, config.coordinator_addr);
    }

    #[tokio::test]
    async fn transitions_must_be_in_order() {
        let mut node = NodeLifecycle::new(identity());
        assert_eq!(node.state(), LifecycleState::Created);

        let err = node.serve().await.unwrap_err();
        assert!(matches!(err, NodeError::InvalidTransition { action: "serve", .. }));

        let err = node.connect_with(Arc::new(FixedGrant(Duration::from_secs(1)))).unwrap_err();
        assert!(matches!(err, NodeError::InvalidTransition { action: "connect", .. }));

        node.init().unwrap();
        assert!(node.store().is_some());
        assert!(node.init().is_err());
        assert_eq!(node.state(), LifecycleState::Initialized);
    }

    #[tokio::test]
    async fn connect_to_unreachable_coordinator_fails() {
        let mut node = NodeLifecycle::new(identity());
        node.init().unwrap();
        let err = node.connect().await.unwrap_err();
        assert!(matches!(err, NodeError::Connect(_)));
        assert_eq!(node.state(), LifecycleState::Initialized);
    }

    #[tokio::test]
    async fn zero_grant_stops_startup() {
        let mut node = NodeLifecycle::new(identity());
        node.init().unwrap();
        node.connect_with(Arc::new(FixedGrant(Duration::ZERO))).unwrap();

        let err = node.serve().await.unwrap_err();
        assert!(matches!(err, NodeError::Registration(CoordinatorError::InvalidTimeout(_))));
        assert_eq!(node.state(), LifecycleState::Connected);
        assert!(node.local_addr().is_none());
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut id = identity();
        id.listen_addr = taken.local_addr().unwrap();

        let mut node = NodeLifecycle::new(id);
        node.init().unwrap();
        node.connect_with(Arc::new(FixedGrant(Duration::from_secs(1)))).unwrap();

        let err = node.serve().await.unwrap_err();
        assert!(matches!(err, NodeError::Bind { .. }));
    }

    #[tokio::test]
    async fn serve_then_stop() {
        let mut node = NodeLifecycle::new(identity());
        node.init().unwrap();
        node.connect_with(Arc::new(FixedGrant(Duration::from_secs(10)))).unwrap();
        node.serve().await.unwrap();

        assert_eq!(node.state(), LifecycleState::Serving);
        let port = node.local_addr().unwrap().port();
        assert_ne!(port, 0);
        assert_eq!(node.advertised_addr(), Some(format!("127.0.0.1:{port}").as_str()));
        assert_eq!(node.liveness().unwrap().heartbeat_period(), Duration::from_secs(5));

        node.stop().await.unwrap();
        assert_eq!(node.state(), LifecycleState::Stopped);
        let err = node.stop().await.unwrap_err();
        assert!(matches!(
            err,
            NodeError::InvalidTransition { action: "stop", state: LifecycleState::Stopped }
        ));
    }

    #[tokio::test]
    async fn stop_before_serving_is_refused() {
        let mut node = NodeLifecycle::new(identity());
        assert!(matches!(
            node.stop().await.unwrap_err(),
            NodeError::InvalidTransition { action: "stop", state: LifecycleState::Created }
        ));

        node.init().unwrap();
        node.connect_with(Arc::new(FixedGrant(Duration::from_secs(1)))).unwrap();
        assert!(matches!(
            node.stop().await.unwrap_err(),
            NodeError::InvalidTransition { action: "stop", state: LifecycleState::Connected }
        ));
        assert_eq!(node.state(), LifecycleState::Connected);
    }
}
