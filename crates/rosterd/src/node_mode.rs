//! Node mode — serves the person store and reports to a coordinator.
//!
//! In this mode, the daemon:
//! 1. Creates the in-memory person store
//! 2. Opens a gRPC channel to the coordinator
//! 3. Binds the inbound listener and registers its address
//! 4. Heartbeats every half of the granted timeout while serving
//! 5. On Ctrl-C or a fatal background error, stops everything and exits

use roster_cluster::{NodeIdentity, NodeLifecycle};
use roster_core::NodeConfig;
use tracing::{error, info};

/// Run a node until interrupted or until liveness is lost.
pub async fn run_node(config: NodeConfig) -> anyhow::Result<()> {
    config.validate()?;
    info!(node_id = %config.node_id, coordinator = %config.coordinator_addr, "Roster node starting");

    let mut node = NodeLifecycle::new(NodeIdentity::from(&config));
    node.init()?;
    node.connect().await?;
    node.serve().await?;

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            signal.map_err(anyhow::Error::from)
        }
        fatal = node.fatal() => {
            error!(error = %fatal, "fatal node error, shutting down");
            Err(fatal.into())
        }
    };

    node.stop().await?;
    info!("node stopped");
    outcome
}
