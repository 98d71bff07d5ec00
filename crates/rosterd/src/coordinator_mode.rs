//! Coordinator mode — accepts node registrations and tracks liveness.
//!
//! In this mode, the daemon:
//! 1. Creates the node registry with the configured liveness timeout
//! 2. Serves the `NodeService` gRPC interface
//! 3. Periodically drops nodes that stopped pinging

use std::sync::Arc;

use roster_cluster::{Registry, RegistryServer};
use roster_core::CoordinatorConfig;
use tokio::sync::watch;
use tracing::info;

/// Run the coordinator until Ctrl-C.
pub async fn run_coordinator(config: CoordinatorConfig) -> anyhow::Result<()> {
    config.validate()?;
    info!(
        listen = %config.listen_addr,
        liveness_timeout = ?config.liveness_timeout(),
        "Roster coordinator starting"
    );

    let registry = Arc::new(Registry::new(config.liveness_timeout()));

    // ── Expired node reaper ──────────────────────────────────────
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let reaper_registry = Arc::clone(&registry);
    let reap_interval = config.reap_interval();
    let reaper_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(reap_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let reaped = reaper_registry.reap_expired().await;
                    if !reaped.is_empty() {
                        info!(count = reaped.len(), "reaped expired nodes");
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }
    });

    // ── gRPC server ──────────────────────────────────────────────
    let service = RegistryServer::new(Arc::clone(&registry)).into_service();
    info!(addr = %config.listen_addr, "gRPC server starting");

    tonic::transport::Server::builder()
        .add_service(service)
        .serve_with_shutdown(config.listen_addr, async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = reaper_handle.await;

    info!(members = registry.members().await.len(), "coordinator stopped");
    Ok(())
}
