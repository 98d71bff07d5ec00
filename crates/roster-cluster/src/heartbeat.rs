//! Heartbeat loop — periodic liveness pings to the coordinator.
//!
//! One ping per tick, every half of the granted timeout. A tick is not
//! awaited until the previous ping has resolved, and late ticks are
//! delayed rather than bursted. Cancellation is checked first on every
//! wakeup and also abandons an in-flight ping, so nothing is sent once
//! shutdown has been observed.
//!
//! A ping that gets no answer within the liveness timeout counts as a
//! failure: by then the coordinator has already given up on the node.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::coordinator::{Coordinator, CoordinatorError};
use crate::registration::LivenessContract;

/// Run until `shutdown` flips (or its sender is dropped).
///
/// Returns the first ping failure; the caller treats it as fatal.
pub async fn run_heartbeat(
    coordinator: Arc<dyn Coordinator>,
    node_id: String,
    contract: LivenessContract,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), CoordinatorError> {
    let period = contract.heartbeat_period();
    let deadline = contract.timeout();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(%node_id, ?period, "heartbeat loop started");

    let mut sent: u64 = 0;
    if *shutdown.borrow_and_update() {
        info!(%node_id, sent, "heartbeat loop cancelled before first tick");
        return Ok(());
    }

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            result = timeout(deadline, coordinator.ping(&node_id)) => {
                let result = result.unwrap_or_else(|_| {
                    Err(CoordinatorError::Timeout { rpc: "Ping", after: deadline })
                });
                if let Err(e) = result {
                    error!(%node_id, error = %e, "heartbeat failed");
                    return Err(e);
                }
                sent += 1;
                debug!(%node_id, sent, "heartbeat sent");
            }
        }
    }

    info!(%node_id, sent, "heartbeat loop shutting down");
    Ok(())
}
