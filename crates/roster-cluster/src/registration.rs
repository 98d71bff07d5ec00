//! One-shot registration with the coordinator.

use std::time::Duration;

use tracing::{error, info};

use crate::coordinator::{Coordinator, CoordinatorError};

/// Liveness timeout granted by the coordinator at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessContract {
    timeout: Duration,
}

impl LivenessContract {
    /// `None` for a zero timeout, which would give a zero heartbeat period.
    pub fn new(timeout: Duration) -> Option<Self> {
        let contract = Self { timeout };
        (!contract.heartbeat_period().is_zero()).then_some(contract)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Interval between heartbeats: half the timeout.
    pub fn heartbeat_period(&self) -> Duration {
        self.timeout / 2
    }
}

/// Announce `node_id` at `address` and return the liveness contract.
///
/// Called exactly once per process and never retried; any error here
/// must stop startup.
pub async fn register(
    coordinator: &dyn Coordinator,
    node_id: &str,
    address: &str,
) -> Result<LivenessContract, CoordinatorError> {
    let timeout = coordinator.add_node(node_id, address).await.map_err(|e| {
        error!(%node_id, %address, error = %e, "registration failed");
        e
    })?;

    let contract = LivenessContract::new(timeout).ok_or(CoordinatorError::InvalidTimeout(timeout))?;

    info!(
        %node_id,
        %address,
        timeout = ?contract.timeout(),
        heartbeat = ?contract.heartbeat_period(),
        "registered with coordinator"
    );
    Ok(contract)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Granting {
        grant: Result<Duration, CoordinatorError>,
        calls: Mutex<Vec<(String, String)>>,
    }

    #[tonic::async_trait]
    impl Coordinator for Granting {
        async fn add_node(&self, node_id: &str, address: &str) -> Result<Duration, CoordinatorError> {
            self.calls
                .lock()
                .unwrap()
                .push((node_id.to_string(), address.to_string()));
            self.grant.clone()
        }

        async fn ping(&self, _node_id: &str) -> Result<(), CoordinatorError> {
            Ok(())
        }
    }

    fn granting(grant: Result<Duration, CoordinatorError>) -> Granting {
        Granting {
            grant,
            calls: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn heartbeat_period_is_half_the_timeout() {
        let contract = LivenessContract::new(Duration::from_secs(10)).unwrap();
        assert_eq!(contract.heartbeat_period(), Duration::from_secs(5));
        assert!(LivenessContract::new(Duration::ZERO).is_none());
    }

    #[tokio::test]
    async fn register_returns_granted_timeout() {
        let coord = granting(Ok(Duration::from_secs(10)));
        let contract = register(&coord, "n1", "h:5000").await.unwrap();
        assert_eq!(contract.timeout(), Duration::from_secs(10));

        let calls = coord.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[("n1".to_string(), "h:5000".to_string())]);
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected() {
        let coord = granting(Ok(Duration::ZERO));
        let err = register(&coord, "n1", "h:5000").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidTimeout(_)));
    }

    #[tokio::test]
    async fn rpc_failure_is_not_retried() {
        let coord = granting(Err(CoordinatorError::Rpc {
            rpc: "AddNode",
            code: tonic::Code::Unavailable,
            message: "down".into(),
        }));
        assert!(register(&coord, "n1", "h:5000").await.is_err());
        assert_eq!(coord.calls.lock().unwrap().len(), 1);
    }
}
