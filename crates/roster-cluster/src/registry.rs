//! Registry — the coordinator's view of registered nodes.
//!
//! Tracks each node's advertised address and when it was last heard
//! from, and drops nodes that stay silent past the liveness timeout.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A registered node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub node_id: String,
    pub address: String,
}

#[derive(Debug)]
struct Entry {
    address: String,
    last_seen: Instant,
}

pub struct Registry {
    nodes: RwLock<HashMap<String, Entry>>,
    liveness_timeout: Duration,
}

impl Registry {
    pub fn new(liveness_timeout: Duration) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            liveness_timeout,
        }
    }

    /// Record a node and return the timeout it must honour.
    ///
    /// Registering an id again replaces its address.
    pub async fn add_node(&self, node_id: &str, address: &str) -> Duration {
        let mut nodes = self.nodes.write().await;
        let previous = nodes.insert(
            node_id.to_string(),
            Entry {
                address: address.to_string(),
                last_seen: Instant::now(),
            },
        );
        if let Some(prev) = previous {
            info!(%node_id, old = %prev.address, new = %address, "node re-registered");
        } else {
            info!(%node_id, %address, "node registered");
        }
        self.liveness_timeout
    }

    /// Refresh a node's last-seen time. Returns false for unknown ids.
    pub async fn ping(&self, node_id: &str) -> bool {
        let mut nodes = self.nodes.write().await;
        match nodes.get_mut(node_id) {
            Some(entry) => {
                entry.last_seen = Instant::now();
                debug!(%node_id, "ping received");
                true
            }
            None => {
                warn!(%node_id, "ping from unknown node");
                false
            }
        }
    }

    pub async fn remove(&self, node_id: &str) -> bool {
        let removed = self.nodes.write().await.remove(node_id).is_some();
        if removed {
            info!(%node_id, "node removed");
        }
        removed
    }

    /// Registered nodes, sorted by id.
    pub async fn members(&self) -> Vec<Member> {
        let nodes = self.nodes.read().await;
        let mut members: Vec<Member> = nodes
            .iter()
            .map(|(id, e)| Member {
                node_id: id.clone(),
                address: e.address.clone(),
            })
            .collect();
        members.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        members
    }

    /// Drop nodes not heard from within the liveness timeout.
    pub async fn reap_expired(&self) -> Vec<String> {
        let now = Instant::now();
        let mut nodes = self.nodes.write().await;
        let expired: Vec<String> = nodes
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_seen) > self.liveness_timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            nodes.remove(id);
            warn!(node_id = %id, "node expired");
        }
        expired
    }
}
