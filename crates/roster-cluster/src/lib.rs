//! roster-cluster — node-side cluster participation for Roster.
//!
//! Provides the gRPC service definitions, the coordinator client used for
//! registration and heartbeats, the inbound person service, the
//! coordinator-side registry, and the lifecycle manager that ties them
//! together.
//!
//! # Architecture
//!
//! ```text
//! Coordinator
//!   └── RegistryServer (gRPC NodeService)
//!       ├── AddNode() → records node, grants liveness timeout
//!       └── Ping()    → refreshes last-seen, NOT_FOUND if unknown
//!
//! Node
//!   └── NodeLifecycle  Created → Initialized → Connected → Serving → Stopped
//!       ├── PersonStore          (init)
//!       ├── GrpcCoordinator      (connect)
//!       ├── register()           (serve: one-shot, fatal on failure)
//!       ├── run_heartbeat()      (serve: every timeout / 2, fatal on failure)
//!       └── PersonServer         (serve: inbound gRPC PersonService)
//! ```

pub mod coordinator;
pub mod heartbeat;
pub mod node;
pub mod registration;
pub mod registry;
pub mod server;
pub mod service;

/// Generated protobuf types and gRPC service stubs.
pub mod proto {
    tonic::include_proto!("roster");
}

pub use coordinator::{Coordinator, CoordinatorError, GrpcCoordinator};
pub use heartbeat::run_heartbeat;
pub use node::{LifecycleState, NodeError, NodeIdentity, NodeLifecycle};
pub use registration::{register, LivenessContract};
pub use registry::Registry;
pub use server::RegistryServer;
pub use service::PersonServer;
