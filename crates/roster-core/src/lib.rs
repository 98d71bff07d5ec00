//! roster-core — shared types and configuration for Roster nodes and
//! the coordinator.

pub mod config;
pub mod types;

pub use config::{ConfigError, CoordinatorConfig, NodeConfig, RosterConfig};
pub use types::*;
