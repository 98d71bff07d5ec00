//! rosterd — the Roster daemon.
//!
//! One binary, two roles:
//! - `node`: serve the person store, register with a coordinator, and
//!   heartbeat until stopped
//! - `coordinator`: accept node registrations and track liveness
//!
//! # Usage
//!
//! ```text
//! rosterd coordinator --listen 0.0.0.0:7700 --liveness-timeout-ms 10000
//! rosterd node --node-id n1 --coordinator 10.0.0.1:7700 --advertise-host 10.0.0.5
//! ```
//!
//! Both roles accept `--config roster.toml`; flags override file values.

mod coordinator_mode;
mod node_mode;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use roster_core::{CoordinatorConfig, NodeConfig, RosterConfig};

#[derive(Parser)]
#[command(name = "rosterd", about = "Roster daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run a node: person service plus coordinator registration.
    Node {
        /// TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Node identifier.
        #[arg(long)]
        node_id: Option<String>,

        /// Coordinator gRPC address (host:port).
        #[arg(long)]
        coordinator: Option<String>,

        /// Inbound listen address. Port 0 picks a free port.
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Host announced to the coordinator.
        #[arg(long)]
        advertise_host: Option<String>,
    },

    /// Run the coordinator.
    Coordinator {
        /// TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// gRPC listen address.
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Liveness timeout granted to nodes, in milliseconds.
        #[arg(long)]
        liveness_timeout_ms: Option<u64>,

        /// Expired-node sweep interval, in milliseconds.
        #[arg(long)]
        reap_interval_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rosterd=debug,roster=debug"));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }

    match cli.command {
        Command::Node {
            config,
            node_id,
            coordinator,
            listen,
            advertise_host,
        } => {
            let file = RosterConfig::load(config.as_deref())?;
            let node = apply_node_overrides(file.node, node_id, coordinator, listen, advertise_host);
            node_mode::run_node(node).await
        }
        Command::Coordinator {
            config,
            listen,
            liveness_timeout_ms,
            reap_interval_ms,
        } => {
            let file = RosterConfig::load(config.as_deref())?;
            let coord =
                apply_coordinator_overrides(file.coordinator, listen, liveness_timeout_ms, reap_interval_ms);
            coordinator_mode::run_coordinator(coord).await
        }
    }
}

fn apply_node_overrides(
    mut config: NodeConfig,
    node_id: Option<String>,
    coordinator: Option<String>,
    listen: Option<SocketAddr>,
    advertise_host: Option<String>,
) -> NodeConfig {
    if let Some(v) = node_id {
        config.node_id = v;
    }
    if let Some(v) = coordinator {
        config.coordinator_addr = v;
    }
    if let Some(v) = listen {
        config.listen_addr = v;
    }
    if let Some(v) = advertise_host {
        config.advertise_host = v;
    }
    config
}

fn apply_coordinator_overrides(
    mut config: CoordinatorConfig,
    listen: Option<SocketAddr>,
    liveness_timeout_ms: Option<u64>,
    reap_interval_ms: Option<u64>,
) -> CoordinatorConfig {
    if let Some(v) = listen {
        config.listen_addr = v;
    }
    if let Some(v) = liveness_timeout_ms {
        config.liveness_timeout_ms = v;
    }
    if let Some(v) = reap_interval_ms {
        config.reap_interval_ms = v;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_node_flags() {
        let cli = Cli::try_parse_from([
            "rosterd",
            "node",
            "--node-id",
            "n1",
            "--coordinator",
            "10.0.0.1:7700",
            "--listen",
            "0.0.0.0:0",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Node { node_id: Some(ref id), .. } if id == "n1"));
    }

    #[test]
    fn cli_rejects_bad_listen_addr() {
        assert!(Cli::try_parse_from(["rosterd", "coordinator", "--listen", "nowhere"]).is_err());
    }

    #[test]
    fn flags_override_file_values() {
        let file = NodeConfig {
            node_id: "from-file".into(),
            advertise_host: "10.0.0.5".into(),
            ..NodeConfig::default()
        };
        let merged = apply_node_overrides(file, Some("n1".into()), None, None, None);
        assert_eq!(merged.node_id, "n1");
        assert_eq!(merged.advertise_host, "10.0.0.5");

        let coord = apply_coordinator_overrides(CoordinatorConfig::default(), None, Some(250), None);
        assert_eq!(coord.liveness_timeout_ms, 250);
        assert_eq!(coord.reap_interval_ms, 5_000);
    }
}
