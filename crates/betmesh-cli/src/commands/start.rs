//! Start command - runs one node until Ctrl+C.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result, bail};
use betmesh_config::{BetmeshConfig, ConfigLoader, Paths};
use tracing::info;

use crate::style::{colors::SemanticStyle, print_labeled, print_spacer, print_warn};

pub fn run(path: &str, http: Option<&str>, gossip: Option<&str>) -> Result<()> {
    let dir = Path::new(path);
    if !Paths::is_initialized(dir) {
        print_warn(&format!(
            "No betmesh.toml in {}, using defaults",
            dir.display()
        ));
    }

    let mut config = ConfigLoader::new()
        .with_project_dir(dir)
        .load()
        .context("Failed to load configuration")?;
    if let Some(http) = http {
        config.node.http_addr = parse_address(http)?.to_string();
    }
    if let Some(gossip) = gossip {
        config.node.gossip_addr = parse_address(gossip)?.to_string();
    }
    config.validate().context("Invalid configuration")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(serve(config))
}

async fn serve(config: BetmeshConfig) -> Result<()> {
    let node = betmesh_server::start(&config)
        .await
        .context("Failed to start node")?;

    println!("{}", "betmesh node".header());
    print_labeled("Node id", &config.node.id.to_string());
    print_labeled("HTTP", &node.http_addr().to_string().code());
    print_labeled("Gossip", &node.gossip_addr().to_string().code());
    print_labeled("Peers", &config.peers.len().to_string());
    let storage = if config.storage.in_memory {
        "in memory".to_string()
    } else {
        config.node.data_dir.display().to_string()
    };
    print_labeled("Storage", &storage);
    print_spacer();
    println!("Node is ready. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("interrupt received");

    node.shutdown().await.context("Node did not stop cleanly")?;
    print_spacer();
    println!("Node stopped gracefully.");
    Ok(())
}

/// Parses an address string into a `SocketAddr`.
///
/// Accepts:
/// - Port only: "8080" -> "127.0.0.1:8080"
/// - Full address: "0.0.0.0:8080"
/// - IPv6: `[::1]:8080`
fn parse_address(address: &str) -> Result<SocketAddr> {
    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(port) = address.parse::<u16>() {
        return Ok(SocketAddr::from(([127, 0, 0, 1], port)));
    }

    bail!(
        "Invalid address '{address}'. Use a port (e.g., '8080') or full address (e.g., '127.0.0.1:8080')"
    );
}
