//! Configuration commands.

use anyhow::{Context, Result, bail};
use betmesh_config::{BetmeshConfig, Paths};
use std::path::Path;

use crate::style::colors::SemanticStyle;

/// Show the effective configuration of a node directory.
pub fn show(path: &str, format: &str) -> Result<()> {
    let dir = Path::new(path);

    if !Paths::is_initialized(dir) {
        bail!(
            "Node not initialized. Run 'betmesh init {}' first.",
            dir.display()
        );
    }

    let config = BetmeshConfig::load_from_dir(dir).context("Failed to load configuration")?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        "toml" => println!("{}", config.to_toml()?),
        _ => print_text(&config),
    }
    Ok(())
}

fn print_text(config: &BetmeshConfig) {
    println!("{}", "betmesh configuration".header());
    println!();

    println!("Node:");
    println!("  Id: {}", config.node.id);
    println!("  Data directory: {}", config.node.data_dir.display());
    println!("  HTTP address: {}", config.node.http_addr);
    println!("  Gossip address: {}", config.node.gossip_addr);
    println!();

    println!("Peers:");
    if config.peers.is_empty() {
        println!("  {}", "none".muted());
    }
    for peer in &config.peers {
        println!("  http {} gossip {}", peer.http, peer.gossip);
    }
    println!();

    println!("Gossip:");
    println!("  Queue depth: {}", config.gossip.queue_depth);
    println!("  Max frame bytes: {}", config.gossip.max_frame_bytes);
    println!("  Dial attempts: {}", config.gossip.dial_attempts);
    println!("  Dial backoff: {}ms", config.gossip.dial_backoff_ms);
    println!();

    println!("Oracle:");
    println!("  Timeout: {}ms", config.oracle.timeout_ms);
    println!();

    println!("Storage:");
    println!("  In memory: {}", config.storage.in_memory);
    println!("  Sync writes: {}", config.storage.sync_writes);
}
