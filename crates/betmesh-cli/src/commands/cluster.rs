//! Cluster commands - generate configs for a local N-node cluster.

use std::path::Path;

use anyhow::{Context, Result};
use betmesh_config::ClusterTopology;

use crate::style::{colors::SemanticStyle, print_hint, print_spacer, print_success};

pub fn init(path: &str, nodes: usize, base_http_port: u16, base_gossip_port: u16) -> Result<()> {
    println!("Initializing {nodes}-node cluster in {}...", path.code());

    let topology = ClusterTopology::local(nodes, base_http_port, base_gossip_port, Path::new(path))
        .context("Failed to plan cluster")?;
    topology.write().context("Failed to write node configs")?;

    print_success("Cluster initialized");
    print_spacer();
    for (id, node) in topology.nodes().iter().enumerate() {
        println!(
            "  Node {} → http {} gossip {} ({})",
            node.node.id,
            node.node.http_addr,
            node.node.gossip_addr,
            topology.node_dir(id).display().to_string().muted()
        );
    }
    print_spacer();
    print_hint("Start each node in its own terminal:");
    for id in 0..topology.nodes().len() {
        println!(
            "  {}",
            format!("betmesh start {}", topology.node_dir(id).display()).code()
        );
    }

    Ok(())
}
