//! Initialize command - writes a single node's `betmesh.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use betmesh_config::{BetmeshConfig, Paths};

use crate::style::{
    colors::SemanticStyle, print_hint, print_labeled, print_spacer, print_success,
};

pub fn run(path: &str, node_id: u32) -> Result<()> {
    let dir = Path::new(path);

    if Paths::is_initialized(dir) {
        bail!(
            "Node already initialized in {}. betmesh.toml already exists.",
            dir.display()
        );
    }

    fs::create_dir_all(dir).context("Failed to create node directory")?;

    let mut config = BetmeshConfig::default();
    config.node.id = node_id;
    config.node.data_dir = Paths::node_data_dir();
    let config_path = Paths::project_config_file(dir);
    fs::write(&config_path, config.to_toml()?).context("Failed to write betmesh.toml")?;

    let gitignore = dir.join(".gitignore");
    if !gitignore.exists() {
        fs::write(&gitignore, Paths::node_gitignore()).context("Failed to write .gitignore")?;
    }

    print_success(&format!("Initialized node {node_id}"));
    print_labeled("Config", &config_path.display().to_string().code());
    print_labeled("HTTP", &config.node.http_addr);
    print_labeled("Gossip", &config.node.gossip_addr);
    print_spacer();
    print_hint("Add [[peers]] entries to betmesh.toml, then run:");
    println!("  {}", format!("betmesh start {path}").code());

    Ok(())
}
