//! betmesh command line.
//!
//! # Quick Start
//!
//! ```bash
//! # Generate configs for three nodes on this machine
//! betmesh cluster init ./cluster --nodes 3
//!
//! # Start each one (separate terminals)
//! betmesh start ./cluster/node-0
//! betmesh start ./cluster/node-1
//! betmesh start ./cluster/node-2
//! ```

mod commands;
mod style;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// betmesh - a replicated betting ledger.
#[derive(Parser)]
#[command(name = "betmesh")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Initialize a node directory with a default betmesh.toml.
    Init {
        /// Node directory to create.
        path: String,

        /// Identifier stamped into the bets this node accepts.
        #[arg(long, default_value = "0")]
        node_id: u32,
    },

    /// Run a node until interrupted.
    Start {
        /// Node directory holding betmesh.toml.
        #[arg(default_value = ".")]
        path: String,

        /// HTTP address override (port only: 8080, or full: 0.0.0.0:8080).
        #[arg(long)]
        http: Option<String>,

        /// Gossip address override.
        #[arg(long)]
        gossip: Option<String>,
    },

    /// Local cluster helpers.
    #[command(subcommand)]
    Cluster(ClusterCommands),

    /// Configuration inspection.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ClusterCommands {
    /// Write node-<i>/betmesh.toml for N nodes that peer with each other.
    Init {
        /// Root directory for the node directories.
        path: String,

        /// Number of nodes.
        #[arg(short, long, default_value = "3")]
        nodes: usize,

        /// HTTP port of node 0; node i uses this plus i.
        #[arg(long, default_value = "8080")]
        base_http_port: u16,

        /// Gossip port of node 0; node i uses this plus i.
        #[arg(long, default_value = "9080")]
        base_gossip_port: u16,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration after all layers are merged.
    Show {
        /// Node directory.
        #[arg(default_value = ".")]
        path: String,

        /// Output format: text, json or toml.
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() {
    let cli = Cli::parse();
    style::set_no_color(cli.no_color);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = dispatch(cli.command) {
        style::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Init { path, node_id } => commands::init::run(&path, node_id),
        Commands::Start { path, http, gossip } => {
            commands::start::run(&path, http.as_deref(), gossip.as_deref())
        }
        Commands::Cluster(ClusterCommands::Init {
            path,
            nodes,
            base_http_port,
            base_gossip_port,
        }) => commands::cluster::init(&path, nodes, base_http_port, base_gossip_port),
        Commands::Config(ConfigCommands::Show { path, format }) => {
            commands::config::show(&path, &format)
        }
    }
}
