//! meshtree - mesh forwarding simulator
//!
//! Floods a learning workload through a radio mesh, then compares flooding
//! against knowledge-tree forwarding on the same messages.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use meshtree_logging::{FileConfig, LogConfig, SubscriberBuilder};
use serde::Serialize;
use tracing::info;

use meshtree_simulation::{
    Algorithm, ArrivalPolicy, LearningMode, NodeId, Scenario, SimConfig, Simulation, TopologyBuilder,
    TopologyKind, TreeVariant, scenarios,
};

#[derive(Parser)]
#[command(
    name = "meshtree",
    about = "Frame-stepped mesh simulator: flooding vs knowledge-tree forwarding",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// JSON config file; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write a JSONL log into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run only the learning phase and show what nodes learned
    Learn {
        #[command(flatten)]
        mesh: MeshArgs,

        /// Print the knowledge of this node
        #[arg(long)]
        show_node: Option<u32>,
    },

    /// Learn, then run the comparison messages under one algorithm
    Run {
        #[command(flatten)]
        mesh: MeshArgs,

        /// Forwarding algorithm: flood or tree
        #[arg(short, long, default_value = "tree")]
        algorithm: Algorithm,
    },

    /// Learn, then run the comparison messages under both algorithms
    Compare {
        #[command(flatten)]
        mesh: MeshArgs,
    },

    /// Run a pre-defined scenario: line, detour, compare
    Scenario {
        name: Scenario,

        #[command(flatten)]
        mesh: MeshArgs,
    },

    /// Create and visualize a topology
    Topology {
        #[command(flatten)]
        mesh: MeshArgs,
    },
}

/// Mesh and run options shared by every subcommand
#[derive(Args, Debug)]
struct MeshArgs {
    /// Number of nodes
    #[arg(short, long)]
    nodes: Option<usize>,

    /// Topology: line, ring, star, full-mesh, grid, random, geometric
    #[arg(short, long)]
    topology: Option<TopologyKind>,

    /// Comparison messages
    #[arg(short, long)]
    messages: Option<usize>,

    /// Comparison frames
    #[arg(short, long)]
    frames: Option<u64>,

    /// Seed for topology and message generation
    #[arg(short, long)]
    seed: Option<u64>,

    /// Hop budget per message
    #[arg(long)]
    hop_limit: Option<u32>,

    /// Learning messages (default depends on node count)
    #[arg(long)]
    learning_messages: Option<usize>,

    /// What receivers learn: bidirectional or source-only
    #[arg(long)]
    learning: Option<LearningMode>,

    /// Tree behavior when withholding is not proven: withhold or multi-path
    #[arg(long)]
    tree_variant: Option<TreeVariant>,

    /// Flood behavior at the target: continue or complete
    #[arg(long)]
    arrival: Option<ArrivalPolicy>,

    /// Reject copies of a message a node already accepted: true or false
    #[arg(long)]
    suppress_duplicates: Option<bool>,
}

impl MeshArgs {
    fn apply(&self, mut config: SimConfig) -> SimConfig {
        if let Some(nodes) = self.nodes {
            config.node_count = nodes;
        }
        if let Some(topology) = self.topology {
            config.topology = topology;
        }
        if let Some(messages) = self.messages {
            config.comparison_messages = messages;
        }
        if let Some(frames) = self.frames {
            config.comparison_frames = frames;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.hop_limit.is_some() {
            config.hop_limit = self.hop_limit;
        }
        if self.learning_messages.is_some() {
            config.learning_messages = self.learning_messages;
        }
        if let Some(learning) = self.learning {
            config.engine.learning = learning;
        }
        if let Some(variant) = self.tree_variant {
            config.engine.tree_variant = variant;
        }
        if let Some(arrival) = self.arrival {
            config.engine.flood_arrival = arrival;
        }
        if let Some(suppress) = self.suppress_duplicates {
            config.engine.suppress_duplicates = suppress;
        }
        config
    }
}

#[derive(Serialize)]
struct LearningSummary {
    seed: u64,
    frames: u64,
    messages: usize,
    completed: usize,
    reached_target: usize,
    routes: usize,
}

fn log_config(verbose: bool, log_dir: Option<PathBuf>) -> LogConfig {
    let mut config = LogConfig::development();
    if !verbose {
        config.default_level = "warn".to_string();
        config.console.level = Some("warn".to_string());
    }
    if let Some(directory) = log_dir {
        config.file = Some(FileConfig {
            directory,
            ..FileConfig::default()
        });
    }
    config
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = SubscriberBuilder::new()
        .with_config(log_config(cli.verbose, cli.log_dir.clone()))
        .init();

    let base = match &cli.config {
        Some(path) => SimConfig::load_json(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SimConfig::default(),
    };

    match cli.command {
        Commands::Learn { mesh, show_node } => {
            let mut sim = Simulation::new(mesh.apply(base))?;
            let outcome = sim.run_learning()?;
            let summary = LearningSummary {
                seed: sim.seed(),
                frames: outcome.frames,
                messages: outcome.messages.len(),
                completed: outcome.completed(),
                reached_target: outcome
                    .messages
                    .values()
                    .filter(|m| m.target_received())
                    .count(),
                routes: sim.engine().route_count(),
            };
            if cli.json {
                print_json(&summary)?;
            } else {
                println!("{}", sim.topology().visualize());
                println!(
                    "Learning: {} messages, {} frames, {} reached target, {} routes known (seed {})",
                    summary.messages,
                    summary.frames,
                    summary.reached_target,
                    summary.routes,
                    summary.seed
                );
            }
            if let Some(id) = show_node {
                let node = sim
                    .engine()
                    .node(NodeId(id))
                    .with_context(|| format!("node {id} is not in the mesh"))?;
                println!("{}", node.knowledge().render());
            }
        }
        Commands::Run { mesh, algorithm } => {
            let mut sim = Simulation::new(mesh.apply(base))?;
            sim.run_learning()?;
            let phase = sim.comparison_phase()?;
            let stats = sim.run_comparison(&phase, algorithm)?;
            if cli.json {
                print_json(&stats)?;
            } else {
                println!("{stats}");
            }
        }
        Commands::Compare { mesh } => {
            let mut sim = Simulation::new(mesh.apply(base))?;
            let learning = sim.run_learning()?;
            info!(frames = learning.frames, routes = sim.engine().route_count(), "Learned");
            let phase = sim.comparison_phase()?;
            let report = sim.compare(&phase)?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!("Seed: {}", sim.seed());
                println!("{report}");
            }
        }
        Commands::Scenario { name, mesh } => {
            scenarios::run_scenario(name, mesh.apply(base))?;
        }
        Commands::Topology { mesh } => {
            let config = mesh.apply(base);
            config.validate()?;
            let seed = config.seed.unwrap_or_default();
            let topology = TopologyBuilder::new(config.node_count).build(config.topology, seed)?;
            println!("{}", topology.visualize());
            println!(
                "{} nodes, {} links, avg degree {:.2}, connected: {}",
                topology.node_count(),
                topology.edge_count(),
                topology.average_degree(),
                topology.is_connected()
            );
        }
    }

    Ok(())
}
