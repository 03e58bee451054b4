//! Simulation driver
//!
//! Ties a topology, an engine and the two phases together. A typical run:
//!
//! ```text
//! Simulation::new(config)
//!     .run_learning()          // flood, fill knowledge
//!     .compare(&comparison)    // same messages under Flood and Tree
//! ```

use std::fmt;
use std::path::Path;

use meshtree_core::{Algorithm, Message};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{EngineConfig, TransmissionEngine};
use crate::error::{SimError, SimResult};
use crate::phases::{ComparisonPhase, DEFAULT_COMPARISON_FRAMES, LearningPhase, PhaseOutcome};
use crate::stats::ComparisonStats;
use crate::topology::{Topology, TopologyBuilder, TopologyKind};

/// Configuration for a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub node_count: usize,
    pub topology: TopologyKind,
    /// Seed for topology and comparison messages; random when unset
    pub seed: Option<u64>,
    /// Hop budget per message; derived from the node count when unset
    pub hop_limit: Option<u32>,
    /// Learning message count; derived from the node count when unset
    pub learning_messages: Option<usize>,
    pub comparison_messages: usize,
    pub comparison_frames: u64,
    pub engine: EngineConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            node_count: 10,
            topology: TopologyKind::default(),
            seed: None,
            hop_limit: None,
            learning_messages: None,
            comparison_messages: 10,
            comparison_frames: DEFAULT_COMPARISON_FRAMES,
            engine: EngineConfig::default(),
        }
    }
}

impl SimConfig {
    /// Read a JSON config file; missing fields take their defaults
    pub fn load_json(path: impl AsRef<Path>) -> SimResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> SimResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.node_count < 2 {
            return Err(SimError::InvalidConfig(format!(
                "node_count must be at least 2, got {}",
                self.node_count
            )));
        }
        if self.hop_limit == Some(0) {
            return Err(SimError::InvalidConfig("hop_limit must be positive".into()));
        }
        if self.comparison_frames == 0 {
            return Err(SimError::InvalidConfig(
                "comparison_frames must be positive".into(),
            ));
        }
        if self.engine.routes_per_destination == 0 {
            return Err(SimError::InvalidConfig(
                "routes_per_destination must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Effective hop budget
    pub fn hop_limit(&self) -> u32 {
        self.hop_limit
            .unwrap_or_else(|| Message::hop_limit_for(self.node_count))
    }
}

/// Flood and Tree statistics over the same comparison messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub flood: ComparisonStats,
    pub tree: ComparisonStats,
}

impl ComparisonReport {
    /// Transmissions Tree saved relative to Flood, as a fraction of Flood's
    pub fn transmission_savings(&self) -> f64 {
        if self.flood.total_transmissions == 0 {
            return 0.0;
        }
        1.0 - self.tree.total_transmissions as f64 / self.flood.total_transmissions as f64
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn latency(stats: &ComparisonStats) -> String {
            stats
                .average_latency()
                .map_or_else(|| "n/a".to_string(), |l| format!("{l:.2}"))
        }

        writeln!(f, "{:<24} {:>10} {:>10}", "", "flood", "tree")?;
        let rows = [
            ("Completed", self.flood.messages_completed, self.tree.messages_completed),
            ("Reached target", self.flood.messages_reached_target, self.tree.messages_reached_target),
            ("Hop limit exceeded", self.flood.messages_hop_limit_exceeded, self.tree.messages_hop_limit_exceeded),
            ("Stalled", self.flood.messages_stalled, self.tree.messages_stalled),
            ("Unfinished", self.flood.messages_unfinished, self.tree.messages_unfinished),
            ("Transmissions", self.flood.total_transmissions, self.tree.total_transmissions),
            ("Receptions", self.flood.successful_receptions, self.tree.successful_receptions),
            ("Collisions", self.flood.total_collisions, self.tree.total_collisions),
            ("Withheld", self.flood.copies_withheld, self.tree.copies_withheld),
            ("Distinct paths", self.flood.distinct_paths, self.tree.distinct_paths),
        ];
        for (label, flood, tree) in rows {
            writeln!(f, "{label:<24} {flood:>10} {tree:>10}")?;
        }
        writeln!(
            f,
            "{:<24} {:>9.1}% {:>9.1}%",
            "Success rate",
            self.flood.success_rate() * 100.0,
            self.tree.success_rate() * 100.0
        )?;
        writeln!(
            f,
            "{:<24} {:>10} {:>10}",
            "Avg latency (frames)",
            latency(&self.flood),
            latency(&self.tree)
        )?;
        write!(
            f,
            "Tree saved {:.1}% of transmissions",
            self.transmission_savings() * 100.0
        )
    }
}

/// A mesh plus its engine, ready to learn and compare
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimConfig,
    seed: u64,
    engine: TransmissionEngine,
}

impl Simulation {
    /// Build the configured topology; draws a seed when none is set
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let topology = TopologyBuilder::new(config.node_count).build(config.topology, seed)?;
        Ok(Self::assemble(config, seed, topology))
    }

    /// Use an explicit topology; `config.node_count` and `config.topology`
    /// are ignored
    pub fn with_topology(config: SimConfig, topology: Topology) -> SimResult<Self> {
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let config = SimConfig {
            node_count: topology.node_count(),
            ..config
        };
        config.validate()?;
        Ok(Self::assemble(config, seed, topology))
    }

    fn assemble(config: SimConfig, seed: u64, topology: Topology) -> Self {
        info!(
            nodes = topology.node_count(),
            edges = topology.edge_count(),
            kind = %config.topology,
            seed,
            "Simulation created"
        );
        let engine = TransmissionEngine::new(topology, config.engine.clone());
        Self {
            config,
            seed,
            engine,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Seed actually in use
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn topology(&self) -> &Topology {
        self.engine.topology()
    }

    pub fn engine(&self) -> &TransmissionEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TransmissionEngine {
        &mut self.engine
    }

    pub fn learning_phase(&self) -> SimResult<LearningPhase> {
        let hop_limit = self.config.hop_limit();
        match self.config.learning_messages {
            Some(count) => LearningPhase::generate_with_count(self.topology(), hop_limit, count),
            None => LearningPhase::generate(self.topology(), hop_limit),
        }
    }

    /// Generate and run the learning phase
    pub fn run_learning(&mut self) -> SimResult<PhaseOutcome> {
        let phase = self.learning_phase()?;
        Ok(phase.run(&mut self.engine, None)?)
    }

    /// Comparison messages drawn from `seed + 1`
    pub fn comparison_phase(&self) -> SimResult<ComparisonPhase> {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(1));
        ComparisonPhase::generate(
            self.topology(),
            self.config.comparison_messages,
            self.config.hop_limit(),
            self.config.comparison_frames,
            &mut rng,
        )
    }

    /// Run `phase` under one algorithm on this engine's current knowledge
    pub fn run_comparison(
        &mut self,
        phase: &ComparisonPhase,
        algorithm: Algorithm,
    ) -> SimResult<ComparisonStats> {
        run_scored(&mut self.engine, phase, algorithm)
    }

    /// Run `phase` under Flood and under Tree from the same knowledge
    ///
    /// Each algorithm runs on its own copy of the engine, so neither sees
    /// what the other learned. The simulation's own engine is left untouched.
    pub fn compare(&self, phase: &ComparisonPhase) -> SimResult<ComparisonReport> {
        let mut flood_engine = self.engine.clone();
        let mut tree_engine = self.engine.clone();
        let flood = run_scored(&mut flood_engine, phase, Algorithm::Flood)?;
        let tree = run_scored(&mut tree_engine, phase, Algorithm::Tree)?;
        info!(
            flood_tx = flood.total_transmissions,
            tree_tx = tree.total_transmissions,
            flood_delivered = flood.messages_reached_target,
            tree_delivered = tree.messages_reached_target,
            "Comparison finished"
        );
        Ok(ComparisonReport { flood, tree })
    }
}

fn run_scored(
    engine: &mut TransmissionEngine,
    phase: &ComparisonPhase,
    algorithm: Algorithm,
) -> SimResult<ComparisonStats> {
    let mut stats = ComparisonStats::new(algorithm);
    let outcome = phase.run(engine, algorithm, Some(&mut stats))?;
    stats.finish(&outcome.messages);
    Ok(stats)
}
