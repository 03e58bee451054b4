//! # meshtree simulation
//!
//! A frame-stepped radio mesh simulator comparing two forwarding strategies:
//! unconditional flooding and a learned "knowledge tree" that withholds
//! copies when a node can prove they would only retrace a known branch.
//!
//! ## Overview
//!
//! Every frame, each node forwards the copies it holds to some of its
//! neighbors. A receiver addressed by two or more senders in the same frame
//! hears nothing (collision). Every successful reception teaches the
//! receiver the reverse of the path the copy travelled.
//!
//! ## Architecture
//!
//! - **Topology** (`topology.rs`): validated, symmetric neighbor map and builders
//! - **Node** (`node.rs`): pending queue plus knowledge store
//! - **Engine** (`engine.rs`): the per-frame phases and [`FrameReport`]
//! - **Stats** (`stats.rs`): [`StatsCollector`] and [`ComparisonStats`]
//! - **Phases** (`phases.rs`): learning and comparison runs
//! - **Simulation** (`simulation.rs`): config, driver and Flood vs Tree report
//! - **Scenarios** (`scenarios.rs`): small hand-built demonstrations
//!
//! ## Example
//!
//! ```rust
//! use meshtree_simulation::*;
//!
//! let config = SimConfig {
//!     node_count: 10,
//!     seed: Some(7),
//!     ..Default::default()
//! };
//! let mut sim = Simulation::new(config).unwrap();
//! sim.run_learning().unwrap();
//!
//! let phase = sim.comparison_phase().unwrap();
//! let report = sim.compare(&phase).unwrap();
//! assert_eq!(report.flood.algorithm, Algorithm::Flood);
//! ```

pub mod engine;
pub mod error;
pub mod node;
pub mod phases;
pub mod scenarios;
pub mod simulation;
pub mod stats;
pub mod topology;

#[cfg(test)]
mod integration_scenarios;

// Re-export main types
pub use engine::{
    ArrivalPolicy, Collision, Completion, EngineConfig, FrameReport, Rejection, Transmission,
    TransmissionEngine, Withheld,
};
pub use error::{EngineError, EngineResult, SimError, SimResult, TopologyError};
pub use node::{Node, PendingCopy};
pub use phases::{
    ComparisonPhase, DEFAULT_COMPARISON_FRAMES, LEARNING_INTERVAL, LearningPhase, MessageRequest,
    PhaseOutcome,
};
pub use scenarios::Scenario;
pub use simulation::{ComparisonReport, SimConfig, Simulation};
pub use stats::{ComparisonStats, StatsCollector};
pub use topology::{Topology, TopologyBuilder, TopologyKind};

pub use meshtree_core::{
    Algorithm, CompletionReason, Message, MessageId, MessageState, NodeId, RunMode,
};
pub use meshtree_routing::{KnowledgeStore, LearningMode, TreeVariant};
