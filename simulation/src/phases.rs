//! Learning and comparison phases
//!
//! A run has two phases over the same engine:
//!
//! - **Learning**: a predetermined, seeded set of messages is flooded so
//!   every node fills its knowledge store
//! - **Comparison**: random messages are sent under one algorithm and scored
//!
//! Both phases restart the frame counter but keep learned knowledge.

use std::collections::BTreeMap;

use meshtree_core::{Algorithm, Message, MessageId, NodeId, RunMode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{FrameReport, TransmissionEngine};
use crate::error::{EngineResult, SimError, SimResult};
use crate::stats::StatsCollector;
use crate::topology::Topology;

/// Frames between two learning messages
pub const LEARNING_INTERVAL: u64 = 4;

/// Frames in a comparison run unless configured otherwise
pub const DEFAULT_COMPARISON_FRAMES: u64 = 60;

/// One source/target pair scheduled at a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRequest {
    pub source: NodeId,
    pub target: NodeId,
    pub start_frame: u64,
}

/// What a phase left behind
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    /// Frames actually stepped
    pub frames: u64,
    pub messages: BTreeMap<MessageId, Message>,
    pub reports: Vec<FrameReport>,
}

impl PhaseOutcome {
    pub fn completed(&self) -> usize {
        self.messages.values().filter(|m| m.is_completed()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.messages
            .values()
            .filter(|m| m.completion_reason().is_some_and(|r| r.is_success()))
            .count()
    }
}

fn build_messages(requests: &[MessageRequest], hop_limit: u32) -> BTreeMap<MessageId, Message> {
    requests
        .iter()
        .enumerate()
        .map(|(i, req)| {
            let id = MessageId(i as u64);
            (
                id,
                Message::new(id, req.source, req.target, hop_limit, req.start_frame),
            )
        })
        .collect()
}

/// Shorten the collector borrow to one frame
fn reborrow<'a>(stats: &'a mut Option<&mut dyn StatsCollector>) -> Option<&'a mut dyn StatsCollector> {
    match stats {
        Some(stats) => Some(&mut **stats),
        None => None,
    }
}

/// Pick a source and a distinct target uniformly
fn random_pair<R: Rng>(nodes: &[NodeId], rng: &mut R) -> (NodeId, NodeId) {
    let source = rng.random_range(0..nodes.len());
    let mut target = rng.random_range(0..nodes.len() - 1);
    if target >= source {
        target += 1;
    }
    (nodes[source], nodes[target])
}

fn require_two_nodes(topology: &Topology) -> SimResult<Vec<NodeId>> {
    let nodes = topology.node_ids();
    if nodes.len() < 2 {
        return Err(SimError::InvalidConfig(format!(
            "need at least 2 nodes to send messages, have {}",
            nodes.len()
        )));
    }
    Ok(nodes)
}

/// Predetermined messages flooded to build knowledge
#[derive(Debug, Clone)]
pub struct LearningPhase {
    requests: Vec<MessageRequest>,
    hop_limit: u32,
    frame_cap: u64,
}

impl LearningPhase {
    /// Number of learning messages for a mesh of `node_count` nodes
    pub fn message_count(node_count: usize) -> usize {
        match node_count {
            10 => 18,
            50 => 40,
            100 => 60,
            n => (n / 2).max(15),
        }
    }

    /// Seeded pairs for `topology`; the same mesh size always yields the
    /// same pairs
    pub fn generate(topology: &Topology, hop_limit: u32) -> SimResult<Self> {
        Self::generate_with_count(
            topology,
            hop_limit,
            Self::message_count(topology.node_count()),
        )
    }

    pub fn generate_with_count(topology: &Topology, hop_limit: u32, count: usize) -> SimResult<Self> {
        let nodes = require_two_nodes(topology)?;
        let mut rng = StdRng::seed_from_u64(nodes.len() as u64 * 1000);
        let pairs: Vec<(NodeId, NodeId)> = (0..count).map(|_| random_pair(&nodes, &mut rng)).collect();
        Ok(Self::from_pairs(&pairs, hop_limit))
    }

    /// One message per pair, every [`LEARNING_INTERVAL`] frames from frame 1
    pub fn from_pairs(pairs: &[(NodeId, NodeId)], hop_limit: u32) -> Self {
        let requests: Vec<MessageRequest> = pairs
            .iter()
            .enumerate()
            .map(|(i, &(source, target))| MessageRequest {
                source,
                target,
                start_frame: 1 + i as u64 * LEARNING_INTERVAL,
            })
            .collect();
        let last_start = requests.last().map_or(0, |r| r.start_frame);
        Self {
            requests,
            hop_limit,
            frame_cap: last_start + 2 * hop_limit as u64 + 4,
        }
    }

    pub fn with_frame_cap(mut self, frame_cap: u64) -> Self {
        self.frame_cap = frame_cap;
        self
    }

    pub fn requests(&self) -> &[MessageRequest] {
        &self.requests
    }

    pub fn hop_limit(&self) -> u32 {
        self.hop_limit
    }

    pub fn frame_cap(&self) -> u64 {
        self.frame_cap
    }

    pub fn messages(&self) -> BTreeMap<MessageId, Message> {
        build_messages(&self.requests, self.hop_limit)
    }

    /// Flood every learning message until all complete or the cap is hit
    pub fn run(
        &self,
        engine: &mut TransmissionEngine,
        mut stats: Option<&mut dyn StatsCollector>,
    ) -> EngineResult<PhaseOutcome> {
        info!(
            messages = self.requests.len(),
            hop_limit = self.hop_limit,
            "Learning phase started"
        );
        engine.reset_run();
        let mut messages = self.messages();
        let mut reports = Vec::new();

        while engine.frame() < self.frame_cap && messages.values().any(|m| !m.is_completed()) {
            let report = engine.step(
                &mut messages,
                RunMode::Learning,
                Algorithm::Flood,
                reborrow(&mut stats),
            )?;
            reports.push(report);
        }

        let outcome = PhaseOutcome {
            frames: engine.frame(),
            messages,
            reports,
        };
        info!(
            frames = outcome.frames,
            completed = outcome.completed(),
            routes = engine.route_count(),
            "Learning phase finished"
        );
        Ok(outcome)
    }
}

/// Random messages used to score one algorithm
#[derive(Debug, Clone)]
pub struct ComparisonPhase {
    requests: Vec<MessageRequest>,
    hop_limit: u32,
    total_frames: u64,
}

impl ComparisonPhase {
    /// Random pairs with start frames in `[1, total_frames - (hop_limit + 4)]`
    pub fn generate<R: Rng>(
        topology: &Topology,
        count: usize,
        hop_limit: u32,
        total_frames: u64,
        rng: &mut R,
    ) -> SimResult<Self> {
        let nodes = require_two_nodes(topology)?;
        let last_start = total_frames.saturating_sub(hop_limit as u64 + 4).max(1);
        let requests = (0..count)
            .map(|_| {
                let (source, target) = random_pair(&nodes, rng);
                MessageRequest {
                    source,
                    target,
                    start_frame: rng.random_range(1..=last_start),
                }
            })
            .collect();
        Ok(Self {
            requests,
            hop_limit,
            total_frames,
        })
    }

    pub fn from_requests(requests: Vec<MessageRequest>, hop_limit: u32, total_frames: u64) -> Self {
        Self {
            requests,
            hop_limit,
            total_frames,
        }
    }

    pub fn requests(&self) -> &[MessageRequest] {
        &self.requests
    }

    pub fn hop_limit(&self) -> u32 {
        self.hop_limit
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn messages(&self) -> BTreeMap<MessageId, Message> {
        build_messages(&self.requests, self.hop_limit)
    }

    /// Run `total_frames` frames, stopping early once every message completed
    pub fn run(
        &self,
        engine: &mut TransmissionEngine,
        algorithm: Algorithm,
        mut stats: Option<&mut dyn StatsCollector>,
    ) -> EngineResult<PhaseOutcome> {
        info!(
            %algorithm,
            messages = self.requests.len(),
            frames = self.total_frames,
            "Comparison phase started"
        );
        engine.reset_run();
        let mut messages = self.messages();
        let mut reports = Vec::new();

        while engine.frame() < self.total_frames && messages.values().any(|m| !m.is_completed()) {
            let report = engine.step(
                &mut messages,
                RunMode::Comparison,
                algorithm,
                reborrow(&mut stats),
            )?;
            reports.push(report);
        }

        let outcome = PhaseOutcome {
            frames: engine.frame(),
            messages,
            reports,
        };
        info!(
            %algorithm,
            frames = outcome.frames,
            completed = outcome.completed(),
            succeeded = outcome.succeeded(),
            "Comparison phase finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::topology::TopologyBuilder;

    #[test]
    fn test_message_counts() {
        assert_eq!(LearningPhase::message_count(10), 18);
        assert_eq!(LearningPhase::message_count(50), 40);
        assert_eq!(LearningPhase::message_count(100), 60);
        assert_eq!(LearningPhase::message_count(12), 15);
        assert_eq!(LearningPhase::message_count(80), 40);
    }

    #[test]
    fn test_learning_pairs_are_deterministic() {
        let topo = TopologyBuilder::new(10).ring().unwrap();
        let a = LearningPhase::generate(&topo, 4).unwrap();
        let b = LearningPhase::generate(&topo, 4).unwrap();
        assert_eq!(a.requests(), b.requests());
        assert_eq!(a.requests().len(), 18);
        assert!(a.requests().iter().all(|r| r.source != r.target));

        let starts: Vec<u64> = a.requests().iter().take(3).map(|r| r.start_frame).collect();
        assert_eq!(starts, vec![1, 5, 9]);
    }

    #[test]
    fn test_learning_fills_knowledge() {
        let topo = TopologyBuilder::new(10).geometric(3).unwrap();
        let mut engine = TransmissionEngine::new(topo.clone(), EngineConfig::default());
        let phase = LearningPhase::generate(&topo, 4).unwrap();

        let outcome = phase.run(&mut engine, None).unwrap();

        assert_eq!(outcome.completed(), 18);
        assert!(outcome.frames <= phase.frame_cap());
        assert!(engine.route_count() > 0);
        assert!(engine.nodes().filter(|n| !n.knowledge().is_empty()).count() > 1);
    }

    #[test]
    fn test_comparison_start_window() {
        let topo = TopologyBuilder::new(10).ring().unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let phase = ComparisonPhase::generate(&topo, 50, 4, 60, &mut rng).unwrap();

        assert_eq!(phase.requests().len(), 50);
        assert!(
            phase
                .requests()
                .iter()
                .all(|r| (1..=52).contains(&r.start_frame) && r.source != r.target)
        );
    }

    #[test]
    fn test_comparison_runs_to_frame_budget() {
        let topo = TopologyBuilder::new(6).line().unwrap();
        let mut engine = TransmissionEngine::new(topo.clone(), EngineConfig::default());
        let phase = ComparisonPhase::from_requests(
            vec![MessageRequest {
                source: NodeId(0),
                target: NodeId(5),
                start_frame: 1,
            }],
            8,
            3,
        );

        let outcome = phase.run(&mut engine, Algorithm::Flood, None).unwrap();

        assert_eq!(outcome.frames, 3);
        assert_eq!(outcome.completed(), 0);
        assert_eq!(outcome.reports.len(), 3);
    }

    #[test]
    fn test_single_node_is_rejected() {
        let topo = Topology::from_adjacency(BTreeMap::from([(NodeId(0), Default::default())])).unwrap();
        assert!(matches!(
            LearningPhase::generate(&topo, 4),
            Err(SimError::InvalidConfig(_))
        ));
    }
}
