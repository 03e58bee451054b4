//! Frame-stepped transmission engine
//!
//! [`TransmissionEngine::step`] advances the mesh by one frame. The phases
//! always run in this order:
//!
//! 0. **Admit**: waiting messages whose start frame has come are started and
//!    their first copy is queued at the source
//! 1. **Expire**: copies with no hops left are dropped; a message left with
//!    no copies completes (hop limit, or success if the target was reached)
//! 2. **Stall**: any active message with no copies left completes
//! 3. **Collect**: every node drains its queue through the forwarding router
//! 4. **Collide**: a receiver addressed by two or more senders gets nothing
//! 5. **Receive**: surviving transmissions create new copies and feed the
//!    receivers' knowledge
//! 6. **Arrive**: the target records arrival; completion depends on the
//!    algorithm, run mode and [`ArrivalPolicy`]
//! 7. **Report**: the [`FrameReport`] goes to the optional collector
//!
//! Collision detection therefore always sees every transmission of the
//! frame before anything is delivered.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use meshtree_core::{
    Algorithm, CompletionReason, ForwardDecision, Message, MessageId, NodeId, ParseEnumError,
    RunMode,
};
use meshtree_routing::{DecisionContext, ForwardingRouter, LearningMode, TreeVariant};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, info, trace};

use crate::error::{EngineError, EngineResult};
use crate::node::{Node, PendingCopy};
use crate::stats::StatsCollector;
use crate::topology::Topology;

/// What flooding does once a copy reaches the target in comparison runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalPolicy {
    /// Complete with success immediately and purge remaining copies
    CompleteOnArrival,
    /// Let remaining copies run until they expire or stall
    #[default]
    Continue,
}

impl FromStr for ArrivalPolicy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "complete" | "complete-on-arrival" => Ok(ArrivalPolicy::CompleteOnArrival),
            "continue" => Ok(ArrivalPolicy::Continue),
            _ => Err(ParseEnumError {
                kind: "arrival policy",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ArrivalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrivalPolicy::CompleteOnArrival => write!(f, "complete-on-arrival"),
            ArrivalPolicy::Continue => write!(f, "continue"),
        }
    }
}

/// Engine behavior knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Which destinations a receiver learns from a copy's path
    pub learning: LearningMode,
    /// Tree behavior when withholding is not proven
    pub tree_variant: TreeVariant,
    /// Flood behavior on arrival in comparison runs
    pub flood_arrival: ArrivalPolicy,
    /// Reject copies of a message a node has already accepted
    pub suppress_duplicates: bool,
    /// Routes retained per destination in each knowledge store
    pub routes_per_destination: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            learning: LearningMode::default(),
            tree_variant: TreeVariant::default(),
            flood_arrival: ArrivalPolicy::default(),
            suppress_duplicates: false,
            routes_per_destination: meshtree_routing::DEFAULT_ROUTES_PER_DESTINATION,
        }
    }
}

/// One proposed send from a node to a neighbor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transmission {
    pub sender: NodeId,
    pub receiver: NodeId,
    pub message: MessageId,
    /// Path of the sender's copy, ending at the sender
    pub path: Vec<NodeId>,
    /// Budget of the sender's copy; the receiver gets one less
    pub remaining_hops: u32,
}

/// A receiver that heard more than one sender in a frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collision {
    pub receiver: NodeId,
    pub senders: BTreeSet<NodeId>,
}

/// A copy the tree algorithm chose not to forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withheld {
    pub node: NodeId,
    pub message: MessageId,
    /// The neighbor behind which both source and target sit
    pub branch: NodeId,
}

/// A delivered copy rejected as a duplicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub receiver: NodeId,
    pub message: MessageId,
}

/// A message that reached a terminal state this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub message: MessageId,
    pub reason: CompletionReason,
}

/// Everything that happened in one frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame: u64,
    /// Messages started this frame
    pub started: Vec<MessageId>,
    /// Copies dropped for having no hops left
    pub expired: usize,
    /// Every proposed transmission, collided or not
    pub transmissions: Vec<Transmission>,
    pub senders: BTreeSet<NodeId>,
    /// Nodes that accepted at least one copy
    pub receivers: BTreeSet<NodeId>,
    /// Copies accepted across all receivers
    pub accepted: usize,
    pub collisions: Vec<Collision>,
    pub rejected: Vec<Rejection>,
    pub withheld: Vec<Withheld>,
    /// Messages whose target was reached for the first time
    pub arrivals: Vec<MessageId>,
    pub completed: Vec<Completion>,
}

impl FrameReport {
    fn new(frame: u64) -> Self {
        Self {
            frame,
            ..Default::default()
        }
    }

    /// Transmissions that were not lost to a collision
    pub fn delivered(&self) -> impl Iterator<Item = &Transmission> {
        let collided: BTreeSet<NodeId> = self.collisions.iter().map(|c| c.receiver).collect();
        self.transmissions
            .iter()
            .filter(move |t| !collided.contains(&t.receiver))
    }

    pub fn is_collision(&self, node: NodeId) -> bool {
        self.collisions.iter().any(|c| c.receiver == node)
    }

    /// Whether anything at all happened
    pub fn is_quiet(&self) -> bool {
        self.started.is_empty()
            && self.transmissions.is_empty()
            && self.completed.is_empty()
            && self.expired == 0
    }
}

impl fmt::Display for FrameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame {}: {} tx from {} senders, {} receivers, {} collisions, {} withheld, {} completed",
            self.frame,
            self.transmissions.len(),
            self.senders.len(),
            self.receivers.len(),
            self.collisions.len(),
            self.withheld.len(),
            self.completed.len()
        )
    }
}

/// Owns the nodes of one mesh and advances them frame by frame
#[derive(Debug, Clone)]
pub struct TransmissionEngine {
    topology: Topology,
    nodes: BTreeMap<NodeId, Node>,
    router: ForwardingRouter,
    config: EngineConfig,
    frame: u64,
}

impl TransmissionEngine {
    pub fn new(topology: Topology, config: EngineConfig) -> Self {
        let nodes = topology
            .node_ids()
            .into_iter()
            .map(|id| {
                let neighbors = topology.neighbors(id).cloned().unwrap_or_default();
                (id, Node::new(id, neighbors, config.routes_per_destination))
            })
            .collect();
        Self {
            router: ForwardingRouter::new(config.tree_variant),
            topology,
            nodes,
            config,
            frame: 0,
        }
    }

    /// Last completed frame (0 before the first step)
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Total learned routes across all nodes
    pub fn route_count(&self) -> usize {
        self.nodes.values().map(|n| n.knowledge().route_count()).sum()
    }

    /// Whether any node still holds a queued copy
    pub fn has_pending(&self) -> bool {
        self.nodes.values().any(Node::has_pending)
    }

    /// Clear queues, duplicate tracking and the frame counter; keep knowledge
    pub fn reset_run(&mut self) {
        for node in self.nodes.values_mut() {
            node.reset_run();
        }
        self.frame = 0;
    }

    /// Advance one frame
    pub fn step(
        &mut self,
        messages: &mut BTreeMap<MessageId, Message>,
        mode: RunMode,
        algorithm: Algorithm,
        stats: Option<&mut dyn StatsCollector>,
    ) -> EngineResult<FrameReport> {
        self.frame += 1;
        let frame = self.frame;
        let algorithm = mode.effective_algorithm(algorithm);
        let span = debug_span!("frame", frame, %mode, %algorithm);
        let _enter = span.enter();

        let mut report = FrameReport::new(frame);

        self.admit(messages, &mut report)?;
        self.expire(messages, &mut report)?;
        self.detect_stalled(messages, &mut report)?;
        let transmissions = self.collect(messages, algorithm, &mut report)?;
        report.transmissions = transmissions;
        self.detect_collisions(&mut report);
        self.apply_receptions(messages, mode, algorithm, &mut report)?;

        trace!("{report}");
        if let Some(stats) = stats {
            stats.record_frame(&report, messages);
        }
        Ok(report)
    }

    fn admit(
        &mut self,
        messages: &mut BTreeMap<MessageId, Message>,
        report: &mut FrameReport,
    ) -> EngineResult<()> {
        for message in messages.values_mut() {
            if !message.is_waiting() || message.start_frame > self.frame {
                continue;
            }
            if !self.nodes.contains_key(&message.target) {
                return Err(EngineError::UnknownNode(message.target));
            }
            let source = self
                .nodes
                .get_mut(&message.source)
                .ok_or(EngineError::UnknownNode(message.source))?;

            let path = message.start_transmission(self.frame)?;
            let verdict = source
                .knowledge()
                .subtree_analysis(message.source, message.target);
            source.mark_seen(message.id);
            source.enqueue(PendingCopy {
                message: message.id,
                path,
                remaining_hops: message.hop_limit,
                verdict,
            });
            report.started.push(message.id);
            debug!(message = %message.id, source = %message.source, target = %message.target, "Message started");

            if message.source == message.target {
                message.target_reached(self.frame);
                report.arrivals.push(message.id);
                let reason = CompletionReason::Success;
                complete(&mut self.nodes, message, reason, self.frame, report)?;
            }
        }
        Ok(())
    }

    fn expire(
        &mut self,
        messages: &mut BTreeMap<MessageId, Message>,
        report: &mut FrameReport,
    ) -> EngineResult<()> {
        let mut touched = BTreeSet::new();
        for node in self.nodes.values_mut() {
            for copy in node.take_expired() {
                report.expired += 1;
                let message = messages
                    .get_mut(&copy.message)
                    .ok_or(EngineError::UnknownMessage(copy.message))?;
                if message.is_active() {
                    message.release_copy(node.id())?;
                    touched.insert(copy.message);
                }
            }
        }

        for id in touched {
            let message = messages
                .get_mut(&id)
                .ok_or(EngineError::UnknownMessage(id))?;
            if message.is_active() && !message.has_active_copies() {
                let reason = if message.target_received() {
                    CompletionReason::Success
                } else {
                    CompletionReason::HopLimitExceeded
                };
                complete(&mut self.nodes, message, reason, self.frame, report)?;
            }
        }
        Ok(())
    }

    fn detect_stalled(
        &mut self,
        messages: &mut BTreeMap<MessageId, Message>,
        report: &mut FrameReport,
    ) -> EngineResult<()> {
        for message in messages.values_mut() {
            if message.is_active() && !message.has_active_copies() {
                let reason = if message.target_received() {
                    CompletionReason::Success
                } else {
                    CompletionReason::Stalled
                };
                complete(&mut self.nodes, message, reason, self.frame, report)?;
            }
        }
        Ok(())
    }

    fn collect(
        &mut self,
        messages: &mut BTreeMap<MessageId, Message>,
        algorithm: Algorithm,
        report: &mut FrameReport,
    ) -> EngineResult<Vec<Transmission>> {
        let mut transmissions = Vec::new();

        for node in self.nodes.values_mut() {
            let pending = node.take_pending();
            let mut sent = false;

            for copy in pending {
                let message = messages
                    .get_mut(&copy.message)
                    .ok_or(EngineError::UnknownMessage(copy.message))?;
                if !message.is_active() {
                    continue;
                }
                message.release_copy(node.id())?;

                let ctx = DecisionContext {
                    node: node.id(),
                    neighbors: node.neighbors(),
                    source: message.source,
                    target: message.target,
                    path: &copy.path,
                    remaining_hops: copy.remaining_hops,
                };
                let decision = self
                    .router
                    .decide_with_verdict(&ctx, node.knowledge(), algorithm, copy.verdict);
                match decision {
                    ForwardDecision::Forward { next_hops, reason } => {
                        trace!(node = %node.id(), message = %copy.message, ?reason, hops = next_hops.len(), "Forwarding");
                        for receiver in next_hops {
                            sent = true;
                            transmissions.push(Transmission {
                                sender: node.id(),
                                receiver,
                                message: copy.message,
                                path: copy.path.clone(),
                                remaining_hops: copy.remaining_hops,
                            });
                        }
                    }
                    ForwardDecision::Withhold { branch } => {
                        debug!(node = %node.id(), message = %copy.message, %branch, "Withheld");
                        report.withheld.push(Withheld {
                            node: node.id(),
                            message: copy.message,
                            branch,
                        });
                    }
                    ForwardDecision::Arrived | ForwardDecision::Exhausted => {}
                }
            }

            if sent {
                report.senders.insert(node.id());
            }
        }
        Ok(transmissions)
    }

    fn detect_collisions(&self, report: &mut FrameReport) {
        let mut senders_by_receiver: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for t in &report.transmissions {
            senders_by_receiver
                .entry(t.receiver)
                .or_default()
                .insert(t.sender);
        }
        for (receiver, senders) in senders_by_receiver {
            if senders.len() > 1 {
                debug!(%receiver, senders = senders.len(), "Collision");
                report.collisions.push(Collision { receiver, senders });
            }
        }
    }

    fn apply_receptions(
        &mut self,
        messages: &mut BTreeMap<MessageId, Message>,
        mode: RunMode,
        algorithm: Algorithm,
        report: &mut FrameReport,
    ) -> EngineResult<()> {
        let delivered: Vec<Transmission> = report.delivered().cloned().collect();

        for t in delivered {
            let message = messages
                .get_mut(&t.message)
                .ok_or(EngineError::UnknownMessage(t.message))?;
            // Completed earlier in this frame
            if !message.is_active() {
                continue;
            }
            let receiver = self
                .nodes
                .get_mut(&t.receiver)
                .ok_or(EngineError::UnknownNode(t.receiver))?;

            if self.config.suppress_duplicates && !receiver.mark_seen(t.message) {
                trace!(receiver = %t.receiver, message = %t.message, "Duplicate rejected");
                report.rejected.push(Rejection {
                    receiver: t.receiver,
                    message: t.message,
                });
                continue;
            }

            let remaining_hops = t.remaining_hops.saturating_sub(1);
            let path = message.create_new_copy(t.sender, t.receiver, &t.path, remaining_hops)?;
            // The proof is fixed before the copy's own path is learned
            let verdict = receiver
                .knowledge()
                .subtree_analysis(message.source, message.target);
            receiver
                .knowledge_mut()
                .learn(&self.config.learning, &path, self.frame)?;
            receiver.enqueue(PendingCopy {
                message: t.message,
                path,
                remaining_hops,
                verdict,
            });
            report.receivers.insert(t.receiver);
            report.accepted += 1;

            if t.receiver != message.target {
                continue;
            }
            if message.target_reached(self.frame) {
                report.arrivals.push(t.message);
                info!(message = %t.message, frame = self.frame, "Target reached");
            }
            let completes = match (mode, algorithm) {
                (RunMode::Learning, _) => false,
                (RunMode::Comparison, Algorithm::Tree) => true,
                (RunMode::Comparison, Algorithm::Flood) => {
                    self.config.flood_arrival == ArrivalPolicy::CompleteOnArrival
                }
            };
            if completes {
                complete(&mut self.nodes, message, CompletionReason::Success, self.frame, report)?;
            }
        }
        Ok(())
    }
}

/// Terminal transition plus purge of every queued copy
fn complete(
    nodes: &mut BTreeMap<NodeId, Node>,
    message: &mut Message,
    reason: CompletionReason,
    frame: u64,
    report: &mut FrameReport,
) -> EngineResult<()> {
    message.complete_message(reason, frame)?;
    let purged: usize = nodes.values_mut().map(|n| n.purge(message.id)).sum();
    info!(message = %message.id, ?reason, frame, purged, "Message completed");
    report.completed.push(Completion {
        message: message.id,
        reason,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshtree_core::MessageState;

    fn n(id: u32) -> NodeId {
        NodeId(id)
    }

    fn line(len: u32) -> Topology {
        let edges: Vec<(u32, u32)> = (1..len).map(|i| (i, i + 1)).collect();
        Topology::from_edges(&edges).unwrap()
    }

    fn one_message(source: u32, target: u32, hop_limit: u32) -> BTreeMap<MessageId, Message> {
        let msg = Message::new(MessageId(0), n(source), n(target), hop_limit, 1);
        BTreeMap::from([(msg.id, msg)])
    }

    fn run_until_done(
        engine: &mut TransmissionEngine,
        messages: &mut BTreeMap<MessageId, Message>,
        mode: RunMode,
        algorithm: Algorithm,
    ) -> Vec<FrameReport> {
        let mut reports = Vec::new();
        while messages.values().any(|m| !m.is_completed()) && engine.frame() < 50 {
            reports.push(engine.step(messages, mode, algorithm, None).unwrap());
        }
        reports
    }

    #[test]
    fn test_line_flood_delivers() {
        let mut engine = TransmissionEngine::new(line(4), EngineConfig::default());
        let mut messages = one_message(1, 4, 4);

        run_until_done(&mut engine, &mut messages, RunMode::Comparison, Algorithm::Flood);

        let msg = &messages[&MessageId(0)];
        assert!(msg.has_path(&[n(1), n(2), n(3), n(4)]));
        assert_eq!(msg.completion_reason(), Some(CompletionReason::Success));
        assert_eq!(msg.delivery_latency(), Some(2));
    }

    #[test]
    fn test_admission_waits_for_start_frame() {
        let mut engine = TransmissionEngine::new(line(3), EngineConfig::default());
        let msg = Message::new(MessageId(7), n(1), n(3), 4, 3);
        let mut messages = BTreeMap::from([(msg.id, msg)]);

        let first = engine.step(&mut messages, RunMode::Comparison, Algorithm::Flood, None).unwrap();
        assert!(first.is_quiet());
        engine.step(&mut messages, RunMode::Comparison, Algorithm::Flood, None).unwrap();
        assert_eq!(messages[&MessageId(7)].state(), MessageState::Waiting);

        let third = engine.step(&mut messages, RunMode::Comparison, Algorithm::Flood, None).unwrap();
        assert_eq!(third.started, vec![MessageId(7)]);
        assert_eq!(third.senders, BTreeSet::from([n(1)]));
        assert_eq!(third.receivers, BTreeSet::from([n(2)]));
    }

    #[test]
    fn test_hop_limit_exceeded() {
        // Target is 5 hops away with a budget of 3
        let mut engine = TransmissionEngine::new(line(6), EngineConfig::default());
        let mut messages = one_message(1, 6, 3);

        let reports = run_until_done(&mut engine, &mut messages, RunMode::Comparison, Algorithm::Flood);

        let msg = &messages[&MessageId(0)];
        assert_eq!(msg.completion_reason(), Some(CompletionReason::HopLimitExceeded));
        assert!(!msg.target_received());
        assert!(msg.paths().iter().all(|p| p.len() <= 4));
        assert!(reports.iter().any(|r| r.expired > 0));
    }

    #[test]
    fn test_collision_blocks_delivery_and_learning() {
        // 1 and 3 both send to 2 in the same frame
        let topo = Topology::from_edges(&[(1, 2), (3, 2)]).unwrap();
        let mut engine = TransmissionEngine::new(topo, EngineConfig::default());
        let a = Message::new(MessageId(0), n(1), n(2), 4, 1);
        let b = Message::new(MessageId(1), n(3), n(2), 4, 1);
        let mut messages = BTreeMap::from([(a.id, a), (b.id, b)]);

        let report = engine.step(&mut messages, RunMode::Comparison, Algorithm::Flood, None).unwrap();

        assert_eq!(report.transmissions.len(), 2);
        assert_eq!(
            report.collisions,
            vec![Collision {
                receiver: n(2),
                senders: BTreeSet::from([n(1), n(3)]),
            }]
        );
        assert!(report.receivers.is_empty());
        assert_eq!(report.delivered().count(), 0);
        assert!(engine.node(n(2)).unwrap().knowledge().is_empty());
        assert!(!messages[&MessageId(0)].target_received());

        // Nothing is left in flight: both stall next frame
        let next = engine.step(&mut messages, RunMode::Comparison, Algorithm::Flood, None).unwrap();
        assert_eq!(next.completed.len(), 2);
        assert!(next.completed.iter().all(|c| c.reason == CompletionReason::Stalled));
    }

    #[test]
    fn test_same_sender_twice_is_not_a_collision() {
        let topo = Topology::from_edges(&[(1, 2)]).unwrap();
        let mut engine = TransmissionEngine::new(topo, EngineConfig::default());
        let a = Message::new(MessageId(0), n(1), n(2), 4, 1);
        let b = Message::new(MessageId(1), n(1), n(2), 4, 1);
        let mut messages = BTreeMap::from([(a.id, a), (b.id, b)]);

        let report = engine.step(&mut messages, RunMode::Comparison, Algorithm::Tree, None).unwrap();

        assert!(report.collisions.is_empty());
        assert_eq!(report.arrivals.len(), 2);
        assert!(messages.values().all(|m| m.completion_reason() == Some(CompletionReason::Success)));
    }

    #[test]
    fn test_learning_mode_forces_flood_and_continues() {
        let mut engine = TransmissionEngine::new(line(3), EngineConfig::default());
        // Seed knowledge at 2 that would make tree mode withhold
        engine
            .node_mut(n(2))
            .unwrap()
            .knowledge_mut()
            .insert(meshtree_routing::Route::new(vec![n(2), n(3), n(1)], 0).unwrap());
        engine
            .node_mut(n(2))
            .unwrap()
            .knowledge_mut()
            .insert(meshtree_routing::Route::new(vec![n(2), n(3)], 0).unwrap());
        let mut messages = one_message(1, 3, 4);

        let reports = run_until_done(&mut engine, &mut messages, RunMode::Learning, Algorithm::Tree);

        assert!(reports.iter().all(|r| r.withheld.is_empty()));
        let msg = &messages[&MessageId(0)];
        assert!(msg.target_received());
        assert_eq!(msg.completion_reason(), Some(CompletionReason::Success));
        // Arrival at frame 2 did not complete the message
        assert!(msg.completed_at().unwrap() > 2);
        // The target learned both predecessors
        assert!(engine.node(n(3)).unwrap().knowledge().has_route(n(1)));
        assert!(engine.node(n(3)).unwrap().knowledge().has_route(n(2)));
    }

    #[test]
    fn test_tree_completes_on_arrival_and_purges() {
        // Ring of 6: copies travel both ways around
        let edges: Vec<(u32, u32)> = (0..6).map(|i| (i, (i + 1) % 6)).collect();
        let topo = Topology::from_edges(&edges).unwrap();
        let mut engine = TransmissionEngine::new(topo, EngineConfig::default());
        let mut messages = one_message(0, 1, 4);

        let report = engine.step(&mut messages, RunMode::Comparison, Algorithm::Tree, None).unwrap();

        assert_eq!(
            report.completed,
            vec![Completion {
                message: MessageId(0),
                reason: CompletionReason::Success
            }]
        );
        assert!(!engine.has_pending());
        assert!(!messages[&MessageId(0)].has_active_copies());
    }

    #[test]
    fn test_duplicate_suppression() {
        // Triangle: 2 hears the message from 1 and then again from 3
        let topo = Topology::from_edges(&[(1, 2), (2, 3), (1, 3), (3, 4)]).unwrap();
        let config = EngineConfig {
            suppress_duplicates: true,
            ..EngineConfig::default()
        };
        let mut engine = TransmissionEngine::new(topo.clone(), config);
        let mut messages = one_message(1, 4, 4);
        let reports = run_until_done(&mut engine, &mut messages, RunMode::Learning, Algorithm::Flood);
        let rejected: usize = reports.iter().map(|r| r.rejected.len()).sum();
        assert!(rejected > 0);

        let mut plain = TransmissionEngine::new(topo, EngineConfig::default());
        let mut messages = one_message(1, 4, 4);
        let reports = run_until_done(&mut plain, &mut messages, RunMode::Learning, Algorithm::Flood);
        assert!(reports.iter().all(|r| r.rejected.is_empty()));
    }

    #[test]
    fn test_unknown_nodes_are_errors() {
        let mut engine = TransmissionEngine::new(line(3), EngineConfig::default());
        let mut messages = one_message(1, 9, 4);
        assert_eq!(
            engine.step(&mut messages, RunMode::Comparison, Algorithm::Flood, None),
            Err(EngineError::UnknownNode(n(9)))
        );
    }

    #[test]
    fn test_reset_keeps_knowledge() {
        let mut engine = TransmissionEngine::new(line(3), EngineConfig::default());
        let mut messages = one_message(1, 3, 4);
        run_until_done(&mut engine, &mut messages, RunMode::Learning, Algorithm::Flood);
        let routes = engine.route_count();
        assert!(routes > 0);

        engine.reset_run();
        assert_eq!(engine.frame(), 0);
        assert!(!engine.has_pending());
        assert_eq!(engine.route_count(), routes);
    }
}
