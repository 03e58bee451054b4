//! Integration scenarios across the whole meshtree stack
//!
//! These scenarios exercise together:
//! - meshtree-core (message lifecycle)
//! - meshtree-routing (knowledge stores, forwarding decisions)
//! - the engine, phases and simulation driver of this crate

use std::collections::{BTreeMap, BTreeSet};

use meshtree_core::{Algorithm, CompletionReason, MessageId, NodeId};
use meshtree_routing::LearningMode;

use crate::engine::{ArrivalPolicy, EngineConfig, FrameReport, TransmissionEngine};
use crate::phases::{ComparisonPhase, LearningPhase, MessageRequest};
use crate::scenarios;
use crate::simulation::{SimConfig, Simulation};
use crate::topology::{Topology, TopologyBuilder};

fn n(id: u32) -> NodeId {
    NodeId(id)
}

fn request(source: u32, target: u32, start_frame: u64) -> MessageRequest {
    MessageRequest {
        source: n(source),
        target: n(target),
        start_frame,
    }
}

fn seeded_sim(nodes: usize, seed: u64) -> Simulation {
    Simulation::new(SimConfig {
        node_count: nodes,
        seed: Some(seed),
        comparison_messages: 12,
        ..Default::default()
    })
    .unwrap()
}

/// Learning plus both comparison runs, keeping every frame report
fn full_run(seed: u64) -> (Vec<FrameReport>, Vec<FrameReport>, Vec<FrameReport>) {
    let mut sim = seeded_sim(10, seed);
    let learning = sim.run_learning().unwrap();
    let phase = sim.comparison_phase().unwrap();

    let mut flood_engine = sim.engine().clone();
    let flood = phase.run(&mut flood_engine, Algorithm::Flood, None).unwrap();
    let mut tree_engine = sim.engine().clone();
    let tree = phase.run(&mut tree_engine, Algorithm::Tree, None).unwrap();

    (learning.reports, flood.reports, tree.reports)
}

/// Every forward spends exactly one hop: a copy that has been forwarded
/// `k` times carries `hop_limit - k` hops
#[test]
fn test_hop_budget_decreases_by_one_per_forward() {
    let sim = seeded_sim(10, 11);
    let hop_limit = sim.config().hop_limit();
    let (learning, flood, tree) = full_run(11);

    for report in learning.iter().chain(&flood).chain(&tree) {
        for t in &report.transmissions {
            assert!(t.remaining_hops >= 1, "exhausted copy was sent: {t:?}");
            assert_eq!(
                (t.path.len() as u32 - 1) + t.remaining_hops,
                hop_limit,
                "hop accounting broken for {t:?}"
            );
        }
    }
}

/// A message completes once and is never transmitted afterwards
#[test]
fn test_single_completion() {
    let (learning, flood, tree) = full_run(23);

    for reports in [&learning, &flood, &tree] {
        let mut completed: BTreeSet<MessageId> = BTreeSet::new();
        for report in reports {
            for t in &report.transmissions {
                assert!(
                    !completed.contains(&t.message),
                    "message {} sent after completion in frame {}",
                    t.message,
                    report.frame
                );
            }
            for c in &report.completed {
                assert!(completed.insert(c.message), "message {} completed twice", c.message);
            }
        }
    }
}

/// A collided receiver accepts nothing that frame
#[test]
fn test_collided_receivers_accept_nothing() {
    let (learning, flood, tree) = full_run(5);
    let mut collisions = 0;

    for report in learning.iter().chain(&flood).chain(&tree) {
        for c in &report.collisions {
            collisions += 1;
            assert!(c.senders.len() >= 2);
            assert!(!report.receivers.contains(&c.receiver));
            assert!(report.delivered().all(|t| t.receiver != c.receiver));
        }
    }
    assert!(collisions > 0, "a 10 node learning run should see collisions");
}

/// Collisions leave the receiver's knowledge untouched
#[test]
fn test_collision_does_not_teach() {
    // 1 and 3 both start at frame 1 and both reach 2 at once
    let topo = Topology::from_edges(&[(1, 2), (2, 3)]).unwrap();
    let mut engine = TransmissionEngine::new(topo, EngineConfig::default());
    let phase = ComparisonPhase::from_requests(vec![request(1, 3, 1), request(3, 1, 1)], 4, 10);

    let outcome = phase.run(&mut engine, Algorithm::Flood, None).unwrap();

    assert_eq!(outcome.reports[0].collisions.len(), 1);
    assert!(engine.node(n(2)).unwrap().knowledge().is_empty());
    assert!(
        outcome
            .messages
            .values()
            .all(|m| m.completion_reason() == Some(CompletionReason::Stalled))
    );
}

/// Flooding never withholds, whatever the nodes know
#[test]
fn test_flood_never_withholds() {
    let (learning, flood, _) = full_run(31);
    assert!(
        learning
            .iter()
            .chain(&flood)
            .all(|r| r.withheld.is_empty())
    );
}

/// Tree withholds the copy at 2 that Flood pushes into the dead end at 5
#[test]
fn test_tree_withholds_where_flood_does_not() {
    let engine = scenarios::detour_engine().unwrap();
    let phase = ComparisonPhase::from_requests(vec![request(1, 4, 1)], 4, 20);

    let mut flood_engine = engine.clone();
    let flood = phase.run(&mut flood_engine, Algorithm::Flood, None).unwrap();
    let mut tree_engine = engine.clone();
    let tree = phase.run(&mut tree_engine, Algorithm::Tree, None).unwrap();

    let withheld: Vec<_> = tree.reports.iter().flat_map(|r| r.withheld.clone()).collect();
    assert_eq!(withheld.len(), 1);
    assert_eq!(withheld[0].node, n(2));
    assert_eq!(withheld[0].branch, n(3));

    let flood_tx: usize = flood.reports.iter().map(|r| r.transmissions.len()).sum();
    let tree_tx: usize = tree.reports.iter().map(|r| r.transmissions.len()).sum();
    assert!(tree_tx < flood_tx);

    let tree_msg = &tree.messages[&MessageId(0)];
    assert_eq!(tree_msg.completion_reason(), Some(CompletionReason::Success));
    assert_eq!(tree_msg.delivery_path(), Some(&vec![n(1), n(3), n(6), n(4)]));
}

/// On the line 1-2-3-4, node 2's earlier proof that 1 and 4 sit behind 3
/// holds even though the copy from 1 teaches it a direct route to 1
#[test]
fn test_line_tree_withholds_at_primed_node() {
    let mut engine = scenarios::primed_line_engine().unwrap();
    let phase = ComparisonPhase::from_requests(vec![request(1, 4, 1)], 4, 20);

    let outcome = phase.run(&mut engine, Algorithm::Tree, None).unwrap();

    let withheld: Vec<_> = outcome.reports.iter().flat_map(|r| r.withheld.clone()).collect();
    assert_eq!(withheld.len(), 1);
    assert_eq!(withheld[0].node, n(2));
    assert_eq!(withheld[0].branch, n(3));
    assert_eq!(outcome.reports[1].frame, 2);
    assert_eq!(outcome.reports[1].withheld.len(), 1);

    let message = &outcome.messages[&MessageId(0)];
    assert_eq!(message.completion_reason(), Some(CompletionReason::Stalled));
    assert_eq!(message.completed_at(), Some(3));
    assert!(!message.target_received());
    assert!(outcome.reports.iter().all(|r| r.transmissions.iter().all(|t| t.sender == n(1))));

    // The copy still taught 2 its direct route to 1
    let at_2 = engine.node(n(2)).unwrap().knowledge();
    assert_eq!(at_2.best_route(n(1)).unwrap().path(), [n(2), n(1)]);
}

/// Without the earlier proof the same line delivers under Tree
#[test]
fn test_line_tree_delivers_without_knowledge() {
    let topo = Topology::from_edges(&[(1, 2), (2, 3), (3, 4)]).unwrap();
    let mut engine = TransmissionEngine::new(topo, EngineConfig::default());
    let phase = ComparisonPhase::from_requests(vec![request(1, 4, 1)], 4, 20);

    let outcome = phase.run(&mut engine, Algorithm::Tree, None).unwrap();

    let message = &outcome.messages[&MessageId(0)];
    assert_eq!(message.completion_reason(), Some(CompletionReason::Success));
    assert_eq!(message.delivery_path(), Some(&vec![n(1), n(2), n(3), n(4)]));
    assert!(outcome.reports.iter().all(|r| r.withheld.is_empty()));
}

/// A collision-free simple path within the hop budget always delivers
#[test]
fn test_flood_delivers_along_simple_path() {
    let topo = TopologyBuilder::new(6).line().unwrap();
    let mut engine = TransmissionEngine::new(topo, EngineConfig::default());
    let phase = ComparisonPhase::from_requests(vec![request(0, 5, 1)], 5, 20);

    let outcome = phase.run(&mut engine, Algorithm::Flood, None).unwrap();
    let message = &outcome.messages[&MessageId(0)];

    assert_eq!(message.completion_reason(), Some(CompletionReason::Success));
    assert!(message.has_path(&NodeId::range(6)));
    assert_eq!(message.delivery_latency(), Some(4));
}

/// After `[1,2,3,4]`, Bidirectional teaches every hop; SourceOnly only the origin
#[test]
fn test_knowledge_round_trip_through_engine() {
    let topo = Topology::from_edges(&[(1, 2), (2, 3), (3, 4)]).unwrap();
    let phase = LearningPhase::from_pairs(&[(n(1), n(4))], 4);

    let mut bidirectional = TransmissionEngine::new(topo.clone(), EngineConfig::default());
    phase.run(&mut bidirectional, None).unwrap();
    let at_3 = bidirectional.node(n(3)).unwrap().knowledge();
    let at_4 = bidirectional.node(n(4)).unwrap().knowledge();
    assert_eq!(at_3.best_route(n(1)).unwrap().path(), [n(3), n(2), n(1)]);
    assert!(at_3.has_route(n(2)));
    assert_eq!(at_4.destinations().collect::<Vec<_>>(), vec![n(1), n(2), n(3)]);

    let mut source_only = TransmissionEngine::new(
        topo,
        EngineConfig {
            learning: LearningMode::SourceOnly,
            ..Default::default()
        },
    );
    phase.run(&mut source_only, None).unwrap();
    let at_3 = source_only.node(n(3)).unwrap().knowledge();
    let at_4 = source_only.node(n(4)).unwrap().knowledge();
    assert!(at_3.has_route(n(1)));
    assert!(!at_3.has_route(n(2)));
    assert_eq!(at_4.destinations().collect::<Vec<_>>(), vec![n(1)]);
}

/// Flood arrival: complete at once, or keep going until copies run out
#[test]
fn test_flood_arrival_policies() {
    // Ring of 6: 0 -> 2 arrives via 1 at frame 2
    let topo = TopologyBuilder::new(6).ring().unwrap();
    let phase = ComparisonPhase::from_requests(vec![request(0, 2, 1)], 4, 30);

    let mut results = BTreeMap::new();
    for policy in [ArrivalPolicy::CompleteOnArrival, ArrivalPolicy::Continue] {
        let mut engine = TransmissionEngine::new(
            topo.clone(),
            EngineConfig {
                flood_arrival: policy,
                ..Default::default()
            },
        );
        let outcome = phase.run(&mut engine, Algorithm::Flood, None).unwrap();
        let message = outcome.messages[&MessageId(0)].clone();
        assert_eq!(message.completion_reason(), Some(CompletionReason::Success));
        assert_eq!(message.delivery_latency(), Some(1));
        results.insert(format!("{policy}"), (message, outcome.frames));
    }

    let (on_arrival, on_arrival_frames) = &results["complete-on-arrival"];
    let (continued, continued_frames) = &results["continue"];
    assert_eq!(on_arrival.completed_at(), Some(2));
    assert!(continued.completed_at() > on_arrival.completed_at());
    assert!(continued.paths().len() > on_arrival.paths().len());
    assert!(continued_frames > on_arrival_frames);
}

/// Learning keeps flooding past the target
#[test]
fn test_learning_continues_past_target() {
    let topo = TopologyBuilder::new(6).ring().unwrap();
    let mut engine = TransmissionEngine::new(topo, EngineConfig::default());
    let phase = LearningPhase::from_pairs(&[(n(0), n(1))], 4);

    let outcome = phase.run(&mut engine, None).unwrap();
    let message = &outcome.messages[&MessageId(0)];

    assert!(message.target_received());
    assert!(message.completed_at() > Some(1));
    for id in [1, 2, 4, 5] {
        assert!(engine.node(n(id)).unwrap().knowledge().has_route(n(0)));
    }
    // 2 and 4 reach 3 in the same frame
    assert!(engine.node(n(3)).unwrap().knowledge().is_empty());
}

/// Both algorithms start from the same knowledge and seeded runs repeat
#[test]
fn test_compare_is_reproducible() {
    let mut a = seeded_sim(10, 99);
    let mut b = seeded_sim(10, 99);
    a.run_learning().unwrap();
    b.run_learning().unwrap();

    let report_a = a.compare(&a.comparison_phase().unwrap()).unwrap();
    let report_b = b.compare(&b.comparison_phase().unwrap()).unwrap();
    assert_eq!(report_a, report_b);

    // Running again from the untouched snapshot repeats the result
    let again = a.compare(&a.comparison_phase().unwrap()).unwrap();
    assert_eq!(again, report_a);
}

/// Comparison runs reset queues and the frame counter but keep knowledge
#[test]
fn test_comparison_keeps_learned_knowledge() {
    let mut sim = seeded_sim(10, 3);
    sim.run_learning().unwrap();
    let learned = sim.engine().route_count();
    assert!(learned > 0);

    let phase = sim.comparison_phase().unwrap();
    let stats = sim.run_comparison(&phase, Algorithm::Tree).unwrap();

    assert!(sim.engine().route_count() >= learned);
    assert!(stats.frames <= phase.total_frames());
    assert_eq!(
        stats.messages_completed + stats.messages_unfinished,
        phase.requests().len() as u64
    );
}

/// Larger generated meshes run end to end
#[test]
fn test_fifty_node_mesh() {
    let mut sim = seeded_sim(50, 2024);
    assert_eq!(sim.config().hop_limit(), 8);
    let learning = sim.run_learning().unwrap();
    assert_eq!(learning.messages.len(), 40);

    let report = sim.compare(&sim.comparison_phase().unwrap()).unwrap();
    assert!(report.flood.total_transmissions > 0);
    assert!(report.tree.total_transmissions > 0);
}
