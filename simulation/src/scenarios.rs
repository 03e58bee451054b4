//! Pre-defined simulation scenarios
//!
//! Small, hand-built meshes that show one behavior each, plus the full
//! learn-then-compare run on a generated mesh.

use std::fmt;
use std::str::FromStr;

use meshtree_core::{Algorithm, MessageId, NodeId, ParseEnumError, format_path};
use meshtree_routing::{Bidirectional, Route};
use tracing::info;

use crate::engine::{EngineConfig, TransmissionEngine};
use crate::error::SimResult;
use crate::phases::{ComparisonPhase, MessageRequest, PhaseOutcome};
use crate::simulation::{ComparisonReport, SimConfig, Simulation};
use crate::topology::Topology;

/// Named scenarios runnable from the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// One message down the line `1-2-3-4`, Tree withholding at node 2
    Line,
    /// Tree withholds a copy a learned detour makes pointless
    Detour,
    /// Learning then Flood vs Tree on a generated mesh
    Compare,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Line, Scenario::Detour, Scenario::Compare];
}

impl FromStr for Scenario {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "line" => Ok(Scenario::Line),
            "detour" | "withhold" => Ok(Scenario::Detour),
            "compare" => Ok(Scenario::Compare),
            _ => Err(ParseEnumError {
                kind: "scenario",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::Line => write!(f, "line"),
            Scenario::Detour => write!(f, "detour"),
            Scenario::Compare => write!(f, "compare"),
        }
    }
}

fn print_outcome(outcome: &PhaseOutcome) {
    for message in outcome.messages.values() {
        println!(
            "  Message {}: {} -> {} {:?}",
            message.id,
            message.source,
            message.target,
            message.status()
        );
        for path in message.paths() {
            println!("    {}", format_path(path));
        }
    }
}

/// Outcome of a scenario run under both algorithms
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub flood: PhaseOutcome,
    pub tree: PhaseOutcome,
}

impl ScenarioOutcome {
    /// Whether `node` ever held a copy of the scenario message
    pub fn reached(outcome: &PhaseOutcome, node: NodeId) -> bool {
        outcome
            .messages
            .get(&MessageId(0))
            .is_some_and(|m| m.paths().iter().any(|p| p.contains(&node)))
    }
}

fn single_message(source: u32, target: u32) -> ComparisonPhase {
    ComparisonPhase::from_requests(
        vec![MessageRequest {
            source: NodeId(source),
            target: NodeId(target),
            start_frame: 1,
        }],
        4,
        20,
    )
}

/// Engine on the line `1-2-3-4` where node 2 believes 1 and 4 both lie
/// behind 3
///
/// ```text
/// 1 --- 2 --- 3 --- 4
/// ```
pub fn primed_line_engine() -> SimResult<TransmissionEngine> {
    let topology = Topology::from_edges(&[(1, 2), (2, 3), (3, 4)])?;
    let mut engine = TransmissionEngine::new(topology, EngineConfig::default());
    if let Some(node) = engine.node_mut(NodeId(2)) {
        let knowledge = node.knowledge_mut();
        knowledge.insert(Route::new(vec![NodeId(2), NodeId(3), NodeId(1)], 0)?);
        knowledge.insert(Route::new(vec![NodeId(2), NodeId(3), NodeId(4)], 0)?);
    }
    Ok(engine)
}

/// Send 1 -> 4 down the line with a hop limit of 4
///
/// Flood starts from empty knowledge and delivers along `[1,2,3,4]`. Tree
/// runs on [`primed_line_engine`]: node 2 withholds on its earlier proof and
/// the message stalls.
pub fn run_line_scenario() -> SimResult<ScenarioOutcome> {
    info!("=== Running Line Scenario ===");
    let primed = primed_line_engine()?;
    println!("{}", primed.topology().visualize());

    let phase = single_message(1, 4);
    let blank = TransmissionEngine::new(primed.topology().clone(), EngineConfig::default());
    let flood = run_algorithm(&blank, &phase, Algorithm::Flood)?;

    if let Some(node) = primed.node(NodeId(2)) {
        println!("\n{}", node.knowledge().render());
    }
    let tree = run_algorithm(&primed, &phase, Algorithm::Tree)?;
    Ok(ScenarioOutcome { flood, tree })
}

/// Mesh used by the detour scenario
///
/// ```text
/// 1 --- 3 --- 6 --- 4
///       |
///       2 --- 5
/// ```
pub fn detour_topology() -> SimResult<Topology> {
    Ok(Topology::from_edges(&[(1, 3), (3, 6), (6, 4), (3, 2), (2, 5)])?)
}

/// Engine where node 2 already learned that 1 and 4 both lie behind 3
pub fn detour_engine() -> SimResult<TransmissionEngine> {
    let mut engine = TransmissionEngine::new(detour_topology()?, EngineConfig::default());
    if let Some(node) = engine.node_mut(NodeId(2)) {
        let knowledge = node.knowledge_mut();
        knowledge.learn(&Bidirectional, &[NodeId(1), NodeId(3), NodeId(2)], 0)?;
        knowledge.learn(
            &Bidirectional,
            &[NodeId(4), NodeId(6), NodeId(3), NodeId(2)],
            0,
        )?;
    }
    Ok(engine)
}

/// Send 1 -> 4 under Flood and Tree from the same knowledge
///
/// Flood pushes a copy into the dead end at 5. Tree lets node 2 withhold
/// because both endpoints lie behind 3.
pub fn run_detour_scenario() -> SimResult<ScenarioOutcome> {
    info!("=== Running Detour Scenario ===");
    let engine = detour_engine()?;
    println!("{}", engine.topology().visualize());
    if let Some(node) = engine.node(NodeId(2)) {
        println!("{}", node.knowledge().render());
    }

    let phase = single_message(1, 4);
    let flood = run_algorithm(&engine, &phase, Algorithm::Flood)?;
    let tree = run_algorithm(&engine, &phase, Algorithm::Tree)?;
    let outcome = ScenarioOutcome { flood, tree };
    println!(
        "\nNode 5 reached: flood={}, tree={}",
        ScenarioOutcome::reached(&outcome.flood, NodeId(5)),
        ScenarioOutcome::reached(&outcome.tree, NodeId(5))
    );
    Ok(outcome)
}

fn run_algorithm(
    engine: &TransmissionEngine,
    phase: &ComparisonPhase,
    algorithm: Algorithm,
) -> SimResult<PhaseOutcome> {
    let mut engine = engine.clone();
    let outcome = phase.run(&mut engine, algorithm, None)?;
    let withheld: usize = outcome.reports.iter().map(|r| r.withheld.len()).sum();
    let transmissions: usize = outcome.reports.iter().map(|r| r.transmissions.len()).sum();
    println!("\n--- {algorithm}: {transmissions} transmissions, {withheld} withheld ---");
    print_outcome(&outcome);
    Ok(outcome)
}

/// Learning phase followed by Flood vs Tree on the configured mesh
pub fn run_compare_scenario(config: SimConfig) -> SimResult<ComparisonReport> {
    info!("=== Running Compare Scenario ===");
    let mut sim = Simulation::new(config)?;
    println!(
        "Mesh: {} nodes, {} links, avg degree {:.2}, seed {}",
        sim.topology().node_count(),
        sim.topology().edge_count(),
        sim.topology().average_degree(),
        sim.seed()
    );

    let learning = sim.run_learning()?;
    println!(
        "Learning: {} messages over {} frames, {} routes known",
        learning.messages.len(),
        learning.frames,
        sim.engine().route_count()
    );

    let phase = sim.comparison_phase()?;
    let report = sim.compare(&phase)?;
    println!("\n{report}");
    Ok(report)
}

/// Run one scenario by name, using `config` for the generated mesh
pub fn run_scenario(scenario: Scenario, config: SimConfig) -> SimResult<()> {
    match scenario {
        Scenario::Line => run_line_scenario().map(|_| ()),
        Scenario::Detour => run_detour_scenario().map(|_| ()),
        Scenario::Compare => run_compare_scenario(config).map(|_| ()),
    }
}
