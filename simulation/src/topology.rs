//! Mesh topology definitions
//!
//! A [`Topology`] maps every node to its fixed neighbor set. It is validated
//! once at construction and never mutated by the engine. Links are radio
//! links, so adjacency is always symmetric.
//!
//! Builders:
//! - Line, ring, star, full mesh, grid
//! - Random: seeded connection probability
//! - Geometric: seeded scatter, nearest neighbors plus random links
//! - Custom: from an edge list or adjacency map

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use meshtree_core::{NodeId, ParseEnumError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::TopologyError;

/// A validated mesh topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl Topology {
    /// Build from an adjacency map
    ///
    /// Every listed neighbor must itself be a key. Missing reverse links are
    /// added so the result is symmetric.
    pub fn from_adjacency(
        adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
    ) -> Result<Self, TopologyError> {
        if adjacency.is_empty() {
            return Err(TopologyError::Empty);
        }

        let mut symmetric = adjacency.clone();
        for (node, neighbors) in &adjacency {
            for neighbor in neighbors {
                if neighbor == node {
                    return Err(TopologyError::SelfLoop(*node));
                }
                let Some(back) = symmetric.get_mut(neighbor) else {
                    return Err(TopologyError::UnknownNeighbor {
                        node: *node,
                        neighbor: *neighbor,
                    });
                };
                back.insert(*node);
            }
        }

        Ok(Self {
            adjacency: symmetric,
        })
    }

    /// Build from an edge list; nodes are the edge endpoints
    pub fn from_edges(edges: &[(u32, u32)]) -> Result<Self, TopologyError> {
        let mut adjacency: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for &(a, b) in edges {
            if a == b {
                return Err(TopologyError::SelfLoop(NodeId(a)));
            }
            adjacency.entry(NodeId(a)).or_default().insert(NodeId(b));
            adjacency.entry(NodeId(b)).or_default().insert(NodeId(a));
        }
        Self::from_adjacency(adjacency)
    }

    /// Get all neighbors of a node
    pub fn neighbors(&self, node: NodeId) -> Option<&BTreeSet<NodeId>> {
        self.adjacency.get(&node)
    }

    /// Check if two nodes are directly connected
    pub fn are_connected(&self, a: NodeId, b: NodeId) -> bool {
        self.adjacency
            .get(&a)
            .is_some_and(|neighbors| neighbors.contains(&b))
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.adjacency.contains_key(&node)
    }

    /// All node ids in ascending order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.adjacency.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected links
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// Mean neighbor count
    pub fn average_degree(&self) -> f64 {
        if self.adjacency.is_empty() {
            return 0.0;
        }
        (2 * self.edge_count()) as f64 / self.node_count() as f64
    }

    /// Shortest path by hop count (breadth first, lowest ids first)
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        let mut previous: BTreeMap<NodeId, NodeId> = BTreeMap::new();
        let mut visited = BTreeSet::from([from]);
        let mut queue = VecDeque::from([from]);

        while let Some(node) = queue.pop_front() {
            if node == to {
                let mut path = vec![to];
                let mut current = to;
                while let Some(&prev) = previous.get(&current) {
                    path.push(prev);
                    current = prev;
                }
                path.reverse();
                return Some(path);
            }
            for &next in self.adjacency.get(&node).into_iter().flatten() {
                if visited.insert(next) {
                    previous.insert(next, node);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// Whether every node can reach every other node
    pub fn is_connected(&self) -> bool {
        let Some(&start) = self.adjacency.keys().next() else {
            return false;
        };
        let mut visited = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for &next in self.adjacency.get(&node).into_iter().flatten() {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        visited.len() == self.adjacency.len()
    }

    /// Print a simple ASCII visualization of the topology
    pub fn visualize(&self) -> String {
        let mut output = String::new();
        output.push_str("Mesh Topology:\n");
        output.push_str(&format!("  Nodes: {}\n", self.node_count()));
        output.push_str(&format!("  Edges: {}\n", self.edge_count()));
        output.push_str(&format!("  Avg degree: {:.2}\n\n", self.average_degree()));

        for (node, neighbors) in &self.adjacency {
            let neighbor_str: Vec<String> = neighbors.iter().map(|n| n.to_string()).collect();
            output.push_str(&format!("  {} -> [{}]\n", node, neighbor_str.join(", ")));
        }
        output
    }
}

/// Shape of a generated topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    Line,
    Ring,
    Star,
    FullMesh,
    Grid,
    Random,
    #[default]
    Geometric,
}

impl FromStr for TopologyKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "line" => Ok(TopologyKind::Line),
            "ring" => Ok(TopologyKind::Ring),
            "star" => Ok(TopologyKind::Star),
            "full" | "full_mesh" => Ok(TopologyKind::FullMesh),
            "grid" => Ok(TopologyKind::Grid),
            "random" => Ok(TopologyKind::Random),
            "geometric" | "mesh" => Ok(TopologyKind::Geometric),
            _ => Err(ParseEnumError {
                kind: "topology",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TopologyKind::Line => "line",
            TopologyKind::Ring => "ring",
            TopologyKind::Star => "star",
            TopologyKind::FullMesh => "full-mesh",
            TopologyKind::Grid => "grid",
            TopologyKind::Random => "random",
            TopologyKind::Geometric => "geometric",
        };
        f.write_str(name)
    }
}

/// Connection probability used by [`TopologyKind::Random`]
pub const DEFAULT_CONNECTION_PROBABILITY: f64 = 0.3;

/// Average neighbor count targeted by the geometric builder
const GEOMETRIC_TARGET_DEGREE: f64 = 3.5;

/// Nearest neighbors every node links to in the geometric builder
const GEOMETRIC_NEAREST: usize = 2;

/// Builder for creating mesh topologies over nodes `0..node_count`
pub struct TopologyBuilder {
    node_count: usize,
}

impl TopologyBuilder {
    pub fn new(node_count: usize) -> Self {
        Self { node_count }
    }

    /// Build the given kind; `seed` drives the random kinds
    pub fn build(self, kind: TopologyKind, seed: u64) -> Result<Topology, TopologyError> {
        match kind {
            TopologyKind::Line => self.line(),
            TopologyKind::Ring => self.ring(),
            TopologyKind::Star => self.star(),
            TopologyKind::FullMesh => self.full_mesh(),
            TopologyKind::Grid => self.grid(),
            TopologyKind::Random => self.random(DEFAULT_CONNECTION_PROBABILITY, seed),
            TopologyKind::Geometric => self.geometric(seed),
        }
    }

    /// 0 - 1 - 2 - ... - n-1
    pub fn line(self) -> Result<Topology, TopologyError> {
        let edges: Vec<(u32, u32)> = (1..self.node_count as u32).map(|i| (i - 1, i)).collect();
        self.finish(&edges)
    }

    /// Line with the ends joined
    pub fn ring(self) -> Result<Topology, TopologyError> {
        let n = self.node_count as u32;
        let mut edges: Vec<(u32, u32)> = (1..n).map(|i| (i - 1, i)).collect();
        if n > 2 {
            edges.push((n - 1, 0));
        }
        self.finish(&edges)
    }

    /// Node 0 in the center, connected to all others
    pub fn star(self) -> Result<Topology, TopologyError> {
        let edges: Vec<(u32, u32)> = (1..self.node_count as u32).map(|i| (0, i)).collect();
        self.finish(&edges)
    }

    /// Every node connected to every other
    pub fn full_mesh(self) -> Result<Topology, TopologyError> {
        let n = self.node_count as u32;
        let edges: Vec<(u32, u32)> = (0..n)
            .flat_map(|a| (a + 1..n).map(move |b| (a, b)))
            .collect();
        self.finish(&edges)
    }

    /// Square-ish grid, row major, `ceil(sqrt(n))` columns
    pub fn grid(self) -> Result<Topology, TopologyError> {
        let n = self.node_count as u32;
        let cols = (self.node_count as f64).sqrt().ceil().max(1.0) as u32;
        let mut edges = Vec::new();
        for i in 0..n {
            if (i + 1) % cols != 0 && i + 1 < n {
                edges.push((i, i + 1));
            }
            if i + cols < n {
                edges.push((i, i + cols));
            }
        }
        self.finish(&edges)
    }

    /// Random links with the given probability; isolated nodes get one link
    pub fn random(self, connection_probability: f64, seed: u64) -> Result<Topology, TopologyError> {
        let n = self.node_count as u32;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut edges = BTreeSet::new();

        for a in 0..n {
            for b in (a + 1)..n {
                if rng.random::<f64>() < connection_probability {
                    edges.insert((a, b));
                }
            }
        }

        // Ensure no node is left isolated
        if n > 1 {
            for node in 0..n {
                if !edges.iter().any(|&(a, b)| a == node || b == node) {
                    let mut other = rng.random_range(0..n - 1);
                    if other >= node {
                        other += 1;
                    }
                    edges.insert((node.min(other), node.max(other)));
                }
            }
        }

        let edges: Vec<(u32, u32)> = edges.into_iter().collect();
        self.finish(&edges)
    }

    /// Scatter nodes on a plane, link each to its nearest neighbors, then add
    /// random links until the average degree reaches about 3.5
    pub fn geometric(self, seed: u64) -> Result<Topology, TopologyError> {
        let n = self.node_count;
        let mut rng = StdRng::seed_from_u64(seed);
        let width = (n as f64).sqrt() * 1.2;
        let height = (n as f64).sqrt() * 0.8;
        let positions: Vec<(f64, f64)> = (0..n)
            .map(|_| {
                (
                    rng.random_range(-width / 2.0..=width / 2.0),
                    rng.random_range(-height / 2.0..=height / 2.0),
                )
            })
            .collect();

        let mut edges: BTreeSet<(u32, u32)> = BTreeSet::new();
        for (i, &(x, y)) in positions.iter().enumerate() {
            let mut by_distance: Vec<(f64, usize)> = positions
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(j, &(ox, oy))| (((x - ox).powi(2) + (y - oy).powi(2)).sqrt(), j))
                .collect();
            by_distance.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            for &(_, j) in by_distance.iter().take(GEOMETRIC_NEAREST) {
                edges.insert((i.min(j) as u32, i.max(j) as u32));
            }
        }

        let max_edges = n * n.saturating_sub(1) / 2;
        let target = ((n as f64 * GEOMETRIC_TARGET_DEGREE) / 2.0) as usize;
        while edges.len() < target.min(max_edges) {
            let a = rng.random_range(0..n as u32);
            let b = rng.random_range(0..n as u32);
            if a != b {
                edges.insert((a.min(b), a.max(b)));
            }
        }

        let edges: Vec<(u32, u32)> = edges.into_iter().collect();
        self.finish(&edges)
    }

    fn finish(&self, edges: &[(u32, u32)]) -> Result<Topology, TopologyError> {
        let mut adjacency: BTreeMap<NodeId, BTreeSet<NodeId>> = NodeId::range(self.node_count)
            .into_iter()
            .map(|id| (id, BTreeSet::new()))
            .collect();
        for &(a, b) in edges {
            adjacency.entry(NodeId(a)).or_default().insert(NodeId(b));
        }
        Topology::from_adjacency(adjacency)
    }
}
