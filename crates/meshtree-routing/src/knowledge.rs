//! Per-node knowledge of routes through the mesh
//!
//! The [`KnowledgeStore`] maps each known destination to the best few routes
//! the owning node has observed toward it. Routes are learned passively from
//! the paths of received message copies and survive across phases.
//!
//! Each route is stored owner-first and loop-erased, so `path[1]` is always
//! the neighbor the route leaves through.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use meshtree_core::{NodeId, format_path};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{RoutingError, RoutingResult};
use crate::learning::LearningPolicy;

/// Routes retained per destination unless configured otherwise
pub const DEFAULT_ROUTES_PER_DESTINATION: usize = 3;

/// A learned route from the owning node to one destination
///
/// Always holds at least two nodes: the owner first, the destination last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RouteRecord")]
pub struct Route {
    path: Vec<NodeId>,
    learned_frame: u64,
}

#[derive(Deserialize)]
struct RouteRecord {
    path: Vec<NodeId>,
    learned_frame: u64,
}

impl TryFrom<RouteRecord> for Route {
    type Error = RoutingError;

    fn try_from(record: RouteRecord) -> RoutingResult<Self> {
        Route::new(record.path, record.learned_frame)
    }
}

impl Route {
    /// Build a route, rejecting paths shorter than one link
    pub fn new(path: Vec<NodeId>, learned_frame: u64) -> RoutingResult<Self> {
        if path.len() < 2 {
            return Err(RoutingError::RouteTooShort { len: path.len() });
        }
        Ok(Self {
            path,
            learned_frame,
        })
    }

    /// Owner first, destination last, no repeated nodes
    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    /// Frame in which the route was last observed
    pub fn learned_frame(&self) -> u64 {
        self.learned_frame
    }

    /// The owning node
    pub fn origin(&self) -> NodeId {
        self.path[0]
    }

    /// The neighbor this route leaves through
    pub fn next_hop(&self) -> NodeId {
        self.path[1]
    }

    /// The destination of this route
    pub fn destination(&self) -> NodeId {
        self.path[self.path.len() - 1]
    }

    /// Number of links on the route
    pub fn hop_count(&self) -> u32 {
        (self.path.len() - 1) as u32
    }
}

/// Outcome of the subtree analysis for a (source, target) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtreeVerdict {
    /// Every known route to both endpoints leaves through this one neighbor
    SameBranch(NodeId),
    /// The endpoints are reached through disjoint sets of neighbors
    DifferentBranches,
    /// At least one endpoint is unknown, or the branches overlap partially
    Inconclusive,
}

impl SubtreeVerdict {
    /// Whether the analysis proves this node is off the useful path
    pub fn proves_detour(&self) -> bool {
        matches!(self, SubtreeVerdict::SameBranch(_))
    }
}

/// Bounded store of learned routes, keyed by destination
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    owner: NodeId,
    routes: BTreeMap<NodeId, Vec<Route>>,
    capacity: usize,
}

impl KnowledgeStore {
    /// Create an empty store for `owner`
    pub fn new(owner: NodeId) -> Self {
        Self::with_capacity(owner, DEFAULT_ROUTES_PER_DESTINATION)
    }

    /// Create an empty store retaining at most `capacity` routes per destination
    pub fn with_capacity(owner: NodeId, capacity: usize) -> Self {
        Self {
            owner,
            routes: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// The node this store belongs to
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Maximum routes retained per destination
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Learn from the path a received copy travelled
    ///
    /// The owner must be the last element of `path`. Returns the number of
    /// routes that were newly retained.
    pub fn learn<P>(&mut self, policy: &P, path: &[NodeId], frame: u64) -> RoutingResult<usize>
    where
        P: LearningPolicy + ?Sized,
    {
        let Some(&last) = path.last() else {
            return Err(RoutingError::EmptyPath);
        };
        if last != self.owner {
            return Err(RoutingError::ObserverNotAtEnd {
                observer: self.owner,
            });
        }

        let mut retained = 0;
        for index in policy.destinations(path) {
            if index + 1 >= path.len() {
                continue;
            }
            let route_path = loop_erased(path[index..].iter().rev().copied());
            let Ok(route) = Route::new(route_path, frame) else {
                continue;
            };
            if self.insert(route) {
                retained += 1;
            }
        }
        Ok(retained)
    }

    /// Insert a single owner-first route
    ///
    /// Routes that do not start at the owner or that end at the owner are
    /// ignored. Re-observing a retained path refreshes its
    /// recency. Returns `true` when a new route was retained.
    pub fn insert(&mut self, route: Route) -> bool {
        if route.origin() != self.owner {
            return false;
        }
        let destination = route.destination();
        if destination == self.owner {
            return false;
        }

        let entries = self.routes.entry(destination).or_default();
        if let Some(existing) = entries.iter_mut().find(|r| r.path == route.path) {
            existing.learned_frame = existing.learned_frame.max(route.learned_frame);
            sort_routes(entries);
            return false;
        }

        let path = route.path.clone();
        entries.push(route);
        sort_routes(entries);
        entries.truncate(self.capacity);
        let kept = entries.iter().any(|r| r.path == path);
        if kept {
            trace!(
                owner = %self.owner,
                destination = %destination,
                route = %format_path(&path),
                "Learned route"
            );
        }
        kept
    }

    /// Retained routes to `destination`, best first
    pub fn routes(&self, destination: NodeId) -> &[Route] {
        self.routes
            .get(&destination)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Shortest (then most recent) route to `destination`
    pub fn best_route(&self, destination: NodeId) -> Option<&Route> {
        self.routes(destination).first()
    }

    /// Whether any route to `destination` is known
    pub fn has_route(&self, destination: NodeId) -> bool {
        !self.routes(destination).is_empty()
    }

    /// Neighbors through which `destination` is known to be reachable
    pub fn branches(&self, destination: NodeId) -> BTreeSet<NodeId> {
        self.routes(destination).iter().map(Route::next_hop).collect()
    }

    /// Decide whether `source` and `target` sit behind the same neighbor
    pub fn subtree_analysis(&self, source: NodeId, target: NodeId) -> SubtreeVerdict {
        let source_branches = self.branches(source);
        let target_branches = self.branches(target);
        if source_branches.is_empty() || target_branches.is_empty() {
            return SubtreeVerdict::Inconclusive;
        }

        let union: BTreeSet<NodeId> = source_branches.union(&target_branches).copied().collect();
        if union.len() == 1 {
            if let Some(&branch) = union.first() {
                return SubtreeVerdict::SameBranch(branch);
            }
        }
        if source_branches.is_disjoint(&target_branches) {
            SubtreeVerdict::DifferentBranches
        } else {
            SubtreeVerdict::Inconclusive
        }
    }

    /// All known destinations
    pub fn destinations(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.routes.keys().copied()
    }

    /// Destinations with a route observed in `frame`
    pub fn learned_in(&self, frame: u64) -> Vec<NodeId> {
        self.routes
            .iter()
            .filter(|(_, routes)| routes.iter().any(|r| r.learned_frame == frame))
            .map(|(dest, _)| *dest)
            .collect()
    }

    /// Number of known destinations
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether nothing has been learned yet
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Total routes across all destinations
    pub fn route_count(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.routes.clear();
    }

    /// Human-readable dump, one destination per line
    pub fn render(&self) -> String {
        let mut out = format!("Node {} knowledge:\n", self.owner);
        if self.routes.is_empty() {
            out.push_str("  (none)\n");
            return out;
        }
        for (destination, routes) in &self.routes {
            let _ = writeln!(out, "  -> {destination}:");
            for route in routes {
                let _ = writeln!(
                    out,
                    "     {} ({} hops, frame {})",
                    format_path(&route.path),
                    route.hop_count(),
                    route.learned_frame
                );
            }
        }
        out
    }
}

/// Shortest first, then most recently observed
fn sort_routes(routes: &mut [Route]) {
    routes.sort_by(|a, b| {
        a.hop_count()
            .cmp(&b.hop_count())
            .then(b.learned_frame.cmp(&a.learned_frame))
    });
}

/// Remove cycles so every node appears once, keeping the first node
fn loop_erased(nodes: impl Iterator<Item = NodeId>) -> Vec<NodeId> {
    let mut out: Vec<NodeId> = Vec::new();
    for node in nodes {
        if let Some(pos) = out.iter().position(|n| *n == node) {
            out.truncate(pos + 1);
        } else {
            out.push(node);
        }
    }
    out
}
