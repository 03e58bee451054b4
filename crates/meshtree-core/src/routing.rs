//! Routing vocabulary shared by the router and the engine

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::NodeId;

/// Forwarding strategy used during a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Forward every copy to every neighbor except the sender
    #[default]
    Flood,
    /// Consult the knowledge store and withhold provably redundant copies
    Tree,
}

/// Which phase of a run the frame belongs to
///
/// Learning frames always flood, whatever algorithm is requested, so that
/// knowledge stores fill up from as many paths as possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Predetermined messages used to populate knowledge stores
    Learning,
    /// Random messages used to evaluate an algorithm
    #[default]
    Comparison,
}

impl RunMode {
    /// The algorithm that actually runs in this mode
    pub fn effective_algorithm(self, requested: Algorithm) -> Algorithm {
        match self {
            RunMode::Learning => Algorithm::Flood,
            RunMode::Comparison => requested,
        }
    }
}

/// Error parsing one of the routing enums from text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Algorithm {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flood" | "flooding" => Ok(Algorithm::Flood),
            "tree" | "knowledge" => Ok(Algorithm::Tree),
            _ => Err(ParseEnumError {
                kind: "algorithm",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Flood => write!(f, "flood"),
            Algorithm::Tree => write!(f, "tree"),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Learning => write!(f, "learning"),
            RunMode::Comparison => write!(f, "comparison"),
        }
    }
}

/// Why a node forwarded a copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardReason {
    /// Flood mode: every neighbor except the sender
    Flood,
    /// Tree mode, knowledge inconclusive: same set as flooding
    Fallback,
    /// Tree mode, multi-path: first hops of known routes to the target
    KnownRoutes,
}

/// Outcome of a forwarding decision for one pending copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardDecision {
    /// Send a copy to each of these neighbors (possibly none)
    Forward {
        next_hops: Vec<NodeId>,
        reason: ForwardReason,
    },
    /// Knowledge proves source and target sit behind one branch
    Withhold { branch: NodeId },
    /// This node is the target; nothing more to send
    Arrived,
    /// No hop budget left
    Exhausted,
}

impl ForwardDecision {
    /// Create a forward decision
    pub fn forward(next_hops: Vec<NodeId>, reason: ForwardReason) -> Self {
        Self::Forward { next_hops, reason }
    }

    /// Neighbors that receive a copy
    pub fn next_hops(&self) -> &[NodeId] {
        match self {
            ForwardDecision::Forward { next_hops, .. } => next_hops,
            ForwardDecision::Withhold { .. }
            | ForwardDecision::Arrived
            | ForwardDecision::Exhausted => &[],
        }
    }

    /// Check if this decision withheld the copy
    pub fn is_withhold(&self) -> bool {
        matches!(self, ForwardDecision::Withhold { .. })
    }

    /// Check if this decision sends at least one copy
    pub fn is_forwarding(&self) -> bool {
        !self.next_hops().is_empty()
    }
}
