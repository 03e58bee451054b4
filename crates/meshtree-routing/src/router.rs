//! Forwarding decision for one pending copy
//!
//! The [`ForwardingRouter`] is stateless apart from its [`TreeVariant`]. All
//! inputs come from a [`DecisionContext`] and the deciding node's
//! [`KnowledgeStore`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use meshtree_core::{Algorithm, ForwardDecision, ForwardReason, NodeId, ParseEnumError};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::knowledge::{KnowledgeStore, SubtreeVerdict};

/// How the tree algorithm behaves when withholding is not proven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TreeVariant {
    /// Withhold on proof, otherwise flood
    #[default]
    Withhold,
    /// Withhold on proof, otherwise follow known routes to the target
    MultiPath,
}

impl FromStr for TreeVariant {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "withhold" => Ok(TreeVariant::Withhold),
            "multi-path" | "multipath" => Ok(TreeVariant::MultiPath),
            _ => Err(ParseEnumError {
                kind: "tree variant",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for TreeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeVariant::Withhold => write!(f, "withhold"),
            TreeVariant::MultiPath => write!(f, "multi-path"),
        }
    }
}

/// Everything a node knows about the copy it is about to forward
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    /// The deciding node
    pub node: NodeId,
    /// Its fixed neighbor set
    pub neighbors: &'a BTreeSet<NodeId>,
    /// Origin of the message
    pub source: NodeId,
    /// Destination of the message
    pub target: NodeId,
    /// Path the copy travelled, ending at `node`
    pub path: &'a [NodeId],
    /// Hops this copy may still take
    pub remaining_hops: u32,
}

impl DecisionContext<'_> {
    /// The node this copy was received from, if any
    pub fn sender(&self) -> Option<NodeId> {
        match self.path {
            [.., sender, _] => Some(*sender),
            _ => None,
        }
    }

    /// All neighbors except the sender
    pub fn flood_targets(&self) -> Vec<NodeId> {
        let sender = self.sender();
        self.neighbors
            .iter()
            .copied()
            .filter(|n| Some(*n) != sender)
            .collect()
    }
}

/// Decides where a pending copy goes next
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardingRouter {
    variant: TreeVariant,
}

impl ForwardingRouter {
    /// Create a router using the given tree variant
    pub fn new(variant: TreeVariant) -> Self {
        Self { variant }
    }

    /// The configured tree variant
    pub fn variant(&self) -> TreeVariant {
        self.variant
    }

    /// Decide what to do with one pending copy
    ///
    /// The subtree proof is taken from `knowledge` as it is now.
    pub fn decide(
        &self,
        ctx: &DecisionContext<'_>,
        knowledge: &KnowledgeStore,
        algorithm: Algorithm,
    ) -> ForwardDecision {
        self.decide_inner(ctx, knowledge, algorithm, || {
            knowledge.subtree_analysis(ctx.source, ctx.target)
        })
    }

    /// Decide using a subtree verdict taken before the copy was received
    ///
    /// Routes learned from the copy itself cannot overturn a proof the node
    /// already held. `knowledge` still supplies routes for the multi-path
    /// variant.
    pub fn decide_with_verdict(
        &self,
        ctx: &DecisionContext<'_>,
        knowledge: &KnowledgeStore,
        algorithm: Algorithm,
        verdict: SubtreeVerdict,
    ) -> ForwardDecision {
        self.decide_inner(ctx, knowledge, algorithm, || verdict)
    }

    fn decide_inner(
        &self,
        ctx: &DecisionContext<'_>,
        knowledge: &KnowledgeStore,
        algorithm: Algorithm,
        verdict: impl FnOnce() -> SubtreeVerdict,
    ) -> ForwardDecision {
        if ctx.remaining_hops == 0 {
            return ForwardDecision::Exhausted;
        }
        if ctx.node == ctx.target {
            return ForwardDecision::Arrived;
        }

        match algorithm {
            Algorithm::Flood => ForwardDecision::forward(ctx.flood_targets(), ForwardReason::Flood),
            Algorithm::Tree => self.decide_tree(ctx, knowledge, verdict()),
        }
    }

    fn decide_tree(
        &self,
        ctx: &DecisionContext<'_>,
        knowledge: &KnowledgeStore,
        verdict: SubtreeVerdict,
    ) -> ForwardDecision {
        if let SubtreeVerdict::SameBranch(branch) = verdict {
            trace!(
                node = %ctx.node,
                source = %ctx.source,
                target = %ctx.target,
                branch = %branch,
                "Withholding: source and target share one branch"
            );
            return ForwardDecision::Withhold { branch };
        }

        if self.variant == TreeVariant::MultiPath {
            let next_hops = known_route_hops(ctx, knowledge);
            if !next_hops.is_empty() {
                return ForwardDecision::forward(next_hops, ForwardReason::KnownRoutes);
            }
        }

        ForwardDecision::forward(ctx.flood_targets(), ForwardReason::Fallback)
    }
}

/// First hops of known target routes that fit the remaining budget
fn known_route_hops(ctx: &DecisionContext<'_>, knowledge: &KnowledgeStore) -> Vec<NodeId> {
    let sender = ctx.sender();
    knowledge
        .routes(ctx.target)
        .iter()
        .filter(|route| route.hop_count() <= ctx.remaining_hops)
        .map(|route| route.next_hop())
        .filter(|hop| Some(*hop) != sender && ctx.neighbors.contains(hop))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
