//! Routing error types

use meshtree_core::NodeId;
use thiserror::Error;

/// Errors raised while learning from an observed path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// Nothing to learn from
    #[error("Observed path is empty")]
    EmptyPath,

    /// The observing node must be the last element of the path it learns from
    #[error("Node {observer} is not at the end of the observed path")]
    ObserverNotAtEnd { observer: NodeId },

    /// A route needs the owner plus at least one more node
    #[error("Route has {len} nodes, needs at least 2")]
    RouteTooShort { len: usize },
}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;
