//! Error types for the simulation crate

use meshtree_core::{MessageError, MessageId, NodeId};
use meshtree_routing::RoutingError;
use thiserror::Error;

/// Invalid topology input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("Node {node} lists unknown neighbor {neighbor}")]
    UnknownNeighbor { node: NodeId, neighbor: NodeId },

    #[error("Node {0} is connected to itself")]
    SelfLoop(NodeId),

    #[error("Topology has no nodes")]
    Empty,
}

/// Errors from [`TransmissionEngine::step`](crate::engine::TransmissionEngine::step)
///
/// Any of these means the frame phases ran out of order or the message
/// table does not match the topology. The run should be aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Unknown message {0}")]
    UnknownMessage(MessageId),
}

/// Errors raised while configuring or driving a simulation
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimError>;
