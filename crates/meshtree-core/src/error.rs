//! Error types for meshtree

use thiserror::Error;

use crate::identity::{MessageId, NodeId};

/// Contract violations on the message lifecycle
///
/// These never describe a delivery outcome. A message that runs out of hops
/// or stalls completes normally; these errors mean the engine touched a
/// message in the wrong phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("Message {0} is already completed")]
    AlreadyCompleted(MessageId),

    #[error("Message {0} is not active")]
    NotActive(MessageId),

    #[error("Message {0} has already been started")]
    NotWaiting(MessageId),

    #[error("Message {id} has no in-flight copy at node {node}")]
    NoCopyAt { id: MessageId, node: NodeId },
}

/// Result type for message lifecycle operations
pub type MessageResult<T> = Result<T, MessageError>;
