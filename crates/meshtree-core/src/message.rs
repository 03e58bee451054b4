//! Messages and their lifecycle
//!
//! A [`Message`] is one logical transmission request. Flooding turns it into
//! many concurrent copies, one per holding node, each with the path it
//! travelled. The message itself only tracks bookkeeping: which nodes hold a
//! copy, every distinct path observed so far, and whether the target has
//! been reached.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{MessageError, MessageResult};
use crate::identity::{MessageId, NodeId};

/// Lifecycle state of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    /// Created, not yet eligible or not yet started
    Waiting,
    /// At least one copy may still be in flight
    Active,
    /// Terminal
    Completed,
}

/// Why a message completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The target received at least one copy
    Success,
    /// Every copy ran out of hops before reaching the target
    HopLimitExceeded,
    /// No copy was left in flight anywhere
    Stalled,
}

impl CompletionReason {
    pub fn is_success(self) -> bool {
        matches!(self, CompletionReason::Success)
    }
}

/// Externally visible status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    InProgress,
    Completed(CompletionReason),
}

/// A message travelling through the mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier
    pub id: MessageId,
    /// Originating node
    pub source: NodeId,
    /// Final destination
    pub target: NodeId,
    /// Maximum number of forwards any copy may undergo
    pub hop_limit: u32,
    /// Frame at which the message becomes eligible to start
    pub start_frame: u64,
    current_hops: u32,
    state: MessageState,
    completion_reason: Option<CompletionReason>,
    target_received: bool,
    paths: BTreeSet<Vec<NodeId>>,
    active_copies: BTreeMap<NodeId, Vec<NodeId>>,
    started_at: Option<u64>,
    arrived_at: Option<u64>,
    completed_at: Option<u64>,
}

impl Message {
    pub fn new(
        id: MessageId,
        source: NodeId,
        target: NodeId,
        hop_limit: u32,
        start_frame: u64,
    ) -> Self {
        Self {
            id,
            source,
            target,
            hop_limit,
            start_frame,
            current_hops: hop_limit,
            state: MessageState::Waiting,
            completion_reason: None,
            target_received: false,
            paths: BTreeSet::new(),
            active_copies: BTreeMap::new(),
            started_at: None,
            arrived_at: None,
            completed_at: None,
        }
    }

    /// Hop limit for a network of `node_count` nodes
    ///
    /// Small meshes need few hops; larger ones get a proportionally larger
    /// budget so that flooding can still cross them.
    pub fn hop_limit_for(node_count: usize) -> u32 {
        match node_count {
            0..=10 => 4,
            11..=50 => 8,
            _ => 12,
        }
    }

    /// Start transmitting: seed the first copy at the source
    ///
    /// Returns the one-node path held by the source.
    pub fn start_transmission(&mut self, frame: u64) -> MessageResult<Vec<NodeId>> {
        if self.state != MessageState::Waiting {
            return Err(MessageError::NotWaiting(self.id));
        }
        self.state = MessageState::Active;
        self.started_at = Some(frame);

        let initial = vec![self.source];
        self.paths.insert(initial.clone());
        self.active_copies.insert(self.source, initial.clone());
        Ok(initial)
    }

    /// Lower the remaining budget of the deepest copy by one
    pub fn decrease_hop(&mut self) {
        self.current_hops = self.current_hops.saturating_sub(1);
    }

    /// Record that a copy reached the target
    ///
    /// Returns `true` on the first arrival. Does not complete the message.
    pub fn target_reached(&mut self, frame: u64) -> bool {
        if self.target_received {
            return false;
        }
        self.target_received = true;
        self.arrived_at = Some(frame);
        true
    }

    /// Terminal transition
    ///
    /// Returns the nodes that still held a copy, so the caller can purge
    /// them from their queues.
    pub fn complete_message(
        &mut self,
        reason: CompletionReason,
        frame: u64,
    ) -> MessageResult<Vec<NodeId>> {
        if self.state == MessageState::Completed {
            return Err(MessageError::AlreadyCompleted(self.id));
        }
        self.state = MessageState::Completed;
        self.completion_reason = Some(reason);
        self.completed_at = Some(frame);
        let holders = self.active_copies.keys().copied().collect();
        self.active_copies.clear();
        Ok(holders)
    }

    /// Create the copy `receiver` gets from `sender`
    ///
    /// Appends the receiver to the sender's path, records the path if it has
    /// not been seen before and returns it.
    pub fn create_new_copy(
        &mut self,
        sender: NodeId,
        receiver: NodeId,
        sender_path: &[NodeId],
        remaining_hops: u32,
    ) -> MessageResult<Vec<NodeId>> {
        if self.state != MessageState::Active {
            return Err(MessageError::NotActive(self.id));
        }
        debug_assert_eq!(sender_path.last(), Some(&sender));

        let mut path = Vec::with_capacity(sender_path.len() + 1);
        path.extend_from_slice(sender_path);
        path.push(receiver);

        self.paths.insert(path.clone());
        self.active_copies.insert(receiver, path.clone());
        if remaining_hops < self.current_hops {
            self.decrease_hop();
        }
        Ok(path)
    }

    /// The copy held by `node` was consumed
    pub fn release_copy(&mut self, node: NodeId) -> MessageResult<Vec<NodeId>> {
        self.active_copies
            .remove(&node)
            .ok_or(MessageError::NoCopyAt { id: self.id, node })
    }

    pub fn state(&self) -> MessageState {
        self.state
    }

    pub fn status(&self) -> MessageStatus {
        match self.completion_reason {
            Some(reason) => MessageStatus::Completed(reason),
            None => MessageStatus::InProgress,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.state == MessageState::Waiting
    }

    pub fn is_active(&self) -> bool {
        self.state == MessageState::Active
    }

    pub fn is_completed(&self) -> bool {
        self.state == MessageState::Completed
    }

    pub fn completion_reason(&self) -> Option<CompletionReason> {
        self.completion_reason
    }

    pub fn target_received(&self) -> bool {
        self.target_received
    }

    /// Remaining hop budget of the deepest copy
    pub fn current_hops(&self) -> u32 {
        self.current_hops
    }

    /// Every distinct path observed so far
    pub fn paths(&self) -> &BTreeSet<Vec<NodeId>> {
        &self.paths
    }

    /// Check if `path` has been travelled by some copy
    pub fn has_path(&self, path: &[NodeId]) -> bool {
        self.paths.contains(path)
    }

    /// Shortest observed path that ends at the target
    pub fn delivery_path(&self) -> Option<&Vec<NodeId>> {
        self.paths
            .iter()
            .filter(|p| p.last() == Some(&self.target))
            .min_by_key(|p| p.len())
    }

    /// In-flight copies by holding node
    pub fn active_copies(&self) -> &BTreeMap<NodeId, Vec<NodeId>> {
        &self.active_copies
    }

    pub fn has_active_copies(&self) -> bool {
        !self.active_copies.is_empty()
    }

    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<u64> {
        self.completed_at
    }

    /// Frames between start and first arrival at the target
    pub fn delivery_latency(&self) -> Option<u64> {
        match (self.started_at, self.arrived_at) {
            (Some(start), Some(arrival)) => Some(arrival.saturating_sub(start)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Msg {}: {}->{} | Hops: {}/{} | Frame: {} | State: {:?}",
            self.id,
            self.source,
            self.target,
            self.current_hops,
            self.hop_limit,
            self.start_frame,
            self.state
        )?;
        match self.completion_reason {
            Some(reason) => write!(f, " | Status: {:?}", reason),
            None if self.target_received => write!(f, " (target reached)"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(id: u32) -> NodeId {
        NodeId(id)
    }

    fn make_message() -> Message {
        Message::new(MessageId(1), n(1), n(4), 4, 1)
    }

    #[test]
    fn test_start_seeds_source_copy() {
        let mut msg = make_message();
        assert_eq!(msg.state(), MessageState::Waiting);

        let path = msg.start_transmission(1).unwrap();
        assert_eq!(path, vec![n(1)]);
        assert!(msg.is_active());
        assert_eq!(msg.active_copies().get(&n(1)), Some(&vec![n(1)]));
        assert!(msg.has_path(&[n(1)]));
        assert_eq!(msg.status(), MessageStatus::InProgress);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut msg = make_message();
        msg.start_transmission(1).unwrap();
        assert_eq!(
            msg.start_transmission(2),
            Err(MessageError::NotWaiting(MessageId(1)))
        );
    }

    #[test]
    fn test_create_new_copy_dedups_paths() {
        let mut msg = make_message();
        msg.start_transmission(1).unwrap();
        msg.release_copy(n(1)).unwrap();

        let p1 = msg.create_new_copy(n(1), n(2), &[n(1)], 3).unwrap();
        assert_eq!(p1, vec![n(1), n(2)]);
        assert_eq!(msg.current_hops(), 3);

        // Same sequence again does not add a path
        msg.release_copy(n(2)).unwrap();
        msg.create_new_copy(n(1), n(2), &[n(1)], 3).unwrap();
        assert_eq!(msg.paths().len(), 2);
        assert_eq!(msg.current_hops(), 3);

        let p2 = msg.create_new_copy(n(2), n(3), &p1, 2).unwrap();
        assert_eq!(p2, vec![n(1), n(2), n(3)]);
        assert_eq!(msg.paths().len(), 3);
        assert_eq!(msg.current_hops(), 2);
    }

    #[test]
    fn test_copy_on_waiting_message_fails() {
        let mut msg = make_message();
        assert_eq!(
            msg.create_new_copy(n(1), n(2), &[n(1)], 3),
            Err(MessageError::NotActive(MessageId(1)))
        );
    }

    #[test]
    fn test_target_reached_does_not_complete() {
        let mut msg = make_message();
        msg.start_transmission(1).unwrap();
        assert!(msg.target_reached(3));
        assert!(!msg.target_reached(4));
        assert!(msg.is_active());
        assert_eq!(msg.delivery_latency(), Some(2));
    }

    #[test]
    fn test_complete_exactly_once() {
        let mut msg = make_message();
        msg.start_transmission(1).unwrap();

        let holders = msg.complete_message(CompletionReason::Stalled, 5).unwrap();
        assert_eq!(holders, vec![n(1)]);
        assert!(!msg.has_active_copies());
        assert_eq!(
            msg.status(),
            MessageStatus::Completed(CompletionReason::Stalled)
        );

        assert_eq!(
            msg.complete_message(CompletionReason::Success, 6),
            Err(MessageError::AlreadyCompleted(MessageId(1)))
        );
        assert_eq!(msg.completion_reason(), Some(CompletionReason::Stalled));
        assert_eq!(msg.completed_at(), Some(5));
    }

    #[test]
    fn test_no_copy_after_completion() {
        let mut msg = make_message();
        msg.start_transmission(1).unwrap();
        msg.complete_message(CompletionReason::HopLimitExceeded, 2)
            .unwrap();
        assert!(msg.create_new_copy(n(1), n(2), &[n(1)], 3).is_err());
        assert_eq!(msg.paths().len(), 1);
    }

    #[test]
    fn test_release_missing_copy() {
        let mut msg = make_message();
        msg.start_transmission(1).unwrap();
        assert_eq!(
            msg.release_copy(n(9)),
            Err(MessageError::NoCopyAt {
                id: MessageId(1),
                node: n(9)
            })
        );
    }

    #[test]
    fn test_hop_limit_by_network_size() {
        assert_eq!(Message::hop_limit_for(4), 4);
        assert_eq!(Message::hop_limit_for(10), 4);
        assert_eq!(Message::hop_limit_for(50), 8);
        assert_eq!(Message::hop_limit_for(100), 12);
    }

    #[test]
    fn test_decrease_hop_saturates() {
        let mut msg = Message::new(MessageId(2), n(0), n(1), 1, 0);
        msg.decrease_hop();
        msg.decrease_hop();
        assert_eq!(msg.current_hops(), 0);
    }

    #[test]
    fn test_delivery_path_prefers_shortest() {
        let mut msg = make_message();
        msg.start_transmission(1).unwrap();
        msg.create_new_copy(n(1), n(2), &[n(1)], 3).unwrap();
        msg.create_new_copy(n(2), n(4), &[n(1), n(2)], 2).unwrap();
        msg.create_new_copy(n(2), n(3), &[n(1), n(2)], 2).unwrap();
        msg.create_new_copy(n(3), n(4), &[n(1), n(2), n(3)], 1).unwrap();
        assert_eq!(msg.delivery_path(), Some(&vec![n(1), n(2), n(4)]));
    }
}
