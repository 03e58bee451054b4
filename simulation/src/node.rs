//! Simulated mesh node

use std::collections::BTreeSet;

use meshtree_core::{MessageId, NodeId};
use meshtree_routing::{KnowledgeStore, SubtreeVerdict};

/// A copy waiting at a node to be forwarded in the next frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCopy {
    pub message: MessageId,
    /// Path travelled so far, ending at the holding node
    pub path: Vec<NodeId>,
    pub remaining_hops: u32,
    /// Subtree analysis by the holding node before it accepted this copy
    pub verdict: SubtreeVerdict,
}

/// One radio node: fixed neighbors, a pending queue and learned knowledge
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    neighbors: BTreeSet<NodeId>,
    pending: Vec<PendingCopy>,
    knowledge: KnowledgeStore,
    seen: BTreeSet<MessageId>,
}

impl Node {
    pub fn new(id: NodeId, neighbors: BTreeSet<NodeId>, routes_per_destination: usize) -> Self {
        Self {
            id,
            neighbors,
            pending: Vec::new(),
            knowledge: KnowledgeStore::with_capacity(id, routes_per_destination),
            seen: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn neighbors(&self) -> &BTreeSet<NodeId> {
        &self.neighbors
    }

    /// Copies queued for the next frame, in arrival order
    pub fn pending(&self) -> &[PendingCopy] {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    pub fn knowledge_mut(&mut self) -> &mut KnowledgeStore {
        &mut self.knowledge
    }

    pub(crate) fn enqueue(&mut self, copy: PendingCopy) {
        self.pending.push(copy);
    }

    /// Drain the whole queue
    pub(crate) fn take_pending(&mut self) -> Vec<PendingCopy> {
        std::mem::take(&mut self.pending)
    }

    /// Remove copies whose budget is spent
    pub(crate) fn take_expired(&mut self) -> Vec<PendingCopy> {
        let (expired, live): (Vec<_>, Vec<_>) = self
            .take_pending()
            .into_iter()
            .partition(|copy| copy.remaining_hops == 0);
        self.pending = live;
        expired
    }

    /// Drop every queued copy of `message`; returns how many were dropped
    pub(crate) fn purge(&mut self, message: MessageId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|copy| copy.message != message);
        before - self.pending.len()
    }

    pub fn has_seen(&self, message: MessageId) -> bool {
        self.seen.contains(&message)
    }

    /// Record that this node accepted `message`; `false` if it already had
    pub(crate) fn mark_seen(&mut self, message: MessageId) -> bool {
        self.seen.insert(message)
    }

    /// Clear per-run state, keeping learned knowledge
    pub(crate) fn reset_run(&mut self) {
        self.pending.clear();
        self.seen.clear();
    }
}
