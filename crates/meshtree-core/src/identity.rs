//! Node and message identifiers
//!
//! Nodes and messages are addressed by stable integer ids. Nothing in the
//! simulator holds a reference to another node or message; everything goes
//! through these handles and an id-ordered map.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifier of a node in the mesh
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Generate ids `0..count`
    pub fn range(count: usize) -> Vec<Self> {
        (0..count as u32).map(Self).collect()
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Identifier of a logical message
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display("#{_0}")]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl From<u64> for MessageId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Render a node path as `1 -> 2 -> 3` for logs
pub fn format_path(path: &[NodeId]) -> String {
    path.iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
