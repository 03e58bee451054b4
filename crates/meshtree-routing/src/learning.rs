//! Learning policies
//!
//! A policy decides which destinations an observing node learns from the
//! path a received copy travelled. The observer is always the last element
//! of the path.

use std::fmt;
use std::str::FromStr;

use meshtree_core::{NodeId, ParseEnumError};
use serde::{Deserialize, Serialize};

/// Chooses the destinations learned from one observed path
pub trait LearningPolicy {
    /// Indices into `path` of the nodes the observer learns a route to
    ///
    /// The observer is `path.last()` and is never included.
    fn destinations(&self, path: &[NodeId]) -> Vec<usize>;
}

/// Learn a route to the origin of the path only
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceOnly;

impl LearningPolicy for SourceOnly {
    fn destinations(&self, path: &[NodeId]) -> Vec<usize> {
        if path.len() >= 2 { vec![0] } else { Vec::new() }
    }
}

/// Learn a route to every node that precedes the observer
///
/// For `A -> B -> C -> D` observed at `D`, this yields routes to `A`, `B`
/// and `C`, instead of `A` alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bidirectional;

impl LearningPolicy for Bidirectional {
    fn destinations(&self, path: &[NodeId]) -> Vec<usize> {
        (0..path.len().saturating_sub(1)).collect()
    }
}

/// Configurable learning policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LearningMode {
    SourceOnly,
    #[default]
    Bidirectional,
}

impl LearningPolicy for LearningMode {
    fn destinations(&self, path: &[NodeId]) -> Vec<usize> {
        match self {
            LearningMode::SourceOnly => SourceOnly.destinations(path),
            LearningMode::Bidirectional => Bidirectional.destinations(path),
        }
    }
}

impl FromStr for LearningMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "source_only" | "source" => Ok(LearningMode::SourceOnly),
            "bidirectional" | "all" => Ok(LearningMode::Bidirectional),
            _ => Err(ParseEnumError {
                kind: "learning policy",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LearningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearningMode::SourceOnly => write!(f, "source-only"),
            LearningMode::Bidirectional => write!(f, "bidirectional"),
        }
    }
}
