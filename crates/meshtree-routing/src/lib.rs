//! # meshtree routing
//!
//! Per-node knowledge and the forwarding decision.
//!
//! ## Core Components
//!
//! - [`KnowledgeStore`]: destination → best few learned routes, built from
//!   the paths of received message copies
//! - [`LearningPolicy`]: which destinations a node learns from one observed
//!   path ([`SourceOnly`], [`Bidirectional`], or the configurable
//!   [`LearningMode`])
//! - [`ForwardingRouter`]: flood or tree decision for one pending copy
//!
//! ## Tree Decision
//!
//! In tree mode the router first runs a subtree analysis:
//!
//! 1. **WITHHOLD**: every known route to both the source and the target
//!    leaves through the same single neighbor. A path around this node
//!    exists, so forwarding here is wasted airtime.
//! 2. **KNOWN ROUTES** (multi-path variant): forward along the first hops of
//!    known routes to the target that fit the remaining budget.
//! 3. **FALLBACK**: otherwise behave exactly like flooding.
//!
//! Withholding only happens on proof. Missing knowledge of either endpoint
//! always falls back to flooding, so delivery guarantees are kept.
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeSet;
//! use meshtree_core::{Algorithm, NodeId};
//! use meshtree_routing::{Bidirectional, DecisionContext, ForwardingRouter, KnowledgeStore};
//!
//! let mut store = KnowledgeStore::new(NodeId(3));
//! store.learn(&Bidirectional, &[NodeId(1), NodeId(2), NodeId(3)], 1).unwrap();
//! assert!(store.has_route(NodeId(1)));
//!
//! let neighbors: BTreeSet<NodeId> = [NodeId(2), NodeId(4)].into();
//! let path = [NodeId(1), NodeId(2), NodeId(3)];
//! let ctx = DecisionContext {
//!     node: NodeId(3),
//!     neighbors: &neighbors,
//!     source: NodeId(1),
//!     target: NodeId(4),
//!     path: &path,
//!     remaining_hops: 2,
//! };
//! let decision = ForwardingRouter::default().decide(&ctx, &store, Algorithm::Flood);
//! assert_eq!(decision.next_hops(), &[NodeId(4)]);
//! ```

pub mod error;
pub mod knowledge;
pub mod learning;
pub mod router;

// Re-export main types
pub use error::{RoutingError, RoutingResult};
pub use knowledge::{KnowledgeStore, Route, SubtreeVerdict, DEFAULT_ROUTES_PER_DESTINATION};
pub use learning::{Bidirectional, LearningMode, LearningPolicy, SourceOnly};
pub use router::{DecisionContext, ForwardingRouter, TreeVariant};

// Re-export core routing types for convenience
pub use meshtree_core::{Algorithm, ForwardDecision, ForwardReason};
