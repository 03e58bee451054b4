//! # meshtree core
//!
//! Identifiers, the message lifecycle, and the shared routing vocabulary of
//! the meshtree mesh simulator.
//!
//! The simulator compares two forwarding strategies over a frame-stepped
//! radio mesh: unconditional flooding and a learned "knowledge tree"
//! strategy. This crate holds the pieces every other crate agrees on:
//!
//! - [`NodeId`] / [`MessageId`]: arena-style integer handles
//! - [`Message`]: a logical transmission with zero or more in-flight copies
//! - [`Algorithm`] / [`RunMode`]: the per-frame parameters of the engine
//! - [`ForwardDecision`]: what a node decided to do with one pending copy
//!
//! ## Message lifecycle
//!
//! ```text
//! Waiting --start_transmission()--> Active --complete_message()--> Completed
//! ```
//!
//! `Completed` is terminal. Completing twice is a contract violation and
//! surfaces as [`MessageError::AlreadyCompleted`].

pub mod error;
pub mod identity;
pub mod message;
pub mod routing;

// Re-export main types
pub use error::*;
pub use identity::*;
pub use message::*;
pub use routing::*;
