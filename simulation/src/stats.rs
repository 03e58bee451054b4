//! Per-frame statistics collection
//!
//! The engine hands every [`FrameReport`] to an optional [`StatsCollector`].
//! [`ComparisonStats`] is the collector used to score one algorithm over a
//! comparison run.

use std::collections::BTreeMap;
use std::fmt;

use meshtree_core::{Algorithm, CompletionReason, Message, MessageId};
use serde::{Deserialize, Serialize};

use crate::engine::FrameReport;

/// Receives the report of every frame
pub trait StatsCollector {
    fn record_frame(&mut self, report: &FrameReport, messages: &BTreeMap<MessageId, Message>);
}

/// Outcome counters for one algorithm over one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonStats {
    pub algorithm: Algorithm,
    pub frames: u64,
    pub messages_completed: u64,
    pub messages_reached_target: u64,
    pub messages_hop_limit_exceeded: u64,
    pub messages_stalled: u64,
    pub total_transmissions: u64,
    pub successful_receptions: u64,
    pub duplicates_rejected: u64,
    pub copies_withheld: u64,
    pub total_collisions: u64,
    pub collisions_per_frame: Vec<u64>,
    pub active_messages_per_frame: Vec<u64>,
    /// Sum of frames from start to first arrival over delivered messages
    pub total_delivery_latency: u64,
    pub delivered_with_latency: u64,
    /// Distinct paths observed across all messages (set by `finish`)
    pub distinct_paths: u64,
    /// Messages still in flight when the run ended (set by `finish`)
    pub messages_unfinished: u64,
}

impl ComparisonStats {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            ..Default::default()
        }
    }

    /// Fold in end-of-run totals from the message table
    pub fn finish(&mut self, messages: &BTreeMap<MessageId, Message>) {
        self.distinct_paths = messages.values().map(|m| m.paths().len() as u64).sum();
        self.messages_unfinished = messages.values().filter(|m| !m.is_completed()).count() as u64;
    }

    /// Fraction of completed messages that reached their target
    pub fn success_rate(&self) -> f64 {
        if self.messages_completed == 0 {
            return 0.0;
        }
        self.messages_reached_target as f64 / self.messages_completed as f64
    }

    pub fn average_latency(&self) -> Option<f64> {
        (self.delivered_with_latency > 0)
            .then(|| self.total_delivery_latency as f64 / self.delivered_with_latency as f64)
    }

    /// Transmissions spent per delivered message
    pub fn transmissions_per_delivery(&self) -> Option<f64> {
        (self.messages_reached_target > 0)
            .then(|| self.total_transmissions as f64 / self.messages_reached_target as f64)
    }

    pub fn peak_active_messages(&self) -> u64 {
        self.active_messages_per_frame.iter().copied().max().unwrap_or(0)
    }
}

impl StatsCollector for ComparisonStats {
    fn record_frame(&mut self, report: &FrameReport, messages: &BTreeMap<MessageId, Message>) {
        self.frames = self.frames.max(report.frame);
        self.total_transmissions += report.transmissions.len() as u64;
        self.successful_receptions += report.accepted as u64;
        self.duplicates_rejected += report.rejected.len() as u64;
        self.copies_withheld += report.withheld.len() as u64;

        let collisions = report.collisions.len() as u64;
        self.total_collisions += collisions;
        self.collisions_per_frame.push(collisions);
        self.active_messages_per_frame
            .push(messages.values().filter(|m| m.is_active()).count() as u64);

        for completion in &report.completed {
            self.messages_completed += 1;
            match completion.reason {
                CompletionReason::Success => {
                    self.messages_reached_target += 1;
                    if let Some(latency) = messages
                        .get(&completion.message)
                        .and_then(Message::delivery_latency)
                    {
                        self.total_delivery_latency += latency;
                        self.delivered_with_latency += 1;
                    }
                }
                CompletionReason::HopLimitExceeded => self.messages_hop_limit_exceeded += 1,
                CompletionReason::Stalled => self.messages_stalled += 1,
            }
        }
    }
}

impl fmt::Display for ComparisonStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Algorithm: {}", self.algorithm)?;
        writeln!(f, "  Frames run: {}", self.frames)?;
        writeln!(
            f,
            "  Completed: {} ({} reached target, {} hop limit, {} stalled, {} unfinished)",
            self.messages_completed,
            self.messages_reached_target,
            self.messages_hop_limit_exceeded,
            self.messages_stalled,
            self.messages_unfinished
        )?;
        writeln!(f, "  Success rate: {:.1}%", self.success_rate() * 100.0)?;
        writeln!(f, "  Transmissions: {}", self.total_transmissions)?;
        writeln!(f, "  Receptions: {}", self.successful_receptions)?;
        writeln!(f, "  Withheld: {}", self.copies_withheld)?;
        writeln!(f, "  Collisions: {}", self.total_collisions)?;
        writeln!(f, "  Peak active messages: {}", self.peak_active_messages())?;
        match self.average_latency() {
            Some(latency) => writeln!(f, "  Avg delivery latency: {latency:.2} frames")?,
            None => writeln!(f, "  Avg delivery latency: n/a")?,
        }
        write!(f, "  Distinct paths: {}", self.distinct_paths)
    }
}
