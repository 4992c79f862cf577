//! Default allocation metrics

use crate::traits::MetricSink;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tender_auction::AuctionState;
use tender_core::TaskBatch;

/// Metric sink recording loop counts, the final state and the progress
/// trace of one queue run
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct QueueMetrics {
    allocation_loops: usize,
    final_state: Option<AuctionState>,
    allocated_batches: usize,
    unallocated_batches: usize,
    progress: Vec<usize>,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocation_loops(&self) -> usize {
        self.allocation_loops
    }

    pub fn final_state(&self) -> Option<AuctionState> {
        self.final_state
    }

    /// Batches allocated when processing finished
    pub fn allocated_batches(&self) -> usize {
        self.allocated_batches
    }

    /// Batches still waiting when processing finished
    pub fn unallocated_batches(&self) -> usize {
        self.unallocated_batches
    }

    /// Allocated-batch count sampled at the start of every loop
    pub fn progress(&self) -> &[usize] {
        &self.progress
    }

    /// The deepest the allocation reached, even if later unwound
    pub fn high_water_mark(&self) -> usize {
        self.progress.iter().copied().max().unwrap_or(0)
    }
}

impl MetricSink for QueueMetrics {
    fn increment_allocation_loops(&mut self) {
        self.allocation_loops += 1;
    }

    fn total_allocation_loops(&self) -> usize {
        self.allocation_loops
    }

    fn extract(
        &mut self,
        result: AuctionState,
        forwards: &VecDeque<TaskBatch>,
        backwards: &VecDeque<TaskBatch>,
        progress: &[usize],
    ) {
        self.final_state = Some(result);
        self.allocated_batches = backwards.len();
        self.unallocated_batches = forwards.len();
        self.progress = progress.to_vec();
    }
}
