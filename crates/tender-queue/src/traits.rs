//! Seams between the queue processor and its caller

use crate::error::Result;
use std::collections::VecDeque;
use tender_auction::AuctionState;
use tender_core::{Market, PoolId, TaskBatch};

/// Supplies the worker pool each batch should be auctioned out of
pub trait PoolProvider {
    /// The pool to sell this batch from. Called once per allocation
    /// attempt, so providers may rotate or rebuild pools between attempts.
    fn pool_for(&mut self, market: &Market, batch: &TaskBatch) -> Result<PoolId>;

    /// A batch has moved between the queues; its pool may want to refresh
    /// cached availability.
    fn notify_returned(&mut self, batch: &TaskBatch) {
        let _ = batch;
    }
}

/// A provider selling every batch out of one fixed pool
#[derive(Debug, Clone, Copy)]
pub struct SinglePool(pub PoolId);

impl PoolProvider for SinglePool {
    fn pool_for(&mut self, _market: &Market, _batch: &TaskBatch) -> Result<PoolId> {
        Ok(self.0)
    }
}

/// Collects allocation statistics as the queue is processed
pub trait MetricSink {
    /// One scheduling loop has started
    fn increment_allocation_loops(&mut self);

    /// Loops counted so far
    fn total_allocation_loops(&self) -> usize;

    /// Called once when processing finishes, with the final state and the
    /// queues as they stand
    fn extract(
        &mut self,
        result: AuctionState,
        forwards: &VecDeque<TaskBatch>,
        backwards: &VecDeque<TaskBatch>,
        progress: &[usize],
    );
}
