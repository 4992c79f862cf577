//! Depth-first processing of the batch queue
//!
//! The processor walks a forwards queue of unallocated batches and a
//! backwards queue of allocated ones. A batch that fails its auction sends
//! the search backwards, branching the most recent success onto its
//! next-best outcome before moving forwards again. Reaching the root with
//! nothing left to branch retries the whole queue without domain proxies
//! once, then gives up.

use crate::error::{Error, Result};
use crate::task_pool::TaskPool;
use crate::traits::{MetricSink, PoolProvider};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tender_auction::{AuctionHouse, AuctionState, FixedQueueHouse};
use tender_core::{AuctionModel, Market, TaskBatch};

/// Backtracking scheduler over a pre-built batch queue
#[derive(Debug)]
pub struct QueueProcessor {
    house: FixedQueueHouse,
    forwards: VecDeque<TaskBatch>,
    backwards: VecDeque<TaskBatch>,
    queue_progress: Vec<usize>,
    use_proxies: bool,
    loop_counter: usize,
}

impl QueueProcessor {
    pub fn new(forwards: VecDeque<TaskBatch>) -> Self {
        Self {
            house: FixedQueueHouse::new(),
            forwards,
            backwards: VecDeque::new(),
            queue_progress: Vec::new(),
            use_proxies: true,
            loop_counter: 0,
        }
    }

    pub fn from_pool(pool: TaskPool) -> Self {
        Self::new(pool.into_queue())
    }

    pub fn use_proxies(&self) -> bool {
        self.use_proxies
    }

    pub fn set_use_proxies(&mut self, use_proxies: bool) {
        self.use_proxies = use_proxies;
    }

    pub fn house(&self) -> &FixedQueueHouse {
        &self.house
    }

    /// Batches still waiting for an allocation
    pub fn remaining_batches(&self) -> usize {
        self.forwards.len()
    }

    /// Batches currently holding a confirmed allocation
    pub fn allocated_batches(&self) -> usize {
        self.backwards.len()
    }

    /// Process the queue to completion. On timeout the search unwinds
    /// `multi_undo_increment` auctions and restarts the clock, unwinding
    /// more each time the same run times out again.
    pub fn process<M, P, S>(
        &mut self,
        market: &mut Market,
        model: &mut M,
        pools: &mut P,
        metrics: &mut S,
        multi_undo_increment: usize,
        timeout: Duration,
    ) -> Result<AuctionState>
    where
        M: AuctionModel,
        P: PoolProvider,
        S: MetricSink,
    {
        let state = self.run(market, model, pools, metrics, multi_undo_increment, timeout)?;
        metrics.extract(state, &self.forwards, &self.backwards, &self.queue_progress);
        Ok(state)
    }

    fn run<M, P, S>(
        &mut self,
        market: &mut Market,
        model: &mut M,
        pools: &mut P,
        metrics: &mut S,
        multi_undo_increment: usize,
        timeout: Duration,
    ) -> Result<AuctionState>
    where
        M: AuctionModel,
        P: PoolProvider,
        S: MetricSink,
    {
        let mut start = Instant::now();
        let mut process_forwards = true;
        let starting_queue_size = self.forwards.len() + self.backwards.len();
        let mut multi_undo = multi_undo_increment;

        while !self.forwards.is_empty() {
            self.loop_counter += 1;
            if self.loop_counter >= 20 {
                tracing::debug!(
                    allocated = self.backwards.len(),
                    waiting = self.forwards.len(),
                    "queue progress"
                );
                self.loop_counter = 0;
            }
            self.queue_progress.push(self.backwards.len());
            debug_assert_eq!(self.forwards.len() + self.backwards.len(), starting_queue_size);
            metrics.increment_allocation_loops();

            if !process_forwards && self.backwards.is_empty() {
                if !self.use_proxies {
                    return Ok(AuctionState::TreeFailure);
                }
                // One full retry with direct groupings before giving up.
                tracing::debug!("search root reached, retrying without domain proxies");
                self.use_proxies = false;
                process_forwards = true;
                continue;
            }

            process_forwards = if process_forwards {
                self.process_forwards(market, model, pools, metrics)?
            } else {
                self.process_backwards(market, model, pools)?
            };

            if start.elapsed() > timeout {
                let undo_target = multi_undo;
                multi_undo += multi_undo_increment;
                tracing::warn!(undo_target, "allocation timed out, unwinding");
                self.house.undo_auctions(market, model, undo_target)?;
                let mut undone = 0;
                while undone < undo_target {
                    let Some(batch) = self.backwards.pop_front() else {
                        break;
                    };
                    pools.notify_returned(&batch);
                    self.forwards.push_front(batch);
                    undone += 1;
                }
                start = Instant::now();
            }
        }

        Ok(AuctionState::Success)
    }

    fn process_forwards<M, P, S>(
        &mut self,
        market: &mut Market,
        model: &mut M,
        pools: &mut P,
        metrics: &S,
    ) -> Result<bool>
    where
        M: AuctionModel,
        P: PoolProvider,
        S: MetricSink,
    {
        let Some(batch) = self.forwards.pop_front() else {
            return Ok(true);
        };
        let pool = pools.pool_for(market, &batch)?;
        if metrics.total_allocation_loops() == 1
            && market.pool(pool)?.count_available_workers() == 0
        {
            return Err(Error::EmptyPool { pool });
        }

        let state =
            self.house
                .create_next_auction(market, model, pool, batch.clone(), self.use_proxies)?;
        let advanced = state == AuctionState::Success;
        pools.notify_returned(&batch);
        if advanced {
            self.backwards.push_front(batch);
        } else {
            self.forwards.push_front(batch);
        }
        Ok(advanced)
    }

    fn process_backwards<M, P>(
        &mut self,
        market: &mut Market,
        model: &mut M,
        pools: &mut P,
    ) -> Result<bool>
    where
        M: AuctionModel,
        P: PoolProvider,
    {
        let Some(previous) = self.backwards.pop_front() else {
            return Ok(false);
        };
        let state = self.house.branch_from_last_successful(market, model)?;
        let advanced = state == AuctionState::Success;
        pools.notify_returned(&previous);
        if advanced {
            // The branched auction replaces the one that was unwound, so
            // this batch keeps its place in the allocated queue.
            self.backwards.push_front(previous);
        } else {
            self.forwards.push_front(previous);
        }
        Ok(advanced)
    }
}
