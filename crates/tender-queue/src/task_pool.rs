//! Sorting loose tasks into auctionable batches
//!
//! A task pool takes every task a caller wants allocated and sorts them
//! into batches: same-sized tasks share a batch, and no source appears
//! twice in one batch (a source can only win one grouping per auction).
//! Batches come back out in processing priority order.

use crate::error::Result;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, VecDeque};
use tender_core::{AuctionModel, Market, SourceId, TaskBatch, TaskId};

/// Priority queue of batches built from a set of tasks
#[derive(Debug)]
pub struct TaskPool {
    batches: BinaryHeap<Reverse<TaskBatch>>,
    task_sizes: BTreeSet<u32>,
    sources: BTreeSet<SourceId>,
}

impl TaskPool {
    /// Sort tasks into source-disjoint batches, greedily filling the first
    /// batch of the right size that does not hold the task's source yet
    pub fn new(
        market: &mut Market,
        tasks: &[TaskId],
        nesting: u32,
        model: &impl AuctionModel,
    ) -> Result<Self> {
        let mut by_size: BTreeMap<u32, Vec<(Vec<TaskId>, BTreeSet<SourceId>)>> = BTreeMap::new();
        let mut sources = BTreeSet::new();
        for id in tasks {
            let task = market.task(*id)?;
            let size = task.token_size();
            let source = task.source();
            sources.insert(source);
            let sublists = by_size.entry(size).or_default();
            match sublists
                .iter_mut()
                .find(|(_, members)| !members.contains(&source))
            {
                Some((sublist, members)) => {
                    sublist.push(*id);
                    members.insert(source);
                }
                None => sublists.push((vec![*id], [source].into_iter().collect())),
            }
        }

        let mut batches = BinaryHeap::new();
        for (size, sublists) in &by_size {
            for (sublist, _) in sublists {
                batches.push(Reverse(market.build_batch(sublist, nesting, *size, model)?));
            }
        }

        Ok(Self {
            batches,
            task_sizes: by_size.into_keys().collect(),
            sources,
        })
    }

    pub fn has_next(&self) -> bool {
        !self.batches.is_empty()
    }

    /// The highest-priority remaining batch
    pub fn next_batch(&mut self) -> Option<TaskBatch> {
        self.batches.pop().map(|Reverse(batch)| batch)
    }

    /// Every distinct task size in the pool
    pub fn task_sizes(&self) -> &BTreeSet<u32> {
        &self.task_sizes
    }

    /// Every source contributing a task to the pool
    pub fn sources(&self) -> &BTreeSet<SourceId> {
        &self.sources
    }

    /// Drain into a forwards queue, highest priority at the front
    pub fn into_queue(mut self) -> VecDeque<TaskBatch> {
        let mut queue = VecDeque::new();
        while let Some(Reverse(batch)) = self.batches.pop() {
            queue.push_back(batch);
        }
        queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tender_core::{Cost, GroupingId, TaskRequest, WorkerId};

    struct FlatModel;

    impl AuctionModel for FlatModel {
        fn worker_cost(&self, _: WorkerId, _: &TaskRequest) -> Cost {
            Cost::with_sum(1.0)
        }

        fn receive_grouping(&mut self, _: SourceId, _: GroupingId, _: TaskId) {}
        fn recall_grouping(&mut self, _: SourceId, _: GroupingId, _: TaskId) {}
    }

    /// Bandwidths from a fixed per-source table
    struct BandwidthModel {
        bandwidth: BTreeMap<SourceId, u32>,
    }

    impl AuctionModel for BandwidthModel {
        fn worker_cost(&self, _: WorkerId, _: &TaskRequest) -> Cost {
            Cost::with_sum(1.0)
        }

        fn receive_grouping(&mut self, _: SourceId, _: GroupingId, _: TaskId) {}
        fn recall_grouping(&mut self, _: SourceId, _: GroupingId, _: TaskId) {}

        fn total_bandwidth(&self, source: SourceId) -> u32 {
            self.bandwidth.get(&source).copied().unwrap_or(0)
        }
    }

    #[test]
    fn test_batches_are_source_disjoint() {
        let mut market = Market::new();
        let s1 = SourceId::new(1);
        let s2 = SourceId::new(2);
        let tasks = vec![
            market.add_task(s1, 1),
            market.add_task(s1, 1),
            market.add_task(s2, 1),
            market.add_task(s2, 1),
        ];

        let mut pool = TaskPool::new(&mut market, &tasks, 0, &FlatModel).unwrap();
        assert_eq!(pool.sources().len(), 2);
        assert_eq!(pool.task_sizes().len(), 1);

        let mut seen = 0;
        while let Some(batch) = pool.next_batch() {
            seen += batch.batch_size();
            let mut batch_sources = BTreeSet::new();
            for task in batch.tasks() {
                assert!(batch_sources.insert(market.task(*task).unwrap().source()));
            }
        }
        assert_eq!(seen, 4);
    }

    #[test]
    fn test_sizes_never_mix_within_a_batch() {
        let mut market = Market::new();
        let s1 = SourceId::new(1);
        let short = market.add_task(s1, 1);
        let long = market.add_task(s1, 3);

        let mut pool = TaskPool::new(&mut market, &[short, long], 0, &FlatModel).unwrap();
        assert_eq!(pool.task_sizes().len(), 2);

        // Larger task sizes are auctioned first.
        let first = pool.next_batch().unwrap();
        assert_eq!(first.task_size(), 3);
        let second = pool.next_batch().unwrap();
        assert_eq!(second.task_size(), 1);
        assert!(!pool.has_next());
    }

    #[test]
    fn test_heavier_bandwidth_leads_the_queue() {
        let mut market = Market::new();
        let light = SourceId::new(1);
        let heavy = SourceId::new(2);
        let tasks = vec![
            market.add_task(light, 1),
            market.add_task(light, 1),
            market.add_task(heavy, 1),
        ];
        let model = BandwidthModel {
            bandwidth: [(light, 1), (heavy, 10)].into_iter().collect(),
        };

        // Sublists: [light, heavy] then [light]. The two-task batch carries
        // the larger bandwidth but loses on batch size.
        let pool = TaskPool::new(&mut market, &tasks, 0, &model).unwrap();
        let queue = pool.into_queue();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].batch_size(), 1);
        assert_eq!(queue[1].batch_size(), 2);
        assert_eq!(queue[1].total_bandwidth(), 11);
    }
}
