//! The auction house: LIFO branching over successful auctions
//!
//! The house runs auctions, commits their winning assignments, and keeps a
//! stack of successes so the allocation tree can branch from the most
//! recent one. A bounded stack of recent failures keeps their proxy pools
//! alive just long enough for diagnosis before retiring them.

use crate::auction::{Auction, AuctionState};
use crate::error::Result;
use crate::outcome::AuctionOutcome;
use std::collections::{BTreeSet, VecDeque};
use tender_core::{Assignment, AuctionId, AuctionModel, DomainId, Market, PoolId, TaskBatch};

/// How many failed auctions are kept before the oldest is dropped
const FAILED_STACK_LIMIT: usize = 5;

/// Runs auctions against a market and branches between their outcomes
pub trait AuctionHouse<M: AuctionModel> {
    /// Auction a batch out of a pool. With `use_proxies`, multi-task
    /// batches are auctioned through one proxy grouping per domain so no
    /// domain wins twice in one auction.
    fn create_next_auction(
        &mut self,
        market: &mut Market,
        model: &mut M,
        pool: PoolId,
        batch: TaskBatch,
        use_proxies: bool,
    ) -> Result<AuctionState>;

    /// Unwind the most recent success and re-run it for its next-best
    /// outcome. [`AuctionState::TreeFailure`] when no success remains.
    fn branch_from_last_successful(
        &mut self,
        market: &mut Market,
        model: &mut M,
    ) -> Result<AuctionState>;

    /// Unwind up to `count` recent successes without re-running them
    fn undo_auctions(&mut self, market: &mut Market, model: &mut M, count: usize) -> Result<()>;
}

/// An auction house calling its stack in LIFO order
#[derive(Debug, Default)]
pub struct FixedQueueHouse {
    successful: VecDeque<Auction>,
    failed: VecDeque<Auction>,
    next_auction: u64,
}

impl FixedQueueHouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent successful auction's outcome
    pub fn last_outcome(&self) -> Option<&AuctionOutcome> {
        self.successful.front().and_then(Auction::outcome)
    }

    pub fn successful_count(&self) -> usize {
        self.successful.len()
    }

    fn process_new_auction<M: AuctionModel>(
        &mut self,
        market: &mut Market,
        model: &mut M,
        pool: PoolId,
        owns_pool: bool,
        batch: TaskBatch,
    ) -> Result<AuctionState> {
        let id = AuctionId::new(self.next_auction);
        self.next_auction += 1;

        let mut auction = Auction::new(market, id, pool, owns_pool, batch)?;
        let mut state = auction.validate(market)?;
        if state == AuctionState::ReadyToCall {
            state = auction.call(market, &*model)?;
        }
        tracing::debug!(auction = %id, ?state, "auction called");

        if state != AuctionState::Success {
            self.push_failed(market, auction)?;
            return Ok(state);
        }
        self.process_successful(market, model, auction)?;
        Ok(state)
    }

    fn process_successful<M: AuctionModel>(
        &mut self,
        market: &mut Market,
        model: &mut M,
        auction: Auction,
    ) -> Result<()> {
        let assignments = auction
            .outcome()
            .map(|outcome| outcome.assignments().clone())
            .unwrap_or_default();
        for assignment in assignments {
            Self::confirm_assignment(market, model, auction.pool(), assignment)?;
        }
        self.successful.push_front(auction);
        Ok(())
    }

    /// Hand a won grouping to its source and commit its workers. Proxies
    /// are unboxed to their memoised optimal member first.
    fn confirm_assignment<M: AuctionModel>(
        market: &mut Market,
        model: &mut M,
        pool: PoolId,
        assignment: Assignment,
    ) -> Result<()> {
        let target = Self::unbox(market, assignment)?;
        let source = market.task(assignment.task)?.source();
        model.receive_grouping(source, target, assignment.task);
        market.assign_grouping(pool, target)?;
        Ok(())
    }

    fn undo_auction<M: AuctionModel>(
        market: &mut Market,
        model: &mut M,
        auction: &Auction,
    ) -> Result<()> {
        let assignments = auction
            .outcome()
            .map(|outcome| outcome.assignments().clone())
            .unwrap_or_default();
        for assignment in assignments {
            Self::revoke_assignment(market, model, assignment)?;
        }
        market.pool_mut(auction.pool())?.reset_availability();
        Ok(())
    }

    fn revoke_assignment<M: AuctionModel>(
        market: &mut Market,
        model: &mut M,
        assignment: Assignment,
    ) -> Result<()> {
        let target = Self::unbox(market, assignment)?;
        let source = market.task(assignment.task)?.source();
        model.recall_grouping(source, target, assignment.task);
        Ok(())
    }

    fn unbox(market: &Market, assignment: Assignment) -> Result<tender_core::GroupingId> {
        let grouping = market.grouping(assignment.grouping)?;
        Ok(grouping.unbox(assignment.task).unwrap_or(assignment.grouping))
    }

    /// Push onto the bounded failure stack, retiring the evicted auction's
    /// proxy pool if it owned one
    fn push_failed(&mut self, market: &mut Market, auction: Auction) -> Result<()> {
        self.failed.push_front(auction);
        if self.failed.len() > FAILED_STACK_LIMIT {
            if let Some(evicted) = self.failed.pop_back() {
                if evicted.owns_pool() {
                    market.retire_pool(evicted.pool())?;
                }
            }
        }
        Ok(())
    }
}

impl<M: AuctionModel> AuctionHouse<M> for FixedQueueHouse {
    fn create_next_auction(
        &mut self,
        market: &mut Market,
        model: &mut M,
        pool: PoolId,
        batch: TaskBatch,
        use_proxies: bool,
    ) -> Result<AuctionState> {
        let task_size = batch.task_size();

        // Domains none of the batch's sources have allocated into yet.
        let mut feasible: BTreeSet<DomainId> = BTreeSet::new();
        for task in batch.tasks() {
            let source = market.task(*task)?.source();
            feasible.extend(model.unused_domains(source));
        }

        let mut pool_for_auction = pool;
        let mut owns_pool = false;
        if use_proxies && batch.batch_size() != 1 {
            if let Some(by_domain) = market.available_groupings_by_domain(
                pool,
                task_size,
                batch.batch_size(),
                &feasible,
            )? {
                pool_for_auction = market.create_proxy_pool(&by_domain, task_size)?;
                owns_pool = true;
            }
        }

        self.process_new_auction(market, model, pool_for_auction, owns_pool, batch)
    }

    fn branch_from_last_successful(
        &mut self,
        market: &mut Market,
        model: &mut M,
    ) -> Result<AuctionState> {
        let Some(mut auction) = self.successful.pop_front() else {
            tracing::debug!("no successful auction left to branch from");
            return Ok(AuctionState::TreeFailure);
        };
        Self::undo_auction(market, model, &auction)?;
        let state = auction.find_alternative(market, &*model)?;
        tracing::debug!(auction = %auction.id(), ?state, "branched from last success");
        if state == AuctionState::Success {
            self.process_successful(market, model, auction)?;
        } else {
            self.push_failed(market, auction)?;
        }
        Ok(state)
    }

    fn undo_auctions(&mut self, market: &mut Market, model: &mut M, count: usize) -> Result<()> {
        for _ in 0..count {
            let Some(auction) = self.successful.pop_front() else {
                return Ok(());
            };
            Self::undo_auction(market, model, &auction)?;
            self.push_failed(market, auction)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tender_core::{Cost, GroupingId, SourceId, TaskId, TaskRequest, WorkerId};

    /// Prices from a fixed table and records every receive/recall callback
    struct RecordingModel {
        prices: BTreeMap<(WorkerId, TaskId), f64>,
        domains: BTreeSet<DomainId>,
        received: Vec<(SourceId, GroupingId, TaskId)>,
        recalled: Vec<(SourceId, GroupingId, TaskId)>,
    }

    impl RecordingModel {
        fn new(prices: &[(u64, u64, f64)]) -> Self {
            Self {
                prices: prices
                    .iter()
                    .map(|(w, t, p)| ((WorkerId::new(*w), TaskId::new(*t)), *p))
                    .collect(),
                domains: BTreeSet::new(),
                received: Vec::new(),
                recalled: Vec::new(),
            }
        }
    }

    impl AuctionModel for RecordingModel {
        fn worker_cost(&self, worker: WorkerId, task: &TaskRequest) -> Cost {
            self.prices
                .get(&(worker, task.id()))
                .map(|p| Cost::with_sum(*p))
                .unwrap_or_else(Cost::unreachable)
        }

        fn receive_grouping(&mut self, source: SourceId, grouping: GroupingId, task: TaskId) {
            self.received.push((source, grouping, task));
        }

        fn recall_grouping(&mut self, source: SourceId, grouping: GroupingId, task: TaskId) {
            self.recalled.push((source, grouping, task));
        }

        fn unused_domains(&self, _source: SourceId) -> BTreeSet<DomainId> {
            self.domains.clone()
        }
    }

    struct Fixture {
        market: Market,
        pool: PoolId,
        groupings: Vec<GroupingId>,
        tasks: Vec<TaskId>,
    }

    /// One single-worker grouping per worker, all in one pool
    fn fixture(workers: &[u64], task_count: usize) -> Fixture {
        let mut market = Market::new();
        let pool = market.add_pool(workers.iter().map(|w| WorkerId::new(*w)).collect());
        let groupings: Vec<GroupingId> = workers
            .iter()
            .map(|w| market.add_grouping(1, [WorkerId::new(*w)].into_iter().collect()))
            .collect();
        market
            .pool_mut(pool)
            .unwrap()
            .add_valid_groupings(groupings.iter().copied());
        let tasks: Vec<TaskId> = (0..task_count)
            .map(|index| market.add_task(SourceId::new(index as u64), 1))
            .collect();
        Fixture { market, pool, groupings, tasks }
    }

    fn batch(fixture: &mut Fixture, model: &RecordingModel) -> TaskBatch {
        let tasks = fixture.tasks.clone();
        fixture.market.build_batch(&tasks, 0, 1, model).unwrap()
    }

    #[test]
    fn test_successful_auction_commits_workers() {
        let mut fixture = fixture(&[1, 2], 2);
        let mut model = RecordingModel::new(&[
            (1, fixture.tasks[0].raw(), 1.0),
            (1, fixture.tasks[1].raw(), 2.0),
            (2, fixture.tasks[0].raw(), 2.0),
            (2, fixture.tasks[1].raw(), 4.0),
        ]);
        let batch = batch(&mut fixture, &model);
        let mut house = FixedQueueHouse::new();

        let state = house
            .create_next_auction(&mut fixture.market, &mut model, fixture.pool, batch, false)
            .unwrap();
        assert_eq!(state, AuctionState::Success);
        assert_eq!(house.successful_count(), 1);
        assert_eq!(model.received.len(), 2);
        let pool = fixture.market.pool(fixture.pool).unwrap();
        assert_eq!(pool.count_available_workers(), 0);
        assert_eq!(
            house.last_outcome().unwrap().assignments().len(),
            2
        );
    }

    #[test]
    fn test_undersupplied_batch_fails_validation() {
        let mut fixture = fixture(&[1], 2);
        let mut model = RecordingModel::new(&[
            (1, fixture.tasks[0].raw(), 1.0),
            (1, fixture.tasks[1].raw(), 2.0),
        ]);
        let batch = batch(&mut fixture, &model);
        let mut house = FixedQueueHouse::new();

        let state = house
            .create_next_auction(&mut fixture.market, &mut model, fixture.pool, batch, false)
            .unwrap();
        assert_eq!(state, AuctionState::Failure);
        assert_eq!(house.successful_count(), 0);
        assert!(model.received.is_empty());
    }

    #[test]
    fn test_branch_without_history_is_tree_failure() {
        let mut fixture = fixture(&[1], 1);
        let mut model = RecordingModel::new(&[(1, fixture.tasks[0].raw(), 1.0)]);
        let mut house = FixedQueueHouse::new();

        let state = house
            .branch_from_last_successful(&mut fixture.market, &mut model)
            .unwrap();
        assert_eq!(state, AuctionState::TreeFailure);
    }

    #[test]
    fn test_branch_finds_alternative_allocation() {
        let mut fixture = fixture(&[1, 2], 1);
        let mut model = RecordingModel::new(&[
            (1, fixture.tasks[0].raw(), 1.0),
            (2, fixture.tasks[0].raw(), 2.0),
        ]);
        let batch = batch(&mut fixture, &model);
        let mut house = FixedQueueHouse::new();

        let state = house
            .create_next_auction(&mut fixture.market, &mut model, fixture.pool, batch, false)
            .unwrap();
        assert_eq!(state, AuctionState::Success);
        assert_eq!(model.received[0].1, fixture.groupings[0]);

        let state = house
            .branch_from_last_successful(&mut fixture.market, &mut model)
            .unwrap();
        assert_eq!(state, AuctionState::Success);
        // The cheaper grouping was recalled; the spare one won the branch.
        assert_eq!(model.recalled.len(), 1);
        assert_eq!(model.recalled[0].1, fixture.groupings[0]);
        assert_eq!(model.received[1].1, fixture.groupings[1]);
        assert_eq!(house.successful_count(), 1);
    }

    #[test]
    fn test_undo_restores_worker_availability() {
        let mut fixture = fixture(&[1, 2], 2);
        let mut model = RecordingModel::new(&[
            (1, fixture.tasks[0].raw(), 1.0),
            (1, fixture.tasks[1].raw(), 2.0),
            (2, fixture.tasks[0].raw(), 2.0),
            (2, fixture.tasks[1].raw(), 4.0),
        ]);
        let batch = batch(&mut fixture, &model);
        let mut house = FixedQueueHouse::new();
        house
            .create_next_auction(&mut fixture.market, &mut model, fixture.pool, batch, false)
            .unwrap();

        house
            .undo_auctions(&mut fixture.market, &mut model, 1)
            .unwrap();
        assert_eq!(house.successful_count(), 0);
        assert_eq!(model.recalled.len(), 2);
        let pool = fixture.market.pool(fixture.pool).unwrap();
        assert_eq!(pool.count_available_workers(), 2);

        // Undoing past the stack bottom is a no-op.
        house
            .undo_auctions(&mut fixture.market, &mut model, 3)
            .unwrap();
        assert_eq!(model.recalled.len(), 2);
    }

    #[test]
    fn test_proxy_auction_unboxes_to_direct_groupings() {
        let mut fixture = fixture(&[1, 2, 3, 4], 2);
        let d1 = fixture
            .market
            .add_domain([WorkerId::new(1), WorkerId::new(2)].into_iter().collect());
        let d2 = fixture
            .market
            .add_domain([WorkerId::new(3), WorkerId::new(4)].into_iter().collect());
        fixture.market.add_sub_domain(d1, fixture.groupings[0]).unwrap();
        fixture.market.add_sub_domain(d1, fixture.groupings[1]).unwrap();
        fixture.market.add_sub_domain(d2, fixture.groupings[2]).unwrap();
        fixture.market.add_sub_domain(d2, fixture.groupings[3]).unwrap();
        fixture
            .market
            .set_pool_domains(fixture.pool, [d1, d2].into_iter().collect())
            .unwrap();

        let mut model = RecordingModel::new(&[
            (1, fixture.tasks[0].raw(), 1.0),
            (2, fixture.tasks[0].raw(), 3.0),
            (3, fixture.tasks[0].raw(), 5.0),
            (4, fixture.tasks[0].raw(), 7.0),
            (1, fixture.tasks[1].raw(), 4.0),
            (2, fixture.tasks[1].raw(), 6.0),
            (3, fixture.tasks[1].raw(), 2.0),
            (4, fixture.tasks[1].raw(), 8.0),
        ]);
        model.domains = [d1, d2].into_iter().collect();
        let batch = batch(&mut fixture, &model);
        let mut house = FixedQueueHouse::new();

        let state = house
            .create_next_auction(&mut fixture.market, &mut model, fixture.pool, batch, true)
            .unwrap();
        assert_eq!(state, AuctionState::Success);

        // Each task won a concrete grouping, one per domain.
        let won: BTreeSet<GroupingId> =
            model.received.iter().map(|(_, g, _)| *g).collect();
        assert_eq!(won.len(), 2);
        for grouping in &won {
            assert!(!fixture.market.grouping(*grouping).unwrap().is_proxy());
        }
        assert!(won.contains(&fixture.groupings[0]));
        assert!(won.contains(&fixture.groupings[2]));
    }
}
