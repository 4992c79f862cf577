//! The market registry
//!
//! The market owns every entity the engine reasons about (tasks, groupings,
//! domains, pools) and mediates each operation that cuts across them:
//! tendering an offer book, querying availability, building proxy pools and
//! validated batches. Callers hold ids, never references, so auctions can
//! commit and unwind freely without fighting the borrow checker over a
//! shared object graph.

use crate::batch::TaskBatch;
use crate::cost::Cost;
use crate::domain::Domain;
use crate::error::{Error, Result};
use crate::grouping::Grouping;
use crate::ids::{BatchId, DomainId, GroupingId, PoolId, SourceId, TaskId, TokenId, WorkerId};
use crate::model::AuctionModel;
use crate::pool::WorkerPool;
use crate::task::TaskRequest;
use crate::token::EntryToken;
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};

/// Registry of all allocation entities, and the operations between them
#[derive(Debug, Default)]
pub struct Market {
    tasks: IndexMap<TaskId, TaskRequest>,
    groupings: IndexMap<GroupingId, Grouping>,
    domains: IndexMap<DomainId, Domain>,
    pools: IndexMap<PoolId, WorkerPool>,
    next_task: u64,
    next_grouping: u64,
    next_domain: u64,
    next_pool: u64,
    next_token: u64,
    next_batch: u64,
}

impl Market {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- registration ----------------------------------------------------

    /// Register a task for a source, minting its entry token
    pub fn add_task(&mut self, source: SourceId, token_size: u32) -> TaskId {
        let id = TaskId::new(self.next_task);
        self.next_task += 1;
        let token = EntryToken::new(TokenId::new(self.next_token), token_size);
        self.next_token += 1;
        self.tasks.insert(id, TaskRequest::new(id, source, token));
        id
    }

    /// Register a direct grouping of workers for tasks of the given size
    pub fn add_grouping(&mut self, size: u32, workers: BTreeSet<WorkerId>) -> GroupingId {
        let id = GroupingId::new(self.next_grouping);
        self.next_grouping += 1;
        self.groupings.insert(id, Grouping::new(id, size, workers));
        id
    }

    /// Register a proxy grouping standing in for the given members. Its
    /// worker set is the union of the members' workers.
    pub fn add_proxy_grouping(&mut self, size: u32, members: Vec<GroupingId>) -> Result<GroupingId> {
        if members.is_empty() {
            return Err(Error::EmptyProxy);
        }
        let mut workers = BTreeSet::new();
        for member in &members {
            workers.extend(self.grouping(*member)?.workers().iter().copied());
        }
        let id = GroupingId::new(self.next_grouping);
        self.next_grouping += 1;
        self.groupings
            .insert(id, Grouping::new_proxy(id, size, workers, members));
        Ok(id)
    }

    /// Register a domain over a set of workers
    pub fn add_domain(&mut self, workers: BTreeSet<WorkerId>) -> DomainId {
        let id = DomainId::new(self.next_domain);
        self.next_domain += 1;
        self.domains.insert(id, Domain::new(id, workers));
        id
    }

    /// Register a grouping as a sub-domain of a domain. Returns false when
    /// the grouping's workers are not all inside the domain.
    pub fn add_sub_domain(&mut self, domain: DomainId, grouping: GroupingId) -> Result<bool> {
        let workers = self.grouping(grouping)?.workers().clone();
        let domain = self
            .domains
            .get_mut(&domain)
            .ok_or(Error::UnknownDomain(domain))?;
        Ok(domain.add_sub_domain(grouping, &workers))
    }

    /// Register a pool over a set of workers
    pub fn add_pool(&mut self, workers: BTreeSet<WorkerId>) -> PoolId {
        let id = PoolId::new(self.next_pool);
        self.next_pool += 1;
        self.pools.insert(id, WorkerPool::new(id, workers));
        id
    }

    /// Point a pool at a set of domains; every sub-domain grouping becomes a
    /// valid bid for the pool
    pub fn set_pool_domains(&mut self, pool: PoolId, domains: BTreeSet<DomainId>) -> Result<()> {
        let mut groupings = BTreeSet::new();
        for domain in &domains {
            let domain = self
                .domains
                .get(domain)
                .ok_or(Error::UnknownDomain(*domain))?;
            groupings.extend(domain.groupings().iter().copied());
        }
        let pool = self.pools.get_mut(&pool).ok_or(Error::UnknownPool(pool))?;
        pool.set_domains(domains);
        pool.add_valid_groupings(groupings);
        Ok(())
    }

    /// Drop a pool, together with any proxy groupings minted for it
    pub fn retire_pool(&mut self, pool: PoolId) -> Result<()> {
        let pool = self
            .pools
            .shift_remove(&pool)
            .ok_or(Error::UnknownPool(pool))?;
        for grouping in pool.valid_groupings() {
            if self
                .groupings
                .get(grouping)
                .is_some_and(Grouping::is_proxy)
            {
                self.groupings.shift_remove(grouping);
            }
        }
        Ok(())
    }

    // ---- access ----------------------------------------------------------

    pub fn task(&self, id: TaskId) -> Result<&TaskRequest> {
        self.tasks.get(&id).ok_or(Error::UnknownTask(id))
    }

    pub fn task_mut(&mut self, id: TaskId) -> Result<&mut TaskRequest> {
        self.tasks.get_mut(&id).ok_or(Error::UnknownTask(id))
    }

    pub fn grouping(&self, id: GroupingId) -> Result<&Grouping> {
        self.groupings.get(&id).ok_or(Error::UnknownGrouping(id))
    }

    pub fn grouping_mut(&mut self, id: GroupingId) -> Result<&mut Grouping> {
        self.groupings
            .get_mut(&id)
            .ok_or(Error::UnknownGrouping(id))
    }

    pub fn domain(&self, id: DomainId) -> Result<&Domain> {
        self.domains.get(&id).ok_or(Error::UnknownDomain(id))
    }

    pub fn pool(&self, id: PoolId) -> Result<&WorkerPool> {
        self.pools.get(&id).ok_or(Error::UnknownPool(id))
    }

    pub fn pool_mut(&mut self, id: PoolId) -> Result<&mut WorkerPool> {
        self.pools.get_mut(&id).ok_or(Error::UnknownPool(id))
    }

    /// Mark a task's entry token as inside (or outside) a live auction
    pub fn set_task_auction_live(&mut self, task: TaskId, live: bool) -> Result<()> {
        self.task_mut(task)?.token_mut().set_auction_live(live);
        Ok(())
    }

    // ---- tendering -------------------------------------------------------

    /// Price one task for one grouping through the model. For a proxy, the
    /// cheapest member wins and is memoised for later unboxing.
    pub fn total_cost(
        &mut self,
        grouping: GroupingId,
        task: TaskId,
        model: &impl AuctionModel,
    ) -> Result<Cost> {
        let members = self.grouping(grouping)?.members().to_vec();
        if members.is_empty() {
            return self.direct_cost(grouping, task, model);
        }

        let mut best_member = members[0];
        let mut best_cost = self.direct_cost(best_member, task, model)?;
        for member in &members[1..] {
            let cost = self.direct_cost(*member, task, model)?;
            if cost.final_value() < best_cost.final_value() {
                best_member = *member;
                best_cost = cost;
            }
        }
        self.grouping_mut(grouping)?.record_optimal(task, best_member);
        Ok(best_cost)
    }

    fn direct_cost(
        &self,
        grouping: GroupingId,
        task: TaskId,
        model: &impl AuctionModel,
    ) -> Result<Cost> {
        let task = self.task(task)?;
        let grouping = self.grouping(grouping)?;
        let mut cost = Cost::new();
        for worker in grouping.workers() {
            cost.add(model.worker_cost(*worker, task).final_value());
        }
        cost.scale(grouping.scarcity());
        Ok(cost)
    }

    /// Collect offers on a task from every grouping that can reach it.
    /// Groupings already holding an offer are left untouched.
    pub fn tender_task(
        &mut self,
        task: TaskId,
        groupings: &BTreeSet<GroupingId>,
        model: &impl AuctionModel,
    ) -> Result<()> {
        for grouping in groupings {
            if self.task(task)?.has_offer(*grouping) {
                continue;
            }
            let cost = self.total_cost(*grouping, task, model)?;
            if cost.is_unreachable() {
                continue;
            }
            self.task_mut(task)?
                .add_to_offer(*grouping, cost.final_value());
        }
        Ok(())
    }

    // ---- availability ----------------------------------------------------

    /// Valid groupings of the given size whose workers are all available
    pub fn available_groupings(&self, pool: PoolId, size: u32) -> Result<Vec<GroupingId>> {
        let pool = self.pool(pool)?;
        let mut available = Vec::new();
        for id in pool.valid_groupings() {
            let grouping = self.grouping(*id)?;
            if grouping.size() != size {
                continue;
            }
            if grouping.workers().iter().all(|w| pool.is_available(*w)) {
                available.push(*id);
            }
        }
        Ok(available)
    }

    /// Available groupings grouped by domain, in tiers of descending
    /// availability, stopping once at least `min_domains` domains are
    /// collected. Returns `None` when the pool cannot supply that many.
    pub fn available_groupings_by_domain(
        &self,
        pool: PoolId,
        size: u32,
        min_domains: usize,
        feasible: &BTreeSet<DomainId>,
    ) -> Result<Option<BTreeMap<DomainId, BTreeSet<GroupingId>>>> {
        let available: BTreeSet<GroupingId> =
            self.available_groupings(pool, size)?.into_iter().collect();

        let mut by_domain: BTreeMap<DomainId, BTreeSet<GroupingId>> = BTreeMap::new();
        for domain in self.pool(pool)?.domains() {
            if !feasible.contains(domain) {
                continue;
            }
            let groupings: BTreeSet<GroupingId> = self
                .domain(*domain)?
                .groupings()
                .intersection(&available)
                .copied()
                .collect();
            by_domain.insert(*domain, groupings);
        }

        let mut tiers: BTreeMap<DomainId, BTreeSet<GroupingId>> = BTreeMap::new();
        while tiers.len() < min_domains {
            let most_available = by_domain.values().map(BTreeSet::len).max().unwrap_or(0);
            if most_available == 0 {
                return Ok(None);
            }
            let tier: Vec<DomainId> = by_domain
                .iter()
                .filter(|(_, groupings)| groupings.len() == most_available)
                .map(|(domain, _)| *domain)
                .collect();
            for domain in tier {
                if let Some(groupings) = by_domain.remove(&domain) {
                    tiers.insert(domain, groupings);
                }
            }
        }

        Ok(Some(tiers))
    }

    /// Build a pool of one proxy grouping per domain, for one auction
    pub fn create_proxy_pool(
        &mut self,
        by_domain: &BTreeMap<DomainId, BTreeSet<GroupingId>>,
        size: u32,
    ) -> Result<PoolId> {
        let mut proxies = Vec::new();
        let mut workers = BTreeSet::new();
        for members in by_domain.values() {
            let proxy = self.add_proxy_grouping(size, members.iter().copied().collect())?;
            workers.extend(self.grouping(proxy)?.workers().iter().copied());
            proxies.push(proxy);
        }
        let pool = self.add_pool(workers);
        self.pool_mut(pool)?.add_valid_groupings(proxies);
        Ok(pool)
    }

    /// Commit every worker of a grouping in a pool
    pub fn assign_grouping(&mut self, pool: PoolId, grouping: GroupingId) -> Result<()> {
        let workers = self.grouping(grouping)?.workers().clone();
        let pool = self.pools.get_mut(&pool).ok_or(Error::UnknownPool(pool))?;
        for worker in workers {
            pool.assign_worker(worker)?;
        }
        Ok(())
    }

    // ---- batches ---------------------------------------------------------

    /// Build a validated batch: non-empty, every token matching the batch's
    /// task size, bandwidths drawn from the model
    pub fn build_batch(
        &mut self,
        tasks: &[TaskId],
        nesting: u32,
        task_size: u32,
        model: &impl AuctionModel,
    ) -> Result<TaskBatch> {
        if tasks.is_empty() {
            return Err(Error::EmptyBatch);
        }
        let mut total_bandwidth = 0;
        let mut max_bandwidth = 0;
        let mut members = BTreeSet::new();
        for id in tasks {
            let task = self.task(*id)?;
            if task.token_size() != task_size {
                return Err(Error::TokenSizeMismatch {
                    task: *id,
                    expected: task_size,
                    actual: task.token_size(),
                });
            }
            total_bandwidth += model.total_bandwidth(task.source());
            max_bandwidth = max_bandwidth.max(model.max_bandwidth(task.source()));
            members.insert(*id);
        }
        let id = BatchId::new(self.next_batch);
        self.next_batch += 1;
        Ok(TaskBatch::new(
            id,
            nesting,
            task_size,
            members,
            total_bandwidth,
            max_bandwidth,
        ))
    }
}
