//! Worker pools
//!
//! A pool tracks which workers are free and which are committed, plus the
//! groupings considered valid bids out of this pool. Availability queries
//! that cut across groupings and domains live on [`Market`](crate::Market);
//! the pool itself only owns worker state.

use crate::error::{Error, Result};
use crate::ids::{DomainId, GroupingId, PoolId, WorkerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Availability ledger for a set of workers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPool {
    id: PoolId,
    available: BTreeSet<WorkerId>,
    assigned: BTreeSet<WorkerId>,
    valid_groupings: BTreeSet<GroupingId>,
    domains: BTreeSet<DomainId>,
}

impl WorkerPool {
    pub(crate) fn new(id: PoolId, workers: BTreeSet<WorkerId>) -> Self {
        Self {
            id,
            available: workers,
            assigned: BTreeSet::new(),
            valid_groupings: BTreeSet::new(),
            domains: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Commit a worker. It is an error to commit a worker that is not
    /// currently available.
    pub fn assign_worker(&mut self, worker: WorkerId) -> Result<()> {
        if self.available.remove(&worker) {
            self.assigned.insert(worker);
            Ok(())
        } else {
            Err(Error::WorkerNotAvailable { worker, pool: self.id })
        }
    }

    /// Release a worker back to availability
    pub fn unassign_worker(&mut self, worker: WorkerId) {
        self.assigned.remove(&worker);
        self.available.insert(worker);
    }

    /// Release every committed worker
    pub fn reset_availability(&mut self) {
        self.available.append(&mut self.assigned);
    }

    pub fn is_available(&self, worker: WorkerId) -> bool {
        self.available.contains(&worker)
    }

    pub fn available_workers(&self) -> &BTreeSet<WorkerId> {
        &self.available
    }

    pub fn count_available_workers(&self) -> usize {
        self.available.len()
    }

    pub fn count_assigned_workers(&self) -> usize {
        self.assigned.len()
    }

    /// Groupings allowed to bid from this pool
    pub fn valid_groupings(&self) -> &BTreeSet<GroupingId> {
        &self.valid_groupings
    }

    /// Allow a set of groupings to bid from this pool.
    /// Returns true if any of them was new.
    pub fn add_valid_groupings(&mut self, groupings: impl IntoIterator<Item = GroupingId>) -> bool {
        let before = self.valid_groupings.len();
        self.valid_groupings.extend(groupings);
        self.valid_groupings.len() > before
    }

    /// Domains this pool draws on
    pub fn domains(&self) -> &BTreeSet<DomainId> {
        &self.domains
    }

    pub(crate) fn set_domains(&mut self, domains: BTreeSet<DomainId>) {
        self.domains = domains;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(workers: &[u64]) -> WorkerPool {
        WorkerPool::new(
            PoolId::new(1),
            workers.iter().map(|w| WorkerId::new(*w)).collect(),
        )
    }

    #[test]
    fn test_assign_moves_worker() {
        let mut pool = pool(&[1, 2]);
        pool.assign_worker(WorkerId::new(1)).unwrap();
        assert!(!pool.is_available(WorkerId::new(1)));
        assert_eq!(pool.count_available_workers(), 1);
        assert_eq!(pool.count_assigned_workers(), 1);
    }

    #[test]
    fn test_assign_unavailable_is_error() {
        let mut pool = pool(&[1]);
        pool.assign_worker(WorkerId::new(1)).unwrap();
        let err = pool.assign_worker(WorkerId::new(1)).unwrap_err();
        assert!(matches!(err, Error::WorkerNotAvailable { .. }));
    }

    #[test]
    fn test_reset_availability() {
        let mut pool = pool(&[1, 2, 3]);
        pool.assign_worker(WorkerId::new(2)).unwrap();
        pool.assign_worker(WorkerId::new(3)).unwrap();
        pool.reset_availability();
        assert_eq!(pool.count_available_workers(), 3);
        assert_eq!(pool.count_assigned_workers(), 0);
    }

    #[test]
    fn test_unassign_returns_worker() {
        let mut pool = pool(&[1]);
        pool.assign_worker(WorkerId::new(1)).unwrap();
        pool.unassign_worker(WorkerId::new(1));
        assert!(pool.is_available(WorkerId::new(1)));
    }

    #[test]
    fn test_valid_groupings() {
        let mut pool = pool(&[1]);
        assert!(pool.add_valid_groupings([GroupingId::new(1), GroupingId::new(2)]));
        assert!(!pool.add_valid_groupings([GroupingId::new(2)]));
        assert_eq!(pool.valid_groupings().len(), 2);
    }
}
