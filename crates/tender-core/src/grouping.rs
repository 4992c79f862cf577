//! Worker groupings
//!
//! A grouping is the unit that bids in an auction: one or more workers
//! offered together for a task of a matching size. A domain proxy is a
//! grouping standing in for every available grouping of one domain, so a
//! single auction can hand out at most one win per domain. The proxy
//! remembers which member priced each task best, and unboxes to that member
//! once the auction settles.

use crate::ids::{GroupingId, TaskId, WorkerId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What a grouping stands for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GroupingKind {
    /// A concrete set of workers
    Direct,
    /// A stand-in for the available groupings of one domain
    Proxy {
        /// The groupings this proxy represents
        members: Vec<GroupingId>,
        /// Cheapest member per task, filled in during tendering
        optimal: BTreeMap<TaskId, GroupingId>,
    },
}

/// A set of workers bidding as one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grouping {
    id: GroupingId,
    size: u32,
    workers: BTreeSet<WorkerId>,
    scarcity: f64,
    kind: GroupingKind,
}

impl Grouping {
    pub(crate) fn new(id: GroupingId, size: u32, workers: BTreeSet<WorkerId>) -> Self {
        Self { id, size, workers, scarcity: 1.0, kind: GroupingKind::Direct }
    }

    pub(crate) fn new_proxy(
        id: GroupingId,
        size: u32,
        workers: BTreeSet<WorkerId>,
        members: Vec<GroupingId>,
    ) -> Self {
        Self {
            id,
            size,
            workers,
            scarcity: 1.0,
            kind: GroupingKind::Proxy { members, optimal: BTreeMap::new() },
        }
    }

    pub fn id(&self) -> GroupingId {
        self.id
    }

    /// Task size this grouping can bid for
    pub fn size(&self) -> u32 {
        self.size
    }

    /// All workers behind this grouping (for a proxy, the union of all
    /// member groupings' workers)
    pub fn workers(&self) -> &BTreeSet<WorkerId> {
        &self.workers
    }

    /// Scarcity weighting folded into every tendered cost
    pub fn scarcity(&self) -> f64 {
        self.scarcity
    }

    pub fn set_scarcity(&mut self, scarcity: f64) {
        self.scarcity = scarcity;
    }

    pub fn kind(&self) -> &GroupingKind {
        &self.kind
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.kind, GroupingKind::Proxy { .. })
    }

    /// Member groupings of a proxy, empty for a direct grouping
    pub fn members(&self) -> &[GroupingId] {
        match &self.kind {
            GroupingKind::Direct => &[],
            GroupingKind::Proxy { members, .. } => members,
        }
    }

    /// The cheapest member recorded for a task during tendering
    pub fn optimal_for(&self, task: TaskId) -> Option<GroupingId> {
        match &self.kind {
            GroupingKind::Direct => None,
            GroupingKind::Proxy { optimal, .. } => optimal.get(&task).copied(),
        }
    }

    pub(crate) fn record_optimal(&mut self, task: TaskId, member: GroupingId) {
        if let GroupingKind::Proxy { optimal, .. } = &mut self.kind {
            optimal.insert(task, member);
        }
    }

    /// Resolve this grouping to the concrete grouping that should receive
    /// the task: itself when direct, the memoised optimal member for a proxy
    pub fn unbox(&self, task: TaskId) -> Option<GroupingId> {
        match &self.kind {
            GroupingKind::Direct => Some(self.id),
            GroupingKind::Proxy { optimal, .. } => optimal.get(&task).copied(),
        }
    }
}
