//! Task batches
//!
//! A batch is the set of same-sized tasks put up in one auction. Batches are
//! ordered for processing: shallower nesting first (the root of an
//! allocation tree), then larger task sizes, then fewer tasks (keeping the
//! combinatorial space small), then larger total bandwidth, with the id as
//! the final tie-break.

use crate::assignment::Assignment;
use crate::ids::{BatchId, TaskId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// The set of tasks contested in a single auction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskBatch {
    id: BatchId,
    nesting: u32,
    task_size: u32,
    tasks: BTreeSet<TaskId>,
    total_bandwidth: u32,
    max_bandwidth: u32,
    outcome: Option<BTreeSet<Assignment>>,
}

impl TaskBatch {
    pub(crate) fn new(
        id: BatchId,
        nesting: u32,
        task_size: u32,
        tasks: BTreeSet<TaskId>,
        total_bandwidth: u32,
        max_bandwidth: u32,
    ) -> Self {
        Self { id, nesting, task_size, tasks, total_bandwidth, max_bandwidth, outcome: None }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Depth of this batch within the caller's allocation tree
    pub fn nesting(&self) -> u32 {
        self.nesting
    }

    /// Token size shared by every task in the batch
    pub fn task_size(&self) -> u32 {
        self.task_size
    }

    pub fn tasks(&self) -> &BTreeSet<TaskId> {
        &self.tasks
    }

    pub fn batch_size(&self) -> usize {
        self.tasks.len()
    }

    /// Summed bandwidth of the batch's sources
    pub fn total_bandwidth(&self) -> u32 {
        self.total_bandwidth
    }

    /// Largest single-source bandwidth in the batch
    pub fn max_bandwidth(&self) -> u32 {
        self.max_bandwidth
    }

    /// The winning assignment set, once the batch's auction succeeded
    pub fn outcome(&self) -> Option<&BTreeSet<Assignment>> {
        self.outcome.as_ref()
    }

    pub fn set_outcome(&mut self, assignments: BTreeSet<Assignment>) {
        self.outcome = Some(assignments);
    }

    pub fn clear_outcome(&mut self) {
        self.outcome = None;
    }

    fn priority_key(&self) -> (u32, std::cmp::Reverse<u32>, usize, std::cmp::Reverse<u32>, BatchId) {
        (
            self.nesting,
            std::cmp::Reverse(self.task_size),
            self.tasks.len(),
            std::cmp::Reverse(self.total_bandwidth),
            self.id,
        )
    }
}

impl PartialEq for TaskBatch {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TaskBatch {}

impl PartialOrd for TaskBatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TaskBatch {
    /// Processing priority: the least batch is allocated first
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority_key().cmp(&other.priority_key())
    }
}
