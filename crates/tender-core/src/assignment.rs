//! Task-to-grouping assignments

use crate::ids::{GroupingId, TaskId};
use serde::{Deserialize, Serialize};

/// One allocation decision: a task handed to a grouping
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Assignment {
    pub task: TaskId,
    pub grouping: GroupingId,
}

impl Assignment {
    pub fn new(task: TaskId, grouping: GroupingId) -> Self {
        Self { task, grouping }
    }
}
