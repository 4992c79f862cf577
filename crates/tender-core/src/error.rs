//! Error types for tender-core

use crate::ids::{DomainId, GroupingId, PoolId, TaskId, WorkerId};
use thiserror::Error;

/// Result type for tender-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the market
#[derive(Debug, Error)]
pub enum Error {
    #[error("task {0} not registered in this market")]
    UnknownTask(TaskId),

    #[error("grouping {0} not registered in this market")]
    UnknownGrouping(GroupingId),

    #[error("domain {0} not registered in this market")]
    UnknownDomain(DomainId),

    #[error("pool {0} not registered in this market")]
    UnknownPool(PoolId),

    #[error("cannot assign {worker} in {pool}: not available")]
    WorkerNotAvailable { worker: WorkerId, pool: PoolId },

    #[error("a task batch must contain at least one task")]
    EmptyBatch,

    #[error("task {task} has token size {actual}, batch expects {expected}")]
    TokenSizeMismatch { task: TaskId, expected: u32, actual: u32 },

    #[error("a proxy grouping must have at least one member")]
    EmptyProxy,
}
