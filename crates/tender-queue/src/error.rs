//! Error types for tender-queue

use tender_core::PoolId;
use thiserror::Error;

/// Result type for tender-queue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while processing the batch queue
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Market(#[from] tender_core::Error),

    #[error(transparent)]
    Auction(#[from] tender_auction::Error),

    /// The provider handed the first batch a pool with no free workers
    #[error("pool {pool} has no available workers")]
    EmptyPool { pool: PoolId },
}
