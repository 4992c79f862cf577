//! Error types for tender-solver

use thiserror::Error;

/// Result type for tender-solver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while solving a batch
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Market(#[from] tender_core::Error),
}
