//! Error types for tender-auction

use thiserror::Error;

/// Result type for tender-auction operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running auctions
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Market(#[from] tender_core::Error),

    #[error(transparent)]
    Solver(#[from] tender_solver::Error),
}
