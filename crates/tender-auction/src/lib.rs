//! Tender Auction - Auctions and the branching auction house
//!
//! This crate turns the matrix solver into a tree search:
//! - [`Auction`] runs one batch against one pool and can be re-called for
//!   its next-best outcome
//! - [`FixedQueueHouse`] commits winning assignments, keeps a LIFO stack of
//!   successes to branch from, and mints proxy pools for multi-task batches
//!   so no domain wins twice in one auction
//!
//! Batch scheduling and backtracking across many batches live in
//! `tender-queue`.

mod auction;
mod error;
mod house;
mod outcome;

pub use auction::{Auction, AuctionState};
pub use error::{Error, Result};
pub use house::{AuctionHouse, FixedQueueHouse};
pub use outcome::AuctionOutcome;
