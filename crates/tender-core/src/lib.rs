//! Tender Core - Markets, tasks and workers for auction-based allocation
//!
//! This crate provides the entities and the user seam of the tender engine:
//! - Copyable identity types for every market entity
//! - Costs with additive and multiplicative parts
//! - Task requests with tendered offer books, and sized entry tokens
//! - Worker groupings, domain proxies, domains and pools
//! - Validated, priority-ordered task batches
//! - The [`Market`] registry mediating every cross-entity operation
//! - The [`AuctionModel`] trait, where caller pricing and allocation
//!   callbacks plug in
//!
//! The solving machinery lives in `tender-solver`; auctions and the
//! backtracking queue live in `tender-auction` and `tender-queue`.

mod assignment;
mod batch;
mod cost;
mod domain;
mod error;
mod grouping;
mod ids;
mod market;
mod model;
mod pool;
mod task;
mod token;

pub use assignment::Assignment;
pub use batch::TaskBatch;
pub use cost::Cost;
pub use domain::Domain;
pub use error::{Error, Result};
pub use grouping::{Grouping, GroupingKind};
pub use ids::{
    AuctionId, BatchId, DomainId, GroupingId, PoolId, SourceId, TaskId, TokenId, WorkerId,
};
pub use market::Market;
pub use model::AuctionModel;
pub use pool::WorkerPool;
pub use task::TaskRequest;
pub use token::EntryToken;
