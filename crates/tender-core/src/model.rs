//! The user seam of the allocation engine
//!
//! The engine never prices a task itself and never decides what an
//! allocation means to the caller. Both sides of that boundary go through
//! [`AuctionModel`]: per-worker pricing feeds the cost matrices, and the
//! receive/recall callbacks let task sources track which groupings they
//! currently hold as the tree search commits and unwinds auctions.
//!
//! # Example
//!
//! ```rust,ignore
//! use tender_core::{AuctionModel, Cost, GroupingId, SourceId, TaskId, TaskRequest, WorkerId};
//!
//! struct FlatRate;
//!
//! impl AuctionModel for FlatRate {
//!     fn worker_cost(&self, _worker: WorkerId, _task: &TaskRequest) -> Cost {
//!         Cost::with_sum(1.0)
//!     }
//!
//!     fn receive_grouping(&mut self, _s: SourceId, _g: GroupingId, _t: TaskId) {}
//!     fn recall_grouping(&mut self, _s: SourceId, _g: GroupingId, _t: TaskId) {}
//! }
//! ```

use crate::cost::Cost;
use crate::ids::{DomainId, GroupingId, SourceId, TaskId, WorkerId};
use crate::task::TaskRequest;
use std::collections::BTreeSet;

/// Caller-implemented pricing and allocation callbacks
pub trait AuctionModel {
    /// Price one task for one worker.
    ///
    /// Must return [`Cost::unreachable`] when the worker cannot perform the
    /// task; the market keeps unreachable offers out of every offer book.
    fn worker_cost(&self, worker: WorkerId, task: &TaskRequest) -> Cost;

    /// A source has won a grouping for a task. Called when an auction's
    /// outcome is confirmed, with proxies already unboxed.
    fn receive_grouping(&mut self, source: SourceId, grouping: GroupingId, task: TaskId);

    /// A previously confirmed allocation is being unwound.
    fn recall_grouping(&mut self, source: SourceId, grouping: GroupingId, task: TaskId);

    /// Domains a source has not allocated into yet. Used to restrict which
    /// domains a proxy auction may draw on.
    fn unused_domains(&self, source: SourceId) -> BTreeSet<DomainId> {
        let _ = source;
        BTreeSet::new()
    }

    /// Total bandwidth a source still asks for; feeds batch priority.
    fn total_bandwidth(&self, source: SourceId) -> u32 {
        let _ = source;
        0
    }

    /// Largest single demand a source still asks for; feeds batch priority.
    fn max_bandwidth(&self, source: SourceId) -> u32 {
        let _ = source;
        0
    }
}
