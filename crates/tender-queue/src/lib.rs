//! Tender Queue - Batch scheduling and backtracking for the tender engine
//!
//! This crate drives whole allocation runs:
//! - [`TaskPool`] sorts loose tasks into source-disjoint, priority-ordered
//!   batches
//! - [`QueueProcessor`] walks the batch queue depth-first, branching failed
//!   allocations back through the auction house and unwinding further on
//!   timeout
//! - [`PoolProvider`] and [`MetricSink`] are the caller seams for pool
//!   selection and run statistics, with [`QueueMetrics`] as the stock sink

mod error;
mod metrics;
mod processor;
mod task_pool;
mod traits;

pub use error::{Error, Result};
pub use metrics::QueueMetrics;
pub use processor::QueueProcessor;
pub use task_pool::TaskPool;
pub use traits::{MetricSink, PoolProvider, SinglePool};
