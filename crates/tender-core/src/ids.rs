//! Identity types for market entities
//!
//! Every entity the market tracks gets a copyable newtype id. Ids are
//! allocated by the [`Market`](crate::Market) with monotonic counters, so
//! two entities of the same kind never share an id within one market.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl $name {
            /// Create an id from a raw value
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get the raw id value
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Unique identifier for a task request
    TaskId,
    "task"
);
id_type!(
    /// Unique identifier for a task source (the caller-side owner of tasks)
    SourceId,
    "source"
);
id_type!(
    /// Unique identifier for an individual worker
    WorkerId,
    "worker"
);
id_type!(
    /// Unique identifier for a worker grouping (direct or domain proxy)
    GroupingId,
    "grouping"
);
id_type!(
    /// Unique identifier for a worker domain
    DomainId,
    "domain"
);
id_type!(
    /// Unique identifier for a worker pool
    PoolId,
    "pool"
);
id_type!(
    /// Unique identifier for a task batch
    BatchId,
    "batch"
);
id_type!(
    /// Serial number of an entry token, the audit trail of auction entry
    TokenId,
    "token"
);
id_type!(
    /// Unique identifier for an auction
    AuctionId,
    "auction"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_roundtrip() {
        let id = TaskId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(format!("{}", id), "task:42");
    }

    #[test]
    fn test_display_prefixes() {
        assert_eq!(format!("{}", GroupingId::new(7)), "grouping:7");
        assert_eq!(format!("{}", PoolId::new(0)), "pool:0");
        assert_eq!(format!("{}", TokenId::new(3)), "token:3");
    }

    #[test]
    fn test_ordering() {
        assert!(WorkerId::new(1) < WorkerId::new(2));
    }
}
