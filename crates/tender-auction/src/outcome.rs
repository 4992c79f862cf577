//! Auction outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tender_core::Assignment;

/// The winning assignment set of one auction call, stamped when decided
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionOutcome {
    assignments: BTreeSet<Assignment>,
    decided_at: DateTime<Utc>,
}

impl AuctionOutcome {
    pub fn new(assignments: BTreeSet<Assignment>) -> Self {
        Self { assignments, decided_at: Utc::now() }
    }

    pub fn assignments(&self) -> &BTreeSet<Assignment> {
        &self.assignments
    }

    pub fn decided_at(&self) -> DateTime<Utc> {
        self.decided_at
    }
}
