//! Worker domains
//!
//! Domains partition workers along some external dimension (a day, a site, a
//! shift) and limit how deeply one auction can allocate into that dimension.
//! A grouping registers as a sub-domain of a domain only when every one of
//! its workers belongs to the domain.

use crate::ids::{DomainId, GroupingId, WorkerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A slice of the worker population along one allocation dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    id: DomainId,
    workers: BTreeSet<WorkerId>,
    groupings: BTreeSet<GroupingId>,
}

impl Domain {
    pub(crate) fn new(id: DomainId, workers: BTreeSet<WorkerId>) -> Self {
        Self { id, workers, groupings: BTreeSet::new() }
    }

    pub fn id(&self) -> DomainId {
        self.id
    }

    /// Workers belonging to this domain
    pub fn workers(&self) -> &BTreeSet<WorkerId> {
        &self.workers
    }

    /// Groupings registered as sub-domains
    pub fn groupings(&self) -> &BTreeSet<GroupingId> {
        &self.groupings
    }

    /// Register a grouping whose workers all belong to this domain.
    /// Returns false (and registers nothing) otherwise.
    pub(crate) fn add_sub_domain(
        &mut self,
        grouping: GroupingId,
        grouping_workers: &BTreeSet<WorkerId>,
    ) -> bool {
        if grouping_workers.is_subset(&self.workers) {
            self.groupings.insert(grouping);
            true
        } else {
            false
        }
    }
}
