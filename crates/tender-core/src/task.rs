//! Task requests
//!
//! A task request is one unit of work entered into an auction. It keeps an
//! offer book: the tendered cost of every grouping that can perform it.
//! Groupings that priced the task as unreachable never enter the book, so a
//! missing entry reads back as an unreachable cost.

use crate::cost::Cost;
use crate::ids::{GroupingId, SourceId, TaskId};
use crate::token::EntryToken;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A unit of work offered for allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    id: TaskId,
    source: SourceId,
    token: EntryToken,
    offers: IndexMap<GroupingId, Cost>,
}

impl TaskRequest {
    pub(crate) fn new(id: TaskId, source: SourceId, token: EntryToken) -> Self {
        Self { id, source, token, offers: IndexMap::new() }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The caller-side owner of this task
    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn token(&self) -> &EntryToken {
        &self.token
    }

    /// Size of the entry token, which is also the task's size
    pub fn token_size(&self) -> u32 {
        self.token.size()
    }

    pub(crate) fn token_mut(&mut self) -> &mut EntryToken {
        &mut self.token
    }

    /// Effective cost of this task for a grouping, unreachable when the
    /// grouping never tendered an offer
    pub fn cost_for(&self, grouping: GroupingId) -> f64 {
        self.offers
            .get(&grouping)
            .map(Cost::final_value)
            .unwrap_or(f64::INFINITY)
    }

    /// The full offer book, in tender order
    pub fn offers(&self) -> &IndexMap<GroupingId, Cost> {
        &self.offers
    }

    /// Number of groupings holding an offer on this task
    pub fn offer_count(&self) -> usize {
        self.offers.len()
    }

    /// Record or extend an offer by adding to its additive part
    pub fn add_to_offer(&mut self, grouping: GroupingId, increase: f64) {
        self.offers.entry(grouping).or_default().add(increase);
    }

    /// Whether a grouping holds an offer on this task
    pub fn has_offer(&self, grouping: GroupingId) -> bool {
        self.offers.contains_key(&grouping)
    }

    /// Withdraw a grouping's offer
    pub fn remove_offer(&mut self, grouping: GroupingId) {
        self.offers.shift_remove(&grouping);
    }

    /// Clear the whole offer book, ready for a fresh tender round
    pub fn reset_offers(&mut self) {
        self.offers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TokenId;

    fn task() -> TaskRequest {
        TaskRequest::new(
            TaskId::new(1),
            SourceId::new(1),
            EntryToken::new(TokenId::new(1), 2),
        )
    }

    #[test]
    fn test_missing_offer_reads_unreachable() {
        let task = task();
        assert_eq!(task.cost_for(GroupingId::new(9)), f64::INFINITY);
        assert_eq!(task.offer_count(), 0);
    }

    #[test]
    fn test_offers_accumulate() {
        let mut task = task();
        let grouping = GroupingId::new(4);
        task.add_to_offer(grouping, 2.5);
        task.add_to_offer(grouping, 1.5);
        assert_eq!(task.cost_for(grouping), 4.0);
        assert_eq!(task.offer_count(), 1);
    }

    #[test]
    fn test_remove_and_reset() {
        let mut task = task();
        task.add_to_offer(GroupingId::new(1), 1.0);
        task.add_to_offer(GroupingId::new(2), 2.0);
        task.remove_offer(GroupingId::new(1));
        assert!(!task.has_offer(GroupingId::new(1)));
        assert!(task.has_offer(GroupingId::new(2)));
        task.reset_offers();
        assert_eq!(task.offer_count(), 0);
    }
}
