//! Assignment ranking for seeding the exclusion search
//!
//! When a solution set has to be sacrificed, the order its assignments are
//! excluded in decides how quickly the search degrades. Two rankings feed
//! that order:
//!
//! - The void order interleaves every task's viable assignments, scarcest
//!   tasks first and cheapest cross-sums first within a task
//! - The marginal cost reads the reduced template cell, falling back to the
//!   tendered cost for cells no longer in the template

use crate::error::Result;
use crate::matrix::CostMatrix;
use indexmap::IndexMap;
use std::collections::{BTreeSet, VecDeque};
use tender_core::{Assignment, GroupingId, Market, TaskId};

/// Sum of every finite cost in an assignment's row and column, the cell
/// itself counted once
pub(crate) fn cross_sum(
    market: &Market,
    assignment: Assignment,
    groupings: &[GroupingId],
    tasks: &[TaskId],
) -> Result<f64> {
    let task = market.task(assignment.task)?;
    let mut sum = 0.0;
    for grouping in groupings {
        let cost = task.cost_for(*grouping);
        if cost < f64::INFINITY {
            sum += cost;
        }
    }
    for other in tasks {
        if *other == assignment.task {
            continue;
        }
        let cost = market.task(*other)?.cost_for(assignment.grouping);
        if cost < f64::INFINITY {
            sum += cost;
        }
    }
    Ok(sum)
}

/// Round-robin of every task's remaining viable assignments: tasks with the
/// fewest options lead each round, and each task yields its lowest
/// cross-sum assignment first
pub(crate) fn void_order(
    market: &Market,
    viable: &IndexMap<TaskId, BTreeSet<GroupingId>>,
    groupings: &[GroupingId],
    tasks: &[TaskId],
) -> Result<Vec<Assignment>> {
    let mut ranked: Vec<(TaskId, VecDeque<Assignment>)> = Vec::new();
    for (task, viable_groupings) in viable {
        let mut keyed: Vec<(f64, Assignment)> = Vec::new();
        for grouping in viable_groupings {
            let assignment = Assignment::new(*task, *grouping);
            keyed.push((cross_sum(market, assignment, groupings, tasks)?, assignment));
        }
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        ranked.push((*task, keyed.into_iter().map(|(_, a)| a).collect()));
    }
    ranked.sort_by_key(|(task, queue)| (queue.len(), *task));

    let mut order = Vec::new();
    loop {
        let mut drained = true;
        for (_, queue) in &mut ranked {
            if let Some(next) = queue.pop_front() {
                order.push(next);
                drained = false;
            }
        }
        if drained {
            break;
        }
    }
    Ok(order)
}

/// Reduced template cost of an assignment, or its true tendered cost when
/// the template no longer carries that cell
pub(crate) fn marginal_cost(
    template: &CostMatrix,
    market: &Market,
    assignment: Assignment,
) -> Result<f64> {
    match template.assignment_cost(assignment) {
        Some(cost) => Ok(cost),
        None => Ok(market.task(assignment.task)?.cost_for(assignment.grouping)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tender_core::{AuctionModel, Cost, SourceId, TaskRequest, WorkerId};

    struct UnitModel;

    impl AuctionModel for UnitModel {
        fn worker_cost(&self, worker: WorkerId, _task: &TaskRequest) -> Cost {
            Cost::with_sum(worker.raw() as f64)
        }

        fn receive_grouping(&mut self, _: SourceId, _: GroupingId, _: TaskId) {}
        fn recall_grouping(&mut self, _: SourceId, _: GroupingId, _: TaskId) {}
    }

    fn setup() -> (Market, Vec<GroupingId>, Vec<TaskId>) {
        let mut market = Market::new();
        let source = SourceId::new(1);
        let tasks = vec![market.add_task(source, 1), market.add_task(source, 1)];
        let groupings = vec![
            market.add_grouping(1, [WorkerId::new(1)].into_iter().collect()),
            market.add_grouping(1, [WorkerId::new(2)].into_iter().collect()),
        ];
        let grouping_set: BTreeSet<GroupingId> = groupings.iter().copied().collect();
        for task in &tasks {
            market.tender_task(*task, &grouping_set, &UnitModel).unwrap();
        }
        (market, groupings, tasks)
    }

    #[test]
    fn test_cross_sum_spans_row_and_column() {
        let (market, groupings, tasks) = setup();
        // Task 0 row: 1 + 2; task 1's cost on grouping 0: 1.
        let sum = cross_sum(
            &market,
            Assignment::new(tasks[0], groupings[0]),
            &groupings,
            &tasks,
        )
        .unwrap();
        assert_eq!(sum, 4.0);
    }

    #[test]
    fn test_void_order_interleaves_tasks() {
        let (market, groupings, tasks) = setup();
        let mut viable: IndexMap<TaskId, BTreeSet<GroupingId>> = IndexMap::new();
        viable.insert(tasks[0], groupings.iter().copied().collect());
        viable.insert(tasks[1], groupings.iter().copied().collect());

        let order = void_order(&market, &viable, &groupings, &tasks).unwrap();
        assert_eq!(order.len(), 4);
        // One assignment per task per round.
        assert_eq!(order[0].task, tasks[0]);
        assert_eq!(order[1].task, tasks[1]);
        assert_eq!(order[2].task, tasks[0]);
        assert_eq!(order[3].task, tasks[1]);
        // Cheapest grouping leads within each task.
        assert_eq!(order[0].grouping, groupings[0]);
        assert_eq!(order[1].grouping, groupings[0]);
    }

    #[test]
    fn test_scarcer_task_leads_void_order() {
        let (market, groupings, tasks) = setup();
        let mut viable: IndexMap<TaskId, BTreeSet<GroupingId>> = IndexMap::new();
        viable.insert(tasks[0], groupings.iter().copied().collect());
        viable.insert(tasks[1], [groupings[1]].into_iter().collect());

        let order = void_order(&market, &viable, &groupings, &tasks).unwrap();
        assert_eq!(order[0].task, tasks[1]);
        assert_eq!(order[1].task, tasks[0]);
    }
}
