//! Stateful solving of one assignment batch
//!
//! A [`MatrixSolver`] is built once per batch and solved repeatedly: the
//! first call yields the optimum, later calls exclude previously seen
//! solutions through a combinatorial search and yield progressively less
//! optimal alternatives, until the search space is exhausted. When the
//! underlying offer books change the solver must be discarded and rebuilt.

use crate::error::Result;
use crate::matrix::{Column, CostMatrix};
use crate::ranking;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tender_core::{Assignment, AuctionModel, GroupingId, Market, TaskId};
use tender_combinatorics::SubsetSequence;

/// Why a solver can or cannot produce further solutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Viability {
    /// At least one task still has multiple viable groupings
    Live,
    /// Some task had no reachable grouping at tender time
    UnreachableColumn,
    /// The exclusion search ran out of combinations
    SearchExhausted,
    /// Every task was allocated by the unique-offer pre-pass
    AllTasksPreassigned,
    /// Dimensions disagreed or costs degenerated
    Corrupt,
}

/// Solves a batch of tasks against a set of groupings, remembering failed
/// branches and exhausted exclusion sets across calls
#[derive(Debug)]
pub struct MatrixSolver {
    groupings: Vec<GroupingId>,
    tasks: Vec<TaskId>,
    unassigned_groupings: BTreeSet<GroupingId>,
    unassigned_tasks: BTreeSet<TaskId>,
    viable: IndexMap<TaskId, BTreeSet<GroupingId>>,
    unique_assignments: IndexMap<TaskId, GroupingId>,
    confirmed: BTreeSet<Assignment>,
    failed_branches: HashSet<BTreeSet<Assignment>>,
    solved_matrices: usize,
    template: Option<CostMatrix>,
    active: Option<CostMatrix>,
    combinatorial: Option<SubsetSequence<Assignment>>,
    viability: Viability,
}

impl MatrixSolver {
    /// Tender every task over the given groupings and build the template
    /// matrix. The tasks' offer books in the market are rewritten as part
    /// of the unique-offer pre-pass.
    pub fn new(
        market: &mut Market,
        model: &impl AuctionModel,
        groupings: Vec<GroupingId>,
        tasks: Vec<TaskId>,
    ) -> Result<Self> {
        let unassigned_groupings: BTreeSet<GroupingId> = groupings.iter().copied().collect();
        let unassigned_tasks: BTreeSet<TaskId> = tasks.iter().copied().collect();
        let mut solver = Self {
            groupings,
            tasks,
            unassigned_groupings,
            unassigned_tasks,
            viable: IndexMap::new(),
            unique_assignments: IndexMap::new(),
            confirmed: BTreeSet::new(),
            failed_branches: HashSet::new(),
            solved_matrices: 0,
            template: None,
            active: None,
            combinatorial: None,
            viability: Viability::Live,
        };
        solver.compute_base_costs(market, model)?;
        if solver.viability == Viability::Live {
            solver.build_template(market)?;
        }
        Ok(solver)
    }

    pub fn viability(&self) -> Viability {
        self.viability
    }

    /// The confirmed outcome of the latest successful solve
    pub fn assigned_tasks(&self) -> &BTreeSet<Assignment> {
        &self.confirmed
    }

    /// True tendered cost of the active solution, for comparing successive
    /// iterations
    pub fn sum_of_assignment_costs(&self, market: &Market) -> Option<f64> {
        let active = self.active.as_ref()?;
        if active.assignments().is_empty() {
            return None;
        }
        let mut sum = 0.0;
        for assignment in active.assignments() {
            sum += market.task(assignment.task).ok()?.cost_for(assignment.grouping);
        }
        Some(sum)
    }

    /// Solve, or re-solve for the next-best alternative.
    ///
    /// Returns true when a full assignment set was confirmed. Check
    /// [`viability`](Self::viability) after a false return to distinguish an
    /// exhausted search from a dead batch.
    pub fn apply_algorithm(&mut self, market: &Market) -> Result<bool> {
        let mut outcome = false;
        match self.viability {
            Viability::Live => {
                outcome = if self.solved_matrices == 0 && self.failed_branches.is_empty() {
                    self.solve_active()
                } else {
                    self.iterate(market)?
                };
            }
            Viability::AllTasksPreassigned => outcome = true,
            _ => {}
        }

        if outcome {
            for (task, grouping) in &self.unique_assignments {
                self.confirmed.insert(Assignment::new(*task, *grouping));
            }
            if self.active.is_some() {
                self.confirm_assignments();
            }
        }

        if self.confirmed.is_empty() {
            outcome = false;
        } else {
            self.solved_matrices += 1;
        }
        Ok(outcome)
    }

    // ---- initialisation --------------------------------------------------

    fn compute_base_costs(&mut self, market: &mut Market, model: &impl AuctionModel) -> Result<()> {
        for task in &self.tasks {
            market.tender_task(*task, &self.unassigned_groupings, model)?;
            let offers: BTreeSet<GroupingId> =
                market.task(*task)?.offers().keys().copied().collect();
            self.viable.insert(*task, offers);
        }
        self.viability = if self.viable.values().any(BTreeSet::is_empty) {
            Viability::UnreachableColumn
        } else {
            Viability::Live
        };
        Ok(())
    }

    fn build_template(&mut self, market: &mut Market) -> Result<()> {
        self.remove_single_offer_tasks(market)?;
        if self.unassigned_tasks.is_empty() {
            self.viability = Viability::AllTasksPreassigned;
            return Ok(());
        }

        let rows: Vec<GroupingId> = self.unassigned_groupings.iter().copied().collect();
        let mut columns: Vec<Column> = self
            .unassigned_tasks
            .iter()
            .map(|task| Column::Task(*task))
            .collect();
        for slack in 0..rows.len().saturating_sub(columns.len()) {
            columns.push(Column::Slack(slack));
        }
        if rows.len() != columns.len() {
            self.viability = Viability::Corrupt;
            return Ok(());
        }

        let mut template = CostMatrix::new(rows, columns, |grouping, task| {
            market
                .task(task)
                .map(|t| t.cost_for(grouping))
                .unwrap_or(f64::INFINITY)
        });
        template.reduce();
        if template.any_nan() {
            self.viability = Viability::Corrupt;
            return Ok(());
        }
        self.active = Some(template.clone());
        self.template = Some(template);
        Ok(())
    }

    /// Pre-assign every task holding exactly one offer, withdrawing the won
    /// grouping from all other offer books; repeats until stable
    fn remove_single_offer_tasks(&mut self, market: &mut Market) -> Result<()> {
        let mut found = true;
        while found {
            found = false;
            let snapshot: Vec<TaskId> = self.unassigned_tasks.iter().copied().collect();
            for task in snapshot {
                if market.task(task)?.offer_count() == 1 {
                    self.assign_unique_bid(market, task)?;
                    found = true;
                }
            }
        }
        Ok(())
    }

    fn assign_unique_bid(&mut self, market: &mut Market, task: TaskId) -> Result<()> {
        let Some(grouping) = market.task(task)?.offers().keys().next().copied() else {
            return Ok(());
        };
        self.unassigned_tasks.remove(&task);
        self.unassigned_groupings.remove(&grouping);
        for other in &self.unassigned_tasks {
            market.task_mut(*other)?.remove_offer(grouping);
        }
        self.unique_assignments.insert(task, grouping);
        Ok(())
    }

    // ---- solving ---------------------------------------------------------

    fn solve_active(&mut self) -> bool {
        let Some(mut active) = self.active.take() else {
            return self.viability == Viability::AllTasksPreassigned;
        };
        let outcome = loop {
            if active.apply_minimum_crossings() {
                break !self.failed_branches.contains(active.assignments());
            }
            if !active.modify_by_lowest_uncrossed() {
                break false;
            }
        };
        self.active = Some(active);
        outcome
    }

    fn iterate(&mut self, market: &Market) -> Result<bool> {
        if self.viability == Viability::AllTasksPreassigned {
            return Ok(false);
        }
        loop {
            // Fetch an exclusion combination that leaves a viable matrix.
            loop {
                if !self.check_combinatorial_state(market)? {
                    self.viability = Viability::SearchExhausted;
                    return Ok(false);
                }
                self.reset_active_matrix();
                let Some(next) = self
                    .combinatorial
                    .as_mut()
                    .and_then(|sequence| sequence.next_subset())
                else {
                    continue;
                };
                let viable = match self.active.as_mut() {
                    Some(active) => {
                        for assignment in &next {
                            active.override_cost(*assignment, f64::INFINITY);
                        }
                        active.reduce();
                        active.check_viable()
                    }
                    None => false,
                };
                if viable {
                    break;
                }
                // This combination alone broke the matrix; never revisit
                // its supersets.
                if let Some(sequence) = self.combinatorial.as_mut() {
                    sequence.add_avoid(&next);
                }
            }
            if self.solve_active() {
                return Ok(true);
            }
        }
    }

    fn confirm_assignments(&mut self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        for assignment in active.assignments() {
            let clash = self.confirmed.iter().any(|confirmed| {
                confirmed.task == assignment.task || confirmed.grouping == assignment.grouping
            });
            if clash {
                self.confirmed.clear();
                break;
            }
            self.confirmed.insert(*assignment);
        }
    }

    // ---- iterating -------------------------------------------------------

    /// Side effect: the active solution is cached with the failed branches.
    fn check_combinatorial_state(&mut self, market: &Market) -> Result<bool> {
        let needs_new = match &self.combinatorial {
            None => true,
            Some(sequence) => !sequence.has_next(),
        };
        if needs_new {
            self.create_combinatorial(market)
        } else {
            self.cache_active_assignments();
            Ok(true)
        }
    }

    fn reset_active_matrix(&mut self) {
        self.confirmed.clear();

        self.unassigned_groupings = self.groupings.iter().copied().collect();
        for grouping in self.unique_assignments.values() {
            self.unassigned_groupings.remove(grouping);
        }
        self.unassigned_tasks = self.tasks.iter().copied().collect();
        for task in self.unique_assignments.keys() {
            self.unassigned_tasks.remove(task);
        }

        self.active = self.template.clone();
    }

    /// Seed a fresh exclusion sequence from the most recent solution,
    /// ordered cheapest sacrifice first. False means the search space is
    /// exhausted.
    fn create_combinatorial(&mut self, market: &Market) -> Result<bool> {
        if self.active.is_none() {
            return Ok(false);
        }
        if self.combinatorial.is_some() && !self.cleanup_last_combinatorial() {
            return Ok(false);
        }
        let Some(seed) = self.cache_active_assignments() else {
            return Ok(false);
        };
        self.active = None;

        let order = ranking::void_order(market, &self.viable, &self.groupings, &self.tasks)?;
        if order.is_empty() {
            return Ok(false);
        }
        let rank: HashMap<Assignment, i64> = order
            .iter()
            .enumerate()
            .map(|(index, assignment)| (*assignment, index as i64))
            .collect();
        let Some(template) = self.template.as_ref() else {
            return Ok(false);
        };

        let mut keyed: Vec<(f64, i64, Assignment)> = Vec::new();
        for assignment in seed {
            let cost = ranking::marginal_cost(template, market, assignment)?;
            let void_rank = rank.get(&assignment).copied().unwrap_or(-1);
            keyed.push((cost, void_rank, assignment));
        }
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        self.combinatorial = Some(SubsetSequence::new(
            keyed.into_iter().map(|(_, _, assignment)| assignment).collect(),
        ));
        Ok(true)
    }

    /// Permanently eliminate the exhausted sequence's assignments from the
    /// template and prune them out of the failed branches. False when the
    /// template became unviable, which ends the search.
    fn cleanup_last_combinatorial(&mut self) -> bool {
        let Some(sequence) = self.combinatorial.as_ref() else {
            return false;
        };
        let elements = sequence.elements().to_vec();
        for assignment in &elements {
            self.permanently_eliminate(*assignment);
        }

        let element_set: BTreeSet<Assignment> = elements.into_iter().collect();
        self.failed_branches.remove(&element_set);
        let branches: Vec<BTreeSet<Assignment>> = self.failed_branches.drain().collect();
        for branch in branches {
            let live: BTreeSet<Assignment> =
                branch.difference(&element_set).copied().collect();
            if !live.is_empty() {
                self.failed_branches.insert(live);
            }
        }

        self.template.as_ref().is_some_and(CostMatrix::check_viable)
    }

    fn permanently_eliminate(&mut self, assignment: Assignment) {
        if let Some(template) = self.template.as_mut() {
            template.override_cost(assignment, f64::INFINITY);
        }
        if let Some(viable) = self.viable.get_mut(&assignment.task) {
            viable.remove(&assignment.grouping);
        }
    }

    fn cache_active_assignments(&mut self) -> Option<BTreeSet<Assignment>> {
        let assignments = self.active.as_ref()?.assignments().clone();
        if assignments.is_empty() {
            return None;
        }
        self.failed_branches.insert(assignments.clone());
        Some(assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tender_core::{Cost, SourceId, TaskRequest, WorkerId};

    /// Prices every (worker, task) pair from a fixed table; absent pairs
    /// are unreachable
    struct TableModel {
        prices: BTreeMap<(WorkerId, TaskId), f64>,
    }

    impl TableModel {
        fn new(prices: &[(u64, u64, f64)]) -> Self {
            Self {
                prices: prices
                    .iter()
                    .map(|(w, t, p)| ((WorkerId::new(*w), TaskId::new(*t)), *p))
                    .collect(),
            }
        }
    }

    impl AuctionModel for TableModel {
        fn worker_cost(&self, worker: WorkerId, task: &TaskRequest) -> Cost {
            self.prices
                .get(&(worker, task.id()))
                .map(|p| Cost::with_sum(*p))
                .unwrap_or_else(Cost::unreachable)
        }

        fn receive_grouping(&mut self, _: SourceId, _: GroupingId, _: TaskId) {}
        fn recall_grouping(&mut self, _: SourceId, _: GroupingId, _: TaskId) {}
    }

    fn single_worker_groupings(market: &mut Market, workers: &[u64]) -> Vec<GroupingId> {
        workers
            .iter()
            .map(|worker| market.add_grouping(1, [WorkerId::new(*worker)].into_iter().collect()))
            .collect()
    }

    #[test]
    fn test_first_solve_is_optimal() {
        let mut market = Market::new();
        let source = SourceId::new(1);
        let tasks = vec![market.add_task(source, 1), market.add_task(source, 1)];
        let groupings = single_worker_groupings(&mut market, &[1, 2]);
        let model = TableModel::new(&[
            (1, tasks[0].raw(), 1.0),
            (1, tasks[1].raw(), 2.0),
            (2, tasks[0].raw(), 2.0),
            (2, tasks[1].raw(), 4.0),
        ]);

        let mut solver =
            MatrixSolver::new(&mut market, &model, groupings.clone(), tasks.clone()).unwrap();
        assert_eq!(solver.viability(), Viability::Live);
        assert!(solver.apply_algorithm(&market).unwrap());

        let expected: BTreeSet<Assignment> = [
            Assignment::new(tasks[0], groupings[1]),
            Assignment::new(tasks[1], groupings[0]),
        ]
        .into_iter()
        .collect();
        assert_eq!(solver.assigned_tasks(), &expected);
        assert_eq!(solver.sum_of_assignment_costs(&market), Some(4.0));
    }

    #[test]
    fn test_unreachable_task_is_dead_on_arrival() {
        let mut market = Market::new();
        let source = SourceId::new(1);
        let tasks = vec![market.add_task(source, 1), market.add_task(source, 1)];
        let groupings = single_worker_groupings(&mut market, &[1, 2]);
        // Task 1 is priced by nobody.
        let model = TableModel::new(&[(1, tasks[0].raw(), 1.0), (2, tasks[0].raw(), 2.0)]);

        let mut solver = MatrixSolver::new(&mut market, &model, groupings, tasks).unwrap();
        assert_eq!(solver.viability(), Viability::UnreachableColumn);
        assert!(!solver.apply_algorithm(&market).unwrap());
        assert!(solver.assigned_tasks().is_empty());
    }

    #[test]
    fn test_unique_offers_preassign_whole_batch() {
        let mut market = Market::new();
        let source = SourceId::new(1);
        let tasks = vec![market.add_task(source, 1), market.add_task(source, 1)];
        let groupings = single_worker_groupings(&mut market, &[1, 2]);
        // Each task is reachable by exactly one grouping.
        let model = TableModel::new(&[(1, tasks[0].raw(), 1.0), (2, tasks[1].raw(), 2.0)]);

        let mut solver =
            MatrixSolver::new(&mut market, &model, groupings.clone(), tasks.clone()).unwrap();
        assert_eq!(solver.viability(), Viability::AllTasksPreassigned);
        assert!(solver.apply_algorithm(&market).unwrap());

        let expected: BTreeSet<Assignment> = [
            Assignment::new(tasks[0], groupings[0]),
            Assignment::new(tasks[1], groupings[1]),
        ]
        .into_iter()
        .collect();
        assert_eq!(solver.assigned_tasks(), &expected);
        // Pre-assigned batches keep succeeding but can never iterate.
        assert!(solver.apply_algorithm(&market).unwrap());
    }

    #[test]
    fn test_iteration_yields_second_best() {
        let mut market = Market::new();
        let source = SourceId::new(1);
        let tasks = vec![market.add_task(source, 1), market.add_task(source, 1)];
        let groupings = single_worker_groupings(&mut market, &[1, 2]);
        let model = TableModel::new(&[
            (1, tasks[0].raw(), 1.0),
            (1, tasks[1].raw(), 2.0),
            (2, tasks[0].raw(), 2.0),
            (2, tasks[1].raw(), 4.0),
        ]);

        let mut solver =
            MatrixSolver::new(&mut market, &model, groupings.clone(), tasks.clone()).unwrap();
        assert!(solver.apply_algorithm(&market).unwrap());
        let first = solver.assigned_tasks().clone();

        assert!(solver.apply_algorithm(&market).unwrap());
        let second = solver.assigned_tasks().clone();
        assert_ne!(first, second);

        let expected: BTreeSet<Assignment> = [
            Assignment::new(tasks[0], groupings[0]),
            Assignment::new(tasks[1], groupings[1]),
        ]
        .into_iter()
        .collect();
        assert_eq!(second, expected);
        assert_eq!(solver.sum_of_assignment_costs(&market), Some(5.0));
    }

    #[test]
    fn test_spare_grouping_feeds_alternatives_then_exhausts() {
        let mut market = Market::new();
        let source = SourceId::new(1);
        let tasks = vec![market.add_task(source, 1)];
        let groupings = single_worker_groupings(&mut market, &[1, 2]);
        let model =
            TableModel::new(&[(1, tasks[0].raw(), 1.0), (2, tasks[0].raw(), 2.0)]);

        let mut solver =
            MatrixSolver::new(&mut market, &model, groupings.clone(), tasks.clone()).unwrap();

        // Cheapest grouping wins first.
        assert!(solver.apply_algorithm(&market).unwrap());
        let first: BTreeSet<Assignment> =
            [Assignment::new(tasks[0], groupings[0])].into_iter().collect();
        assert_eq!(solver.assigned_tasks(), &first);

        // The spare grouping carries the only alternative.
        assert!(solver.apply_algorithm(&market).unwrap());
        let second: BTreeSet<Assignment> =
            [Assignment::new(tasks[0], groupings[1])].into_iter().collect();
        assert_eq!(solver.assigned_tasks(), &second);

        // Nothing left to sacrifice.
        assert!(!solver.apply_algorithm(&market).unwrap());
        assert_eq!(solver.viability(), Viability::SearchExhausted);
    }
}
