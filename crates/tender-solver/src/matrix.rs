//! Square cost matrices and the crossing steps that solve them
//!
//! A matrix carries a single solving state: costs, cached zero locations,
//! row and column crossings, starred and primed cells. Slack columns pad the
//! matrix square when groupings outnumber tasks; they cost nothing and never
//! surface as assignments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tender_core::{Assignment, GroupingId, TaskId};

/// One column of a cost matrix: a real task, or square-padding slack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Column {
    Task(TaskId),
    Slack(usize),
}

impl Column {
    pub fn task(&self) -> Option<TaskId> {
        match self {
            Column::Task(task) => Some(*task),
            Column::Slack(_) => None,
        }
    }
}

/// A square assignment matrix mid-solve
///
/// Rows are worker groupings, columns are tasks. A solved matrix holds one
/// starred zero per row and column; stars on task columns become the
/// assignment set.
#[derive(Debug, Clone)]
pub struct CostMatrix {
    size: usize,
    rows: Vec<GroupingId>,
    columns: Vec<Column>,
    costs: Vec<f64>,
    zero_locations: Vec<(usize, usize)>,
    rows_crossed: Vec<bool>,
    columns_crossed: Vec<bool>,
    starred: Vec<bool>,
    primed: Vec<bool>,
    assigned: BTreeSet<Assignment>,
}

impl CostMatrix {
    /// # Panics
    ///
    /// Panics when rows and columns disagree in length; callers square the
    /// matrix with slack columns first.
    pub fn new(
        rows: Vec<GroupingId>,
        columns: Vec<Column>,
        cost: impl Fn(GroupingId, TaskId) -> f64,
    ) -> Self {
        assert_eq!(rows.len(), columns.len(), "cost matrix must be square");
        let size = rows.len();
        let mut costs = vec![f64::INFINITY; size * size];
        for (row, grouping) in rows.iter().enumerate() {
            for (column, entry) in columns.iter().enumerate() {
                costs[row * size + column] = match entry {
                    Column::Task(task) => cost(*grouping, *task),
                    Column::Slack(_) => 0.0,
                };
            }
        }
        Self {
            size,
            rows,
            columns,
            costs,
            zero_locations: Vec::new(),
            rows_crossed: vec![false; size],
            columns_crossed: vec![false; size],
            starred: vec![false; size * size],
            primed: vec![false; size * size],
            assigned: BTreeSet::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn at(&self, row: usize, column: usize) -> f64 {
        self.costs[row * self.size + column]
    }

    fn set(&mut self, row: usize, column: usize, value: f64) {
        self.costs[row * self.size + column] = value;
    }

    /// Subtract each column's minimum, then each row's, and cache the
    /// resulting zero locations
    pub fn reduce(&mut self) {
        self.normalise_columns();
        self.normalise_rows();
        self.cache_zero_locations();
    }

    fn normalise_columns(&mut self) {
        for column in 0..self.size {
            let mut lowest = f64::MAX;
            for row in 0..self.size {
                lowest = lowest.min(self.at(row, column));
            }
            for row in 0..self.size {
                let value = self.at(row, column);
                self.set(row, column, value - lowest);
            }
        }
    }

    fn normalise_rows(&mut self) {
        for row in 0..self.size {
            let mut lowest = f64::MAX;
            for column in 0..self.size {
                lowest = lowest.min(self.at(row, column));
            }
            for column in 0..self.size {
                let value = self.at(row, column);
                self.set(row, column, value - lowest);
            }
        }
    }

    fn cache_zero_locations(&mut self) {
        for row in 0..self.size {
            for column in 0..self.size {
                if self.at(row, column) == 0.0 {
                    self.zero_locations.push((row, column));
                }
            }
        }
    }

    /// Whether no row or column is entirely unreachable. Reducing an
    /// all-infinite column leaves NaN behind, so any non-finite cell counts.
    pub fn check_viable(&self) -> bool {
        let mut row_infinities = vec![0usize; self.size];
        let mut column_infinities = vec![0usize; self.size];
        for row in 0..self.size {
            for column in 0..self.size {
                if !self.at(row, column).is_finite() {
                    row_infinities[row] += 1;
                    if row_infinities[row] == self.size {
                        return false;
                    }
                    column_infinities[column] += 1;
                    if column_infinities[column] == self.size {
                        return false;
                    }
                }
            }
        }
        true
    }

    pub fn any_nan(&self) -> bool {
        self.costs.iter().any(|cost| cost.is_nan())
    }

    /// Cross out all zeros with the fewest lines.
    ///
    /// Returns true when the matrix is solved and its assignments are
    /// confirmed; false when the costs need modifying first.
    pub fn apply_minimum_crossings(&mut self) -> bool {
        if self.zero_locations.is_empty() {
            self.cache_zero_locations();
        }
        self.uncross_all();
        self.star_single_zero_columns();

        if self.count_starred() == self.size {
            self.confirm_starred_assignments();
            return true;
        }

        let mut covering_all_zeros = true;
        while covering_all_zeros {
            self.cross_starred_columns();
            let mut last_primed = None;
            loop {
                match self.find_uncrossed_zero() {
                    None => {
                        covering_all_zeros = false;
                        break;
                    }
                    Some(zero) => {
                        last_primed = Some(zero);
                        if !self.uncross_column_cross_row(zero.0) {
                            break;
                        }
                    }
                }
            }
            if covering_all_zeros {
                if let Some(start) = last_primed {
                    let walk = self.find_prime_star_walk(start);
                    self.apply_prime_star_walk(walk);
                    self.uncross_all();
                    self.unprime_all();
                }
            }
        }
        if self.count_starred() == self.size {
            self.confirm_starred_assignments();
            return true;
        }
        false
    }

    fn uncross_all(&mut self) {
        self.rows_crossed.fill(false);
        self.columns_crossed.fill(false);
    }

    fn unprime_all(&mut self) {
        self.primed.fill(false);
    }

    /// Star the zero of every single-zero column whose row holds no star yet
    fn star_single_zero_columns(&mut self) {
        let mut single: Vec<Option<(usize, usize)>> = vec![None; self.size];
        let mut multiple = vec![false; self.size];
        for (row, column) in &self.zero_locations {
            if multiple[*column] {
                continue;
            }
            if single[*column].is_some() {
                single[*column] = None;
                multiple[*column] = true;
            } else {
                single[*column] = Some((*row, *column));
            }
        }
        for location in single.into_iter().flatten() {
            if self.star_in_row(location.0).is_none() {
                self.starred[location.0 * self.size + location.1] = true;
            }
        }
    }

    fn count_starred(&self) -> usize {
        (0..self.size)
            .filter(|row| self.star_in_row(*row).is_some())
            .count()
    }

    fn confirm_starred_assignments(&mut self) {
        for row in 0..self.size {
            for column in 0..self.size {
                if !self.starred[row * self.size + column] {
                    continue;
                }
                if let Column::Task(task) = self.columns[column] {
                    self.assigned.insert(Assignment::new(task, self.rows[row]));
                }
            }
        }
    }

    fn cross_starred_columns(&mut self) {
        for row in 0..self.size {
            for column in 0..self.size {
                if self.starred[row * self.size + column] {
                    self.columns_crossed[column] = true;
                }
            }
        }
    }

    /// Find and prime the first cached zero outside every crossing
    fn find_uncrossed_zero(&mut self) -> Option<(usize, usize)> {
        for (row, column) in &self.zero_locations {
            if !self.rows_crossed[*row] && !self.columns_crossed[*column] {
                self.primed[*row * self.size + *column] = true;
                return Some((*row, *column));
            }
        }
        None
    }

    /// Swap a primed zero's covering from its starred column to its row.
    /// False when the row holds no star, which starts an augmenting walk.
    fn uncross_column_cross_row(&mut self, row: usize) -> bool {
        match self.star_in_row(row) {
            Some(column) => {
                self.columns_crossed[column] = false;
                self.rows_crossed[row] = true;
                true
            }
            None => false,
        }
    }

    /// Alternating prime/star walk from an uncovered primed zero
    fn find_prime_star_walk(&self, start: (usize, usize)) -> Vec<(usize, usize)> {
        let mut walk = vec![start];
        loop {
            let primed = match walk.last() {
                Some(location) => *location,
                None => break,
            };
            let star = match self.star_in_column(primed.1) {
                Some(row) => (row, primed.1),
                None => break,
            };
            walk.push(star);
            match self.prime_in_row(star.0) {
                Some(column) => walk.push((star.0, column)),
                None => {
                    debug_assert!(false, "starred row without a primed zero");
                    break;
                }
            }
        }
        walk
    }

    /// Star every primed zero on the walk and unstar every starred one,
    /// growing the star count by one
    fn apply_prime_star_walk(&mut self, mut walk: Vec<(usize, usize)>) {
        let mut prime = true;
        while let Some((row, column)) = walk.pop() {
            let index = row * self.size + column;
            if prime {
                self.primed[index] = false;
                self.starred[index] = true;
            } else {
                self.starred[index] = false;
            }
            prime = !prime;
        }
    }

    fn star_in_row(&self, row: usize) -> Option<usize> {
        (0..self.size).find(|column| self.starred[row * self.size + column])
    }

    fn star_in_column(&self, column: usize) -> Option<usize> {
        (0..self.size).find(|row| self.starred[row * self.size + column])
    }

    fn prime_in_row(&self, row: usize) -> Option<usize> {
        (0..self.size).find(|column| self.primed[row * self.size + column])
    }

    /// Shift costs towards a new zero: subtract the lowest uncrossed value
    /// from uncrossed cells and add it to doubly-crossed ones.
    ///
    /// Returns false when no finite cost moved, meaning this matrix cannot
    /// progress further.
    pub fn modify_by_lowest_uncrossed(&mut self) -> bool {
        self.zero_locations.clear();
        let mut lowest = f64::MAX;
        for row in 0..self.size {
            for column in 0..self.size {
                if !self.rows_crossed[row] && !self.columns_crossed[column] {
                    lowest = lowest.min(self.at(row, column));
                }
            }
        }
        let mut any_modified = false;
        for row in 0..self.size {
            for column in 0..self.size {
                let value = self.at(row, column);
                if value == f64::INFINITY {
                    continue;
                }
                let mut coefficient = -1i32;
                if self.rows_crossed[row] {
                    coefficient += 1;
                }
                if self.columns_crossed[column] {
                    coefficient += 1;
                }
                any_modified = any_modified || coefficient != 0;
                let modified = value + f64::from(coefficient) * lowest;
                self.set(row, column, modified);
                if modified == 0.0 {
                    self.zero_locations.push((row, column));
                }
            }
        }
        lowest != f64::MAX && any_modified
    }

    /// Overwrite one cell, invalidating the zero cache. Unknown pairs are
    /// ignored.
    pub fn override_cost(&mut self, assignment: Assignment, cost: f64) {
        self.zero_locations.clear();
        let row = self.rows.iter().position(|r| *r == assignment.grouping);
        let column = self
            .columns
            .iter()
            .position(|c| c.task() == Some(assignment.task));
        if let (Some(row), Some(column)) = (row, column) {
            self.set(row, column, cost);
        }
    }

    /// Current (reduced) cost of an assignment's cell, if both sides are in
    /// this matrix
    pub fn assignment_cost(&self, assignment: Assignment) -> Option<f64> {
        let row = self.rows.iter().position(|r| *r == assignment.grouping)?;
        let column = self
            .columns
            .iter()
            .position(|c| c.task() == Some(assignment.task))?;
        Some(self.at(row, column))
    }

    /// Confirmed assignments; slack columns never appear here
    pub fn assignments(&self) -> &BTreeSet<Assignment> {
        &self.assigned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn grouping(id: u64) -> GroupingId {
        GroupingId::new(id)
    }

    fn task(id: u64) -> TaskId {
        TaskId::new(id)
    }

    fn matrix(rows: &[u64], tasks: &[u64], slack: usize, table: &[(u64, u64, f64)]) -> CostMatrix {
        let prices: BTreeMap<(u64, u64), f64> =
            table.iter().map(|(g, t, p)| ((*g, *t), *p)).collect();
        let rows: Vec<GroupingId> = rows.iter().map(|id| grouping(*id)).collect();
        let mut columns: Vec<Column> = tasks.iter().map(|id| Column::Task(task(*id))).collect();
        for index in 0..slack {
            columns.push(Column::Slack(index));
        }
        CostMatrix::new(rows, columns, |g, t| {
            prices
                .get(&(g.raw(), t.raw()))
                .copied()
                .unwrap_or(f64::INFINITY)
        })
    }

    fn solve(matrix: &mut CostMatrix) -> bool {
        loop {
            if matrix.apply_minimum_crossings() {
                return true;
            }
            if !matrix.modify_by_lowest_uncrossed() {
                return false;
            }
        }
    }

    #[test]
    fn test_solves_two_by_two() {
        let mut matrix = matrix(
            &[0, 1],
            &[0, 1],
            0,
            &[(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 4.0)],
        );
        matrix.reduce();
        assert!(solve(&mut matrix));
        let expected: BTreeSet<Assignment> = [
            Assignment::new(task(0), grouping(1)),
            Assignment::new(task(1), grouping(0)),
        ]
        .into_iter()
        .collect();
        assert_eq!(matrix.assignments(), &expected);
    }

    #[test]
    fn test_solve_needs_cost_modification() {
        // Zeros after reduction can be covered with fewer lines than the
        // size, forcing a modify step before the solution appears.
        let mut matrix = matrix(
            &[0, 1, 2],
            &[0, 1, 2],
            0,
            &[
                (0, 0, 1.0),
                (0, 1, 2.0),
                (0, 2, 3.0),
                (1, 0, 2.0),
                (1, 1, 4.0),
                (1, 2, 6.0),
                (2, 0, 3.0),
                (2, 1, 6.0),
                (2, 2, 9.0),
            ],
        );
        matrix.reduce();
        assert!(solve(&mut matrix));
        let expected: BTreeSet<Assignment> = [
            Assignment::new(task(0), grouping(2)),
            Assignment::new(task(1), grouping(1)),
            Assignment::new(task(2), grouping(0)),
        ]
        .into_iter()
        .collect();
        assert_eq!(matrix.assignments(), &expected);
    }

    #[test]
    fn test_slack_columns_absorb_spare_groupings() {
        let mut matrix = matrix(&[0, 1], &[0], 1, &[(0, 0, 5.0), (1, 0, 3.0)]);
        matrix.reduce();
        assert!(solve(&mut matrix));
        let expected: BTreeSet<Assignment> =
            [Assignment::new(task(0), grouping(1))].into_iter().collect();
        assert_eq!(matrix.assignments(), &expected);
    }

    #[test]
    fn test_viability_rejects_unreachable_column() {
        let matrix = matrix(&[0, 1], &[0, 1], 0, &[(0, 0, 1.0), (1, 0, 2.0)]);
        // Task 1 was never priced, so its column is all infinite.
        assert!(!matrix.check_viable());
    }

    #[test]
    fn test_override_blocks_assignment() {
        let mut matrix = matrix(
            &[0, 1],
            &[0, 1],
            0,
            &[(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 4.0)],
        );
        matrix.reduce();
        matrix.override_cost(Assignment::new(task(1), grouping(0)), f64::INFINITY);
        matrix.reduce();
        assert!(matrix.check_viable());
        assert!(solve(&mut matrix));
        let expected: BTreeSet<Assignment> = [
            Assignment::new(task(0), grouping(0)),
            Assignment::new(task(1), grouping(1)),
        ]
        .into_iter()
        .collect();
        assert_eq!(matrix.assignments(), &expected);
    }

    #[test]
    fn test_assignment_cost_reads_reduced_cell() {
        let mut matrix = matrix(
            &[0, 1],
            &[0, 1],
            0,
            &[(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 4.0)],
        );
        matrix.reduce();
        assert_eq!(
            matrix.assignment_cost(Assignment::new(task(0), grouping(1))),
            Some(0.0)
        );
        assert_eq!(
            matrix.assignment_cost(Assignment::new(task(9), grouping(0))),
            None
        );
    }
}
