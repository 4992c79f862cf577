//! Tender Solver - Assignment solving for auction batches
//!
//! Solves one batch of task requests against a set of worker groupings by
//! repeated matrix reduction and crossing, with three departures from the
//! textbook method:
//!
//! - Slack columns square the matrix when groupings outnumber tasks
//! - Tasks holding a single viable offer are pre-assigned before the matrix
//!   is built
//! - Solved matrices can be re-solved: previously seen solutions feed a
//!   combinatorial exclusion search yielding progressively less optimal
//!   alternatives until the space is exhausted
//!
//! A [`MatrixSolver`] is built per batch and must be discarded when the
//! underlying offer books change.

mod error;
mod matrix;
mod ranking;
mod solver;

pub use error::{Error, Result};
pub use matrix::{Column, CostMatrix};
pub use solver::{MatrixSolver, Viability};
