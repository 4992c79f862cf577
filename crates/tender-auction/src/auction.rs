//! One auction over one task batch
//!
//! An auction is a node in the allocation tree: it prices a batch against a
//! pool's available groupings, defers the allocation decision to the matrix
//! solver, and can be re-called for the next-best branch after its outcome
//! is unwound. The auction keeps no memory beyond its solver; re-auctioning
//! a batch on a different branch means building a fresh auction.

use crate::error::Result;
use crate::outcome::AuctionOutcome;
use serde::{Deserialize, Serialize};
use tender_core::{AuctionId, AuctionModel, Market, PoolId, TaskBatch, TaskId};
use tender_solver::{MatrixSolver, Viability};

/// Lifecycle of an auction node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionState {
    Initialised,
    ReadyToCall,
    /// A full assignment set was confirmed
    Success,
    /// Not enough groupings, an unreachable task, or an exhausted solver
    Failure,
    /// The allocation tree has no further branch to explore
    TreeFailure,
    /// The batch held no tasks to sell
    CompleteNull,
}

/// A single allocation auction, re-callable for alternative branches
#[derive(Debug)]
pub struct Auction {
    id: AuctionId,
    pool: PoolId,
    owns_pool: bool,
    task_size: u32,
    batch: TaskBatch,
    solver: Option<MatrixSolver>,
    outcome: Option<AuctionOutcome>,
    state: AuctionState,
}

impl Auction {
    /// The batch may have been auctioned before on another branch, so all
    /// of its offer books are reset here.
    pub fn new(
        market: &mut Market,
        id: AuctionId,
        pool: PoolId,
        owns_pool: bool,
        batch: TaskBatch,
    ) -> Result<Self> {
        for task in batch.tasks() {
            market.task_mut(*task)?.reset_offers();
        }
        Ok(Self {
            id,
            pool,
            owns_pool,
            task_size: batch.task_size(),
            batch,
            solver: None,
            outcome: None,
            state: AuctionState::Initialised,
        })
    }

    pub fn id(&self) -> AuctionId {
        self.id
    }

    pub fn pool(&self) -> PoolId {
        self.pool
    }

    /// Whether this auction's pool was minted for it (a proxy pool) and can
    /// be retired with it
    pub fn owns_pool(&self) -> bool {
        self.owns_pool
    }

    pub fn state(&self) -> AuctionState {
        self.state
    }

    pub fn batch(&self) -> &TaskBatch {
        &self.batch
    }

    pub fn outcome(&self) -> Option<&AuctionOutcome> {
        self.outcome.as_ref()
    }

    /// Check the batch can be sold at all: there are tasks to sell, and at
    /// least as many available groupings of the right size as tasks
    pub fn validate(&mut self, market: &Market) -> Result<AuctionState> {
        let available = market.available_groupings(self.pool, self.task_size)?.len();
        if self.batch.batch_size() == 0 {
            self.state = AuctionState::CompleteNull;
        } else if self.batch.batch_size() > available {
            self.state = AuctionState::Failure;
        } else {
            self.state = AuctionState::ReadyToCall;
        }
        Ok(self.state)
    }

    /// Run (or re-run) the auction. Entry tokens are flagged live for the
    /// duration of the call so models can tell auction pricing from
    /// speculative pricing.
    pub fn call(&mut self, market: &mut Market, model: &impl AuctionModel) -> Result<AuctionState> {
        if matches!(self.state, AuctionState::Failure | AuctionState::CompleteNull) {
            return Ok(self.state);
        }

        self.set_tokens_live(market, true)?;

        if self.solver.is_none() {
            self.init_solver(market, model)?;
            if self.state == AuctionState::Failure {
                self.set_tokens_live(market, false)?;
                return Ok(self.state);
            }
        }

        let attempt = match self.solver.as_mut() {
            Some(solver) => solver.apply_algorithm(market)?,
            None => false,
        };

        if attempt {
            let assignments = self
                .solver
                .as_ref()
                .map(|solver| solver.assigned_tasks().clone())
                .unwrap_or_default();
            if assignments.len() == self.batch.batch_size() {
                self.state = AuctionState::Success;
                self.batch.set_outcome(assignments.clone());
                self.outcome = Some(AuctionOutcome::new(assignments));
            } else {
                self.state = AuctionState::Failure;
            }
        } else {
            self.state = AuctionState::Failure;
        }

        self.set_tokens_live(market, false)?;
        Ok(self.state)
    }

    /// Discard the current outcome and ask the solver for the next-best
    /// branch. Fails permanently when the solver cannot iterate.
    pub fn find_alternative(
        &mut self,
        market: &mut Market,
        model: &impl AuctionModel,
    ) -> Result<AuctionState> {
        self.outcome = None;
        self.batch.clear_outcome();
        self.state = AuctionState::ReadyToCall;
        match self.solver.as_ref().map(MatrixSolver::viability) {
            Some(Viability::Live) => {
                self.call(market, model)?;
            }
            Some(Viability::AllTasksPreassigned) => {
                // A fully pre-assigned batch has exactly one solution.
                self.state = AuctionState::Failure;
            }
            _ => {}
        }
        Ok(self.state)
    }

    fn init_solver(&mut self, market: &mut Market, model: &impl AuctionModel) -> Result<()> {
        let groupings = market.available_groupings(self.pool, self.task_size)?;
        let tasks: Vec<TaskId> = self.batch.tasks().iter().copied().collect();
        let solver = MatrixSolver::new(market, model, groupings, tasks)?;
        if matches!(
            solver.viability(),
            Viability::UnreachableColumn | Viability::Corrupt
        ) {
            self.state = AuctionState::Failure;
        }
        self.solver = Some(solver);
        Ok(())
    }

    fn set_tokens_live(&self, market: &mut Market, live: bool) -> Result<()> {
        for task in self.batch.tasks() {
            market.set_task_auction_live(*task, live)?;
        }
        Ok(())
    }
}
