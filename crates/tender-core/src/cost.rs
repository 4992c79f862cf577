//! Task pricing
//!
//! A [`Cost`] separates additive charges from multiplicative factors so that
//! scarcity weighting can be applied after per-worker fees are summed. The
//! effective price is `sum * product`. An unreachable cost (infinite sum)
//! marks a worker or grouping that cannot perform a task at all.

use serde::{Deserialize, Serialize};

/// Price of one task for one worker or grouping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    sum: f64,
    product: f64,
}

impl Cost {
    /// A zero cost with a neutral scale factor
    pub fn new() -> Self {
        Self { sum: 0.0, product: 1.0 }
    }

    /// A cost with the given additive part and a neutral scale factor
    pub fn with_sum(sum: f64) -> Self {
        Self { sum, product: 1.0 }
    }

    /// The cost of a task that cannot be performed
    pub fn unreachable() -> Self {
        Self::with_sum(f64::INFINITY)
    }

    /// Additive part
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Multiplicative part
    pub fn product(&self) -> f64 {
        self.product
    }

    /// Add a charge to the additive part
    pub fn add(&mut self, value: f64) {
        self.sum += value;
    }

    /// Fold a factor into the multiplicative part
    pub fn scale(&mut self, factor: f64) {
        self.product *= factor;
    }

    /// Effective price: `sum * product`
    pub fn final_value(&self) -> f64 {
        self.sum * self.product
    }

    /// Whether the effective price is infinite
    pub fn is_unreachable(&self) -> bool {
        self.final_value() == f64::INFINITY
    }

    /// Clear the additive part
    pub fn reset_sum(&mut self) {
        self.sum = 0.0;
    }

    /// Clear the multiplicative part back to neutral
    pub fn reset_product(&mut self) {
        self.product = 1.0;
    }
}

impl Default for Cost {
    fn default() -> Self {
        Self::new()
    }
}
