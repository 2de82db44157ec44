#[cfg(feature = "highs")]
pub mod highs;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LpError {
    #[error("LP is infeasible")]
    Infeasible,
    #[error("LP is unbounded")]
    Unbounded,
    #[error("LP solver stopped with status {0}")]
    Status(String),
    #[error("{call} returned status {status}")]
    Call { call: &'static str, status: i32 },
    #[error("invalid file name {0:?}")]
    InvalidPath(String),
}

/// Minimal column-oriented LP interface used by the restricted master.
/// Rows are created empty and filled by the columns added later.
pub trait LPSolver {
    fn new() -> Self;
    fn add_empty_constr(&mut self, lb: f64, ub: f64) -> Result<u32, LpError>;
    fn set_constr_bounds(&mut self, row: u32, lb: f64, ub: f64) -> Result<(), LpError>;
    fn add_column(&mut self, cost: f64, idxs: &[i32], coeffs: &[f64]) -> Result<u32, LpError>;
    /// Solves the LP and returns the objective value.
    fn optimize(&mut self) -> Result<f64, LpError>;
    fn primal(&self) -> Vec<f64>;
    /// Row duals, following the convention `reduced cost = c - a^T y`.
    fn duals(&self) -> Vec<f64>;
    fn inf(&self) -> f64;
    fn num_cols(&self) -> usize;
    fn num_rows(&self) -> usize;
    fn write_model(&mut self, path: &str) -> Result<(), LpError>;
}
