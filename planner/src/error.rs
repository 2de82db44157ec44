use thiserror::Error;
use vrptw_structs::InstanceError;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("infeasible instance: {0}")]
    InfeasibleInstance(#[from] InstanceError),

    /// The restricted master could not be solved. Not retried: without a
    /// different formulation the solver would fail the same way.
    #[error("master LP failed while {stage}: {diagnosis}")]
    MasterSolverFailure { stage: String, diagnosis: String },

    #[error("relaxed pricing created {created} labels, exceeding the bound of {bound}")]
    PricingNonTermination { created: usize, bound: usize },

    #[error("column generation did not converge within {0} iterations")]
    IterationLimit(usize),

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl PlannerError {
    /// Failures that make a branch-and-bound node infeasible for its bounds
    /// rather than aborting the whole search.
    pub fn is_node_local(&self) -> bool {
        matches!(
            self,
            PlannerError::MasterSolverFailure { .. }
                | PlannerError::PricingNonTermination { .. }
                | PlannerError::IterationLimit(_)
        )
    }
}
