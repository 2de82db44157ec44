use vrptw_structs::{Instance, Route, Solution};

pub mod bnb;
pub mod colgen;
#[cfg(all(test, feature = "highs"))]
mod colgen_tests;
pub mod config;
pub mod error;
pub mod extsolvers;
pub mod label;
pub mod pricing;
pub mod shortest_path;

pub use config::SolverConfig;
pub use error::PlannerError;
pub use pricing::PricingMode;

/// A route produced by pricing, with its travel cost and its reduced cost
/// under the duals it was priced with.
#[derive(Debug, Clone)]
pub struct VehicleSolution {
    pub cost: f64,
    pub cost_including_shadow_price: f64,
    pub path: Vec<usize>,
}

impl VehicleSolution {
    pub fn to_route(&self) -> Route {
        Route {
            path: self.path.clone(),
            cost: self.cost,
        }
    }
}

/// Column generation over the whole instance, followed by vehicle-count
/// branch-and-bound when enabled in `config`.
#[cfg(feature = "highs")]
pub fn solve(instance: &Instance, config: &SolverConfig) -> Result<Solution, PlannerError> {
    use extsolvers::highs::HighsSolverInstance;

    if config.branching.enabled {
        let outcome = bnb::solve::<HighsSolverInstance>(instance, config)?;
        outcome
            .best
            .map(|best| best.to_solution(instance))
            .ok_or_else(|| PlannerError::MasterSolverFailure {
                stage: "branch-and-bound".to_string(),
                diagnosis: "infeasible: no node has an integral vehicle count".to_string(),
            })
    } else {
        let mut colgen = colgen::ColumnGeneration::<HighsSolverInstance>::new(instance, config)?;
        let solution = colgen.run(colgen::VehicleBounds::root(instance))?;
        Ok(solution.to_solution(instance))
    }
}
