use serde::{Deserialize, Serialize};

use crate::problem::Instance;

/// A vehicle route: the customers visited between leaving and returning to
/// the depot. The depot itself is not part of `path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub path: Vec<usize>,
    pub cost: f64,
}

impl Route {
    pub fn new(instance: &Instance, path: Vec<usize>) -> Self {
        let cost = instance.route_cost(&path);
        Route { path, cost }
    }

    /// Number of times `customer` is visited. Above one only for routes
    /// produced by relaxed pricing.
    pub fn visits(&self, customer: usize) -> usize {
        self.path.iter().filter(|c| **c == customer).count()
    }

    pub fn is_elementary(&self) -> bool {
        let mut seen = self.path.clone();
        seen.sort_unstable();
        seen.windows(2).all(|w| w[0] != w[1])
    }

    pub fn load(&self, instance: &Instance) -> f64 {
        self.path.iter().map(|c| instance.nodes[*c].demand).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionRoute {
    /// Value of the route variable in the master LP.
    pub value: f64,
    pub route: Route,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub instance: String,
    pub objective: f64,
    pub vehicles: f64,
    pub routes: Vec<SolutionRoute>,
}

impl Solution {
    pub fn is_integral(&self, tol: f64) -> bool {
        self.routes
            .iter()
            .all(|r| (r.value - r.value.round()).abs() <= tol)
    }
}
