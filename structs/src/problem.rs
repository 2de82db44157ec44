use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Point;

/// Slack used when comparing times and loads read from instance files.
pub const FEAS_TOL: f64 = 1e-9;

/// A customer or the depot. Node index 0 of an [`Instance`] is the depot,
/// whose time window is the planning horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: usize,
    pub pos: Point,
    pub demand: f64,
    pub ready: f64,
    pub due: f64,
    pub service: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub capacity: f64,
    pub max_vehicles: usize,
    pub nodes: Vec<Node>,
    /// Arc travel cost, `cost[i][j]` for the arc i -> j.
    #[serde(default)]
    pub cost: Vec<Vec<f64>>,
    /// Arc travel time, `time[i][j]` for the arc i -> j.
    #[serde(default)]
    pub time: Vec<Vec<f64>>,
}

#[derive(Debug, Error, PartialEq)]
pub enum InstanceError {
    #[error("instance has no depot")]
    Empty,
    #[error("{matrix} matrix is not {expected}x{expected}")]
    MatrixShape { matrix: &'static str, expected: usize },
    #[error("node {node} has negative demand {demand}")]
    NegativeDemand { node: usize, demand: f64 },
    #[error("node {node} has an inverted time window [{ready}, {due}]")]
    InvertedWindow { node: usize, ready: f64, due: f64 },
    #[error("customer {node} demands {demand}, vehicle capacity is {capacity}")]
    DemandExceedsCapacity { node: usize, demand: f64, capacity: f64 },
    #[error("customer {node} cannot be served by any route within the time windows")]
    UnreachableCustomer { node: usize },
}

impl Instance {
    /// Builds an instance whose travel costs and times are the Euclidean
    /// distances between node positions.
    pub fn euclidean(name: &str, capacity: f64, max_vehicles: usize, nodes: Vec<Node>) -> Self {
        let mut instance = Self::with_matrices(name, capacity, max_vehicles, nodes, Vec::new(), Vec::new());
        instance.ensure_matrices();
        instance
    }

    /// Builds an instance with explicit `n x n` cost and time matrices.
    pub fn with_matrices(
        name: &str,
        capacity: f64,
        max_vehicles: usize,
        nodes: Vec<Node>,
        cost: Vec<Vec<f64>>,
        time: Vec<Vec<f64>>,
    ) -> Self {
        Instance {
            name: name.to_string(),
            capacity,
            max_vehicles,
            nodes,
            cost,
            time,
        }
    }

    /// Fills in Euclidean matrices when the instance was read without them.
    pub fn ensure_matrices(&mut self) {
        if self.cost.is_empty() {
            self.cost = self
                .nodes
                .iter()
                .map(|a| self.nodes.iter().map(|b| a.pos.dist(&b.pos)).collect())
                .collect();
        }
        if self.time.is_empty() {
            self.time = self.cost.clone();
        }
    }

    /// Truncates every arc cost and time to one decimal, the convention used
    /// by most published VRPTW results on Solomon instances.
    pub fn with_rounding(mut self) -> Self {
        let truncate = |m: &mut Vec<Vec<f64>>| {
            for row in m.iter_mut() {
                for x in row.iter_mut() {
                    *x = (*x * 10.0).floor() / 10.0;
                }
            }
        };
        truncate(&mut self.cost);
        truncate(&mut self.time);
        self
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_customers(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn customers(&self) -> impl Iterator<Item = usize> {
        1..self.nodes.len()
    }

    pub fn depot(&self) -> &Node {
        &self.nodes[0]
    }

    /// Start of service at `to` when leaving `from` after starting service
    /// there at `start`, or `None` when the window of `to` is missed.
    pub fn arrival(&self, from: usize, start: f64, to: usize) -> Option<f64> {
        let arrival = start + self.nodes[from].service + self.time[from][to];
        let node = &self.nodes[to];
        let t = arrival.max(node.ready);
        (t <= node.due + FEAS_TOL).then_some(t)
    }

    /// Travel cost of the route `depot -> path -> depot`.
    pub fn route_cost(&self, path: &[usize]) -> f64 {
        let mut prev = 0;
        let mut cost = 0.0;
        for &n in path.iter().chain(std::iter::once(&0)) {
            cost += self.cost[prev][n];
            prev = n;
        }
        cost
    }

    /// Checks load and time windows along `depot -> path -> depot`.
    pub fn route_is_feasible(&self, path: &[usize]) -> bool {
        let load: f64 = path.iter().map(|n| self.nodes[*n].demand).sum();
        if load > self.capacity + FEAS_TOL {
            return false;
        }

        let mut prev = 0;
        let mut t = self.depot().ready;
        for &n in path.iter().chain(std::iter::once(&0)) {
            match self.arrival(prev, t, n) {
                Some(next) => t = next,
                None => return false,
            }
            prev = n;
        }
        true
    }

    /// Whether `time[i][k] <= time[i][j] + service[j] + time[j][k]` for all
    /// triples. When it holds, a customer missed directly from some node
    /// cannot be reached through a detour either.
    pub fn time_triangle_holds(&self) -> bool {
        let n = self.nodes.len();
        (0..n).all(|i| {
            (0..n).all(|j| {
                (0..n).all(|k| {
                    self.time[i][k]
                        <= self.time[i][j] + self.nodes[j].service + self.time[j][k] + FEAS_TOL
                })
            })
        })
    }

    pub fn validate(&self) -> Result<(), InstanceError> {
        let n = self.nodes.len();
        if n == 0 {
            return Err(InstanceError::Empty);
        }
        for (matrix, m) in [("cost", &self.cost), ("time", &self.time)] {
            if m.len() != n || m.iter().any(|row| row.len() != n) {
                return Err(InstanceError::MatrixShape { matrix, expected: n });
            }
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            if node.demand < 0.0 {
                return Err(InstanceError::NegativeDemand {
                    node: idx,
                    demand: node.demand,
                });
            }
            if node.ready > node.due {
                return Err(InstanceError::InvertedWindow {
                    node: idx,
                    ready: node.ready,
                    due: node.due,
                });
            }
        }

        for c in self.customers() {
            let demand = self.nodes[c].demand;
            if demand > self.capacity + FEAS_TOL {
                return Err(InstanceError::DemandExceedsCapacity {
                    node: c,
                    demand,
                    capacity: self.capacity,
                });
            }
            if !self.route_is_feasible(&[c]) {
                return Err(InstanceError::UnreachableCustomer { node: c });
            }
        }
        Ok(())
    }
}
