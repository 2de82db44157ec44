use std::collections::HashSet;
use std::fmt;

use log::{debug, info, warn};
use vrptw_structs::{Instance, Route, Solution, SolutionRoute};

use crate::{
    config::SolverConfig,
    error::PlannerError,
    extsolvers::{LPSolver, LpError},
    pricing::{Duals, Pricer},
};

/// Tolerance for integrality of primal values and for detecting artificial
/// columns left in a converged master.
pub const INT_TOL: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColgenState {
    Init,
    SolveMaster,
    Price,
    Converged,
    Failed,
}

/// Bounds on the number of vehicles, i.e. on the sum of route variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleBounds {
    pub lower: f64,
    pub upper: f64,
}

impl VehicleBounds {
    /// No bound beyond the fleet size. A fleet size of zero means unlimited.
    pub fn root(instance: &Instance) -> Self {
        let upper = if instance.max_vehicles == 0 {
            f64::INFINITY
        } else {
            instance.max_vehicles as f64
        };
        VehicleBounds { lower: 0.0, upper }
    }

    pub fn with_upper(self, upper: f64) -> Self {
        VehicleBounds {
            upper: self.upper.min(upper),
            ..self
        }
    }

    pub fn with_lower(self, lower: f64) -> Self {
        VehicleBounds {
            lower: self.lower.max(lower),
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lower > self.upper + INT_TOL
    }
}

impl fmt::Display for VehicleBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// Restricted master LP: a covering row per customer and one vehicle row.
/// The first columns are artificial, one per customer row, so the LP stays
/// feasible under any vehicle bounds.
pub struct RestrictedMaster<LP> {
    lp: LP,
    customer_rows: Vec<u32>,
    vehicle_row: u32,
    num_artificials: usize,
    columns: Vec<Route>,
    known: HashSet<Vec<usize>>,
    idxs_buf: Vec<i32>,
    coeffs_buf: Vec<f64>,
}

fn lp_failure(stage: &str, err: LpError) -> PlannerError {
    PlannerError::MasterSolverFailure {
        stage: stage.to_string(),
        diagnosis: err.to_string(),
    }
}

impl<LP: LPSolver> RestrictedMaster<LP> {
    pub fn new(instance: &Instance, artificial_cost: f64, bounds: VehicleBounds) -> Result<Self, PlannerError> {
        let mut lp = LP::new();
        let inf = lp.inf();
        let building = |err| lp_failure("building the restricted master", err);

        // Row index by node; the depot entry is never read.
        let mut customer_rows = vec![u32::MAX; instance.num_nodes()];
        for c in instance.customers() {
            customer_rows[c] = lp.add_empty_constr(1.0, inf).map_err(building)?;
        }
        let vehicle_row = lp
            .add_empty_constr(bounds.lower, bounds.upper.min(inf))
            .map_err(building)?;

        for c in instance.customers() {
            lp.add_column(artificial_cost, &[customer_rows[c] as i32], &[1.0])
                .map_err(building)?;
        }

        Ok(RestrictedMaster {
            lp,
            customer_rows,
            vehicle_row,
            num_artificials: instance.num_customers(),
            columns: Vec::new(),
            known: HashSet::new(),
            idxs_buf: Vec::new(),
            coeffs_buf: Vec::new(),
        })
    }

    /// Adds `route` as a column unless an identical path is already present.
    /// Returns whether it was added.
    pub fn add_route(&mut self, route: Route) -> Result<bool, PlannerError> {
        if self.known.contains(&route.path) {
            return Ok(false);
        }
        create_column(
            &mut self.idxs_buf,
            &mut self.coeffs_buf,
            &self.customer_rows,
            self.vehicle_row,
            &route.path,
        );
        let col_idx = self
            .lp
            .add_column(route.cost, &self.idxs_buf, &self.coeffs_buf)
            .map_err(|err| lp_failure(&format!("adding column {:?}", route.path), err))?;
        let expected = self.num_artificials + self.columns.len();
        if col_idx as usize != expected {
            return Err(PlannerError::Invariant(format!(
                "route column got index {}, expected {}",
                col_idx, expected
            )));
        }
        self.known.insert(route.path.clone());
        self.columns.push(route);
        Ok(true)
    }

    pub fn set_vehicle_bounds(&mut self, bounds: VehicleBounds) -> Result<(), PlannerError> {
        let upper = bounds.upper.min(self.lp.inf());
        self.lp
            .set_constr_bounds(self.vehicle_row, bounds.lower, upper)
            .map_err(|err| lp_failure(&format!("setting vehicles to {}", bounds), err))
    }

    pub fn solve(&mut self) -> Result<f64, LpError> {
        self.lp.optimize()
    }

    pub fn duals(&self) -> Duals {
        let y = self.lp.duals();
        let customer = self
            .customer_rows
            .iter()
            .map(|row| if *row == u32::MAX { 0.0 } else { y[*row as usize] })
            .collect();
        Duals {
            customer,
            vehicle: y[self.vehicle_row as usize],
        }
    }

    /// Primal values of the artificial columns and of the route columns.
    pub fn primal(&self) -> (Vec<f64>, Vec<f64>) {
        let mut x = self.lp.primal();
        let routes = x.split_off(self.num_artificials.min(x.len()));
        (x, routes)
    }

    pub fn columns(&self) -> &[Route] {
        &self.columns
    }

    pub fn write_model(&mut self, path: &str) -> Result<(), PlannerError> {
        self.lp
            .write_model(path)
            .map_err(|err| lp_failure(&format!("writing the model to {}", path), err))
    }
}

/// Coefficients of a route column: its visit count on each customer row and
/// one on the vehicle row.
fn create_column(
    idxs_buf: &mut Vec<i32>,
    coeffs_buf: &mut Vec<f64>,
    customer_rows: &[u32],
    vehicle_row: u32,
    path: &[usize],
) {
    idxs_buf.clear();
    coeffs_buf.clear();

    let mut sorted = path.to_vec();
    sorted.sort_unstable();
    for c in sorted {
        let row = customer_rows[c] as i32;
        if idxs_buf.last() == Some(&row) {
            if let Some(coeff) = coeffs_buf.last_mut() {
                *coeff += 1.0;
            }
        } else {
            idxs_buf.push(row);
            coeffs_buf.push(1.0);
        }
    }

    idxs_buf.push(vehicle_row as i32);
    coeffs_buf.push(1.0);
}

#[derive(Debug, Clone)]
pub struct ColgenSolution {
    pub objective: f64,
    /// Sum of the route variables.
    pub vehicles: f64,
    /// Routes with a non-zero value in the converged master.
    pub routes: Vec<SolutionRoute>,
    pub bounds: VehicleBounds,
    pub iterations: usize,
    pub columns: usize,
}

impl ColgenSolution {
    pub fn is_vehicle_integral(&self) -> bool {
        (self.vehicles - self.vehicles.round()).abs() <= INT_TOL
    }

    pub fn to_solution(&self, instance: &Instance) -> Solution {
        Solution {
            instance: instance.name.clone(),
            objective: self.objective,
            vehicles: self.vehicles,
            routes: self.routes.clone(),
        }
    }
}

/// Penalty of an artificial cover column: well above the cost of serving
/// every customer with its own vehicle.
fn default_artificial_cost(instance: &Instance) -> f64 {
    let singles: f64 = instance.customers().map(|c| instance.route_cost(&[c])).sum();
    100.0 * (singles + 1.0)
}

pub struct ColumnGeneration<'a, LP> {
    instance: &'a Instance,
    config: &'a SolverConfig,
    pricer: Pricer<'a>,
    master: RestrictedMaster<LP>,
    state: ColgenState,
    seed: Vec<Route>,
    seeded: bool,
}

impl<'a, LP: LPSolver> ColumnGeneration<'a, LP> {
    /// Validates the instance; infeasible instances are rejected before any
    /// LP is solved.
    pub fn new(instance: &'a Instance, config: &'a SolverConfig) -> Result<Self, PlannerError> {
        Self::with_columns(instance, config, &[])
    }

    /// Like [`ColumnGeneration::new`], seeding the master with `columns` in
    /// addition to the single-customer routes.
    pub fn with_columns(
        instance: &'a Instance,
        config: &'a SolverConfig,
        columns: &[Route],
    ) -> Result<Self, PlannerError> {
        instance.validate()?;
        let artificial_cost = config
            .colgen
            .artificial_cost
            .unwrap_or_else(|| default_artificial_cost(instance));
        Ok(ColumnGeneration {
            instance,
            config,
            pricer: Pricer::new(instance, &config.pricing),
            master: RestrictedMaster::new(instance, artificial_cost, VehicleBounds::root(instance))?,
            state: ColgenState::Init,
            seed: columns.to_vec(),
            seeded: false,
        })
    }

    pub fn state(&self) -> ColgenState {
        self.state
    }

    pub fn columns(&self) -> &[Route] {
        self.master.columns()
    }

    /// Writes the current restricted master in a format chosen by the
    /// solver from the file extension.
    pub fn write_master(&mut self, path: &str) -> Result<(), PlannerError> {
        self.master.write_model(path)
    }

    fn transition(&mut self, next: ColgenState) {
        debug!("Column generation {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: PlannerError) -> Result<ColgenSolution, PlannerError> {
        self.transition(ColgenState::Failed);
        Err(err)
    }

    /// Runs column generation to convergence with the vehicle count
    /// restricted to `bounds`. Columns from earlier runs are kept.
    pub fn run(&mut self, bounds: VehicleBounds) -> Result<ColgenSolution, PlannerError> {
        #[cfg(feature = "prof")]
        let _p = hprof::enter("colgen run");

        self.state = ColgenState::Init;
        let max_iterations = self.config.colgen.max_iterations;
        let mut iterations = 0;
        let mut objective = f64::NAN;
        let mut duals = Duals::zero(self.instance.num_nodes());

        loop {
            match self.state {
                ColgenState::Init => {
                    if !self.seeded {
                        let singles = self.instance.customers().map(|c| Route::new(self.instance, vec![c]));
                        let seed = std::mem::take(&mut self.seed);
                        for route in singles.chain(seed) {
                            if let Err(err) = self.master.add_route(route) {
                                return self.fail(err);
                            }
                        }
                        self.seeded = true;
                    }
                    if let Err(err) = self.master.set_vehicle_bounds(bounds) {
                        return self.fail(err);
                    }
                    self.transition(ColgenState::SolveMaster);
                }
                ColgenState::SolveMaster => {
                    iterations += 1;
                    if iterations > max_iterations {
                        return self.fail(PlannerError::IterationLimit(max_iterations));
                    }
                    match self.master.solve() {
                        Ok(value) => {
                            objective = value;
                            duals = self.master.duals();
                            info!(
                                "Iteration {:>4}  objective {:.4}  columns {}",
                                iterations,
                                objective,
                                self.master.columns().len()
                            );
                            self.transition(ColgenState::Price);
                        }
                        Err(err) => {
                            return self.fail(PlannerError::MasterSolverFailure {
                                stage: format!(
                                    "solving the restricted master at iteration {} with vehicles in {}",
                                    iterations, bounds
                                ),
                                diagnosis: err.to_string(),
                            });
                        }
                    }
                }
                ColgenState::Price => {
                    let outcome = match self.pricer.price(&duals) {
                        Ok(outcome) => outcome,
                        Err(err) => return self.fail(err),
                    };
                    let found = outcome.routes.len();
                    let mut added = 0;
                    for column in outcome.routes.iter() {
                        match self.master.add_route(column.to_route()) {
                            Ok(true) => added += 1,
                            Ok(false) => {}
                            Err(err) => return self.fail(err),
                        }
                    }

                    if found > added {
                        // Only possible when the LP duals are slightly off.
                        warn!(
                            "{} of {} priced columns were already in the master",
                            found - added,
                            found
                        );
                    }
                    if added == 0 {
                        self.transition(ColgenState::Converged);
                    } else {
                        self.transition(ColgenState::SolveMaster);
                    }
                }
                ColgenState::Converged => return self.finish(objective, iterations, bounds),
                ColgenState::Failed => {
                    return Err(PlannerError::Invariant(
                        "column generation continued from the failed state".to_string(),
                    ))
                }
            }
        }
    }

    fn finish(
        &mut self,
        objective: f64,
        iterations: usize,
        bounds: VehicleBounds,
    ) -> Result<ColgenSolution, PlannerError> {
        let (artificials, values) = self.master.primal();
        let uncovered = artificials
            .iter()
            .enumerate()
            .filter(|(_, x)| **x > INT_TOL)
            .map(|(i, _)| i + 1)
            .collect::<Vec<_>>();
        if !uncovered.is_empty() {
            return self.fail(PlannerError::MasterSolverFailure {
                stage: format!("converging with vehicles in {}", bounds),
                diagnosis: format!("infeasible: customers {:?} remain uncovered", uncovered),
            });
        }

        let vehicles = values.iter().sum::<f64>();
        let routes = self
            .master
            .columns()
            .iter()
            .zip(values.iter())
            .filter(|(_, x)| **x > INT_TOL)
            .map(|(route, x)| SolutionRoute {
                value: *x,
                route: route.clone(),
            })
            .collect::<Vec<_>>();

        info!(
            "Converged after {} iterations: objective {:.4}, {:.3} vehicles, {} columns",
            iterations,
            objective,
            vehicles,
            self.master.columns().len()
        );
        Ok(ColgenSolution {
            objective,
            vehicles,
            routes,
            bounds,
            iterations,
            columns: self.master.columns().len(),
        })
    }
}
