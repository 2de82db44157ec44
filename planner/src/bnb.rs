use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use ordered_float::OrderedFloat;
use parking_lot::Mutex;
use vrptw_structs::{Instance, Route};

use crate::{
    colgen::{ColgenSolution, ColumnGeneration, VehicleBounds},
    config::SolverConfig,
    error::PlannerError,
    extsolvers::LPSolver,
};

/// Nodes whose LP objective is within this of the incumbent are pruned.
const PRUNE_TOL: f64 = 1e-6;

/// Best integral objective found so far, shared between workers.
#[derive(Debug)]
pub struct Incumbent(AtomicU64);

impl Default for Incumbent {
    fn default() -> Self {
        Incumbent(AtomicU64::new(f64::INFINITY.to_bits()))
    }
}

impl Incumbent {
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Stores `value` if it is strictly better than the current one.
    pub fn try_improve(&self, value: f64) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if value >= f64::from_bits(current) {
                return false;
            }
            match self
                .0
                .compare_exchange_weak(current, value.to_bits(), Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn prunes(&self, objective: f64) -> bool {
        objective >= self.get() - PRUNE_TOL
    }
}

#[derive(Debug)]
pub struct BranchOutcome {
    /// Best solution with an integral vehicle count, `None` if no node had one.
    pub best: Option<ColgenSolution>,
    pub root_objective: f64,
    pub nodes_explored: usize,
    pub nodes_pruned: usize,
}

/// The two children of a node with a fractional vehicle count.
fn branches(solution: &ColgenSolution) -> [VehicleBounds; 2] {
    let v = solution.vehicles;
    [
        solution.bounds.with_upper(v.floor()),
        solution.bounds.with_lower(v.ceil()),
    ]
}

/// Vehicle-count branch-and-bound, sequential or on a thread pool depending
/// on `config.branching.threads`.
pub fn solve<LP: LPSolver + 'static>(
    instance: &Instance,
    config: &SolverConfig,
) -> Result<BranchOutcome, PlannerError> {
    if config.branching.threads > 1 {
        branch_and_bound_parallel::<LP>(instance, config, config.branching.threads)
    } else {
        branch_and_bound::<LP>(instance, config)
    }
}

struct OpenNode {
    solution: ColgenSolution,
    seq: usize,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    // Reversed so the max-heap pops the lowest objective, oldest first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        OrderedFloat(other.solution.objective)
            .cmp(&OrderedFloat(self.solution.objective))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Best-first search on a single master whose vehicle row bounds are changed
/// per node. Columns found at any node stay in the master.
pub fn branch_and_bound<LP: LPSolver>(
    instance: &Instance,
    config: &SolverConfig,
) -> Result<BranchOutcome, PlannerError> {
    #[cfg(feature = "prof")]
    let _p = hprof::enter("branch and bound");

    let mut colgen = ColumnGeneration::<LP>::new(instance, config)?;
    let root = colgen.run(VehicleBounds::root(instance))?;
    let root_objective = root.objective;
    info!("Root LP objective {:.4} with {:.4} vehicles", root.objective, root.vehicles);

    let incumbent = Incumbent::default();
    let mut best: Option<ColgenSolution> = None;
    let mut open = BinaryHeap::new();
    let mut seq = 0;
    let mut nodes_explored = 1;
    let mut nodes_pruned = 0;
    open.push(OpenNode { solution: root, seq });

    while let Some(OpenNode { solution, .. }) = open.pop() {
        if solution.is_vehicle_integral() {
            if incumbent.try_improve(solution.objective) {
                info!(
                    "New incumbent {:.4} with {} vehicles",
                    solution.objective,
                    solution.vehicles.round()
                );
                best = Some(solution);
            }
            continue;
        }

        if incumbent.prunes(solution.objective) {
            debug!(
                "Pruned node {} with objective {:.4} (incumbent {:.4})",
                solution.bounds,
                solution.objective,
                incumbent.get()
            );
            nodes_pruned += 1;
            continue;
        }

        info!(
            "Branching on {:.4} vehicles at node {} (objective {:.4})",
            solution.vehicles, solution.bounds, solution.objective
        );
        for child in branches(&solution) {
            nodes_explored += 1;
            if child.is_empty() {
                nodes_pruned += 1;
                continue;
            }
            match colgen.run(child) {
                Ok(child_solution) => {
                    seq += 1;
                    open.push(OpenNode {
                        solution: child_solution,
                        seq,
                    });
                }
                Err(err) if err.is_node_local() => {
                    info!("Node {} is infeasible: {}", child, err);
                    nodes_pruned += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    Ok(BranchOutcome {
        best,
        root_objective,
        nodes_explored,
        nodes_pruned,
    })
}

struct SharedSearch<'a> {
    instance: &'a Instance,
    config: &'a SolverConfig,
    incumbent: Incumbent,
    best: Mutex<Option<ColgenSolution>>,
    error: Mutex<Option<PlannerError>>,
    explored: AtomicUsize,
    pruned: AtomicUsize,
}

impl SharedSearch<'_> {
    fn record(&self, solution: ColgenSolution) {
        if !self.incumbent.try_improve(solution.objective) {
            return;
        }
        info!(
            "New incumbent {:.4} with {} vehicles",
            solution.objective,
            solution.vehicles.round()
        );
        let mut best = self.best.lock();
        if best.as_ref().map_or(true, |b| solution.objective < b.objective) {
            *best = Some(solution);
        }
    }

    fn prune(&self) {
        self.pruned.fetch_add(1, Ordering::Relaxed);
    }
}

/// Explores nodes concurrently. Each node builds its own master from the
/// columns of its parent; only the incumbent and the best solution are
/// shared.
pub fn branch_and_bound_parallel<LP: LPSolver + 'static>(
    instance: &Instance,
    config: &SolverConfig,
    threads: usize,
) -> Result<BranchOutcome, PlannerError> {
    #[cfg(feature = "prof")]
    let _p = hprof::enter("branch and bound");

    let mut colgen = ColumnGeneration::<LP>::new(instance, config)?;
    let root = colgen.run(VehicleBounds::root(instance))?;
    let root_objective = root.objective;
    info!("Root LP objective {:.4} with {:.4} vehicles", root.objective, root.vehicles);
    let columns = Arc::new(colgen.columns().to_vec());
    drop(colgen);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| PlannerError::Invariant(format!("could not start {} worker threads: {}", threads, e)))?;

    let shared = SharedSearch {
        instance,
        config,
        incumbent: Incumbent::default(),
        best: Mutex::new(None),
        error: Mutex::new(None),
        explored: AtomicUsize::new(1),
        pruned: AtomicUsize::new(0),
    };
    pool.scope(|scope| expand::<LP>(scope, &shared, root, columns));

    if let Some(err) = shared.error.into_inner() {
        return Err(err);
    }
    Ok(BranchOutcome {
        best: shared.best.into_inner(),
        root_objective,
        nodes_explored: shared.explored.into_inner(),
        nodes_pruned: shared.pruned.into_inner(),
    })
}

fn expand<'s, LP: LPSolver + 'static>(
    scope: &rayon::Scope<'s>,
    shared: &'s SharedSearch<'s>,
    solution: ColgenSolution,
    columns: Arc<Vec<Route>>,
) {
    if solution.is_vehicle_integral() {
        shared.record(solution);
        return;
    }
    if shared.incumbent.prunes(solution.objective) {
        shared.prune();
        return;
    }

    debug!(
        "Branching on {:.4} vehicles at node {} (objective {:.4})",
        solution.vehicles, solution.bounds, solution.objective
    );
    let parent_objective = solution.objective;
    for child in branches(&solution) {
        let columns = Arc::clone(&columns);
        scope.spawn(move |scope| {
            shared.explored.fetch_add(1, Ordering::Relaxed);
            if child.is_empty() || shared.incumbent.prunes(parent_objective) {
                shared.prune();
                return;
            }
            if shared.error.lock().is_some() {
                return;
            }

            let result = ColumnGeneration::<LP>::with_columns(shared.instance, shared.config, &columns)
                .and_then(|mut colgen| {
                    let solution = colgen.run(child)?;
                    Ok((solution, Arc::new(colgen.columns().to_vec())))
                });
            match result {
                Ok((child_solution, child_columns)) => {
                    expand::<LP>(scope, shared, child_solution, child_columns)
                }
                Err(err) if err.is_node_local() => {
                    info!("Node {} is infeasible: {}", child, err);
                    shared.prune();
                }
                Err(err) => {
                    warn!("Aborting branch-and-bound at node {}: {}", child, err);
                    let mut slot = shared.error.lock();
                    if slot.is_none() {
                        *slot = Some(err);
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_incumbent_only_improves() {
        let inc = Incumbent::default();
        assert!(inc.get().is_infinite());
        assert!(inc.try_improve(10.0));
        assert!(!inc.try_improve(10.0));
        assert!(!inc.try_improve(11.0));
        assert!(inc.try_improve(9.5));
        assert_eq!(inc.get(), 9.5);
        assert!(inc.prunes(9.5));
        assert!(!inc.prunes(9.0));
    }

    #[test]
    fn test_incumbent_concurrent_minimum() {
        let inc = Incumbent::default();
        thread::scope(|s| {
            for t in 0..8 {
                let inc = &inc;
                s.spawn(move || {
                    for i in 0..1000 {
                        inc.try_improve((1000 * t + i) as f64 * 0.5 + 3.0);
                    }
                });
            }
        });
        assert_eq!(inc.get(), 3.0);
    }
}
