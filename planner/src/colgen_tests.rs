use vrptw_structs::{Instance, Node, Point};

use crate::{
    bnb,
    colgen::{ColgenState, ColumnGeneration, VehicleBounds},
    config::{PricingConfig, SolverConfig},
    error::PlannerError,
    extsolvers::highs::HighsSolverInstance,
    pricing::PricingMode,
};

type Colgen<'a> = ColumnGeneration<'a, HighsSolverInstance>;

fn node(id: usize, x: f64, y: f64, demand: f64) -> Node {
    Node {
        id,
        pos: Point::new(x, y),
        demand,
        ready: 0.0,
        due: 100.0,
        service: 0.0,
    }
}

fn config(mode: PricingMode) -> SolverConfig {
    SolverConfig {
        pricing: PricingConfig {
            mode,
            ..PricingConfig::default()
        },
        ..SolverConfig::default()
    }
}

/// Four customers on a line; one vehicle out to the far end and back covers
/// everything for 8.
fn line_instance() -> Instance {
    Instance::euclidean(
        "line",
        10.0,
        4,
        vec![
            node(0, 0.0, 0.0, 0.0),
            node(1, 1.0, 0.0, 1.0),
            node(2, 2.0, 0.0, 1.0),
            node(3, 3.0, 0.0, 1.0),
            node(4, 4.0, 0.0, 1.0),
        ],
    )
}

/// Three customers on a unit triangle far from the depot, capacity two. The
/// LP uses each pair route at one half: 1.5 vehicles.
fn triangle_instance() -> Instance {
    Instance::euclidean(
        "triangle",
        2.0,
        3,
        vec![
            node(0, 0.0, 0.0, 0.0),
            node(1, 10.0, 0.0, 1.0),
            node(2, 11.0, 0.0, 1.0),
            node(3, 10.5, 0.75f64.sqrt(), 1.0),
        ],
    )
}

fn triangle_lp_value() -> f64 {
    // Half of the three pair routes 22, 11 + sqrt(111) and 12 + sqrt(111).
    22.5 + 111f64.sqrt()
}

fn triangle_integral_value() -> f64 {
    // Customer 1 alone (20) plus the pair 2-3.
    32.0 + 111f64.sqrt()
}

#[test]
pub fn test_line_converges_in_every_mode() {
    let _ = env_logger::try_init();
    let inst = line_instance();
    for mode in [PricingMode::Exact, PricingMode::Dssr, PricingMode::Ssr] {
        let config = config(mode);
        let mut colgen = Colgen::new(&inst, &config).unwrap();
        assert_eq!(colgen.state(), ColgenState::Init);
        let solution = colgen.run(VehicleBounds::root(&inst)).unwrap();
        assert_eq!(colgen.state(), ColgenState::Converged);
        assert!((solution.objective - 8.0).abs() < 1e-6, "{}: {}", mode, solution.objective);
        assert!((solution.vehicles - 1.0).abs() < 1e-6);
        assert!(solution.is_vehicle_integral());
        assert!(solution.iterations >= 2);
        // Four single-customer seeds plus at least one priced route.
        assert!(solution.columns > 4);
    }
}

#[test]
pub fn test_fractional_root() {
    let _ = env_logger::try_init();
    let inst = triangle_instance();
    let config = config(PricingMode::Exact);
    let mut colgen = Colgen::new(&inst, &config).unwrap();
    let root = colgen.run(VehicleBounds::root(&inst)).unwrap();
    assert!((root.objective - triangle_lp_value()).abs() < 1e-6);
    assert!((root.vehicles - 1.5).abs() < 1e-6);
    assert!(!root.is_vehicle_integral());
    assert!(!root.to_solution(&inst).is_integral(1e-6));
    // Only pair routes are used, and each customer is covered exactly once.
    for r in root.routes.iter() {
        assert_eq!(r.route.path.len(), 2);
    }
    for c in inst.customers() {
        let cover: f64 = root
            .routes
            .iter()
            .map(|r| r.value * r.route.visits(c) as f64)
            .sum();
        assert!((cover - 1.0).abs() < 1e-6);
    }
}

#[test]
pub fn test_infeasible_bound_then_recover() {
    let _ = env_logger::try_init();
    let inst = triangle_instance();
    let config = config(PricingMode::Dssr);
    let mut colgen = Colgen::new(&inst, &config).unwrap();
    let root_bounds = VehicleBounds::root(&inst);

    // Three customers, two per vehicle: one vehicle cannot do it.
    match colgen.run(root_bounds.with_upper(1.0)) {
        Err(PlannerError::MasterSolverFailure { diagnosis, .. }) => {
            assert!(diagnosis.starts_with("infeasible"), "{}", diagnosis)
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(colgen.state(), ColgenState::Failed);

    // The same master solves again once the bound is lifted.
    let root = colgen.run(root_bounds).unwrap();
    assert_eq!(colgen.state(), ColgenState::Converged);
    assert!((root.objective - triangle_lp_value()).abs() < 1e-6);
}

#[test]
pub fn test_branching_reaches_integral_vehicle_count() {
    let _ = env_logger::try_init();
    let inst = triangle_instance();
    let config = config(PricingMode::Dssr);
    let outcome = bnb::branch_and_bound::<HighsSolverInstance>(&inst, &config).unwrap();

    assert!((outcome.root_objective - triangle_lp_value()).abs() < 1e-6);
    let best = outcome.best.unwrap();
    assert!(best.is_vehicle_integral());
    assert!((best.vehicles - 2.0).abs() < 1e-6);
    assert!(best.objective >= outcome.root_objective - 1e-9);
    assert!((best.objective - triangle_integral_value()).abs() < 1e-6);
    // Root plus its two children; the one-vehicle child is infeasible.
    assert_eq!(outcome.nodes_explored, 3);
    assert_eq!(outcome.nodes_pruned, 1);
}

#[test]
pub fn test_parallel_branching_agrees() {
    let _ = env_logger::try_init();
    let inst = triangle_instance();
    let config = config(PricingMode::Exact);
    let sequential = bnb::branch_and_bound::<HighsSolverInstance>(&inst, &config).unwrap();
    let parallel = bnb::branch_and_bound_parallel::<HighsSolverInstance>(&inst, &config, 2).unwrap();
    let (a, b) = (sequential.best.unwrap(), parallel.best.unwrap());
    assert!((a.objective - b.objective).abs() < 1e-6);
    assert!(b.is_vehicle_integral());
}

#[test]
pub fn test_integral_root_needs_no_branching() {
    let _ = env_logger::try_init();
    let inst = line_instance();
    let config = config(PricingMode::Exact);
    let outcome = bnb::branch_and_bound::<HighsSolverInstance>(&inst, &config).unwrap();
    assert_eq!(outcome.nodes_explored, 1);
    assert!((outcome.best.unwrap().objective - 8.0).abs() < 1e-6);
}

#[test]
pub fn test_exact_and_dssr_agree_ssr_bounds_below() {
    let _ = env_logger::try_init();
    let mut nodes = vec![Node {
        id: 0,
        pos: Point::new(35.0, 35.0),
        demand: 0.0,
        ready: 0.0,
        due: 230.0,
        service: 0.0,
    }];
    let customers = [
        (41.0, 49.0, 10.0, 161.0, 171.0),
        (35.0, 17.0, 7.0, 50.0, 60.0),
        (55.0, 45.0, 13.0, 116.0, 126.0),
        (55.0, 20.0, 19.0, 149.0, 159.0),
        (15.0, 30.0, 26.0, 34.0, 44.0),
        (25.0, 30.0, 3.0, 99.0, 109.0),
        (20.0, 50.0, 5.0, 81.0, 91.0),
    ];
    for (i, (x, y, demand, ready, due)) in customers.iter().enumerate() {
        nodes.push(Node {
            id: i + 1,
            pos: Point::new(*x, *y),
            demand: *demand,
            ready: *ready,
            due: *due,
            service: 10.0,
        });
    }
    let inst = Instance::euclidean("r_tiny", 50.0, 7, nodes);

    let mut objectives = Vec::new();
    for mode in [PricingMode::Exact, PricingMode::Dssr, PricingMode::Ssr] {
        let config = config(mode);
        let mut colgen = Colgen::new(&inst, &config).unwrap();
        let solution = colgen.run(VehicleBounds::root(&inst)).unwrap();
        if mode != PricingMode::Ssr {
            for r in solution.routes.iter() {
                assert!(r.route.is_elementary());
                assert!(inst.route_is_feasible(&r.route.path));
            }
        }
        objectives.push(solution.objective);
    }
    assert!((objectives[0] - objectives[1]).abs() < 1e-4);
    assert!(objectives[2] <= objectives[0] + 1e-4);
}

#[test]
pub fn test_infeasible_instance_fails_fast() {
    let mut inst = line_instance();
    inst.nodes[3].demand = 11.0;
    let config = SolverConfig::default();
    assert!(matches!(
        Colgen::new(&inst, &config),
        Err(PlannerError::InfeasibleInstance(_))
    ));
}

#[test]
pub fn test_solve_entry_point() {
    let _ = env_logger::try_init();
    let inst = triangle_instance();
    let mut config = config(PricingMode::Dssr);

    let relaxed = crate::solve(&inst, &config).unwrap();
    assert!((relaxed.objective - triangle_lp_value()).abs() < 1e-6);

    config.branching.enabled = true;
    let solution = crate::solve(&inst, &config).unwrap();
    assert!((solution.objective - triangle_integral_value()).abs() < 1e-6);
    assert!((solution.vehicles - 2.0).abs() < 1e-6);
    assert_eq!(solution.instance, "triangle");
}
