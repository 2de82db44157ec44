use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use fixedbitset::FixedBitSet;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use vrptw_structs::Instance;

use crate::{
    config::PricingConfig,
    error::PlannerError,
    label::{SetRule, Strengthen},
    shortest_path::{label_setting, LabelStats},
    VehicleSolution,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingMode {
    /// Elementary labeling over the full visited set.
    Exact,
    /// Decremental state-space relaxation: only customers that have been
    /// seen repeated in an optimal relaxed route are tracked.
    Dssr,
    /// State-space relaxation without any visited set. Routes may cycle.
    Ssr,
}

impl FromStr for PricingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(PricingMode::Exact),
            "dssr" => Ok(PricingMode::Dssr),
            "ssr" => Ok(PricingMode::Ssr),
            other => Err(format!("unknown pricing mode {:?} (expected exact, dssr or ssr)", other)),
        }
    }
}

impl fmt::Display for PricingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PricingMode::Exact => "exact",
            PricingMode::Dssr => "dssr",
            PricingMode::Ssr => "ssr",
        };
        f.write_str(name)
    }
}

/// Dual values of the restricted master. `customer` is indexed by node, with
/// a zero entry for the depot.
#[derive(Debug, Clone, PartialEq)]
pub struct Duals {
    pub customer: Vec<f64>,
    pub vehicle: f64,
}

impl Duals {
    pub fn zero(num_nodes: usize) -> Self {
        Duals {
            customer: vec![0.0; num_nodes],
            vehicle: 0.0,
        }
    }

    pub fn reduced_cost(&self, instance: &Instance, path: &[usize]) -> f64 {
        instance.route_cost(path) - path.iter().map(|c| self.customer[*c]).sum::<f64>() - self.vehicle
    }
}

#[derive(Debug, Default, Clone)]
pub struct PricingStats {
    pub labels_created: usize,
    pub labels_dominated: usize,
    pub labeling_runs: usize,
    /// Critical customers at the end of a DSSR call.
    pub critical: Vec<usize>,
}

impl PricingStats {
    fn add(&mut self, stats: &LabelStats) {
        self.labels_created += stats.created;
        self.labels_dominated += stats.dominated;
        self.labeling_runs += 1;
    }
}

#[derive(Debug)]
pub struct PricingOutcome {
    /// Distinct routes with negative reduced cost, cheapest first.
    pub routes: Vec<VehicleSolution>,
    /// Smallest reduced cost seen at the depot, improving or not.
    pub best_reduced_cost: Option<f64>,
    pub stats: PricingStats,
}

pub struct Pricer<'a> {
    instance: &'a Instance,
    config: &'a PricingConfig,
    strengthen: Strengthen,
}

impl<'a> Pricer<'a> {
    pub fn new(instance: &'a Instance, config: &'a PricingConfig) -> Self {
        let strengthen = if !config.strengthen_unreachable {
            Strengthen::Off
        } else if instance.time_triangle_holds() {
            Strengthen::LoadAndTime
        } else {
            debug!("Travel times violate the triangle inequality, strengthening on load only");
            Strengthen::Load
        };
        Pricer {
            instance,
            config,
            strengthen,
        }
    }

    /// Searches for routes with negative reduced cost under `duals`. An empty
    /// route list means none exists (for SSR: none among relaxed routes).
    pub fn price(&self, duals: &Duals) -> Result<PricingOutcome, PlannerError> {
        #[cfg(feature = "prof")]
        let _p = hprof::enter("pricing");

        let outcome = match self.config.mode {
            PricingMode::Exact => self.exact(duals),
            PricingMode::Dssr => self.dssr(duals),
            PricingMode::Ssr => self.ssr(duals),
        }?;
        debug!(
            "Pricing ({}) found {} columns, best reduced cost {:?}, {} labels",
            self.config.mode,
            outcome.routes.len(),
            outcome.best_reduced_cost,
            outcome.stats.labels_created
        );
        Ok(outcome)
    }

    fn exact(&self, duals: &Duals) -> Result<PricingOutcome, PlannerError> {
        let result = label_setting(self.instance, duals, SetRule::Elementary(self.strengthen), None)?;
        let mut stats = PricingStats::default();
        stats.add(&result.stats);
        Ok(self.collect(result.sorted_routes(), false, stats))
    }

    fn ssr(&self, duals: &Duals) -> Result<PricingOutcome, PlannerError> {
        let result = label_setting(
            self.instance,
            duals,
            SetRule::Relaxed,
            Some(self.config.ssr_max_labels),
        )?;
        let mut stats = PricingStats::default();
        stats.add(&result.stats);
        Ok(self.collect(result.sorted_routes(), false, stats))
    }

    fn dssr(&self, duals: &Duals) -> Result<PricingOutcome, PlannerError> {
        let mut critical = FixedBitSet::with_capacity(self.instance.num_nodes());
        let mut stats = PricingStats::default();

        loop {
            // Non-critical customers may cycle; the visit count keeps the run finite.
            let result = label_setting(self.instance, duals, SetRule::Critical(&critical), None)?;
            stats.add(&result.stats);
            stats.critical = critical.ones().collect();
            let routes = result.sorted_routes();

            let Some((best_cost, best_path)) = routes.first() else {
                return Ok(self.collect(routes, true, stats));
            };
            if *best_cost >= -self.config.reduced_cost_tol {
                // The relaxation bounds the elementary optimum from below.
                return Ok(self.collect(routes, true, stats));
            }

            let repeated = repeated_customers(best_path);
            if repeated.is_empty() {
                return Ok(self.collect(routes, true, stats));
            }

            for c in repeated {
                if critical.contains(c) {
                    return Err(PlannerError::Invariant(format!(
                        "critical customer {} repeated in route {:?}",
                        c, best_path
                    )));
                }
                critical.insert(c);
            }
            debug!(
                "DSSR run {}: best route {:?} is not elementary, critical set now {:?}",
                stats.labeling_runs,
                best_path,
                critical.ones().collect::<Vec<_>>()
            );
        }
    }

    fn collect(&self, routes: Vec<(f64, Vec<usize>)>, elementary_only: bool, stats: PricingStats) -> PricingOutcome {
        let best_reduced_cost = routes.first().map(|(rc, _)| *rc);
        let mut seen = HashSet::new();
        let mut columns = Vec::new();

        for (reduced_cost, path) in routes {
            if reduced_cost >= -self.config.reduced_cost_tol || columns.len() >= self.config.max_columns {
                break;
            }
            if elementary_only && !repeated_customers(&path).is_empty() {
                continue;
            }
            if !seen.insert(path.clone()) {
                continue;
            }
            trace!("  column {:?} rc={:.4}", path, reduced_cost);
            columns.push(VehicleSolution {
                cost: self.instance.route_cost(&path),
                cost_including_shadow_price: reduced_cost,
                path,
            });
        }

        PricingOutcome {
            routes: columns,
            best_reduced_cost,
            stats,
        }
    }
}

/// Customers occurring more than once in `path`, ascending.
fn repeated_customers(path: &[usize]) -> Vec<usize> {
    let mut sorted = path.to_vec();
    sorted.sort_unstable();
    let mut repeated = sorted
        .windows(2)
        .filter(|w| w[0] == w[1])
        .map(|w| w[0])
        .collect::<Vec<_>>();
    repeated.dedup();
    repeated
}
