use serde::{Deserialize, Serialize};

use crate::pricing::PricingMode;

pub const DEFAULT_SSR_MAX_LABELS: usize = 2_000_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub pricing: PricingConfig,
    pub colgen: ColgenConfig,
    pub branching: BranchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub mode: PricingMode,
    /// Upper limit on the columns returned by one pricing call.
    pub max_columns: usize,
    /// Add customers that can no longer be reached to a label's visited set
    /// (exact mode only).
    pub strengthen_unreachable: bool,
    /// Labels a relaxed (SSR) pricing call may create before giving up.
    pub ssr_max_labels: usize,
    /// A route is improving when its reduced cost is below `-reduced_cost_tol`.
    pub reduced_cost_tol: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            mode: PricingMode::Dssr,
            max_columns: 10,
            strengthen_unreachable: true,
            ssr_max_labels: DEFAULT_SSR_MAX_LABELS,
            reduced_cost_tol: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColgenConfig {
    pub max_iterations: usize,
    /// Objective coefficient of the artificial cover columns. Derived from
    /// the instance when unset.
    pub artificial_cost: Option<f64>,
}

impl Default for ColgenConfig {
    fn default() -> Self {
        ColgenConfig {
            max_iterations: 10_000,
            artificial_cost: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchConfig {
    pub enabled: bool,
    /// Worker threads exploring the tree. One means sequential best-first.
    pub threads: usize,
}

impl Default for BranchConfig {
    fn default() -> Self {
        BranchConfig {
            enabled: false,
            threads: 1,
        }
    }
}

impl SolverConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
