use std::time::Duration;

/// Numeric tolerances used throughout the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    /// A column improves the master only if its reduced cost is below `-reduced_cost`
    pub reduced_cost: f64,
    /// Distance to the nearest integer below which a value counts as integral
    pub integer: f64,
    /// Slack for bound and label comparisons
    pub comparison: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Tolerances {
            reduced_cost: 1e-5,
            integer: 1e-6,
            comparison: 1e-5,
        }
    }
}

impl Tolerances {
    pub fn is_integer(&self, value: f64) -> bool {
        (value.round() - value).abs() <= self.integer
    }
}

/// Order in which open nodes are explored
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SearchStrategy {
    #[default]
    DepthFirst,
    BreadthFirst,
    /// Lowest parent relaxation first
    BestFirst,
}

/// Which oracle solves the pricing problem
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PricingKind {
    #[default]
    LabelSetting,
    /// Explicit 0/1 program, only available with a MIP backend
    Mip,
}

/// Which item triples receive a subset-row cut in the master
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CutSelection {
    #[default]
    None,
    /// Consecutive triples of the item list
    Separate,
    /// Every combination of three items
    Complete,
    /// Seeded random subset of all combinations
    Random { count: usize, seed: u64 },
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub tolerances: Tolerances,
    pub strategy: SearchStrategy,
    pub pricing: PricingKind,
    pub cuts: CutSelection,
    /// Number of negative reduced cost columns added per pricing round (delta)
    pub columns_per_pricing: usize,
    pub time_limit: Option<Duration>,
    pub node_limit: Option<usize>,
    /// Safety valve for column generation, reported when hit
    pub max_colgen_iterations: Option<usize>,
    /// Budget handed to every single LP / MIP solve
    pub lp_time_limit: Option<Duration>,
    pub num_threads: usize,
    /// Seed the root with first fit decreasing and use it as first incumbent
    pub seed_with_heuristic: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tolerances: Tolerances::default(),
            strategy: SearchStrategy::default(),
            pricing: PricingKind::default(),
            cuts: CutSelection::default(),
            columns_per_pricing: 1,
            time_limit: None,
            node_limit: None,
            max_colgen_iterations: None,
            lp_time_limit: None,
            num_threads: 1,
            seed_with_heuristic: false,
        }
    }
}
