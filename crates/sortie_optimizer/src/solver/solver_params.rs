use fxhash::FxHashMap;
use jiff::SignedDuration;
use sortie_matrix::MatrixParams;

use crate::{problem::vehicle::PriorityFilter, solver::allocator::AllocationMode};

#[derive(Clone, Debug)]
pub struct SolverParams {
    pub allocation_mode: AllocationMode,

    /// Mission wide priority filter, applied on top of each vehicle's own.
    pub priority_filter: Option<PriorityFilter>,

    /// Target id to vehicle id. A pinned target can only be visited by its vehicle.
    pub pinned_targets: FxHashMap<String, String>,

    /// Above this number of candidates, the heuristic replaces the exact search.
    pub max_exact_targets: usize,
    pub exact_time_limit: SignedDuration,
    pub heuristic_max_iterations: usize,

    /// A migration needs `SSD - OSD` strictly above this value.
    pub swap_min_gain: f64,
    pub max_swap_passes: usize,
    pub max_crossing_iterations: usize,
    pub max_optimizer_rounds: usize,

    pub trajectory_swap: bool,
    pub insert_missed: bool,
    pub crossing_removal: bool,

    pub solver_threads: Threads,
    pub matrix: MatrixParams,
}

#[derive(Clone, Debug)]
pub enum Threads {
    Single,
    Auto,
    Multi(usize),
}

impl Threads {
    pub fn number_of_threads(&self) -> usize {
        match self {
            Threads::Single => 1,
            Threads::Multi(num) => (*num).max(1),
            Threads::Auto => std::thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            allocation_mode: AllocationMode::Overlapping,
            priority_filter: None,
            pinned_targets: FxHashMap::default(),

            max_exact_targets: 16,
            exact_time_limit: SignedDuration::from_secs(10),
            heuristic_max_iterations: 10_000,

            swap_min_gain: 1.0,
            max_swap_passes: 25,
            max_crossing_iterations: 100,
            max_optimizer_rounds: 10,

            trajectory_swap: true,
            insert_missed: true,
            crossing_removal: true,

            solver_threads: Threads::Auto,
            matrix: MatrixParams::default(),
        }
    }
}

impl SolverParams {
    pub fn any_optimizer_phase(&self) -> bool {
        self.trajectory_swap || self.insert_missed || self.crossing_removal
    }
}
