//! Batch VRP solver contract
//!
//! Layer 2 hands the solver every currently routed stop and asks for a fresh
//! partition into at most `vehicle_count` routes. The solver only sees a
//! pool-local cost submatrix: index 0 is the depot, index `i + 1` is
//! `pool[i]`.

mod adapter;
mod config;
mod pragmatic;

pub use adapter::{build_pragmatic_matrix, build_pragmatic_problem, job_id, parse_job_id, DEFAULT_PROFILE};
pub use config::SolverConfig;
pub use pragmatic::PragmaticSolver;

use chrono::NaiveDateTime;

use crate::config::Constraints;
use crate::error::SolverError;
use crate::services::matrix::TravelTimeMatrix;
use crate::types::{Stop, TimeWindow, DEPOT};

/// Everything the solver needs for one batch run
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub pool: Vec<Stop>,
    /// Minutes, `(pool.len() + 1)²`, depot first
    pub submatrix: Vec<Vec<f64>>,
    pub vehicle_count: usize,
    /// Capacity per vehicle, in stops
    pub max_stops_per_route: usize,
    pub max_route_duration_minutes: f64,
    /// Parallel to `pool`
    pub time_windows: Vec<Option<TimeWindow>>,
    /// Wall-clock origin for time windows
    pub shift_start: NaiveDateTime,
    pub config: SolverConfig,
}

impl BatchRequest {
    /// `windows` is indexed by global stop index; missing entries mean no window
    pub fn new(
        pool: Vec<Stop>,
        matrix: &TravelTimeMatrix,
        constraints: &Constraints,
        windows: &[Option<TimeWindow>],
        shift_start: NaiveDateTime,
        config: SolverConfig,
    ) -> Self {
        let nodes: Vec<Stop> = std::iter::once(DEPOT).chain(pool.iter().copied()).collect();
        let submatrix = nodes
            .iter()
            .map(|&from| nodes.iter().map(|&to| matrix.time(from, to)).collect())
            .collect();
        let time_windows = pool
            .iter()
            .map(|stop| windows.get(stop.index()).copied().flatten())
            .collect();

        Self {
            pool,
            submatrix,
            vehicle_count: constraints.vehicle_count,
            max_stops_per_route: constraints.max_stops_per_route,
            max_route_duration_minutes: constraints.max_route_duration_minutes,
            time_windows,
            shift_start,
            config,
        }
    }
}

/// External combinatorial solver consumed by Layer 2.
///
/// Returns at most `vehicle_count` ordered routes over pool stops. Stops the
/// solver could not place are simply absent from the result.
pub trait BatchSolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, request: &BatchRequest) -> Result<Vec<Vec<Stop>>, SolverError>;
}
