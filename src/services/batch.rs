//! Layer 2: periodic batch re-optimization
//!
//! Snapshot under the lock, solve outside it, then compare-and-install.
//! A proposal is installed only when it is clearly cheaper and no Layer 1
//! commit landed since the snapshot was taken.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{validate_ratio, Constraints};
use crate::defaults::{
    DEFAULT_BATCH_ACCEPT_RATIO, DEFAULT_BATCH_BUDGET_SECS, DEFAULT_BATCH_INTERVAL_SECS,
    DEFAULT_BATCH_MAX_GENERATIONS,
};
use crate::error::{ConfigError, SolverError};
use crate::services::cost::route_cost;
use crate::services::fleet::SharedFleet;
use crate::services::matrix::TravelTimeMatrix;
use crate::services::vrp::{BatchRequest, BatchSolver, SolverConfig};
use crate::types::{Route, Stop, TimeWindow};

/// Slack on top of the solver budget before the call is abandoned
const SOLVE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchConfig {
    /// Wall-clock period between runs
    pub interval: Duration,
    pub solve_budget: Duration,
    pub max_generations: usize,
    /// Proposal must cost at most this fraction of the current fleet
    pub accept_ratio: f64,
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroBatchInterval);
        }
        validate_ratio("batch accept ratio", self.accept_ratio)
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig::new(self.solve_budget.as_secs(), self.max_generations)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_BATCH_INTERVAL_SECS),
            solve_budget: Duration::from_secs(DEFAULT_BATCH_BUDGET_SECS),
            max_generations: DEFAULT_BATCH_MAX_GENERATIONS,
            accept_ratio: DEFAULT_BATCH_ACCEPT_RATIO,
        }
    }
}

/// What one batch run did to the fleet
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Nothing routed yet
    Empty,
    /// An abandoned solve from an earlier run is still going
    Busy,
    /// Solver failed, timed out or proposed something invalid
    Unchanged { reason: String },
    /// Proposal not cheap enough to replace the current routes
    NotSignificant { old_cost: f64, new_cost: f64 },
    /// Layer 1 committed while the solver ran
    Stale { snapshot_revision: u64, current_revision: u64 },
    Installed {
        old_cost: f64,
        new_cost: f64,
        revision: u64,
        /// Previously routed stops the proposal left out
        dropped: Vec<Stop>,
    },
}

pub struct BatchReoptimizer {
    fleet: SharedFleet,
    matrix: Arc<TravelTimeMatrix>,
    constraints: Constraints,
    solver: Arc<dyn BatchSolver>,
    config: BatchConfig,
    /// Indexed by global stop index
    time_windows: Vec<Option<TimeWindow>>,
    shift_start: NaiveDateTime,
    /// Set while a blocking solve runs, including one that timed out
    solving: Arc<AtomicBool>,
}

/// Clears the in-flight flag when the blocking solve returns or panics
struct SolveGuard(Arc<AtomicBool>);

impl Drop for SolveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BatchReoptimizer {
    pub fn new(
        fleet: SharedFleet,
        matrix: Arc<TravelTimeMatrix>,
        constraints: Constraints,
        solver: Arc<dyn BatchSolver>,
        config: BatchConfig,
    ) -> Self {
        Self {
            fleet,
            matrix,
            constraints,
            solver,
            config,
            time_windows: Vec::new(),
            shift_start: NaiveDateTime::default(),
            solving: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Pass per-stop delivery windows to the solver, measured from `shift_start`
    pub fn with_time_windows(mut self, time_windows: Vec<Option<TimeWindow>>, shift_start: NaiveDateTime) -> Self {
        self.time_windows = time_windows;
        self.shift_start = shift_start;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// One snapshot-solve-install cycle. Never holds the fleet lock while solving.
    pub async fn run_once(&self) -> BatchOutcome {
        if self.solving.load(Ordering::Acquire) {
            warn!("Previous batch solve is still running, skipping this run");
            return BatchOutcome::Busy;
        }

        let snapshot = self.fleet.snapshot();
        let pool = snapshot.assigned_stops();
        if pool.is_empty() {
            debug!("Batch skipped: no routed stops");
            return BatchOutcome::Empty;
        }

        let old_cost: f64 = snapshot
            .routes()
            .iter()
            .map(|r| route_cost(r.stops(), &self.matrix))
            .sum();

        info!(
            solver = self.solver.name(),
            stops = pool.len(),
            revision = snapshot.revision(),
            old_cost,
            "Starting batch re-optimization"
        );

        let request = BatchRequest::new(
            pool.clone(),
            &self.matrix,
            &self.constraints,
            &self.time_windows,
            self.shift_start,
            self.config.solver_config(),
        );

        let routes = match self.solve(request).await {
            Ok(routes) => routes,
            Err(err) => {
                warn!("Batch solver returned no usable proposal: {}", err);
                return BatchOutcome::Unchanged { reason: err.to_string() };
            }
        };

        if let Err(err) = validate_proposal(&routes, &pool, &self.matrix, &self.constraints) {
            warn!("Discarding batch proposal: {}", err);
            return BatchOutcome::Unchanged { reason: err.to_string() };
        }

        let new_cost: f64 = routes.iter().map(|r| route_cost(r, &self.matrix)).sum();
        if new_cost > self.config.accept_ratio * old_cost {
            info!(old_cost, new_cost, "Batch proposal not significant, keeping current routes");
            return BatchOutcome::NotSignificant { old_cost, new_cost };
        }

        let routed: HashSet<Stop> = routes.iter().flatten().copied().collect();
        let dropped: Vec<Stop> = pool.into_iter().filter(|s| !routed.contains(s)).collect();

        let mut new_routes: Vec<Route> = routes.into_iter().map(Route::from).collect();
        new_routes.resize(self.constraints.vehicle_count, Route::new());

        match self.fleet.install_if_unchanged(snapshot.revision(), new_routes) {
            Some(revision) => {
                info!(
                    old_cost,
                    new_cost,
                    revision,
                    dropped = dropped.len(),
                    "Installed batch re-optimization"
                );
                BatchOutcome::Installed { old_cost, new_cost, revision, dropped }
            }
            None => {
                let current_revision = self.fleet.revision();
                info!(
                    snapshot_revision = snapshot.revision(),
                    current_revision,
                    "Batch proposal is stale, discarding"
                );
                BatchOutcome::Stale { snapshot_revision: snapshot.revision(), current_revision }
            }
        }
    }

    async fn solve(&self, request: BatchRequest) -> Result<Vec<Vec<Stop>>, SolverError> {
        let solver = self.solver.clone();
        let budget = request.config.budget();
        self.solving.store(true, Ordering::Release);
        let guard = SolveGuard(self.solving.clone());
        let handle = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            solver.solve(&request)
        });

        match tokio::time::timeout(budget + SOLVE_GRACE, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(SolverError::Failed(
                anyhow::Error::new(join_err).context("Batch solver task panicked"),
            )),
            Err(_) => Err(SolverError::Timeout { budget_secs: budget.as_secs() }),
        }
    }
}

/// Routes only pool stops, each once, within the fleet size and both caps
fn validate_proposal(
    routes: &[Vec<Stop>],
    pool: &[Stop],
    matrix: &TravelTimeMatrix,
    constraints: &Constraints,
) -> Result<(), SolverError> {
    if routes.len() > constraints.vehicle_count {
        return Err(SolverError::InvalidProposal(format!(
            "{} routes for {} vehicles",
            routes.len(),
            constraints.vehicle_count
        )));
    }

    let allowed: HashSet<Stop> = pool.iter().copied().collect();
    let mut seen = HashSet::new();
    for (vehicle, route) in routes.iter().enumerate() {
        for stop in route {
            if !allowed.contains(stop) {
                return Err(SolverError::InvalidProposal(format!("stop {} was never routed", stop)));
            }
            if !seen.insert(*stop) {
                return Err(SolverError::InvalidProposal(format!("stop {} appears twice", stop)));
            }
        }
        if route.len() > constraints.max_stops_per_route {
            return Err(SolverError::InvalidProposal(format!(
                "vehicle {} has {} stops, cap is {}",
                vehicle,
                route.len(),
                constraints.max_stops_per_route
            )));
        }
        let cost = route_cost(route, matrix);
        if cost > constraints.max_route_duration_minutes {
            return Err(SolverError::InvalidProposal(format!(
                "vehicle {} needs {:.1} min, cap is {:.1}",
                vehicle, cost, constraints.max_route_duration_minutes
            )));
        }
    }

    Ok(())
}

/// Run `reoptimizer` every `interval` until `token` is cancelled.
///
/// The first run happens one interval after start. Cancellation is only
/// observed between runs, so an in-flight solve always completes.
pub fn spawn_batch_task(
    reoptimizer: Arc<BatchReoptimizer>,
    token: CancellationToken,
    reports: mpsc::UnboundedSender<BatchOutcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = reoptimizer.config().interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = reoptimizer.run_once().await;
            if reports.send(outcome).is_err() {
                debug!("Batch report receiver dropped");
                break;
            }
        }

        info!("Batch re-optimization task stopped");
    })
}
