//! Simulated service day driving both dispatch tiers
//!
//! A wall-paced clock ticks through the day. Each tick applies whatever
//! Layer 2 reported since the last tick, may bring one new order, and lets
//! the smart queue assign at most one pending order. Layer 2 runs on its
//! own wall-clock interval the whole time.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::defaults::{
    default_day_end, default_day_start, DEFAULT_ORDER_PROBABILITY, DEFAULT_TICK_DELAY_MS, DEFAULT_TICK_MINUTES,
};
use crate::services::batch::{spawn_batch_task, BatchOutcome, BatchReoptimizer};
use crate::services::cost::{fleet_cost, route_cost};
use crate::services::dispatch::DispatchTier;
use crate::services::fleet::SharedFleet;
use crate::services::matrix::PlanningData;
use crate::services::orders::{dispatch_next, OrderBook, OrderSummary};
use crate::services::overflow::{build_overflow_route, OverflowRoute};
use crate::services::vrp::BatchSolver;
use crate::types::{FleetState, Stop, UnassignedReason, VehicleId};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    pub tick_minutes: u32,
    /// Chance of one new order per tick
    pub order_probability: f64,
    /// Wall time spent per simulated tick
    pub tick_delay: Duration,
    /// Fixed seed for a reproducible order stream
    pub seed: Option<u64>,
    /// Day the time windows refer to
    pub service_date: NaiveDate,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            day_start: default_day_start(),
            day_end: default_day_end(),
            tick_minutes: DEFAULT_TICK_MINUTES,
            order_probability: DEFAULT_ORDER_PROBABILITY,
            tick_delay: Duration::from_millis(DEFAULT_TICK_DELAY_MS),
            seed: None,
            service_date: Utc::now().date_naive(),
        }
    }
}

/// Simulated time from `start` (inclusive) to `end` (exclusive)
#[derive(Debug, Clone)]
pub struct SimulationClock {
    next: Option<NaiveTime>,
    end: NaiveTime,
    step: chrono::Duration,
}

impl SimulationClock {
    pub fn new(start: NaiveTime, end: NaiveTime, tick_minutes: u32) -> Self {
        Self {
            next: Some(start),
            end,
            step: chrono::Duration::minutes(tick_minutes.max(1) as i64),
        }
    }
}

impl Iterator for SimulationClock {
    type Item = NaiveTime;

    fn next(&mut self) -> Option<NaiveTime> {
        let now = self.next.filter(|t| *t < self.end)?;
        let (following, wrapped) = now.overflowing_add_signed(self.step);
        self.next = (wrapped == 0).then_some(following);
        Some(now)
    }
}

/// Random order arrivals over customer stops
pub struct OrderGenerator {
    rng: StdRng,
    probability: f64,
}

impl OrderGenerator {
    pub fn new(seed: Option<u64>, probability: f64) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            probability: probability.clamp(0.0, 1.0),
        }
    }

    /// Maybe pick one of `candidates` for a new order this tick
    pub fn next_stop(&mut self, candidates: &[Stop]) -> Option<Stop> {
        if !self.rng.gen_bool(self.probability) {
            return None;
        }
        candidates.choose(&mut self.rng).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteReport {
    pub vehicle_id: VehicleId,
    pub stops: Vec<Stop>,
    pub labels: Vec<String>,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub runs: usize,
    pub installed: usize,
    pub not_significant: usize,
    pub stale: usize,
    pub unchanged: usize,
    pub busy: usize,
    pub requeued_orders: usize,
    /// Layer 2 ran but every usable proposal lost to a Layer 1 commit
    pub starved: bool,
}

impl BatchStats {
    pub fn record(&mut self, outcome: &BatchOutcome) {
        self.runs += 1;
        match outcome {
            BatchOutcome::Empty => {}
            BatchOutcome::Busy => self.busy += 1,
            BatchOutcome::Unchanged { .. } => self.unchanged += 1,
            BatchOutcome::NotSignificant { .. } => self.not_significant += 1,
            BatchOutcome::Stale { .. } => self.stale += 1,
            BatchOutcome::Installed { .. } => self.installed += 1,
        }
        self.starved = self.installed == 0 && self.stale > 0;
    }
}

/// Final state of the day, printed as JSON by the binary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub ticks: usize,
    pub orders_placed: usize,
    pub orders_assigned: usize,
    pub routes: Vec<RouteReport>,
    pub fleet_cost: f64,
    pub revision: u64,
    pub batch: BatchStats,
    pub orders: Vec<OrderSummary>,
    pub overflow: Option<OverflowRoute>,
}

pub struct Simulation {
    data: PlanningData,
    config: Config,
    solver: Arc<dyn BatchSolver>,
}

impl Simulation {
    pub fn new(data: PlanningData, config: Config, solver: Arc<dyn BatchSolver>) -> Self {
        Self { data, config, solver }
    }

    /// Run the whole day and shut Layer 2 down cleanly before reporting
    pub async fn run(self) -> Result<SimulationReport> {
        let sim = &self.config.simulation;
        let constraints = self.config.constraints;
        let fleet = SharedFleet::new(constraints.vehicle_count);

        let dispatch = DispatchTier::new(fleet.clone(), self.data.matrix.clone(), constraints, self.config.dispatch);
        let reoptimizer = BatchReoptimizer::new(
            fleet.clone(),
            self.data.matrix.clone(),
            constraints,
            self.solver.clone(),
            self.config.batch,
        )
        .with_time_windows(self.data.time_windows(), sim.service_date.and_time(sim.day_start));

        let token = CancellationToken::new();
        let (reports_tx, mut reports) = mpsc::unbounded_channel();
        let batch_task = spawn_batch_task(Arc::new(reoptimizer), token.clone(), reports_tx);

        info!(
            vehicles = constraints.vehicle_count,
            locations = self.data.locations.len(),
            solver = self.solver.name(),
            "Starting dispatch simulation"
        );

        let mut book = OrderBook::new();
        let mut generator = OrderGenerator::new(sim.seed, sim.order_probability);
        let mut stats = BatchStats::default();
        let mut ticks = 0;

        for now in SimulationClock::new(sim.day_start, sim.day_end, sim.tick_minutes) {
            ticks += 1;
            debug!("Tick {}", now.format("%H:%M"));

            while let Ok(outcome) = reports.try_recv() {
                self.apply_batch_outcome(&outcome, &mut book, &mut stats, &fleet);
            }

            let snapshot = fleet.snapshot();
            let candidates: Vec<Stop> = self
                .data
                .customer_stops()
                .into_iter()
                .filter(|s| !snapshot.contains(*s) && !book.has_open_order(*s))
                .collect();
            if let Some(order) = generator.next_stop(&candidates).and_then(|stop| book.place(stop, now)) {
                info!(
                    "[{}] New order {} for {}",
                    now.format("%H:%M"),
                    order.id,
                    self.data.label(order.stop)
                );
            }

            if dispatch_next(&mut book, &dispatch).is_some() {
                self.log_fleet_status("Layer 1", &fleet.snapshot());
            }

            tokio::time::sleep(sim.tick_delay).await;
        }

        info!("Simulated day ended, stopping batch re-optimization");
        token.cancel();
        batch_task.await.context("Batch re-optimization task failed")?;
        while let Some(outcome) = reports.recv().await {
            self.apply_batch_outcome(&outcome, &mut book, &mut stats, &fleet);
        }

        if book.is_empty() {
            info!("No orders arrived during the simulated day");
        }
        if stats.starved {
            warn!(
                runs = stats.runs,
                stale = stats.stale,
                "Layer 2 never installed: every proposal went stale behind Layer 1 commits"
            );
        }

        let leftovers = book.drain_pending(&fleet.snapshot());
        let overflow = build_overflow_route(&leftovers, &self.data.matrix);
        if let Some(route) = &overflow {
            let labels: Vec<String> = route.stops.iter().map(|s| self.data.label(*s)).collect();
            info!(
                "Fallback vehicle: Depot -> {} -> Depot ({:.2} min)",
                labels.join(" -> "),
                route.cost
            );
        }

        let final_state = fleet.snapshot();
        Ok(SimulationReport {
            ticks,
            orders_placed: book.len(),
            orders_assigned: book.assigned_count(),
            routes: self.route_reports(&final_state),
            fleet_cost: fleet_cost(&final_state, &self.data.matrix),
            revision: final_state.revision(),
            batch: stats,
            orders: book.summaries(),
            overflow,
        })
    }

    fn apply_batch_outcome(&self, outcome: &BatchOutcome, book: &mut OrderBook, stats: &mut BatchStats, fleet: &SharedFleet) {
        stats.record(outcome);
        if let BatchOutcome::Installed { dropped, .. } = outcome {
            for stop in dropped {
                if let Some(id) = book.requeue_stop(*stop, UnassignedReason::DroppedByBatch) {
                    warn!("Batch re-optimization dropped {}, order {} requeued", self.data.label(*stop), id);
                    stats.requeued_orders += 1;
                }
            }
            self.log_fleet_status("Layer 2", &fleet.snapshot());
        }
    }

    fn log_fleet_status(&self, source: &str, state: &FleetState) {
        info!("Fleet status (updated by {})", source);
        for line in fleet_status_lines(state, &self.data) {
            info!("{}", line);
        }
    }

    fn route_reports(&self, state: &FleetState) -> Vec<RouteReport> {
        state
            .routes()
            .iter()
            .enumerate()
            .map(|(vehicle_id, route)| RouteReport {
                vehicle_id,
                stops: route.stops().to_vec(),
                labels: route.stops().iter().map(|s| self.data.label(*s)).collect(),
                cost: route_cost(route.stops(), &self.data.matrix),
            })
            .collect()
    }
}

/// One human-readable line per non-empty route
pub fn fleet_status_lines(state: &FleetState, data: &PlanningData) -> Vec<String> {
    state
        .routes()
        .iter()
        .enumerate()
        .filter(|(_, route)| !route.is_empty())
        .map(|(vehicle, route)| {
            let path: Vec<String> = route.stops().iter().map(|s| data.label(*s)).collect();
            format!(
                "Vehicle {} (Stops: {}): Depot -> {} -> Depot",
                vehicle,
                route.len(),
                path.join(" -> ")
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Constraints;
    use crate::error::SolverError;
    use crate::services::batch::BatchConfig;
    use crate::services::dispatch::DispatchConfig;
    use crate::services::matrix::TravelTimeMatrix;
    use crate::services::vrp::BatchRequest;
    use crate::types::{Location, OrderStatus, Route};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn location(name: &str) -> Location {
        Location {
            name: name.to_string(),
            latitude: None,
            longitude: None,
            earliest_minute: None,
            latest_minute: None,
        }
    }

    /// Depot plus `n` customers on a line, 10 minutes apart
    fn line_data(n: usize) -> PlanningData {
        let size = n + 1;
        let rows = (0..size)
            .map(|i| (0..size).map(|j| (i as f64 - j as f64).abs() * 10.0).collect())
            .collect();
        let locations = (0..size).map(|i| location(&format!("Stop {}, Delhi", i))).collect();
        PlanningData::new(locations, TravelTimeMatrix::new(rows).unwrap()).unwrap()
    }

    struct KeepSolver;

    impl BatchSolver for KeepSolver {
        fn name(&self) -> &'static str {
            "keep"
        }

        fn solve(&self, _request: &BatchRequest) -> Result<Vec<Vec<Stop>>, SolverError> {
            Err(SolverError::NoSolution)
        }
    }

    /// Proposes empty routes once, dropping every stop, then gives up
    #[derive(Default)]
    struct DropOnceSolver {
        dropped: AtomicBool,
    }

    impl BatchSolver for DropOnceSolver {
        fn name(&self) -> &'static str {
            "drop-once"
        }

        fn solve(&self, _request: &BatchRequest) -> Result<Vec<Vec<Stop>>, SolverError> {
            if self.dropped.swap(true, Ordering::SeqCst) {
                Err(SolverError::NoSolution)
            } else {
                Ok(vec![])
            }
        }
    }

    fn config(vehicles: usize, max_stops: usize, max_minutes: f64, probability: f64) -> Config {
        Config {
            matrix_file: PathBuf::from("time_matrix.json"),
            cache_file: PathBuf::from("travel_time_cache.json"),
            constraints: Constraints {
                vehicle_count: vehicles,
                max_stops_per_route: max_stops,
                max_route_duration_minutes: max_minutes,
            },
            dispatch: DispatchConfig::default(),
            batch: BatchConfig {
                interval: Duration::from_secs(3600),
                ..BatchConfig::default()
            },
            simulation: SimulationConfig {
                day_start: at(9, 0),
                day_end: at(11, 0),
                tick_minutes: 15,
                order_probability: probability,
                tick_delay: Duration::ZERO,
                seed: Some(7),
                service_date: NaiveDate::from_ymd_opt(2026, 1, 26).unwrap(),
            },
        }
    }

    #[test]
    fn test_clock_ticks_until_end_exclusive() {
        let ticks: Vec<NaiveTime> = SimulationClock::new(at(9, 0), at(10, 0), 15).collect();
        assert_eq!(ticks, vec![at(9, 0), at(9, 15), at(9, 30), at(9, 45)]);
        assert_eq!(SimulationClock::new(at(9, 0), at(17, 0), 15).count(), 32);
    }

    #[test]
    fn test_clock_stops_at_midnight() {
        let ticks: Vec<NaiveTime> = SimulationClock::new(at(23, 0), at(23, 59), 30).collect();
        assert_eq!(ticks, vec![at(23, 0), at(23, 30)]);
    }

    #[test]
    fn test_generator_is_reproducible_with_seed() {
        let candidates: Vec<Stop> = (1..20).map(Stop).collect();
        let mut a = OrderGenerator::new(Some(42), 0.9);
        let mut b = OrderGenerator::new(Some(42), 0.9);
        let first: Vec<Option<Stop>> = (0..10).map(|_| a.next_stop(&candidates)).collect();
        let second: Vec<Option<Stop>> = (0..10).map(|_| b.next_stop(&candidates)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_generator_respects_probability_and_candidates() {
        let mut never = OrderGenerator::new(Some(1), 0.0);
        assert!(never.next_stop(&[Stop(1)]).is_none());

        let mut always = OrderGenerator::new(Some(1), 1.0);
        assert!(always.next_stop(&[]).is_none());
        assert_eq!(always.next_stop(&[Stop(3)]), Some(Stop(3)));
    }

    #[test]
    fn test_fleet_status_lines_use_labels() {
        let data = line_data(3);
        let state = FleetState::from_routes(vec![Route::from(vec![Stop(2), Stop(1)]), Route::new()]);
        assert_eq!(
            fleet_status_lines(&state, &data),
            vec!["Vehicle 0 (Stops: 2): Depot -> Stop 2 -> Stop 1 -> Depot".to_string()]
        );
    }

    #[tokio::test]
    async fn test_full_day_routes_every_order_when_capacity_allows() {
        let data = line_data(12);
        let report = Simulation::new(data, config(2, 10, 500.0, 1.0), Arc::new(KeepSolver))
            .run()
            .await
            .unwrap();

        // 9:00 to 11:00 in 15 minute steps, one order per tick
        assert_eq!(report.ticks, 8);
        assert_eq!(report.orders_placed, 8);
        assert_eq!(report.orders_assigned, 8);
        assert!(report.overflow.is_none());
        assert_eq!(report.routes.len(), 2);

        let routed: usize = report.routes.iter().map(|r| r.stops.len()).sum();
        assert_eq!(routed, 8);
        let total: f64 = report.routes.iter().map(|r| r.cost).sum();
        assert!((total - report.fleet_cost).abs() < 1e-9);
        assert!(report.routes.iter().all(|r| r.cost <= 500.0));
    }

    #[tokio::test]
    async fn test_leftover_orders_go_to_overflow() {
        let data = line_data(12);
        // One vehicle with room for two stops
        let report = Simulation::new(data, config(1, 2, 500.0, 1.0), Arc::new(KeepSolver))
            .run()
            .await
            .unwrap();

        assert_eq!(report.orders_placed, 8);
        assert_eq!(report.orders_assigned, 2);
        let overflow = report.overflow.unwrap();
        assert_eq!(overflow.orders.len(), 6);
        let overflowed = report
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::Overflow)
            .count();
        assert_eq!(overflowed, 6);
    }

    #[tokio::test]
    async fn test_stop_dropped_by_batch_is_routed_once() {
        let data = line_data(1);
        let mut cfg = config(1, 5, 500.0, 1.0);
        cfg.simulation.tick_delay = Duration::from_millis(200);
        cfg.batch.interval = Duration::from_millis(300);

        let report = Simulation::new(data, cfg, Arc::new(DropOnceSolver::default()))
            .run()
            .await
            .unwrap();

        assert_eq!(report.batch.installed, 1);
        assert_eq!(report.batch.requeued_orders, 1);
        // The dropped stop never gets a second order
        assert_eq!(report.orders_placed, 1);
        assert_eq!(report.orders_assigned, 1);

        let routed: Vec<Stop> = report.routes.iter().flat_map(|r| r.stops.clone()).collect();
        let overflowed: Vec<Stop> = report.overflow.iter().flat_map(|r| r.stops.clone()).collect();
        assert_eq!(routed, vec![Stop(1)]);
        assert!(overflowed.is_empty());
    }

    #[test]
    fn test_batch_stats_flag_starvation() {
        let mut stats = BatchStats::default();
        stats.record(&BatchOutcome::Empty);
        stats.record(&BatchOutcome::Stale { snapshot_revision: 1, current_revision: 2 });
        stats.record(&BatchOutcome::Busy);
        assert_eq!((stats.runs, stats.stale, stats.busy), (3, 1, 1));
        assert!(stats.starved);

        stats.record(&BatchOutcome::Installed { old_cost: 50.0, new_cost: 40.0, revision: 3, dropped: vec![] });
        assert_eq!(stats.installed, 1);
        assert!(!stats.starved);
    }
}
