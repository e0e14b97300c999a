//! Layer 1: immediate per-order dispatch
//!
//! Greedy insertion followed by tabu refinement of the resulting fleet,
//! committed under the fleet lock. Each order runs to completion before the
//! next one is looked at.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{validate_ratio, Constraints};
use crate::defaults::DEFAULT_TABU_ACCEPT_RATIO;
use crate::error::{ConfigError, DispatchError};
use crate::services::cost::{fleet_cost, route_cost};
use crate::services::fleet::SharedFleet;
use crate::services::insertion::{apply_insertion, find_cheapest_insertion};
use crate::services::matrix::TravelTimeMatrix;
use crate::services::tabu::{TabuConfig, TabuRefiner};
use crate::types::{AssignmentMethod, AssignmentResult, FleetState, Order};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchConfig {
    pub tabu: TabuConfig,
    /// Refined state must cost at most this fraction of the greedy one
    pub accept_ratio: f64,
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ratio("tabu accept ratio", self.accept_ratio)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tabu: TabuConfig::default(),
            accept_ratio: DEFAULT_TABU_ACCEPT_RATIO,
        }
    }
}

pub struct DispatchTier {
    fleet: SharedFleet,
    matrix: Arc<TravelTimeMatrix>,
    constraints: Constraints,
    refiner: TabuRefiner,
    accept_ratio: f64,
}

impl DispatchTier {
    pub fn new(
        fleet: SharedFleet,
        matrix: Arc<TravelTimeMatrix>,
        constraints: Constraints,
        config: DispatchConfig,
    ) -> Self {
        Self {
            fleet,
            matrix,
            constraints,
            refiner: TabuRefiner::new(config.tabu),
            accept_ratio: config.accept_ratio,
        }
    }

    /// Assign one order, or reject it without touching the fleet.
    ///
    /// The lock is held from the first read to the commit so that a batch
    /// install can land either before or after this order, never inside it.
    pub fn dispatch(&self, order: &Order) -> Result<AssignmentResult, DispatchError> {
        let matrix = self.matrix.as_ref();
        let stop = order.stop;

        self.fleet.with_lock(|state| {
            if !matrix.is_customer(stop) {
                return Err(DispatchError::UnknownStop { order_id: order.id, stop });
            }
            if let Some((vehicle_id, _)) = state.locate(stop) {
                return Err(DispatchError::StopAlreadyAssigned { order_id: order.id, stop, vehicle_id });
            }

            let insertion = find_cheapest_insertion(state, stop, matrix, &self.constraints)
                .ok_or(DispatchError::InfeasibleInsertion { order_id: order.id, stop })?;

            let greedy = apply_insertion(state, stop, &insertion);
            let greedy_cost = fleet_cost(&greedy, matrix);
            let refinement = self.refiner.refine(&greedy, matrix, &self.constraints);

            debug!(
                order = %order.id,
                greedy_cost,
                refined_cost = refinement.cost,
                iterations = refinement.iterations,
                "Refined greedy candidate"
            );

            let (committed, method) = if self.accepts(refinement.cost, greedy_cost) {
                (refinement.fleet, AssignmentMethod::Tabu)
            } else {
                (greedy, AssignmentMethod::Greedy)
            };

            let (vehicle_id, insertion_index) = committed
                .locate(stop)
                .unwrap_or((insertion.vehicle_id, insertion.index));
            let new_route_cost = committed
                .route(vehicle_id)
                .map(|route| route_cost(route.stops(), matrix))
                .unwrap_or(insertion.new_route_cost);

            commit(state, committed);
            let total = fleet_cost(state, matrix);

            info!(
                order = %order.id,
                stop = %stop,
                vehicle = vehicle_id,
                index = insertion_index,
                method = method.as_str(),
                route_cost = new_route_cost,
                fleet_cost = total,
                "Order assigned"
            );

            Ok(AssignmentResult {
                order_id: order.id,
                vehicle_id,
                insertion_index,
                method,
                new_route_cost,
                fleet_cost: total,
            })
        })
    }

    fn accepts(&self, refined_cost: f64, greedy_cost: f64) -> bool {
        refined_cost < greedy_cost && refined_cost <= self.accept_ratio * greedy_cost
    }
}

fn commit(state: &mut FleetState, committed: FleetState) {
    state.replace_routes(committed.into_routes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderId, Route, Stop};
    use chrono::NaiveTime;

    fn order(id: u64, stop: usize) -> Order {
        Order {
            id: OrderId(id),
            stop: Stop(stop),
            placed_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        }
    }

    fn constraints(vehicles: usize, max_stops: usize, max_minutes: f64) -> Constraints {
        Constraints {
            vehicle_count: vehicles,
            max_stops_per_route: max_stops,
            max_route_duration_minutes: max_minutes,
        }
    }

    fn matrix_4() -> Arc<TravelTimeMatrix> {
        Arc::new(
            TravelTimeMatrix::new(vec![
                vec![0.0, 10.0, 12.0, 30.0],
                vec![10.0, 0.0, 4.0, 25.0],
                vec![12.0, 4.0, 0.0, 20.0],
                vec![30.0, 25.0, 20.0, 0.0],
            ])
            .unwrap(),
        )
    }

    /// Points on a line at 0..4, time = distance × 10
    fn line_matrix() -> Arc<TravelTimeMatrix> {
        let rows = (0..5)
            .map(|i| (0..5).map(|j| (i as f64 - j as f64).abs() * 10.0).collect())
            .collect();
        Arc::new(TravelTimeMatrix::new(rows).unwrap())
    }

    fn tier(fleet: SharedFleet, matrix: Arc<TravelTimeMatrix>, c: Constraints, ratio: f64) -> DispatchTier {
        let config = DispatchConfig {
            accept_ratio: ratio,
            ..DispatchConfig::default()
        };
        DispatchTier::new(fleet, matrix, c, config)
    }

    #[test]
    fn test_four_node_scenario() {
        let m = matrix_4();
        let dispatch = tier(SharedFleet::new(2), m.clone(), constraints(2, 2, 100.0), 0.97);

        let first = dispatch.dispatch(&order(1, 1)).unwrap();
        assert_eq!(first.vehicle_id, 0);
        assert_eq!(first.insertion_index, 0);
        assert_eq!(first.new_route_cost, m.time(Stop(0), Stop(1)) + m.time(Stop(1), Stop(0)));

        // Both positions on vehicle 0 cost +6, the empty vehicle +24
        let second = dispatch.dispatch(&order(2, 2)).unwrap();
        assert_eq!(second.vehicle_id, 0);
        assert_eq!(second.insertion_index, 0);
        assert_eq!(second.method, AssignmentMethod::Greedy);
        assert_eq!(second.new_route_cost, 26.0);
        assert_eq!(second.fleet_cost, 26.0);
    }

    #[test]
    fn test_full_vehicle_is_skipped() {
        let dispatch = tier(SharedFleet::new(2), matrix_4(), constraints(2, 2, 100.0), 0.97);
        dispatch.dispatch(&order(1, 1)).unwrap();
        dispatch.dispatch(&order(2, 2)).unwrap();

        let third = dispatch.dispatch(&order(3, 3)).unwrap();
        assert_eq!(third.vehicle_id, 1);
        assert_eq!(third.new_route_cost, 60.0);
    }

    #[test]
    fn test_infeasible_order_leaves_fleet_untouched() {
        let fleet = SharedFleet::new(1);
        let dispatch = tier(fleet.clone(), matrix_4(), constraints(1, 5, 50.0), 0.97);
        let err = dispatch.dispatch(&order(1, 3)).unwrap_err();
        assert_eq!(err, DispatchError::InfeasibleInsertion { order_id: OrderId(1), stop: Stop(3) });
        assert_eq!(fleet.revision(), 0);
        assert_eq!(fleet.snapshot().stop_count(), 0);
    }

    #[test]
    fn test_rejects_depot_unknown_and_duplicate_stops() {
        let dispatch = tier(SharedFleet::new(2), matrix_4(), constraints(2, 2, 100.0), 0.97);
        assert!(matches!(dispatch.dispatch(&order(1, 0)), Err(DispatchError::UnknownStop { .. })));
        assert!(matches!(dispatch.dispatch(&order(2, 9)), Err(DispatchError::UnknownStop { .. })));

        dispatch.dispatch(&order(3, 2)).unwrap();
        let err = dispatch.dispatch(&order(4, 2)).unwrap_err();
        assert_eq!(
            err,
            DispatchError::StopAlreadyAssigned { order_id: OrderId(4), stop: Stop(2), vehicle_id: 0 }
        );
    }

    #[test]
    fn test_every_stop_routed_exactly_once() {
        let fleet = SharedFleet::new(2);
        let dispatch = tier(fleet.clone(), line_matrix(), constraints(2, 3, 1000.0), 0.97);
        for (id, stop) in [(1, 3), (2, 1), (3, 4), (4, 2)] {
            dispatch.dispatch(&order(id, stop)).unwrap();
        }
        let state = fleet.snapshot();
        assert!(state.has_unique_stops());
        assert_eq!(state.stop_count(), 4);
        assert_eq!(state.revision(), 4);
    }

    fn tangled_fleet() -> SharedFleet {
        SharedFleet::from_state(FleetState::from_routes(vec![Route::from(vec![Stop(3), Stop(1), Stop(2)])]))
    }

    #[test]
    fn test_sufficient_tabu_improvement_is_committed() {
        let fleet = tangled_fleet();
        let dispatch = tier(fleet.clone(), line_matrix(), constraints(1, 10, 1000.0), 0.97);

        // Greedy puts stop 4 first: 4,3,1,2 costs 100; sorted order costs 80
        let result = dispatch.dispatch(&order(1, 4)).unwrap();
        assert_eq!(result.method, AssignmentMethod::Tabu);
        assert!(result.fleet_cost <= 0.97 * 100.0);
        assert_eq!(result.fleet_cost, fleet_cost(&fleet.snapshot(), &line_matrix()));
    }

    #[test]
    fn test_insufficient_tabu_improvement_commits_greedy_exactly() {
        let fleet = tangled_fleet();
        let m = line_matrix();
        let c = constraints(1, 10, 1000.0);
        let before = fleet.snapshot();
        let insertion = find_cheapest_insertion(&before, Stop(4), &m, &c).unwrap();
        let expected = apply_insertion(&before, Stop(4), &insertion);

        let dispatch = tier(fleet.clone(), m, c, 0.1);
        let result = dispatch.dispatch(&order(1, 4)).unwrap();

        assert_eq!(result.method, AssignmentMethod::Greedy);
        assert_eq!(result.new_route_cost, 100.0);
        assert_eq!(result.insertion_index, 0);
        assert!(fleet.snapshot().routes_equal(&expected));
    }

    #[test]
    fn test_config_rejects_bad_ratio() {
        let config = DispatchConfig { accept_ratio: 0.0, ..DispatchConfig::default() };
        assert!(config.validate().is_err());
        assert!(DispatchConfig::default().validate().is_ok());
    }
}
