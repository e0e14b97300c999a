//! Cheapest feasible insertion of a single stop into the fleet.

use crate::config::Constraints;
use crate::services::cost::route_cost;
use crate::services::matrix::TravelTimeMatrix;
use crate::types::{FleetState, Stop, VehicleId};

/// One candidate insertion point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Insertion {
    pub vehicle_id: VehicleId,
    /// Position in the route (0 = right after the depot)
    pub index: usize,
    pub cost_increase: f64,
    pub new_route_cost: f64,
}

/// Every feasible insertion position of `stop` into one vehicle's route.
///
/// Returns positions in index order; empty when the route is already at the
/// stop cap or no position stays within the duration cap.
pub fn calculate_insertion_positions(
    fleet: &FleetState,
    vehicle_id: VehicleId,
    stop: Stop,
    matrix: &TravelTimeMatrix,
    constraints: &Constraints,
) -> Vec<Insertion> {
    let route = match fleet.route(vehicle_id) {
        Some(route) if route.len() < constraints.max_stops_per_route => route,
        _ => return vec![],
    };

    let original_cost = route_cost(route.stops(), matrix);
    let mut candidate = Vec::with_capacity(route.len() + 1);
    let mut positions = Vec::with_capacity(route.len() + 1);

    for index in 0..=route.len() {
        candidate.clear();
        candidate.extend_from_slice(&route.stops()[..index]);
        candidate.push(stop);
        candidate.extend_from_slice(&route.stops()[index..]);

        let new_route_cost = route_cost(&candidate, matrix);
        if new_route_cost > constraints.max_route_duration_minutes {
            continue;
        }

        positions.push(Insertion {
            vehicle_id,
            index,
            cost_increase: new_route_cost - original_cost,
            new_route_cost,
        });
    }

    positions
}

/// Cheapest feasible insertion across the whole fleet.
///
/// Ties keep the first candidate in (vehicle, position) order. `None` means
/// no vehicle can take the stop under the current constraints.
pub fn find_cheapest_insertion(
    fleet: &FleetState,
    stop: Stop,
    matrix: &TravelTimeMatrix,
    constraints: &Constraints,
) -> Option<Insertion> {
    let mut best: Option<Insertion> = None;

    for vehicle_id in 0..fleet.vehicle_count() {
        for candidate in calculate_insertion_positions(fleet, vehicle_id, stop, matrix, constraints) {
            let better = best.map_or(true, |b| candidate.cost_increase < b.cost_increase);
            if better {
                best = Some(candidate);
            }
        }
    }

    best
}

/// Working copy of `fleet` with `insertion` applied
pub fn apply_insertion(fleet: &FleetState, stop: Stop, insertion: &Insertion) -> FleetState {
    let mut candidate = fleet.clone();
    if let Some(route) = candidate.route_mut(insertion.vehicle_id) {
        route.insert(insertion.index, stop);
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Route;

    fn constraints(vehicles: usize, max_stops: usize, max_minutes: f64) -> Constraints {
        Constraints {
            vehicle_count: vehicles,
            max_stops_per_route: max_stops,
            max_route_duration_minutes: max_minutes,
        }
    }

    fn fleet(routes: Vec<Vec<usize>>) -> FleetState {
        FleetState::from_routes(
            routes
                .into_iter()
                .map(|r| Route::from(r.into_iter().map(Stop).collect::<Vec<_>>()))
                .collect(),
        )
    }

    /// depot=0, stops 1..3
    fn matrix_4() -> TravelTimeMatrix {
        TravelTimeMatrix::new(vec![
            vec![0.0, 10.0, 12.0, 30.0],
            vec![10.0, 0.0, 4.0, 25.0],
            vec![12.0, 4.0, 0.0, 20.0],
            vec![30.0, 25.0, 20.0, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_first_stop_into_empty_fleet_goes_to_vehicle_zero() {
        let m = matrix_4();
        let state = FleetState::new(2);
        let best = find_cheapest_insertion(&state, Stop(1), &m, &constraints(2, 2, 100.0)).unwrap();
        assert_eq!(best.vehicle_id, 0);
        assert_eq!(best.index, 0);
        assert_eq!(best.new_route_cost, m.time(Stop(0), Stop(1)) + m.time(Stop(1), Stop(0)));
    }

    #[test]
    fn test_second_stop_considers_both_positions_and_vehicles() {
        let m = matrix_4();
        let state = fleet(vec![vec![1], vec![]]);
        let c = constraints(2, 2, 100.0);

        let positions = calculate_insertion_positions(&state, 0, Stop(2), &m, &c);
        assert_eq!(positions.len(), 2);
        // before stop 1: 0→2→1→0 = 12 + 4 + 10 = 26, increase 6
        assert_eq!(positions[0].new_route_cost, 26.0);
        // after stop 1: 0→1→2→0 = 10 + 4 + 12 = 26, increase 6
        assert_eq!(positions[1].new_route_cost, 26.0);

        let empty_vehicle = calculate_insertion_positions(&state, 1, Stop(2), &m, &c);
        assert_eq!(empty_vehicle.len(), 1);
        assert_eq!(empty_vehicle[0].cost_increase, 24.0);

        // Tie between both positions on vehicle 0 resolves to the first
        let best = find_cheapest_insertion(&state, Stop(2), &m, &c).unwrap();
        assert_eq!((best.vehicle_id, best.index), (0, 0));
        assert_eq!(best.cost_increase, 6.0);
    }

    #[test]
    fn test_full_vehicle_is_skipped() {
        let m = matrix_4();
        let state = fleet(vec![vec![1, 2], vec![]]);
        let c = constraints(2, 2, 100.0);

        assert!(calculate_insertion_positions(&state, 0, Stop(3), &m, &c).is_empty());
        let best = find_cheapest_insertion(&state, Stop(3), &m, &c).unwrap();
        assert_eq!(best.vehicle_id, 1);
    }

    #[test]
    fn test_duration_cap_filters_positions() {
        let m = matrix_4();
        let state = FleetState::new(1);
        // 0→3→0 = 60 > 50
        assert!(find_cheapest_insertion(&state, Stop(3), &m, &constraints(1, 5, 50.0)).is_none());
        // exactly at the cap is feasible
        let best = find_cheapest_insertion(&state, Stop(3), &m, &constraints(1, 5, 60.0)).unwrap();
        assert_eq!(best.new_route_cost, 60.0);
    }

    #[test]
    fn test_returned_insertion_never_exceeds_duration_cap() {
        let m = matrix_4();
        let state = fleet(vec![vec![1], vec![2]]);
        for cap in [20.0, 30.0, 45.0, 60.0, 80.0] {
            let c = constraints(2, 3, cap);
            if let Some(best) = find_cheapest_insertion(&state, Stop(3), &m, &c) {
                assert!(best.new_route_cost <= cap);
                let applied = apply_insertion(&state, Stop(3), &best);
                let route = applied.route(best.vehicle_id).unwrap();
                assert!(route_cost(route.stops(), &m) <= cap);
            }
        }
    }

    #[test]
    fn test_apply_insertion_leaves_original_untouched() {
        let m = matrix_4();
        let state = fleet(vec![vec![1], vec![]]);
        let best = find_cheapest_insertion(&state, Stop(2), &m, &constraints(2, 2, 100.0)).unwrap();
        let candidate = apply_insertion(&state, Stop(2), &best);
        assert_eq!(state.route(0).unwrap().stops(), &[Stop(1)]);
        assert_eq!(candidate.route(0).unwrap().stops(), &[Stop(2), Stop(1)]);
    }
}
