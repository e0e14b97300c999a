//! Route cost model
//!
//! Cost is total travel time in minutes: depot → first stop, every
//! consecutive hop, last stop → depot.

use crate::services::matrix::TravelTimeMatrix;
use crate::types::{FleetState, Stop, DEPOT};

/// Travel cost of one route over a stop slice. Empty route costs 0.
pub fn route_cost(stops: &[Stop], matrix: &TravelTimeMatrix) -> f64 {
    let (first, last) = match (stops.first(), stops.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return 0.0,
    };

    let hops: f64 = stops
        .windows(2)
        .map(|pair| matrix.time(pair[0], pair[1]))
        .sum();

    matrix.time(DEPOT, first) + hops + matrix.time(last, DEPOT)
}

/// Sum of route costs over the whole fleet
pub fn fleet_cost(fleet: &FleetState, matrix: &TravelTimeMatrix) -> f64 {
    fleet
        .routes()
        .iter()
        .map(|route| route_cost(route.stops(), matrix))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Route;

    fn matrix(rows: Vec<Vec<f64>>) -> TravelTimeMatrix {
        TravelTimeMatrix::new(rows).unwrap()
    }

    fn symmetric_4() -> TravelTimeMatrix {
        matrix(vec![
            vec![0.0, 10.0, 20.0, 30.0],
            vec![10.0, 0.0, 15.0, 25.0],
            vec![20.0, 15.0, 0.0, 12.0],
            vec![30.0, 25.0, 12.0, 0.0],
        ])
    }

    #[test]
    fn test_empty_route_costs_zero() {
        assert_eq!(route_cost(&[], &symmetric_4()), 0.0);
    }

    #[test]
    fn test_single_stop_is_out_and_back() {
        let m = symmetric_4();
        assert_eq!(route_cost(&[Stop(2)], &m), 40.0);
    }

    #[test]
    fn test_multi_stop_sums_hops() {
        let m = symmetric_4();
        // 0→1 (10) + 1→2 (15) + 2→3 (12) + 3→0 (30)
        assert_eq!(route_cost(&[Stop(1), Stop(2), Stop(3)], &m), 67.0);
    }

    #[test]
    fn test_symmetric_matrix_gives_reversal_invariant_cost() {
        let m = symmetric_4();
        let forward = route_cost(&[Stop(1), Stop(3), Stop(2)], &m);
        let backward = route_cost(&[Stop(2), Stop(3), Stop(1)], &m);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_asymmetric_matrix_is_respected() {
        let m = matrix(vec![
            vec![0.0, 5.0, 9.0],
            vec![7.0, 0.0, 1.0],
            vec![3.0, 8.0, 0.0],
        ]);
        // 0→1 (5) + 1→2 (1) + 2→0 (3)
        assert_eq!(route_cost(&[Stop(1), Stop(2)], &m), 9.0);
        // 0→2 (9) + 2→1 (8) + 1→0 (7)
        assert_eq!(route_cost(&[Stop(2), Stop(1)], &m), 24.0);
    }

    #[test]
    fn test_fleet_cost_sums_routes() {
        let m = symmetric_4();
        let fleet = FleetState::from_routes(vec![
            Route::from(vec![Stop(1)]),
            Route::new(),
            Route::from(vec![Stop(3), Stop(2)]),
        ]);
        // 20 + 0 + (30 + 12 + 20)
        assert_eq!(fleet_cost(&fleet, &m), 82.0);
    }
}
