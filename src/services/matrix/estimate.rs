//! Straight-line travel-time estimation and matrix building

use anyhow::{bail, Result};
use tracing::{debug, info};

use super::{MatrixFile, TravelTimeCache};
use crate::types::{Coordinates, Location};

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate Haversine distance between two points in kilometers
pub fn haversine_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    EARTH_RADIUS_KM * 2.0 * a.sqrt().asin()
}

/// Haversine distance × road coefficient at a constant average speed
#[derive(Debug, Clone)]
pub struct HaversineEstimator {
    /// Straight-line to road distance (default: 1.3)
    road_coefficient: f64,
    /// Average speed in km/h (default: 40)
    average_speed_kmh: f64,
}

impl Default for HaversineEstimator {
    fn default() -> Self {
        Self {
            road_coefficient: 1.3,
            average_speed_kmh: 40.0,
        }
    }
}

impl HaversineEstimator {
    #[cfg(test)]
    pub fn with_params(road_coefficient: f64, average_speed_kmh: f64) -> Self {
        Self {
            road_coefficient,
            average_speed_kmh,
        }
    }

    /// Estimated travel time in minutes
    pub fn travel_minutes(&self, from: &Coordinates, to: &Coordinates) -> f64 {
        let road_km = haversine_distance(from, to) * self.road_coefficient;
        road_km / self.average_speed_kmh * 60.0
    }
}

/// Build the full matrix for `locations` (depot first).
///
/// Pairs already in `cache` are reused; the rest are estimated and stored
/// back into the cache. Flushing the cache is left to the caller.
pub fn build_matrix_file(
    locations: Vec<Location>,
    cache: &mut TravelTimeCache,
    estimator: &HaversineEstimator,
) -> Result<MatrixFile> {
    if locations.is_empty() {
        bail!("No locations to build a matrix for");
    }

    let mut points = Vec::with_capacity(locations.len());
    for (index, location) in locations.iter().enumerate() {
        match location.coordinates() {
            Some(c) => points.push(c),
            None => bail!("Location {} ('{}') has no coordinates", index, location.name),
        }
    }

    let n = points.len();
    let cached_before = cache.len();
    if cache.is_empty() {
        debug!("Travel-time cache is empty, estimating every pair");
    }
    let mut time_matrix = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            time_matrix[i][j] =
                cache.get_or_insert_with(&points[i], &points[j], || estimator.travel_minutes(&points[i], &points[j]));
        }
        debug!("Computed travel times for location {}/{}", i + 1, n);
    }

    info!(
        locations = n,
        new_entries = cache.len() - cached_before,
        "Built travel-time matrix"
    );

    Ok(MatrixFile { locations, time_matrix })
}
