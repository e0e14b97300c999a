//! Travel-time matrix and location table
//!
//! The matrix is precomputed by the matrix builder (or any external
//! collaborator) and stays immutable for a planning session.

mod cache;
mod estimate;

pub use cache::TravelTimeCache;
pub use estimate::{build_matrix_file, haversine_distance, HaversineEstimator};

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::types::{Location, Stop, TimeWindow};

/// Validated N×N travel times in minutes
#[derive(Debug, Clone, PartialEq)]
pub struct TravelTimeMatrix {
    times: Vec<Vec<f64>>,
}

impl TravelTimeMatrix {
    /// Validate and wrap raw rows.
    ///
    /// Rejects empty and non-square matrices, negative or non-finite entries,
    /// and a non-zero diagonal.
    pub fn new(times: Vec<Vec<f64>>) -> Result<Self, ConfigError> {
        let size = times.len();
        if size == 0 {
            return Err(ConfigError::EmptyMatrix);
        }

        for (from, row) in times.iter().enumerate() {
            if row.len() != size {
                return Err(ConfigError::NonSquareMatrix { row: from, expected: size, found: row.len() });
            }
            for (to, &value) in row.iter().enumerate() {
                if !value.is_finite() {
                    return Err(ConfigError::NonFiniteCost { from, to });
                }
                if value < 0.0 {
                    return Err(ConfigError::NegativeCost { from, to, value });
                }
                if from == to && value != 0.0 {
                    return Err(ConfigError::NonZeroDiagonal { index: from, value });
                }
            }
        }

        Ok(Self { times })
    }

    /// Number of locations including the depot
    pub fn size(&self) -> usize {
        self.times.len()
    }

    /// Travel time from one stop to another in minutes
    pub fn time(&self, from: Stop, to: Stop) -> f64 {
        self.times[from.index()][to.index()]
    }

    /// True for indices 1..N (a real customer, not the depot)
    pub fn is_customer(&self, stop: Stop) -> bool {
        !stop.is_depot() && stop.index() < self.size()
    }
}

/// On-disk matrix format: `{ "locations": [...], "time_matrix": [[...]] }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixFile {
    pub locations: Vec<Location>,
    #[serde(alias = "timeMatrix")]
    pub time_matrix: Vec<Vec<f64>>,
}

/// Location table plus matching matrix, loaded once at startup
#[derive(Debug, Clone)]
pub struct PlanningData {
    pub locations: Vec<Location>,
    /// Shared read-only with both dispatch tiers
    pub matrix: Arc<TravelTimeMatrix>,
}

impl PlanningData {
    pub fn new(locations: Vec<Location>, matrix: TravelTimeMatrix) -> Result<Self, ConfigError> {
        if locations.len() != matrix.size() {
            return Err(ConfigError::LocationCountMismatch {
                locations: locations.len(),
                matrix: matrix.size(),
            });
        }
        Ok(Self { locations, matrix: Arc::new(matrix) })
    }

    pub fn from_file(file: MatrixFile) -> Result<Self> {
        let matrix = TravelTimeMatrix::new(file.time_matrix)?;
        Ok(Self::new(file.locations, matrix)?)
    }

    /// Load `time_matrix.json`
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read matrix file '{}'", path.display()))?;
        let file: MatrixFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse matrix file '{}'", path.display()))?;
        let data = Self::from_file(file)
            .with_context(|| format!("Invalid matrix file '{}'", path.display()))?;

        info!(
            locations = data.locations.len(),
            "Loaded travel-time matrix from {}",
            path.display()
        );
        Ok(data)
    }

    /// Display label for a stop, falling back to its index
    pub fn label(&self, stop: Stop) -> String {
        self.locations
            .get(stop.index())
            .map(|l| l.label().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| stop.to_string())
    }

    /// Per-stop time windows, indexed like the matrix
    pub fn time_windows(&self) -> Vec<Option<TimeWindow>> {
        self.locations.iter().map(Location::time_window).collect()
    }

    /// Customer stops (every index except the depot)
    pub fn customer_stops(&self) -> Vec<Stop> {
        (1..self.matrix.size()).map(Stop).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_matrix() {
        assert_eq!(TravelTimeMatrix::new(vec![]), Err(ConfigError::EmptyMatrix));
    }

    #[test]
    fn test_rejects_non_square_matrix() {
        let err = TravelTimeMatrix::new(vec![vec![0.0, 1.0], vec![1.0]]).unwrap_err();
        assert_eq!(err, ConfigError::NonSquareMatrix { row: 1, expected: 2, found: 1 });
    }

    #[test]
    fn test_rejects_negative_cost() {
        let err = TravelTimeMatrix::new(vec![vec![0.0, -3.0], vec![1.0, 0.0]]).unwrap_err();
        assert_eq!(err, ConfigError::NegativeCost { from: 0, to: 1, value: -3.0 });
    }

    #[test]
    fn test_rejects_nan_and_diagonal() {
        assert!(matches!(
            TravelTimeMatrix::new(vec![vec![0.0, f64::NAN], vec![1.0, 0.0]]),
            Err(ConfigError::NonFiniteCost { from: 0, to: 1 })
        ));
        assert!(matches!(
            TravelTimeMatrix::new(vec![vec![0.0, 1.0], vec![1.0, 2.0]]),
            Err(ConfigError::NonZeroDiagonal { index: 1, .. })
        ));
    }

    #[test]
    fn test_is_customer_excludes_depot_and_out_of_range() {
        let m = TravelTimeMatrix::new(vec![vec![0.0; 3]; 3]).unwrap();
        assert!(!m.is_customer(Stop(0)));
        assert!(m.is_customer(Stop(2)));
        assert!(!m.is_customer(Stop(3)));
    }

    #[test]
    fn test_planning_data_parses_original_format() {
        let json = r#"{
            "locations": [
                {"original_address": "Swaad, Connaught Place", "latitude": 28.63, "longitude": 77.21},
                {"original_address": "Saket, Delhi NCR", "latitude": 28.52, "longitude": 77.21}
            ],
            "time_matrix": [[0, 35.5], [33.0, 0]]
        }"#;
        let file: MatrixFile = serde_json::from_str(json).unwrap();
        let data = PlanningData::from_file(file).unwrap();
        assert_eq!(data.matrix.time(Stop(0), Stop(1)), 35.5);
        assert_eq!(data.label(Stop(0)), "Swaad");
        assert_eq!(data.label(Stop(1)), "Saket");
        assert_eq!(data.customer_stops(), vec![Stop(1)]);
    }

    #[test]
    fn test_planning_data_rejects_mismatched_lengths() {
        let m = TravelTimeMatrix::new(vec![vec![0.0; 2]; 2]).unwrap();
        let err = PlanningData::new(vec![], m).unwrap_err();
        assert_eq!(err, ConfigError::LocationCountMismatch { locations: 0, matrix: 2 });
    }
}
