//! Stop and location types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Matrix index of the depot
pub const DEPOT: Stop = Stop(0);

/// Index into the location table (0 = depot, 1..N = customers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stop(pub usize);

impl Stop {
    pub const fn index(self) -> usize {
        self.0
    }

    pub const fn is_depot(self) -> bool {
        self.0 == DEPOT.0
    }
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// GPS coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Delivery window in minutes from the start of the service day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub earliest_minute: u32,
    pub latest_minute: u32,
}

/// One row of the location table shared with the travel-time matrix.
///
/// Field aliases accept the column names produced by the geocoding and
/// time-window preparation scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(alias = "original_address", alias = "formatted_address", default)]
    pub name: String,
    #[serde(alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: Option<f64>,
    #[serde(alias = "earliest_time", default)]
    pub earliest_minute: Option<u32>,
    #[serde(alias = "latest_time", default)]
    pub latest_minute: Option<u32>,
}

impl Location {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }

    pub fn time_window(&self) -> Option<TimeWindow> {
        match (self.earliest_minute, self.latest_minute) {
            (Some(earliest_minute), Some(latest_minute)) if earliest_minute <= latest_minute => {
                Some(TimeWindow { earliest_minute, latest_minute })
            }
            _ => None,
        }
    }

    /// Short display label (first comma-separated part of the name)
    pub fn label(&self) -> &str {
        self.name.split(',').next().unwrap_or("").trim()
    }
}
