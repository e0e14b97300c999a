//! Adapter to build vrp-pragmatic inputs from a batch request.

use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use vrp_pragmatic::format::problem::Matrix;

use super::BatchRequest;
use crate::types::{Stop, TimeWindow};

pub const DEFAULT_PROFILE: &str = "car";
pub const DEFAULT_VEHICLE_TYPE: &str = "courier";

const JOB_PREFIX: &str = "stop_";
const VEHICLE_PREFIX: &str = "vehicle_";

/// Job id carries the global stop index so tours map straight back to stops
pub fn job_id(stop: Stop) -> String {
    format!("{}{}", JOB_PREFIX, stop.index())
}

pub fn parse_job_id(id: &str) -> Option<Stop> {
    id.strip_prefix(JOB_PREFIX)?.parse().ok().map(Stop)
}

pub(super) fn vehicle_id(index: usize) -> String {
    format!("{}{}", VEHICLE_PREFIX, index)
}

pub(super) fn parse_vehicle_id(id: &str) -> Option<usize> {
    id.strip_prefix(VEHICLE_PREFIX)?.parse().ok()
}

/// Build pragmatic problem JSON.
///
/// Every pool stop becomes a unit-demand delivery; vehicle capacity is the
/// stop cap and `limits.maxDuration` the duration cap. Only travel time is
/// priced, matching the dispatch cost model.
pub fn build_pragmatic_problem(request: &BatchRequest) -> Value {
    let jobs: Vec<Value> = request
        .pool
        .iter()
        .zip(&request.time_windows)
        .enumerate()
        .map(|(index, (&stop, window))| {
            let mut place = json!({
                "location": { "index": index + 1 },
                "duration": 0,
            });
            if let Some(window) = window {
                place["times"] = json!([time_span(request.shift_start, window)]);
            }

            json!({
                "id": job_id(stop),
                "deliveries": [{
                    "places": [place],
                    "demand": [1]
                }]
            })
        })
        .collect();

    let vehicle_ids: Vec<String> = (0..request.vehicle_count).map(vehicle_id).collect();
    let max_duration_secs = minutes_to_seconds(request.max_route_duration_minutes);

    json!({
        "plan": {
            "jobs": jobs
        },
        "fleet": {
            "vehicles": [{
                "typeId": DEFAULT_VEHICLE_TYPE,
                "vehicleIds": vehicle_ids,
                "profile": { "matrix": DEFAULT_PROFILE },
                "costs": {
                    "fixed": 0.0,
                    "distance": 0.0,
                    "time": 1.0
                },
                "shifts": [{
                    "start": {
                        "earliest": format_rfc3339(request.shift_start),
                        "location": { "index": 0 }
                    },
                    "end": {
                        "latest": format_rfc3339(request.shift_start + Duration::minutes(horizon_minutes(request))),
                        "location": { "index": 0 }
                    }
                }],
                "capacity": [request.max_stops_per_route],
                "limits": {
                    "maxDuration": max_duration_secs as f64
                }
            }],
            "profiles": [{
                "name": DEFAULT_PROFILE
            }]
        }
    })
}

/// Flatten the pool-local submatrix (minutes) into pragmatic seconds.
///
/// Distances mirror travel times since only time is priced.
pub fn build_pragmatic_matrix(request: &BatchRequest, profile: &str) -> Matrix {
    let travel_times: Vec<i64> = request
        .submatrix
        .iter()
        .flat_map(|row| row.iter().map(|&minutes| minutes_to_seconds(minutes)))
        .collect();

    Matrix {
        profile: Some(profile.to_string()),
        timestamp: None,
        distances: travel_times.clone(),
        travel_times,
        error_codes: None,
    }
}

/// Shift end must leave room for the latest window plus a full route
fn horizon_minutes(request: &BatchRequest) -> i64 {
    let latest_window = request
        .time_windows
        .iter()
        .flatten()
        .map(|w| w.latest_minute as i64)
        .max()
        .unwrap_or(0);
    latest_window + request.max_route_duration_minutes.ceil() as i64
}

fn time_span(origin: NaiveDateTime, window: &TimeWindow) -> [String; 2] {
    [
        format_rfc3339(origin + Duration::minutes(window.earliest_minute as i64)),
        format_rfc3339(origin + Duration::minutes(window.latest_minute as i64)),
    ]
}

fn minutes_to_seconds(minutes: f64) -> i64 {
    (minutes * 60.0).round() as i64
}

fn format_rfc3339(naive: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).to_rfc3339_opts(SecondsFormat::Secs, true)
}
