use chrono::NaiveTime;

pub const DEFAULT_MATRIX_FILE: &str = "time_matrix.json";
pub const DEFAULT_CACHE_FILE: &str = "travel_time_cache.json";

pub const DEFAULT_VEHICLES: usize = 4;
pub const DEFAULT_MAX_STOPS_PER_ROUTE: usize = 10;
pub const DEFAULT_MAX_ROUTE_MINUTES: f64 = 150.0;

pub const DEFAULT_TABU_ITERATIONS: usize = 50;
pub const DEFAULT_TABU_TENURE: usize = 10;
pub const DEFAULT_TABU_ACCEPT_RATIO: f64 = 0.97;

pub const DEFAULT_BATCH_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_BATCH_BUDGET_SECS: u64 = 5;
pub const DEFAULT_BATCH_MAX_GENERATIONS: usize = 3000;
pub const DEFAULT_BATCH_ACCEPT_RATIO: f64 = 0.95;

pub const DEFAULT_TICK_MINUTES: u32 = 15;
pub const DEFAULT_ORDER_PROBABILITY: f64 = 0.9;
pub const DEFAULT_TICK_DELAY_MS: u64 = 1000;

pub const DEFAULT_START_HOUR: u32 = 9;
pub const DEFAULT_END_HOUR: u32 = 17;

pub fn default_day_start() -> NaiveTime {
    NaiveTime::from_hms_opt(DEFAULT_START_HOUR, 0, 0).unwrap_or_default()
}

pub fn default_day_end() -> NaiveTime {
    NaiveTime::from_hms_opt(DEFAULT_END_HOUR, 0, 0).unwrap_or_default()
}
