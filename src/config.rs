//! Configuration management

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{self, Context, Result};
use chrono::{NaiveDate, NaiveTime, Utc};

use crate::defaults::*;
use crate::error::ConfigError;
use crate::services::batch::BatchConfig;
use crate::services::dispatch::DispatchConfig;
use crate::services::simulation::SimulationConfig;
use crate::services::tabu::TabuConfig;

/// Hard per-route limits, constant for a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraints {
    pub vehicle_count: usize,
    pub max_stops_per_route: usize,
    /// Cap on a route's travel cost (minutes), depot to depot
    pub max_route_duration_minutes: f64,
}

impl Constraints {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vehicle_count == 0 {
            return Err(ConfigError::ZeroVehicles);
        }
        if self.max_stops_per_route == 0 {
            return Err(ConfigError::ZeroStopCap);
        }
        if !self.max_route_duration_minutes.is_finite() || self.max_route_duration_minutes <= 0.0 {
            return Err(ConfigError::InvalidDuration(self.max_route_duration_minutes));
        }
        Ok(())
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            vehicle_count: DEFAULT_VEHICLES,
            max_stops_per_route: DEFAULT_MAX_STOPS_PER_ROUTE,
            max_route_duration_minutes: DEFAULT_MAX_ROUTE_MINUTES,
        }
    }
}

/// Ratios are fractions of the previous cost a new state must reach
pub fn validate_ratio(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidRatio { name, value })
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Precomputed `time_matrix.json`
    pub matrix_file: PathBuf,

    /// Travel-time cache used by the matrix builder
    pub cache_file: PathBuf,

    pub constraints: Constraints,

    pub dispatch: DispatchConfig,

    pub batch: BatchConfig,

    pub simulation: SimulationConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup (environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let matrix_file = get("DISPATCH_MATRIX_FILE")
            .unwrap_or_else(|| DEFAULT_MATRIX_FILE.to_string())
            .into();
        let cache_file = get("DISPATCH_CACHE_FILE")
            .unwrap_or_else(|| DEFAULT_CACHE_FILE.to_string())
            .into();

        let constraints = Constraints {
            vehicle_count: parse_or(&get, "DISPATCH_VEHICLES", DEFAULT_VEHICLES)?,
            max_stops_per_route: parse_or(&get, "DISPATCH_MAX_STOPS", DEFAULT_MAX_STOPS_PER_ROUTE)?,
            max_route_duration_minutes: parse_or(&get, "DISPATCH_MAX_ROUTE_MINUTES", DEFAULT_MAX_ROUTE_MINUTES)?,
        };
        constraints.validate()?;

        let dispatch = DispatchConfig {
            tabu: TabuConfig {
                iterations: parse_or(&get, "DISPATCH_TABU_ITERATIONS", DEFAULT_TABU_ITERATIONS)?,
                tenure: parse_or(&get, "DISPATCH_TABU_TENURE", DEFAULT_TABU_TENURE)?,
            },
            accept_ratio: parse_or(&get, "DISPATCH_TABU_ACCEPT_RATIO", DEFAULT_TABU_ACCEPT_RATIO)?,
        };
        dispatch.validate()?;

        let batch = BatchConfig {
            interval: Duration::from_secs(parse_or(&get, "DISPATCH_BATCH_INTERVAL_SECS", DEFAULT_BATCH_INTERVAL_SECS)?),
            solve_budget: Duration::from_secs(parse_or(&get, "DISPATCH_BATCH_BUDGET_SECS", DEFAULT_BATCH_BUDGET_SECS)?),
            max_generations: parse_or(&get, "DISPATCH_BATCH_MAX_GENERATIONS", DEFAULT_BATCH_MAX_GENERATIONS)?,
            accept_ratio: parse_or(&get, "DISPATCH_BATCH_ACCEPT_RATIO", DEFAULT_BATCH_ACCEPT_RATIO)?,
        };
        batch.validate()?;

        let start_hour: u32 = parse_or(&get, "SIM_START_HOUR", DEFAULT_START_HOUR)?;
        let end_hour: u32 = parse_or(&get, "SIM_END_HOUR", DEFAULT_END_HOUR)?;
        let day_start = hour(start_hour).context("SIM_START_HOUR must be 0-23")?;
        let day_end = hour(end_hour).context("SIM_END_HOUR must be 0-23")?;
        if day_end <= day_start {
            anyhow::bail!("SIM_END_HOUR ({}) must be after SIM_START_HOUR ({})", end_hour, start_hour);
        }

        let tick_minutes: u32 = parse_or(&get, "SIM_TICK_MINUTES", DEFAULT_TICK_MINUTES)?;
        if tick_minutes == 0 {
            anyhow::bail!("SIM_TICK_MINUTES must be at least 1");
        }

        let order_probability: f64 = parse_or(&get, "SIM_ORDER_PROBABILITY", DEFAULT_ORDER_PROBABILITY)?;
        if !(0.0..=1.0).contains(&order_probability) {
            anyhow::bail!("SIM_ORDER_PROBABILITY must be within [0, 1], got {}", order_probability);
        }

        let service_date = match get("SIM_DATE") {
            Some(raw) => NaiveDate::from_str(&raw).with_context(|| format!("SIM_DATE '{}' is not YYYY-MM-DD", raw))?,
            None => Utc::now().date_naive(),
        };

        let seed = match get("SIM_SEED") {
            Some(raw) => Some(raw.parse().with_context(|| format!("SIM_SEED '{}' is not a number", raw))?),
            None => None,
        };

        let simulation = SimulationConfig {
            day_start,
            day_end,
            tick_minutes,
            order_probability,
            tick_delay: Duration::from_millis(parse_or(&get, "SIM_TICK_DELAY_MS", DEFAULT_TICK_DELAY_MS)?),
            seed,
            service_date,
        };

        Ok(Self {
            matrix_file,
            cache_file,
            constraints,
            dispatch,
            batch,
            simulation,
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}

fn hour(h: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(h, 0, 0)
}
