//! Batch solver configuration

use std::time::Duration;

use crate::defaults::{DEFAULT_BATCH_BUDGET_SECS, DEFAULT_BATCH_MAX_GENERATIONS};

/// Termination limits handed to the batch solver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverConfig {
    /// Maximum solving time in seconds
    pub max_time_seconds: u64,
    /// Maximum generations for the metaheuristic
    pub max_generations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_time_seconds: DEFAULT_BATCH_BUDGET_SECS,
            max_generations: DEFAULT_BATCH_MAX_GENERATIONS,
        }
    }
}

impl SolverConfig {
    pub fn new(max_time_seconds: u64, max_generations: usize) -> Self {
        Self {
            max_time_seconds,
            max_generations,
        }
    }

    /// Minimal solve time for tests
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            max_time_seconds: 1,
            max_generations: 200,
        }
    }

    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.max_time_seconds)
    }
}
