//! Tabu-search refinement over a complete fleet assignment.
//!
//! The neighbourhood is every pairwise position swap inside a single
//! vehicle's route. Moves never cross vehicles, so a stop stays on the
//! vehicle the greedy step put it on.

use std::collections::VecDeque;

use tracing::trace;

use crate::config::Constraints;
use crate::defaults::{DEFAULT_TABU_ITERATIONS, DEFAULT_TABU_TENURE};
use crate::services::cost::{fleet_cost, route_cost};
use crate::services::matrix::TravelTimeMatrix;
use crate::types::{FleetState, Stop, VehicleId};

/// Configuration for the tabu refiner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabuConfig {
    /// Upper bound on search steps
    pub iterations: usize,
    /// How many recent swaps stay forbidden
    pub tenure: usize,
}

impl Default for TabuConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_TABU_ITERATIONS,
            tenure: DEFAULT_TABU_TENURE,
        }
    }
}

/// Bounded FIFO of recently swapped stop pairs
#[derive(Debug, Clone)]
pub struct TabuList {
    pairs: VecDeque<(Stop, Stop)>,
    tenure: usize,
}

impl TabuList {
    pub fn new(tenure: usize) -> Self {
        Self {
            pairs: VecDeque::with_capacity(tenure),
            tenure,
        }
    }

    /// Record a swap, evicting the oldest entry once at capacity
    pub fn push(&mut self, a: Stop, b: Stop) {
        if self.tenure == 0 {
            return;
        }
        if self.pairs.len() == self.tenure {
            self.pairs.pop_front();
        }
        self.pairs.push_back((a, b));
    }

    /// Pair is forbidden in either order
    pub fn contains(&self, a: Stop, b: Stop) -> bool {
        self.pairs.iter().any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Best admissible swap of one iteration
#[derive(Debug, Clone, Copy)]
struct SwapMove {
    vehicle_id: VehicleId,
    i: usize,
    j: usize,
    cost_change: f64,
}

/// Result of a refinement run
#[derive(Debug, Clone)]
pub struct Refinement {
    /// Best fleet seen across all iterations
    pub fleet: FleetState,
    pub cost: f64,
    /// Steps actually taken before the budget ran out or the neighbourhood emptied
    pub iterations: usize,
}

pub struct TabuRefiner {
    config: TabuConfig,
}

impl TabuRefiner {
    pub fn new(config: TabuConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TabuConfig {
        &self.config
    }

    /// Improve `initial` without breaking the duration cap.
    ///
    /// Each step applies the single cheapest non-tabu swap across the fleet,
    /// even when it makes the route worse, and the best state seen is
    /// returned. The returned cost is never above the input cost.
    pub fn refine(
        &self,
        initial: &FleetState,
        matrix: &TravelTimeMatrix,
        constraints: &Constraints,
    ) -> Refinement {
        let mut current = initial.clone();
        let mut current_cost = fleet_cost(&current, matrix);
        let mut best = current.clone();
        let mut best_cost = current_cost;
        let mut tabu = TabuList::new(self.config.tenure);
        let mut iterations = 0;

        for _ in 0..self.config.iterations {
            let Some(step) = best_move(&current, &tabu, matrix, constraints) else {
                break;
            };
            iterations += 1;

            if let Some(route) = current.route_mut(step.vehicle_id) {
                let (a, b) = (route.stops()[step.i], route.stops()[step.j]);
                route.swap(step.i, step.j);
                tabu.push(a, b);
            }
            current_cost += step.cost_change;

            trace!(
                vehicle = step.vehicle_id,
                i = step.i,
                j = step.j,
                change = step.cost_change,
                "Tabu step"
            );

            if current_cost < best_cost {
                best = current.clone();
                best_cost = current_cost;
            }
        }

        Refinement {
            cost: fleet_cost(&best, matrix),
            fleet: best,
            iterations,
        }
    }
}

impl Default for TabuRefiner {
    fn default() -> Self {
        Self::new(TabuConfig::default())
    }
}

/// Cheapest admissible swap, first found wins ties (vehicle, i, j order)
fn best_move(
    fleet: &FleetState,
    tabu: &TabuList,
    matrix: &TravelTimeMatrix,
    constraints: &Constraints,
) -> Option<SwapMove> {
    let mut best: Option<SwapMove> = None;
    let mut swapped: Vec<Stop> = Vec::new();

    for (vehicle_id, route) in fleet.routes().iter().enumerate() {
        if route.len() < 2 {
            continue;
        }
        let stops = route.stops();
        let original_cost = route_cost(stops, matrix);

        for i in 0..stops.len() {
            for j in (i + 1)..stops.len() {
                if tabu.contains(stops[i], stops[j]) {
                    continue;
                }

                swapped.clear();
                swapped.extend_from_slice(stops);
                swapped.swap(i, j);

                let new_cost = route_cost(&swapped, matrix);
                if new_cost > constraints.max_route_duration_minutes {
                    continue;
                }

                let cost_change = new_cost - original_cost;
                if best.map_or(true, |b| cost_change < b.cost_change) {
                    best = Some(SwapMove { vehicle_id, i, j, cost_change });
                }
            }
        }
    }

    best
}
