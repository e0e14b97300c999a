//! Order types

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Stop, VehicleId};

/// Order identifier (arrival counter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Pending delivery request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub stop: Stop,
    /// Simulation clock time at which the order arrived
    pub placed_at: NaiveTime,
}

/// Which Layer 1 stage produced the committed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMethod {
    Greedy,
    Tabu,
}

impl AssignmentMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            AssignmentMethod::Greedy => "greedy",
            AssignmentMethod::Tabu => "tabu",
        }
    }
}

/// Why an order is (back) in the unassigned state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    /// Waiting for its first attempt
    AwaitingDispatch,
    /// No vehicle/position satisfied the constraints
    InfeasibleInsertion,
    /// Stop index outside the location table, or the depot
    UnknownStop,
    /// The stop is already routed for another order
    StopAlreadyAssigned,
    /// A batch re-optimization installed routes without this stop
    DroppedByBatch,
}

impl UnassignedReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            UnassignedReason::AwaitingDispatch => "awaiting_dispatch",
            UnassignedReason::InfeasibleInsertion => "infeasible_insertion",
            UnassignedReason::UnknownStop => "unknown_stop",
            UnassignedReason::StopAlreadyAssigned => "stop_already_assigned",
            UnassignedReason::DroppedByBatch => "dropped_by_batch",
        }
    }
}

/// Order lifecycle as seen from outside the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrderStatus {
    Unassigned { reason: UnassignedReason },
    Assigned { vehicle_id: VehicleId, method: AssignmentMethod },
    /// Drained into the fallback route at horizon end
    Overflow,
}

impl OrderStatus {
    pub const fn is_assigned(&self) -> bool {
        matches!(self, OrderStatus::Assigned { .. })
    }
}

/// Outcome of one successful Layer 1 dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResult {
    pub order_id: OrderId,
    pub vehicle_id: VehicleId,
    /// Position of the stop in the committed route
    pub insertion_index: usize,
    pub method: AssignmentMethod,
    /// Cost of the vehicle's route after commit (minutes)
    pub new_route_cost: f64,
    /// Total fleet cost after commit (minutes)
    pub fleet_cost: f64,
}
