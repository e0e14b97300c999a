//! Error taxonomy of the dispatch engine

use thiserror::Error;

use crate::types::{OrderId, Stop, UnassignedReason, VehicleId};

/// Invalid startup input. Fatal: the engine refuses to start.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("travel-time matrix is empty")]
    EmptyMatrix,

    #[error("travel-time matrix row {row} has {found} entries, expected {expected}")]
    NonSquareMatrix { row: usize, expected: usize, found: usize },

    #[error("negative travel time {value} from {from} to {to}")]
    NegativeCost { from: usize, to: usize, value: f64 },

    #[error("non-finite travel time from {from} to {to}")]
    NonFiniteCost { from: usize, to: usize },

    #[error("travel time from location {index} to itself must be 0, found {value}")]
    NonZeroDiagonal { index: usize, value: f64 },

    #[error("location table has {locations} rows but the matrix has {matrix}")]
    LocationCountMismatch { locations: usize, matrix: usize },

    #[error("fleet must have at least one vehicle")]
    ZeroVehicles,

    #[error("max stops per route must be at least 1")]
    ZeroStopCap,

    #[error("max route duration must be positive and finite, got {0}")]
    InvalidDuration(f64),

    #[error("{name} must be in (0, 1], got {value}")]
    InvalidRatio { name: &'static str, value: f64 },

    #[error("batch interval must be non-zero")]
    ZeroBatchInterval,
}

/// Layer 1 rejection of a single order. Recoverable: the caller owns retry policy.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("order {order_id}: no vehicle can take stop {stop} within the route constraints")]
    InfeasibleInsertion { order_id: OrderId, stop: Stop },

    #[error("order {order_id}: stop {stop} is not a customer location")]
    UnknownStop { order_id: OrderId, stop: Stop },

    #[error("order {order_id}: stop {stop} is already routed on vehicle {vehicle_id}")]
    StopAlreadyAssigned { order_id: OrderId, stop: Stop, vehicle_id: VehicleId },
}

impl DispatchError {
    /// Reason code recorded on the order while it waits for a retry
    pub fn reason(&self) -> UnassignedReason {
        match self {
            DispatchError::InfeasibleInsertion { .. } => UnassignedReason::InfeasibleInsertion,
            DispatchError::UnknownStop { .. } => UnassignedReason::UnknownStop,
            DispatchError::StopAlreadyAssigned { .. } => UnassignedReason::StopAlreadyAssigned,
        }
    }
}

/// Batch solver failure. Layer 2 leaves the fleet unchanged on any of these.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("solver exceeded its {budget_secs}s budget")]
    Timeout { budget_secs: u64 },

    #[error("solver returned no solution")]
    NoSolution,

    #[error("solver proposal rejected: {0}")]
    InvalidProposal(String),

    #[error("solver failed: {0:#}")]
    Failed(#[from] anyhow::Error),
}
