//! Dispatch engine services

pub mod batch;
pub mod cost;
pub mod dispatch;
pub mod fleet;
pub mod insertion;
pub mod matrix;
pub mod orders;
pub mod overflow;
pub mod simulation;
pub mod tabu;
pub mod vrp;
