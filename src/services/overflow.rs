//! End-of-horizon fallback route
//!
//! Whatever is still queued when the day ends goes on one extra vehicle in
//! arrival order. No stop or duration cap applies.

use serde::Serialize;
use tracing::{info, warn};

use crate::services::cost::route_cost;
use crate::services::matrix::TravelTimeMatrix;
use crate::types::{Order, OrderId, Stop};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverflowRoute {
    pub orders: Vec<OrderId>,
    pub stops: Vec<Stop>,
    /// Depot → stops → depot, minutes
    pub cost: f64,
}

/// `None` when nothing was left over
pub fn build_overflow_route(orders: &[Order], matrix: &TravelTimeMatrix) -> Option<OverflowRoute> {
    if orders.is_empty() {
        info!("No overflow: every order was routed");
        return None;
    }

    let stops: Vec<Stop> = orders.iter().map(|o| o.stop).collect();
    let cost = route_cost(&stops, matrix);
    warn!(
        orders = orders.len(),
        cost,
        "Unrouted orders drained into the fallback route"
    );

    Some(OverflowRoute {
        orders: orders.iter().map(|o| o.id).collect(),
        stops,
        cost,
    })
}
