//! Order ledger and pending queue
//!
//! Order ids are handed out in arrival order, so the pending set ordered by
//! id is the arrival queue. Rejected and dropped orders go back into it with
//! a reason code and keep their original place. A stop has at most one open
//! order (queued or assigned) at any time.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveTime;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::services::dispatch::DispatchTier;
use crate::types::{AssignmentResult, FleetState, Order, OrderId, OrderStatus, Stop, UnassignedReason};

#[derive(Debug, Clone)]
struct OrderRecord {
    order: Order,
    status: OrderStatus,
}

/// Reportable view of one order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderId,
    pub stop: Stop,
    pub placed_at: NaiveTime,
    #[serde(flatten)]
    pub status: OrderStatus,
}

#[derive(Debug, Default)]
pub struct OrderBook {
    records: BTreeMap<OrderId, OrderRecord>,
    pending: BTreeSet<OrderId>,
    next_id: u64,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new arrival at the back of the queue.
    ///
    /// `None` when the stop already has an open order.
    pub fn place(&mut self, stop: Stop, placed_at: NaiveTime) -> Option<Order> {
        if self.has_open_order(stop) {
            debug!("Stop {} already has an open order", stop);
            return None;
        }
        self.next_id += 1;
        let order = Order {
            id: OrderId(self.next_id),
            stop,
            placed_at,
        };
        self.records.insert(
            order.id,
            OrderRecord {
                order,
                status: OrderStatus::Unassigned { reason: UnassignedReason::AwaitingDispatch },
            },
        );
        self.pending.insert(order.id);
        Some(order)
    }

    #[cfg(test)]
    pub fn status(&self, id: OrderId) -> Option<OrderStatus> {
        self.records.get(&id).map(|r| r.status)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pending orders in arrival order
    pub fn pending(&self) -> Vec<Order> {
        self.pending
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| r.order))
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Queued or assigned order for `stop`, including one a batch run just
    /// dropped whose report has not been applied yet
    pub fn has_open_order(&self, stop: Stop) -> bool {
        self.records
            .values()
            .any(|r| r.order.stop == stop && (r.status.is_assigned() || self.pending.contains(&r.order.id)))
    }

    pub fn mark_assigned(&mut self, result: &AssignmentResult) {
        if let Some(record) = self.records.get_mut(&result.order_id) {
            record.status = OrderStatus::Assigned {
                vehicle_id: result.vehicle_id,
                method: result.method,
            };
            self.pending.remove(&result.order_id);
        }
    }

    /// Keep the order queued and remember why the last attempt failed
    pub fn mark_unassigned(&mut self, id: OrderId, reason: UnassignedReason) {
        if let Some(record) = self.records.get_mut(&id) {
            record.status = OrderStatus::Unassigned { reason };
            self.pending.insert(id);
        }
    }

    /// Put the assigned order for `stop` back into the queue
    pub fn requeue_stop(&mut self, stop: Stop, reason: UnassignedReason) -> Option<OrderId> {
        let id = self
            .records
            .values()
            .find(|r| r.order.stop == stop && r.status.is_assigned())
            .map(|r| r.order.id)?;
        self.mark_unassigned(id, reason);
        Some(id)
    }

    /// Empty the queue in arrival order, marking every order as overflow.
    ///
    /// An order whose stop is already on a fleet route is closed as
    /// `StopAlreadyAssigned` instead, so no stop lands on two routes.
    pub fn drain_pending(&mut self, routed: &FleetState) -> Vec<Order> {
        let mut drained = Vec::new();
        for order in self.pending() {
            let Some(record) = self.records.get_mut(&order.id) else {
                continue;
            };
            if routed.contains(order.stop) {
                warn!("Order {} not sent to overflow: stop {} is already routed", order.id, order.stop);
                record.status = OrderStatus::Unassigned { reason: UnassignedReason::StopAlreadyAssigned };
            } else {
                record.status = OrderStatus::Overflow;
                drained.push(order);
            }
        }
        self.pending.clear();
        drained
    }

    pub fn assigned_count(&self) -> usize {
        self.records.values().filter(|r| r.status.is_assigned()).count()
    }

    pub fn summaries(&self) -> Vec<OrderSummary> {
        self.records
            .values()
            .map(|r| OrderSummary {
                id: r.order.id,
                stop: r.order.stop,
                placed_at: r.order.placed_at,
                status: r.status,
            })
            .collect()
    }
}

/// Smart queue: try pending orders oldest first, commit the first that fits.
///
/// At most one order is assigned per call. Every order tried before it keeps
/// its rejection reason and stays queued.
pub fn dispatch_next(book: &mut OrderBook, tier: &DispatchTier) -> Option<AssignmentResult> {
    for order in book.pending() {
        match tier.dispatch(&order) {
            Ok(result) => {
                book.mark_assigned(&result);
                return Some(result);
            }
            Err(err) => {
                debug!("Order {} stays queued: {}", order.id, err);
                book.mark_unassigned(order.id, err.reason());
            }
        }
    }

    if book.pending_count() > 0 {
        info!(pending = book.pending_count(), "No pending order fits the fleet this tick");
    }
    None
}
