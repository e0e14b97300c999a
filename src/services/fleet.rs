//! Shared fleet state guarded for the two dispatch tiers
//!
//! Layer 1 commits and Layer 2 installs both go through the one mutex.
//! No caller may hold the guard across an `.await`.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{FleetState, Route};

#[derive(Clone)]
pub struct SharedFleet {
    inner: Arc<Mutex<FleetState>>,
}

impl SharedFleet {
    /// Empty routes for `vehicle_count` vehicles
    pub fn new(vehicle_count: usize) -> Self {
        Self::from_state(FleetState::new(vehicle_count))
    }

    pub fn from_state(state: FleetState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Consistent copy of the current state, revision included
    pub fn snapshot(&self) -> FleetState {
        self.inner.lock().clone()
    }

    pub fn revision(&self) -> u64 {
        self.inner.lock().revision()
    }

    /// Run `f` with exclusive access to the state
    pub(crate) fn with_lock<R>(&self, f: impl FnOnce(&mut FleetState) -> R) -> R {
        let mut state = self.inner.lock();
        f(&mut state)
    }

    /// Replace every route iff nobody committed since `expected_revision`.
    ///
    /// Returns the new revision on success, `None` when the state moved on.
    pub fn install_if_unchanged(&self, expected_revision: u64, routes: Vec<Route>) -> Option<u64> {
        let mut state = self.inner.lock();
        if state.revision() != expected_revision || routes.len() != state.vehicle_count() {
            return None;
        }
        state.replace_routes(routes);
        Some(state.revision())
    }
}
