//! Route and fleet assignment types

use serde::{Deserialize, Serialize};

use super::Stop;

/// Vehicle identifier (0..V-1)
pub type VehicleId = usize;

/// Ordered stops of one vehicle. The depot is implicit at both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route {
    stops: Vec<Stop>,
}

impl Route {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn contains(&self, stop: Stop) -> bool {
        self.stops.contains(&stop)
    }

    pub fn position(&self, stop: Stop) -> Option<usize> {
        self.stops.iter().position(|&s| s == stop)
    }

    /// Insert at `index` (0 = right after the depot, `len` = right before return)
    pub fn insert(&mut self, index: usize, stop: Stop) {
        self.stops.insert(index, stop);
    }

    pub fn swap(&mut self, i: usize, j: usize) {
        self.stops.swap(i, j);
    }
}

impl From<Vec<Stop>> for Route {
    fn from(stops: Vec<Stop>) -> Self {
        Self { stops }
    }
}

/// Per-vehicle routes of the whole fleet.
///
/// The vehicle count is fixed at construction. `revision` increases on every
/// commit so that writers holding an older snapshot can detect that the fleet
/// moved on underneath them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetState {
    routes: Vec<Route>,
    revision: u64,
}

impl FleetState {
    /// All-empty routes for `vehicle_count` vehicles
    pub fn new(vehicle_count: usize) -> Self {
        Self {
            routes: vec![Route::new(); vehicle_count],
            revision: 0,
        }
    }

    /// Build from explicit routes (revision 0)
    #[cfg(test)]
    pub fn from_routes(routes: Vec<Route>) -> Self {
        Self { routes, revision: 0 }
    }

    pub fn vehicle_count(&self) -> usize {
        self.routes.len()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route(&self, vehicle: VehicleId) -> Option<&Route> {
        self.routes.get(vehicle)
    }

    pub(crate) fn route_mut(&mut self, vehicle: VehicleId) -> Option<&mut Route> {
        self.routes.get_mut(vehicle)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Vehicle and position of `stop`, if routed
    pub fn locate(&self, stop: Stop) -> Option<(VehicleId, usize)> {
        self.routes
            .iter()
            .enumerate()
            .find_map(|(vehicle, route)| route.position(stop).map(|index| (vehicle, index)))
    }

    pub fn contains(&self, stop: Stop) -> bool {
        self.locate(stop).is_some()
    }

    /// All routed stops, vehicle by vehicle in route order
    pub fn assigned_stops(&self) -> Vec<Stop> {
        self.routes.iter().flat_map(|r| r.stops().iter().copied()).collect()
    }

    #[cfg(test)]
    pub fn stop_count(&self) -> usize {
        self.routes.iter().map(Route::len).sum()
    }

    /// Route-by-route equality, ignoring the revision counter
    #[cfg(test)]
    pub fn routes_equal(&self, other: &FleetState) -> bool {
        self.routes == other.routes
    }

    /// Replace the routes wholesale and bump the revision
    pub(crate) fn replace_routes(&mut self, routes: Vec<Route>) {
        self.routes = routes;
        self.revision += 1;
        debug_assert!(self.has_unique_stops(), "stop routed twice at revision {}", self.revision);
    }

    /// Every stop appears at most once across the fleet
    pub fn has_unique_stops(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.routes
            .iter()
            .flat_map(|r| r.stops().iter())
            .all(|stop| seen.insert(*stop))
    }

    pub(crate) fn into_routes(self) -> Vec<Route> {
        self.routes
    }
}
