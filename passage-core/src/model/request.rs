use crate::error::TraversalError;
use crate::model::mode::{ModeSet, TraverseMode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// user-facing routing parameters. all costs are in abstract weight units,
/// all times in seconds, all distances in meters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingRequest {
    pub modes: ModeSet,
    /// when true the search runs backward in time from the arrival instant.
    pub arrive_by: bool,

    pub park_and_ride: bool,
    pub bike_park_and_ride: bool,
    pub allow_bike_rental: bool,
    pub allowed_bike_rental_networks: HashSet<String>,

    pub walk_speed: f64,
    pub bike_speed: f64,
    pub car_speed: f64,
    pub walk_reluctance: f64,
    pub bike_reluctance: f64,
    pub car_reluctance: f64,
    pub wait_reluctance: f64,
    /// multiplier on the wait reluctance for the wait before the first
    /// boarding, which a traveler can absorb by leaving later.
    pub wait_at_beginning_factor: f64,

    pub max_walk_distance: f64,
    /// when true, exceeding `max_walk_distance` adds a per-meter overage
    /// penalty instead of blocking the traversal.
    pub soft_walk_limiting: bool,
    pub soft_walk_overage_reluctance: f64,

    pub car_drop_off_time: i64,
    /// multiplier applied to the weight already accrued while driving when
    /// the car is parked; values above 1.0 discourage parking very late in
    /// a long drive.
    pub car_park_car_leg_weight: f64,
    pub max_car_park_opening_wait: i64,
    pub use_car_park_availability: bool,

    pub bike_park_time: i64,
    pub bike_park_cost: f64,
    pub bike_rental_pickup_time: i64,
    pub bike_rental_pickup_cost: f64,
    pub bike_rental_drop_off_time: i64,
    pub bike_rental_drop_off_cost: f64,

    pub board_slack: i64,
    pub alight_slack: i64,
    pub board_cost: f64,

    pub wheelchair_accessible: bool,
    /// skip trips and stop calls flagged cancelled by realtime updates.
    pub omit_canceled: bool,
    pub reverse_optimizing: bool,
    /// initial transit wait subtracted from active time, clamped to this
    /// many seconds. -1 disables clamping; 0 disables the subtraction.
    pub clamp_initial_wait_seconds: i64,
}

impl Default for RoutingRequest {
    fn default() -> Self {
        RoutingRequest {
            modes: ModeSet::new(true, false, false, true),
            arrive_by: false,
            park_and_ride: false,
            bike_park_and_ride: false,
            allow_bike_rental: false,
            allowed_bike_rental_networks: HashSet::new(),
            walk_speed: 1.33,
            bike_speed: 5.0,
            car_speed: 11.2,
            walk_reluctance: 2.0,
            bike_reluctance: 2.0,
            car_reluctance: 1.0,
            wait_reluctance: 1.0,
            wait_at_beginning_factor: 0.4,
            max_walk_distance: f64::MAX,
            soft_walk_limiting: true,
            soft_walk_overage_reluctance: 5.0,
            car_drop_off_time: 120,
            car_park_car_leg_weight: 1.0,
            max_car_park_opening_wait: 15 * 60,
            use_car_park_availability: false,
            bike_park_time: 60,
            bike_park_cost: 120.0,
            bike_rental_pickup_time: 60,
            bike_rental_pickup_cost: 120.0,
            bike_rental_drop_off_time: 30,
            bike_rental_drop_off_cost: 30.0,
            board_slack: 0,
            alight_slack: 0,
            board_cost: 60.0 * 10.0,
            wheelchair_accessible: false,
            omit_canceled: true,
            reverse_optimizing: false,
            clamp_initial_wait_seconds: -1,
        }
    }
}

impl RoutingRequest {
    /// checks parameter coherence. reluctances below 1.0 would break the
    /// admissibility of edge lower bounds, which assume weight >= time.
    pub fn validate(&self) -> Result<(), TraversalError> {
        for (name, value) in [
            ("walk_speed", self.walk_speed),
            ("bike_speed", self.bike_speed),
            ("car_speed", self.car_speed),
        ] {
            if value <= 0.0 || !value.is_finite() {
                return Err(TraversalError::InvalidRequest(format!(
                    "{name} must be positive and finite, found {value}"
                )));
            }
        }
        for (name, value) in [
            ("walk_reluctance", self.walk_reluctance),
            ("bike_reluctance", self.bike_reluctance),
            ("car_reluctance", self.car_reluctance),
            ("wait_reluctance", self.wait_reluctance),
        ] {
            if value < 1.0 || !value.is_finite() {
                return Err(TraversalError::InvalidRequest(format!(
                    "{name} must be at least 1.0, found {value}"
                )));
            }
        }
        if self.wait_at_beginning_factor <= 0.0 || self.wait_at_beginning_factor > 1.0 {
            return Err(TraversalError::InvalidRequest(format!(
                "wait_at_beginning_factor must be in (0, 1], found {}",
                self.wait_at_beginning_factor
            )));
        }
        if self.car_park_car_leg_weight < 1.0 {
            return Err(TraversalError::InvalidRequest(format!(
                "car_park_car_leg_weight must be at least 1.0, found {}",
                self.car_park_car_leg_weight
            )));
        }
        Ok(())
    }

    pub fn speed(&self, mode: TraverseMode) -> f64 {
        match mode {
            TraverseMode::Walk => self.walk_speed,
            TraverseMode::Bicycle => self.bike_speed,
            TraverseMode::Car => self.car_speed,
            _ => self.walk_speed,
        }
    }

    pub fn reluctance(&self, mode: TraverseMode) -> f64 {
        match mode {
            TraverseMode::Walk => self.walk_reluctance,
            TraverseMode::Bicycle => self.bike_reluctance,
            TraverseMode::Car => self.car_reluctance,
            _ => self.walk_reluctance,
        }
    }

    /// the fastest configured speed over the enabled street modes, used by
    /// admissible lower bounds.
    pub fn max_street_speed(&self) -> f64 {
        let mut best = self.walk_speed;
        if self.modes.bicycle {
            best = best.max(self.bike_speed);
        }
        if self.modes.car {
            best = best.max(self.car_speed);
        }
        best
    }

    /// a copy of this request with the direction of time flipped, used as
    /// the basis for path reversal and reverse optimization.
    pub fn reversed_clone(&self) -> RoutingRequest {
        let mut reversed = self.clone();
        reversed.arrive_by = !self.arrive_by;
        reversed
    }
}

/// everything a traversal needs beyond the state itself: the request, the
/// per-request temporary-vertex registry, and rental drop-off policy. passed
/// explicitly at construction instead of living in process-wide state.
#[derive(Debug)]
pub struct RequestContext {
    pub request: RoutingRequest,
    pub request_id: u64,
    /// rental networks whose vehicles may be left anywhere rather than at a
    /// station.
    pub free_floating_networks: Arc<HashSet<String>>,
    temporary_vertices: Arc<RwLock<HashSet<usize>>>,
}

impl RequestContext {
    pub fn new(request: RoutingRequest, request_id: u64) -> Arc<RequestContext> {
        Arc::new(RequestContext {
            request,
            request_id,
            free_floating_networks: Arc::new(HashSet::new()),
            temporary_vertices: Arc::new(RwLock::new(HashSet::new())),
        })
    }

    pub fn with_free_floating_networks(
        request: RoutingRequest,
        request_id: u64,
        free_floating_networks: HashSet<String>,
    ) -> Arc<RequestContext> {
        Arc::new(RequestContext {
            request,
            request_id,
            free_floating_networks: Arc::new(free_floating_networks),
            temporary_vertices: Arc::new(RwLock::new(HashSet::new())),
        })
    }

    /// registers a splice vertex created for this request. the registry is
    /// consulted by the state editor to reject stale temporary vertices
    /// from other requests.
    pub fn register_temporary_vertex(&self, vertex_id: usize) {
        if let Ok(mut guard) = self.temporary_vertices.write() {
            guard.insert(vertex_id);
        }
    }

    pub fn is_registered_temporary(&self, vertex_id: usize) -> bool {
        self.temporary_vertices
            .read()
            .map(|guard| guard.contains(&vertex_id))
            .unwrap_or(false)
    }

    /// tears down the request-scoped splice vertices when the request ends.
    pub fn clear_temporary_vertices(&self) {
        if let Ok(mut guard) = self.temporary_vertices.write() {
            guard.clear();
        }
    }

    /// whether leaving a rented vehicle away from a station is permitted for
    /// any of the given held networks.
    pub fn networks_allow_free_floating_drop_off(&self, held: &HashSet<String>) -> bool {
        !self.free_floating_networks.is_disjoint(held)
    }

    /// a context for the direction-flipped request, sharing this request's
    /// temporary-vertex registry so reversed states remain valid.
    pub fn reversed(self: &Arc<Self>) -> Arc<RequestContext> {
        Arc::new(RequestContext {
            request: self.request.reversed_clone(),
            request_id: self.request_id,
            free_floating_networks: self.free_floating_networks.clone(),
            temporary_vertices: self.temporary_vertices.clone(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate_rejects_sub_unit_reluctance() {
        let request = RoutingRequest {
            walk_reluctance: 0.5,
            ..Default::default()
        };
        let result = request.validate();
        assert!(result.is_err(), "expected sub-unit reluctance to be rejected");
    }

    #[test]
    fn test_reversed_context_shares_temporaries() {
        let ctx = RequestContext::new(RoutingRequest::default(), 7);
        ctx.register_temporary_vertex(42);
        let reversed = ctx.reversed();
        assert!(reversed.request.arrive_by);
        assert!(reversed.is_registered_temporary(42));
        ctx.clear_temporary_vertices();
        assert!(!reversed.is_registered_temporary(42));
    }
}
