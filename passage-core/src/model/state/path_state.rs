use crate::model::mode::TraverseMode;
use crate::model::network::Vertex;
use crate::model::request::{RequestContext, RoutingRequest};
use crate::model::state::state_data::{ExtensionSlot, StateData};
use crate::model::state::PathStateEditor;
use crate::model::traversal::TraversableEdge;
use log::warn;
use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

/// an immutable snapshot of a partial path: where we are, when, at what
/// accumulated cost, and how we got here. states form singly-linked chains
/// through `back_state`; each node points only to strictly earlier nodes, so
/// shared ownership via `Arc` cannot form cycles.
///
/// states are only created through [`PathStateEditor`], which enforces the
/// mutation protocol (monotone weight, direction-consistent time,
/// copy-on-write of the shared [`StateData`] block).
#[derive(Clone)]
pub struct PathState {
    pub(crate) vertex: Arc<Vertex>,
    /// current time in milliseconds since the epoch. runs backward in
    /// arrive-by searches.
    pub(crate) time_ms: i64,
    pub(crate) weight: f64,
    pub(crate) walk_distance: f64,
    /// seconds traveled before boarding transit, for park-and-ride limits.
    pub(crate) pre_transit_time: i64,
    pub(crate) back_state: Option<Arc<PathState>>,
    pub(crate) back_edge: Option<Arc<dyn TraversableEdge>>,
    pub(crate) data: Arc<StateData>,
}

impl PathState {
    /// the initial, parent-less state at the beginning of a search.
    pub fn initial(
        vertex: Arc<Vertex>,
        start_time_seconds: i64,
        ctx: Arc<RequestContext>,
    ) -> Arc<PathState> {
        let start_time_ms = start_time_seconds * 1000;
        Arc::new(PathState {
            vertex,
            time_ms: start_time_ms,
            weight: 0.0,
            walk_distance: 0.0,
            pre_transit_time: 0,
            back_state: None,
            back_edge: None,
            data: Arc::new(StateData::initial(ctx, start_time_ms)),
        })
    }

    /// creates an editor bound to this state and the given edge. the editor
    /// produces at most one child state.
    pub fn edit(self: &Arc<Self>, edge: &Arc<dyn TraversableEdge>) -> PathStateEditor {
        PathStateEditor::new(self, edge)
    }

    /* field accessors. states are immutable; the corresponding setters live
     * on the editor. */

    pub fn vertex(&self) -> &Arc<Vertex> {
        &self.vertex
    }

    pub fn time_milliseconds(&self) -> i64 {
        self.time_ms
    }

    pub fn time_seconds(&self) -> i64 {
        self.time_ms / 1000
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn walk_distance(&self) -> f64 {
        self.walk_distance
    }

    pub fn pre_transit_time(&self) -> i64 {
        self.pre_transit_time
    }

    pub fn back_state(&self) -> Option<&Arc<PathState>> {
        self.back_state.as_ref()
    }

    pub fn back_edge(&self) -> Option<&Arc<dyn TraversableEdge>> {
        self.back_edge.as_ref()
    }

    pub fn ctx(&self) -> &Arc<RequestContext> {
        &self.data.ctx
    }

    pub fn request(&self) -> &RoutingRequest {
        &self.data.ctx.request
    }

    pub fn start_time_seconds(&self) -> i64 {
        self.data.start_time_ms / 1000
    }

    pub fn non_transit_mode(&self) -> TraverseMode {
        self.data.non_transit_mode
    }

    pub fn back_mode(&self) -> Option<TraverseMode> {
        self.data.back_mode
    }

    pub fn is_back_walking_bike(&self) -> bool {
        self.data.back_walking_bike
    }

    pub fn is_bike_renting(&self) -> bool {
        self.data.renting_bike
    }

    /// networks of the rental currently held; empty when not renting.
    pub fn rental_networks(&self) -> &std::collections::HashSet<String> {
        &self.data.rental_networks
    }

    pub fn is_car_parked(&self) -> bool {
        self.data.car_parked
    }

    pub fn is_bike_parked(&self) -> bool {
        self.data.bike_parked
    }

    pub fn num_boardings(&self) -> u32 {
        self.data.num_boardings
    }

    /// whether this path has ever boarded (or, in arrive-by, alighted from)
    /// a transit vehicle.
    pub fn is_ever_boarded(&self) -> bool {
        self.data.ever_boarded
    }

    pub fn trip_id(&self) -> Option<&str> {
        self.data.trip_id.as_deref()
    }

    pub fn route_id(&self) -> Option<&str> {
        self.data.route_id.as_deref()
    }

    pub fn previous_stop(&self) -> Option<&str> {
        self.data.previous_stop.as_deref()
    }

    pub fn previous_trip(&self) -> Option<&str> {
        self.data.previous_trip.as_deref()
    }

    pub fn last_alighted_time_seconds(&self) -> Option<i64> {
        self.data.last_alighted_time_ms.map(|ms| ms / 1000)
    }

    pub fn walk_since_last_transit(&self) -> f64 {
        self.walk_distance - self.data.last_transit_walk
    }

    pub fn route_sequence(&self) -> &[String] {
        &self.data.route_sequence
    }

    pub fn initial_wait_time_seconds(&self) -> Option<i64> {
        self.data.initial_wait_time_ms.map(|ms| ms / 1000)
    }

    /// a typed view of an extension slot value, if present and of type `T`.
    pub fn extension<T: Any + Send + Sync>(&self, slot: ExtensionSlot) -> Option<Arc<T>> {
        self.data
            .extension(slot)
            .and_then(|value| value.clone().downcast::<T>().ok())
    }

    /* derived quantities */

    /// trip length in seconds up to this state, regardless of direction.
    pub fn elapsed_time_seconds(&self) -> i64 {
        (self.time_ms - self.data.start_time_ms).abs() / 1000
    }

    /// elapsed time minus the initial transit wait, clamped per the request.
    /// used in lieu of reverse optimization by batch searches.
    pub fn active_time_seconds(&self) -> i64 {
        let clamp = self.request().clamp_initial_wait_seconds;
        let mut initial_wait = self.initial_wait_time_seconds().unwrap_or(0);
        if clamp >= 0 && initial_wait > clamp {
            initial_wait = clamp;
        }
        let active = self.elapsed_time_seconds() - initial_wait;
        if active < 0 {
            warn!("initial wait was greater than elapsed time");
            return self.elapsed_time_seconds();
        }
        active
    }

    pub fn time_delta_seconds(&self) -> i64 {
        match &self.back_state {
            Some(back) => self.time_seconds() - back.time_seconds(),
            None => 0,
        }
    }

    pub fn abs_time_delta_seconds(&self) -> i64 {
        self.time_delta_seconds().abs()
    }

    pub fn walk_distance_delta(&self) -> f64 {
        match &self.back_state {
            Some(back) => (self.walk_distance - back.walk_distance).abs(),
            None => 0.0,
        }
    }

    pub fn pre_transit_time_delta(&self) -> i64 {
        match &self.back_state {
            Some(back) => (self.pre_transit_time - back.pre_transit_time).abs(),
            None => 0,
        }
    }

    pub fn weight_delta(&self) -> f64 {
        match &self.back_state {
            Some(back) => self.weight - back.weight,
            None => 0.0,
        }
    }

    /* path-diversity route sequence checks, used by external dominance
     * functions. these arrays are tiny; quadratic scans are fine. */

    pub fn route_sequence_prefix(&self, other: &PathState) -> bool {
        let rs0 = &self.data.route_sequence;
        let rs1 = &other.data.route_sequence;
        if Arc::ptr_eq(rs0, rs1) {
            return true;
        }
        let n = rs0.len().min(rs1.len());
        rs0[..n] == rs1[..n]
    }

    pub fn route_sequence_subset(&self, other: &PathState) -> bool {
        let rs0 = &self.data.route_sequence;
        let rs1 = &other.data.route_sequence;
        if Arc::ptr_eq(rs0, rs1) {
            return true;
        }
        if rs0.len() > rs1.len() {
            return false;
        }
        rs0.iter().all(|r| rs1.contains(r))
    }

    pub fn route_sequence_superset(&self, other: &PathState) -> bool {
        other.route_sequence_subset(self)
    }

    /* terminal-state handling */

    /// whether this state can terminate a path: every parking or rental
    /// obligation must be resolved consistently with the search direction.
    /// a forward park-and-ride must end with the car parked; an arrive-by
    /// search must end with it not yet parked, since time runs backward.
    pub fn is_final(&self) -> bool {
        let request = self.request();
        let bike_renting_ok =
            !self.is_bike_renting() || self.free_floating_drop_off_allowed();
        let (bike_park_ok, car_park_ok) = if request.arrive_by {
            (
                !request.bike_park_and_ride || !self.is_bike_parked(),
                !request.park_and_ride || !self.is_car_parked(),
            )
        } else {
            (
                !request.bike_park_and_ride || self.is_bike_parked(),
                !request.park_and_ride || self.is_car_parked(),
            )
        };
        bike_renting_ok && bike_park_ok && car_park_ok
    }

    /// whether the currently held rental may be left where it stands.
    pub fn free_floating_drop_off_allowed(&self) -> bool {
        self.data
            .ctx
            .networks_allow_free_floating_drop_off(&self.data.rental_networks)
    }

    /// when stitching sub-searches together, a state still holding a
    /// free-floating rental at its boundary would prevent the next
    /// sub-search from starting a fresh rental. coerce it to a
    /// dropped-off, walking state.
    pub fn finalize_state(self: &Arc<Self>) -> Arc<PathState> {
        if !self.is_bike_renting() {
            return self.clone();
        }
        let mut data = (*self.data).clone();
        data.bike_parked = true;
        data.renting_bike = false;
        data.non_transit_mode = TraverseMode::Walk;
        data.back_mode = Some(TraverseMode::Walk);
        let mut state = (**self).clone();
        state.data = Arc::new(data);
        Arc::new(state)
    }

    /* reversal and reverse optimization */

    /// a fresh chain root at this state's vertex and time under the
    /// direction-flipped request, carrying over the fields reversal needs.
    pub fn reversed_clone(self: &Arc<Self>) -> Arc<PathState> {
        let ctx = self.data.ctx.reversed();
        let mut data = StateData::initial(ctx, self.time_ms);
        data.initial_wait_time_ms = self.data.initial_wait_time_ms;
        data.renting_bike = self.data.renting_bike;
        data.rental_networks = self.data.rental_networks.clone();
        data.car_parked = self.data.car_parked;
        data.bike_parked = self.data.bike_parked;
        // begin with the same non-transit mode the end state had; required
        // for reverse optimization of free-floating rentals
        data.non_transit_mode = self.data.non_transit_mode;
        data.extensions = self.data.extensions.clone();
        Arc::new(PathState {
            vertex: self.vertex.clone(),
            time_ms: self.time_ms,
            weight: 0.0,
            walk_distance: 0.0,
            pre_transit_time: 0,
            back_state: None,
            back_edge: None,
            data: Arc::new(data),
        })
    }

    /// reverse-optimize a completed path.
    pub fn optimize(self: &Arc<Self>) -> Arc<PathState> {
        self.optimize_or_reverse(true, false)
    }

    /// reverse a completed path without changing its duration.
    pub fn reverse(self: &Arc<Self>) -> Arc<PathState> {
        self.optimize_or_reverse(false, false)
    }

    /// rebuilds the path implicit in this state by walking it in the
    /// opposite temporal direction. with `optimize` set, every edge is
    /// re-traversed so that unnecessary waiting collapses into time-dependent
    /// boardings; otherwise the recorded deltas are replayed verbatim.
    /// `forward` marks an on-the-fly reverse invoked from within a forward
    /// search; the result is then re-reversed to face the original
    /// direction. when an edge cannot be reversed the unoptimized path is
    /// returned rather than failing the search.
    pub fn optimize_or_reverse(self: &Arc<Self>, optimize: bool, forward: bool) -> Arc<PathState> {
        let unoptimized = self.clone();
        let mut orig = self.clone();
        let mut ret = self.reversed_clone();
        let mut new_initial_wait_ms = self.data.initial_wait_time_ms;

        while let Some(back) = orig.back_state.clone() {
            let edge = match orig.back_edge.clone() {
                Some(edge) => edge,
                None => break,
            };
            if optimize {
                // at the first board of a forward search (or last alight of
                // an arrive-by search) re-traverse against the parent's time
                // so the initial wait collapses into the boarding.
                let collapse_wait = forward
                    && orig.num_boardings() == 1
                    && edge
                        .board_alight_role()
                        .map(|boarding| boarding != self.request().arrive_by)
                        .unwrap_or(false);
                let next = if collapse_wait {
                    edge.clone()
                        .traverse_with_reference_time(&ret, back.time_seconds())
                } else {
                    edge.clone().traverse(&ret)
                };
                let next = match next {
                    Some(next) => next,
                    None => {
                        warn!(
                            "cannot reverse path at edge {}, returning unoptimized path",
                            edge.name()
                        );
                        return if forward { self.clone() } else { unoptimized.reverse() };
                    }
                };
                if collapse_wait {
                    new_initial_wait_ms = next.data.initial_wait_time_ms;
                }
                // the reversed path must use the same mode on every edge
                if let (Some(next_mode), Some(orig_mode)) = (next.back_mode(), orig.back_mode()) {
                    if next_mode != orig_mode
                        && next_mode != TraverseMode::LegSwitch
                        && orig_mode != TraverseMode::LegSwitch
                    {
                        warn!(
                            "re-traversal changed mode on edge {}, returning unoptimized path",
                            edge.name()
                        );
                        return if forward { self.clone() } else { unoptimized.reverse() };
                    }
                }
                ret = next;
            } else {
                // replay the recorded deltas without re-traversing
                let mut editor = ret.edit(&edge);
                editor.set_from_state(&orig);
                editor.increment_time_seconds(orig.abs_time_delta_seconds());
                editor.increment_weight(orig.weight_delta());
                editor.increment_walk_distance(orig.walk_distance_delta());
                editor.increment_pre_transit_time(orig.pre_transit_time_delta());
                if let Some(mode) = orig.back_mode() {
                    editor.set_back_mode(mode);
                }
                if orig.is_bike_renting() && !back.is_bike_renting() {
                    editor.done_vehicle_renting();
                } else if !orig.is_bike_renting() && back.is_bike_renting() {
                    editor.begin_vehicle_renting(back.data.rental_networks.clone());
                }
                if orig.is_car_parked() != back.is_car_parked() {
                    editor.set_car_parked(!orig.is_car_parked());
                }
                if orig.is_bike_parked() != back.is_bike_parked() {
                    editor.set_bike_parked(!orig.is_bike_parked());
                }
                editor.set_num_boardings(self.num_boardings() - orig.num_boardings());
                match editor.make_state() {
                    Some(next) => ret = next,
                    None => {
                        warn!(
                            "delta replay failed at edge {}, returning original path",
                            edge.name()
                        );
                        return self.clone();
                    }
                }
            }
            orig = back;
        }

        if forward {
            let reversed = ret.reverse();
            if self.weight() < reversed.weight() {
                warn!(
                    "optimization increased weight: before {} after {}",
                    self.weight(),
                    reversed.weight()
                );
            }
            if self.elapsed_time_seconds() != reversed.elapsed_time_seconds() {
                warn!(
                    "optimization changed elapsed time: before {} after {}",
                    self.elapsed_time_seconds(),
                    reversed.elapsed_time_seconds()
                );
            }
            if new_initial_wait_ms != reversed.data.initial_wait_time_ms {
                warn!(
                    "initial wait time not propagated: is {:?}, should be {:?}",
                    reversed.data.initial_wait_time_ms, new_initial_wait_ms
                );
            }
            reversed.with_data_from(self, new_initial_wait_ms)
        } else {
            ret
        }
    }

    /// after re-reversing, restore the slow-changing fields from the
    /// original end state; only the initial wait carries over from the
    /// optimized result.
    fn with_data_from(
        self: &Arc<Self>,
        original: &PathState,
        initial_wait_ms: Option<i64>,
    ) -> Arc<PathState> {
        let mut data = (*original.data).clone();
        data.initial_wait_time_ms = initial_wait_ms;
        let mut state = (**self).clone();
        state.data = Arc::new(data);
        Arc::new(state)
    }
}

impl Display for PathState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<PathState t={} w={} {}{}{}v={}>",
            self.time_seconds(),
            self.weight,
            if self.is_bike_renting() { "BIKE_RENT " } else { "" },
            if self.is_car_parked() { "CAR_PARKED " } else { "" },
            if self.is_bike_parked() { "BIKE_PARKED " } else { "" },
            self.vertex.name,
        )
    }
}
