use crate::error::TraversalError;
use crate::model::mode::TraverseMode;
use crate::model::network::VertexKind;
use crate::model::request::RoutingRequest;
use crate::model::state::state_data::{ExtensionSlot, ExtensionValue, StateData};
use crate::model::state::PathState;
use crate::model::traversal::TraversableEdge;
use log::error;
use std::collections::HashSet;
use std::sync::Arc;

/// the only way to produce a child [`PathState`]. an editor is bound to one
/// parent state and one edge, accumulates mutations, and produces exactly one
/// child via [`make_state`](PathStateEditor::make_state).
///
/// illegal traversals (disconnected edge, negative time or distance
/// increment, a temporary vertex leaked from another request) mark the editor
/// defective; a defective editor logs and returns `None` instead of a state,
/// pruning the branch without failing the search. protocol violations by the
/// calling code itself (reusing a spent editor, parking an already-parked
/// vehicle) panic, since they indicate a bug rather than a dead end.
pub struct PathStateEditor {
    child: Option<PathState>,
    defective: bool,
    traversing_backward: bool,
}

impl PathStateEditor {
    pub(crate) fn new(parent: &Arc<PathState>, edge: &Arc<dyn TraversableEdge>) -> PathStateEditor {
        let mut child = (**parent).clone();
        child.back_state = Some(parent.clone());
        child.back_edge = Some(edge.clone());

        // traversal direction comes from which endpoint we stand on, not
        // from the request; an edge entered at the wrong end is a graph bug
        let arrive_by = parent.request().arrive_by;
        let mut traversing_backward = arrive_by;
        let mut defective = false;
        let from = edge.from_vertex();
        let to = edge.to_vertex();
        let here = parent.vertex.vertex_id;
        if here == from.vertex_id && here == to.vertex_id {
            // loop edge; the vertex stands and the request direction holds
        } else if here == from.vertex_id {
            traversing_backward = false;
            child.vertex = to.clone();
        } else if here == to.vertex_id {
            traversing_backward = true;
            child.vertex = from.clone();
        } else {
            error!(
                "{}",
                TraversalError::DisconnectedEdge(here, edge.name())
            );
            defective = true;
        }
        if traversing_backward != arrive_by {
            error!(
                "edge {} entered against the search direction at vertex {}",
                edge.name(),
                parent.vertex.name
            );
            defective = true;
        }

        // a splice vertex from some other request must never be reachable
        if let VertexKind::Temporary { request_id } = child.vertex.kind {
            let ctx = &child.data.ctx;
            if request_id != ctx.request_id && !ctx.is_registered_temporary(child.vertex.vertex_id)
            {
                error!(
                    "temporary vertex {} belongs to request {}, not {}",
                    child.vertex.name, request_id, ctx.request_id
                );
                defective = true;
            }
        }

        PathStateEditor {
            child: Some(child),
            defective,
            traversing_backward,
        }
    }

    /// finishes the traversal and hands out the child state, or `None` when
    /// the traversal was marked defective or moved time against the search
    /// direction. panics when called twice.
    pub fn make_state(&mut self) -> Option<Arc<PathState>> {
        let child = match self.child.take() {
            Some(child) => child,
            None => panic!("a PathStateEditor can only produce one state"),
        };
        if self.defective {
            error!("defective traversal flagged on edge, returning no state");
            return None;
        }
        if let Some(back) = &child.back_state {
            let time_ok = if back.request().arrive_by {
                child.time_ms <= back.time_ms
            } else {
                child.time_ms >= back.time_ms
            };
            if !time_ok {
                error!("traversal moved time against the search direction");
                return None;
            }
        }
        Some(Arc::new(child))
    }

    fn child_mut(&mut self) -> &mut PathState {
        match self.child.as_mut() {
            Some(child) => child,
            None => panic!("PathStateEditor used after make_state"),
        }
    }

    fn child_ref(&self) -> &PathState {
        match self.child.as_ref() {
            Some(child) => child,
            None => panic!("PathStateEditor used after make_state"),
        }
    }

    /// copy-on-write view of the slow-changing data block: clones it only if
    /// it is still shared with the parent chain.
    fn data_mut(&mut self) -> &mut StateData {
        let child = self.child_mut();
        Arc::make_mut(&mut child.data)
    }

    /* core accumulators */

    pub fn increment_time_seconds(&mut self, seconds: i64) {
        self.increment_time_milliseconds(seconds * 1000);
    }

    pub fn increment_time_milliseconds(&mut self, milliseconds: i64) {
        if milliseconds < 0 {
            error!("refusing to increment time by a negative amount: {milliseconds}ms");
            self.defective = true;
            return;
        }
        let backward = self.traversing_backward;
        let child = self.child_mut();
        if backward {
            child.time_ms -= milliseconds;
        } else {
            child.time_ms += milliseconds;
        }
    }

    /// sets the child's absolute time, as board/alight edges do after a
    /// timetable search. direction consistency is checked at `make_state`.
    pub fn set_time_seconds(&mut self, seconds: i64) {
        self.child_mut().time_ms = seconds * 1000;
    }

    pub fn increment_weight(&mut self, weight: f64) {
        if !weight.is_finite() {
            error!("refusing to increment weight by a non-finite amount: {weight}");
            self.defective = true;
            return;
        }
        if weight < 0.0 {
            debug_assert!(false, "negative weight increment: {weight}");
            let edge = self
                .child_ref()
                .back_edge
                .as_ref()
                .map(|e| e.name())
                .unwrap_or_default();
            error!("{}", TraversalError::NegativeWeight(weight, edge));
            self.defective = true;
            return;
        }
        self.child_mut().weight += weight;
    }

    /// scales the total accrued weight, used when parking a car to make long
    /// drive legs less attractive. the factor must not shrink the weight.
    pub fn multiply_weight(&mut self, factor: f64) {
        if !(factor >= 1.0) {
            error!("refusing to multiply weight by a factor below 1.0: {factor}");
            self.defective = true;
            return;
        }
        self.child_mut().weight *= factor;
    }

    pub fn increment_walk_distance(&mut self, length: f64) {
        if length < 0.0 {
            error!("refusing to increment walk distance by a negative amount: {length}");
            self.defective = true;
            return;
        }
        self.child_mut().walk_distance += length;
    }

    pub fn increment_pre_transit_time(&mut self, seconds: i64) {
        if seconds < 0 {
            error!("refusing to increment pre-transit time by a negative amount: {seconds}");
            self.defective = true;
            return;
        }
        let child = self.child_mut();
        if !child.data.ever_boarded {
            child.pre_transit_time += seconds;
        }
    }

    /// whether the accumulated walk distance exceeds the hard limit. soft
    /// limiting converts the overage into weight instead; see street edges.
    pub fn walked_too_far(&self, request: &RoutingRequest) -> bool {
        !request.soft_walk_limiting && self.child_ref().walk_distance > request.max_walk_distance
    }

    /* mode bookkeeping */

    pub fn set_back_mode(&mut self, mode: TraverseMode) {
        if self.child_ref().data.back_mode == Some(mode) {
            return;
        }
        self.data_mut().back_mode = Some(mode);
    }

    pub fn set_back_walking_bike(&mut self, walking_bike: bool) {
        if self.child_ref().data.back_walking_bike == walking_bike {
            return;
        }
        self.data_mut().back_walking_bike = walking_bike;
    }

    pub fn set_non_transit_mode(&mut self, mode: TraverseMode) {
        if self.child_ref().data.non_transit_mode == mode {
            return;
        }
        self.data_mut().non_transit_mode = mode;
    }

    /* rental and parking transitions. the parking setters treat a repeated
     * transition as a caller bug: edges guard on the current flag before
     * asking for the flip. */

    pub fn begin_vehicle_renting(&mut self, networks: Arc<HashSet<String>>) {
        let data = self.data_mut();
        data.renting_bike = true;
        data.rental_networks = networks;
        data.non_transit_mode = TraverseMode::Bicycle;
    }

    pub fn done_vehicle_renting(&mut self) {
        let data = self.data_mut();
        data.renting_bike = false;
        data.rental_networks = Arc::new(HashSet::new());
        data.non_transit_mode = TraverseMode::Walk;
    }

    pub fn set_car_parked(&mut self, parked: bool) {
        if self.child_ref().data.car_parked == parked {
            debug_assert!(false, "car park flag set to its current value");
            error!(
                "{}, flagging traversal defective",
                TraversalError::IllegalTransition(
                    "car park flag set to its current value".to_string()
                )
            );
            self.defective = true;
            return;
        }
        let data = self.data_mut();
        data.car_parked = parked;
        data.non_transit_mode = if parked {
            TraverseMode::Walk
        } else {
            TraverseMode::Car
        };
    }

    pub fn set_bike_parked(&mut self, parked: bool) {
        if self.child_ref().data.bike_parked == parked {
            debug_assert!(false, "bike park flag set to its current value");
            error!(
                "{}, flagging traversal defective",
                TraversalError::IllegalTransition(
                    "bike park flag set to its current value".to_string()
                )
            );
            self.defective = true;
            return;
        }
        let data = self.data_mut();
        data.bike_parked = parked;
        data.non_transit_mode = if parked {
            TraverseMode::Walk
        } else {
            TraverseMode::Bicycle
        };
    }

    /* transit bookkeeping */

    pub fn increment_num_boardings(&mut self) {
        let data = self.data_mut();
        data.num_boardings += 1;
        data.ever_boarded = true;
    }

    pub fn set_num_boardings(&mut self, num_boardings: u32) {
        let data = self.data_mut();
        data.num_boardings = num_boardings;
        data.ever_boarded = data.ever_boarded || num_boardings > 0;
    }

    pub fn set_trip_id(&mut self, trip_id: Option<&str>) {
        self.data_mut().trip_id = trip_id.map(|id| id.to_string());
    }

    pub fn set_route_id(&mut self, route_id: Option<&str>) {
        self.data_mut().route_id = route_id.map(|id| id.to_string());
    }

    /// appends a route to the ridden-route sequence consulted by
    /// path-diversity checks.
    pub fn add_route_to_sequence(&mut self, route_id: &str) {
        let data = self.data_mut();
        let mut sequence = (*data.route_sequence).clone();
        sequence.push(route_id.to_string());
        data.route_sequence = Arc::new(sequence);
    }

    pub fn set_previous_stop(&mut self, stop_id: &str) {
        self.data_mut().previous_stop = Some(stop_id.to_string());
    }

    pub fn set_previous_trip(&mut self, trip_id: &str) {
        self.data_mut().previous_trip = Some(trip_id.to_string());
    }

    /// records the child's current time as the moment of leaving transit,
    /// and marks the walk odometer for walk-since-transit measurement.
    pub fn record_alighting(&mut self) {
        let time_ms = self.child_ref().time_ms;
        let walk = self.child_ref().walk_distance;
        let data = self.data_mut();
        data.last_alighted_time_ms = Some(time_ms);
        data.last_transit_walk = walk;
    }

    pub fn set_initial_wait_time_seconds(&mut self, seconds: i64) {
        self.data_mut().initial_wait_time_ms = Some(seconds * 1000);
    }

    /* extension slots */

    pub fn set_extension(&mut self, slot: ExtensionSlot, value: ExtensionValue) {
        let data = self.data_mut();
        let mut map = data.extensions.as_deref().cloned().unwrap_or_default();
        map.insert(slot, value);
        data.extensions = Some(Arc::new(map));
    }

    pub fn clear_extension(&mut self, slot: ExtensionSlot) {
        let data = self.data_mut();
        if data.extension(slot).is_none() {
            return;
        }
        let mut map = data.extensions.as_deref().cloned().unwrap_or_default();
        map.remove(&slot);
        data.extensions = if map.is_empty() {
            None
        } else {
            Some(Arc::new(map))
        };
    }

    /// bulk-copies the transit bookkeeping fields from another state, used
    /// when replaying a path in the opposite direction.
    pub fn set_from_state(&mut self, state: &PathState) {
        let data = self.data_mut();
        data.trip_id = state.data.trip_id.clone();
        data.route_id = state.data.route_id.clone();
        data.previous_stop = state.data.previous_stop.clone();
        data.previous_trip = state.data.previous_trip.clone();
        data.route_sequence = state.data.route_sequence.clone();
        data.back_walking_bike = state.data.back_walking_bike;
        data.extensions = state.data.extensions.clone();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::network::Vertex;
    use crate::model::request::{RequestContext, RoutingRequest};
    use crate::model::traversal::FreeEdge;

    fn simple_edge() -> Arc<dyn TraversableEdge> {
        Arc::new(FreeEdge::new(
            Vertex::street(0, "a"),
            Vertex::street(1, "b"),
        ))
    }

    fn start_state() -> Arc<PathState> {
        let _ = env_logger::builder().is_test(true).try_init();
        let ctx = RequestContext::new(RoutingRequest::default(), 1);
        PathState::initial(Vertex::street(0, "a"), 1_000_000, ctx)
    }

    #[test]
    fn test_forward_traversal_advances_time_and_weight() {
        let state = start_state();
        let edge = simple_edge();
        let mut editor = state.edit(&edge);
        editor.increment_time_seconds(30);
        editor.increment_weight(60.0);
        editor.increment_walk_distance(40.0);
        let child = editor.make_state().expect("traversal should succeed");
        assert_eq!(child.time_seconds(), 1_000_030);
        assert_eq!(child.weight(), 60.0);
        assert_eq!(child.walk_distance(), 40.0);
        assert_eq!(child.vertex().vertex_id, 1);
        assert!(child.weight() >= state.weight());
    }

    #[test]
    fn test_arrive_by_traversal_rewinds_time() {
        let request = RoutingRequest {
            arrive_by: true,
            ..Default::default()
        };
        let ctx = RequestContext::new(request, 1);
        // an arrive-by search walks edges from their to-vertex
        let state = PathState::initial(Vertex::street(1, "b"), 1_000_000, ctx);
        let edge = simple_edge();
        let mut editor = state.edit(&edge);
        editor.increment_time_seconds(30);
        editor.increment_weight(60.0);
        let child = editor.make_state().expect("traversal should succeed");
        assert_eq!(child.time_seconds(), 999_970);
        assert_eq!(child.vertex().vertex_id, 0);
        // weight accumulates regardless of time direction
        assert!(child.weight() > state.weight());
    }

    #[test]
    fn test_edge_entered_against_the_search_direction_is_defective() {
        // a forward search standing at the to-vertex of a directed edge
        // must not slide backward along it
        let ctx = RequestContext::new(RoutingRequest::default(), 1);
        let state = PathState::initial(Vertex::street(1, "b"), 1_000_000, ctx);
        let edge = simple_edge();
        let mut editor = state.edit(&edge);
        editor.increment_time_seconds(10);
        assert!(editor.make_state().is_none());

        // and an arrive-by search must not enter at the from-vertex
        let request = RoutingRequest {
            arrive_by: true,
            ..Default::default()
        };
        let ctx = RequestContext::new(request, 1);
        let state = PathState::initial(Vertex::street(0, "a"), 1_000_000, ctx);
        let edge = simple_edge();
        let mut editor = state.edit(&edge);
        editor.increment_time_seconds(10);
        assert!(editor.make_state().is_none());
    }

    #[test]
    #[should_panic(expected = "can only produce one state")]
    fn test_editor_is_single_use() {
        let state = start_state();
        let edge = simple_edge();
        let mut editor = state.edit(&edge);
        editor.increment_time_seconds(1);
        let _ = editor.make_state();
        let _ = editor.make_state();
    }

    #[test]
    fn test_disconnected_edge_is_defective() {
        let state = start_state();
        let edge: Arc<dyn TraversableEdge> = Arc::new(FreeEdge::new(
            Vertex::street(5, "x"),
            Vertex::street(6, "y"),
        ));
        let mut editor = state.edit(&edge);
        editor.increment_time_seconds(1);
        assert!(editor.make_state().is_none());
    }

    #[test]
    fn test_negative_time_increment_is_defective() {
        let state = start_state();
        let edge = simple_edge();
        let mut editor = state.edit(&edge);
        editor.increment_time_seconds(-5);
        assert!(editor.make_state().is_none());
    }

    #[test]
    fn test_wrong_direction_absolute_time_is_rejected() {
        let state = start_state();
        let edge = simple_edge();
        let mut editor = state.edit(&edge);
        editor.set_time_seconds(999_000);
        assert!(editor.make_state().is_none());
    }

    #[test]
    fn test_copy_on_write_leaves_parent_untouched() {
        let state = start_state();
        let edge = simple_edge();
        let mut editor = state.edit(&edge);
        editor.increment_time_seconds(10);
        editor.set_trip_id(Some("trip-1"));
        editor.add_route_to_sequence("route-1");
        let child = editor.make_state().expect("traversal should succeed");
        assert_eq!(child.trip_id(), Some("trip-1"));
        assert_eq!(child.route_sequence(), ["route-1".to_string()]);
        assert_eq!(state.trip_id(), None);
        assert!(state.route_sequence().is_empty());
    }

    #[test]
    fn test_temporary_vertex_from_other_request_is_rejected() {
        let state = start_state();
        let temp = Arc::new(Vertex::new(
            9,
            "splice",
            crate::model::network::VertexKind::Temporary { request_id: 99 },
        ));
        let edge: Arc<dyn TraversableEdge> =
            Arc::new(FreeEdge::new(state.vertex().clone(), temp));
        let mut editor = state.edit(&edge);
        editor.increment_time_seconds(1);
        assert!(editor.make_state().is_none());
    }
}
