use crate::model::mode::TraverseMode;
use crate::model::network::{BikeParkFacility, Vertex, VertexKind};
use crate::model::state::PathState;
use crate::model::traversal::TraversableEdge;
use std::sync::Arc;

/// a loop edge on a bike-park vertex: parks an owned bike going forward,
/// retrieves it in arrive-by searches. a rented free-floating bike can be
/// dropped off here instead, when its network permits leaving it anywhere.
pub struct BikeParkEdge {
    vertex: Arc<Vertex>,
}

impl BikeParkEdge {
    /// `vertex` must be a bike-park vertex.
    pub fn new(vertex: Arc<Vertex>) -> BikeParkEdge {
        BikeParkEdge { vertex }
    }

    fn facility(&self) -> Option<&Arc<BikeParkFacility>> {
        match &self.vertex.kind {
            VertexKind::BikePark(facility) => Some(facility),
            _ => None,
        }
    }
}

impl TraversableEdge for BikeParkEdge {
    fn from_vertex(&self) -> &Arc<Vertex> {
        &self.vertex
    }

    fn to_vertex(&self) -> &Arc<Vertex> {
        &self.vertex
    }

    fn traverse(self: Arc<Self>, state: &Arc<PathState>) -> Option<Arc<PathState>> {
        let request = state.request();
        if !request.bike_park_and_ride {
            return None;
        }
        let facility = self.facility()?;

        if state.is_bike_renting() {
            // a free-floating rental can end at the rack instead of a
            // station
            if request.arrive_by
                || !state.free_floating_drop_off_allowed()
                || state.non_transit_mode() != TraverseMode::Bicycle
            {
                return None;
            }
            let drop_off_time = request.bike_rental_drop_off_time;
            let drop_off_cost = request.bike_rental_drop_off_cost;
            let edge: Arc<dyn TraversableEdge> = self;
            let mut editor = state.edit(&edge);
            editor.done_vehicle_renting();
            editor.set_bike_parked(true);
            editor.set_back_mode(TraverseMode::LegSwitch);
            editor.increment_time_seconds(drop_off_time);
            editor.increment_weight(drop_off_cost);
            return editor.make_state();
        }

        if request.arrive_by {
            if !state.is_bike_parked() || state.non_transit_mode() != TraverseMode::Walk {
                return None;
            }
        } else {
            if state.is_bike_parked() || state.non_transit_mode() != TraverseMode::Bicycle {
                return None;
            }
            if facility.spaces_available() == 0 {
                return None;
            }
        }

        let arrive_by = request.arrive_by;
        let park_time = request.bike_park_time;
        let park_cost = request.bike_park_cost;
        let edge: Arc<dyn TraversableEdge> = self;
        let mut editor = state.edit(&edge);
        editor.set_bike_parked(!arrive_by);
        editor.set_back_mode(TraverseMode::LegSwitch);
        editor.increment_time_seconds(park_time);
        editor.increment_weight(park_cost);
        editor.make_state()
    }

    fn name(&self) -> String {
        format!("bike park at {}", self.vertex.name)
    }
}
