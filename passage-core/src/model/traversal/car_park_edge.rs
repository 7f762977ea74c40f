use crate::model::mode::TraverseMode;
use crate::model::network::{second_of_day, CarParkFacility, Vertex, VertexKind};
use crate::model::state::PathState;
use crate::model::traversal::TraversableEdge;
use std::sync::Arc;

/// a loop edge on a car-park vertex that parks the car (forward searches) or
/// retrieves it (arrive-by searches, where time runs backward and the car
/// starts parked). only meaningful under a park-and-ride request.
pub struct CarParkEdge {
    vertex: Arc<Vertex>,
}

impl CarParkEdge {
    /// `vertex` must be a car-park vertex.
    pub fn new(vertex: Arc<Vertex>) -> CarParkEdge {
        CarParkEdge { vertex }
    }

    fn facility(&self) -> Option<&Arc<CarParkFacility>> {
        match &self.vertex.kind {
            VertexKind::CarPark(facility) => Some(facility),
            _ => None,
        }
    }
}

impl TraversableEdge for CarParkEdge {
    fn from_vertex(&self) -> &Arc<Vertex> {
        &self.vertex
    }

    fn to_vertex(&self) -> &Arc<Vertex> {
        &self.vertex
    }

    fn traverse(self: Arc<Self>, state: &Arc<PathState>) -> Option<Arc<PathState>> {
        let request = state.request();
        if !request.park_and_ride {
            return None;
        }
        let facility = self.facility()?.clone();

        let mut wait_seconds = 0;
        if request.arrive_by {
            // retrieving the car: it must still be parked (we have not yet
            // unparked it going backward) and we must arrive on foot
            if !state.is_car_parked() || state.non_transit_mode() != TraverseMode::Walk {
                return None;
            }
            if facility.is_closed_at(second_of_day(state.time_seconds())) {
                return None;
            }
        } else {
            if state.is_car_parked() || state.non_transit_mode() != TraverseMode::Car {
                return None;
            }
            if request.use_car_park_availability && facility.has_few_spaces_available() {
                return None;
            }
            let now = second_of_day(state.time_seconds());
            if facility.is_closed_at(now) {
                let opens = facility.opens_next(now)?;
                wait_seconds = opens - now;
                if wait_seconds > request.max_car_park_opening_wait {
                    return None;
                }
            }
        }

        let arrive_by = request.arrive_by;
        let drop_off_time = request.car_drop_off_time;
        let wait_reluctance = request.wait_reluctance;
        let car_leg_factor = request.car_park_car_leg_weight;
        let edge: Arc<dyn TraversableEdge> = self;
        let mut editor = state.edit(&edge);
        editor.set_car_parked(!arrive_by);
        editor.set_back_mode(TraverseMode::LegSwitch);
        if !arrive_by && car_leg_factor > 1.0 {
            // discourage parking deep into a long drive
            editor.multiply_weight(car_leg_factor);
        }
        editor.increment_time_seconds(drop_off_time + wait_seconds);
        editor.increment_weight(drop_off_time as f64 + wait_seconds as f64 * wait_reluctance);
        editor.make_state()
    }

    fn name(&self) -> String {
        format!("car park at {}", self.vertex.name)
    }
}
