use crate::model::mode::{ModeSet, TraverseMode};
use crate::model::network::Vertex;
use crate::model::request::RoutingRequest;
use crate::model::state::PathState;
use crate::model::traversal::TraversableEdge;
use std::sync::Arc;

/// a street segment with a permitted street-mode set. cost is derived from
/// the request's per-mode speed and reluctance. a cyclist on a no-cycling
/// segment dismounts and walks the bike at walking speed when walking is
/// permitted.
pub struct StreetEdge {
    from: Arc<Vertex>,
    to: Arc<Vertex>,
    name: String,
    /// segment length in meters.
    length: f64,
    permitted: ModeSet,
}

impl StreetEdge {
    pub fn new(
        from: Arc<Vertex>,
        to: Arc<Vertex>,
        name: &str,
        length: f64,
        permitted: ModeSet,
    ) -> StreetEdge {
        StreetEdge {
            from,
            to,
            name: name.to_string(),
            length,
            permitted,
        }
    }
}

impl TraversableEdge for StreetEdge {
    fn from_vertex(&self) -> &Arc<Vertex> {
        &self.from
    }

    fn to_vertex(&self) -> &Arc<Vertex> {
        &self.to
    }

    fn traverse(self: Arc<Self>, state: &Arc<PathState>) -> Option<Arc<PathState>> {
        let request = state.request();
        let mut mode = state.non_transit_mode();
        let mut walking_bike = false;
        if !self.permitted.allows(mode) {
            if mode == TraverseMode::Bicycle && self.permitted.allows(TraverseMode::Walk) {
                mode = TraverseMode::Walk;
                walking_bike = true;
            } else {
                return None;
            }
        }

        let speed = if walking_bike {
            request.walk_speed
        } else {
            request.speed(mode)
        };
        let seconds = self.length / speed;
        let reluctance = if walking_bike {
            request.walk_reluctance
        } else {
            request.reluctance(mode)
        };
        let mut weight = seconds * reluctance;

        let walking = mode == TraverseMode::Walk;
        if walking && request.soft_walk_limiting {
            // only the portion beyond the limit is penalized
            let before = state.walk_distance();
            let after = before + self.length;
            if after > request.max_walk_distance {
                let overage = after - request.max_walk_distance.max(before);
                weight += overage / request.walk_speed * request.soft_walk_overage_reluctance;
            }
        }

        let length = self.length;
        let edge: Arc<dyn TraversableEdge> = self;
        let mut editor = state.edit(&edge);
        editor.set_back_mode(mode);
        editor.set_back_walking_bike(walking_bike);
        if walking {
            editor.increment_walk_distance(length);
            if editor.walked_too_far(request) {
                return None;
            }
        }
        if mode == TraverseMode::Car {
            editor.increment_pre_transit_time(seconds.round() as i64);
        }
        editor.increment_time_milliseconds((seconds * 1000.0).round() as i64);
        editor.increment_weight(weight);
        editor.make_state()
    }

    fn weight_lower_bound(&self, request: &RoutingRequest) -> f64 {
        // reluctances are at least 1.0, so travel time at the fastest
        // enabled speed bounds weight from below
        self.length / request.max_street_speed()
    }

    fn distance(&self) -> f64 {
        self.length
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
