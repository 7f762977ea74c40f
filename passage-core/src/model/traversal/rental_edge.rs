use crate::model::mode::TraverseMode;
use crate::model::network::{BikeRentalStation, Vertex, VertexKind};
use crate::model::state::PathState;
use crate::model::traversal::TraversableEdge;
use std::sync::Arc;

/// a loop edge on a rental-station vertex, either the pickup side or the
/// drop-off side of a rental. in arrive-by searches the roles swap: walking
/// backward past a drop-off station is where the rental begins.
pub struct BikeRentalEdge {
    vertex: Arc<Vertex>,
    /// true for the pickup side, false for the drop-off side.
    pickup: bool,
}

impl BikeRentalEdge {
    /// `vertex` must be a rental-station vertex.
    pub fn pickup(vertex: Arc<Vertex>) -> BikeRentalEdge {
        BikeRentalEdge {
            vertex,
            pickup: true,
        }
    }

    pub fn drop_off(vertex: Arc<Vertex>) -> BikeRentalEdge {
        BikeRentalEdge {
            vertex,
            pickup: false,
        }
    }

    fn station(&self) -> Option<&Arc<BikeRentalStation>> {
        match &self.vertex.kind {
            VertexKind::BikeRental(station) => Some(station),
            _ => None,
        }
    }

    /// whether the physical action this edge represents can be performed at
    /// its station right now, regardless of search direction.
    fn station_serviceable(&self, station: &BikeRentalStation) -> bool {
        if self.pickup {
            station.bikes_available() > 0
        } else {
            station.allow_drop_off && station.spaces_available() > 0
        }
    }
}

impl TraversableEdge for BikeRentalEdge {
    fn from_vertex(&self) -> &Arc<Vertex> {
        &self.vertex
    }

    fn to_vertex(&self) -> &Arc<Vertex> {
        &self.vertex
    }

    fn traverse(self: Arc<Self>, state: &Arc<PathState>) -> Option<Arc<PathState>> {
        let request = state.request();
        if !request.allow_bike_rental {
            return None;
        }
        let station = self.station()?.clone();
        if !self.station_serviceable(&station) {
            return None;
        }

        // going backward in time, the drop-off side is where the rental
        // begins and the pickup side is where it ends
        let begins_rental = self.pickup != request.arrive_by;
        let (seconds, cost) = if self.pickup {
            (request.bike_rental_pickup_time, request.bike_rental_pickup_cost)
        } else {
            (
                request.bike_rental_drop_off_time,
                request.bike_rental_drop_off_cost,
            )
        };

        if begins_rental {
            if state.is_bike_renting() || state.non_transit_mode() != TraverseMode::Walk {
                return None;
            }
            let allowed = &request.allowed_bike_rental_networks;
            if !allowed.is_empty() && station.networks.is_disjoint(allowed) {
                return None;
            }
        } else {
            if !state.is_bike_renting() {
                return None;
            }
            if !station.compatible_with(state.rental_networks()) {
                return None;
            }
        }

        let networks = Arc::new(station.networks.clone());
        let edge: Arc<dyn TraversableEdge> = self;
        let mut editor = state.edit(&edge);
        if begins_rental {
            editor.begin_vehicle_renting(networks);
        } else {
            editor.done_vehicle_renting();
        }
        editor.set_back_mode(TraverseMode::LegSwitch);
        editor.increment_time_seconds(seconds);
        editor.increment_weight(cost);
        editor.make_state()
    }

    fn name(&self) -> String {
        let side = if self.pickup { "pickup" } else { "drop-off" };
        format!("bike rental {side} at {}", self.vertex.name)
    }
}
