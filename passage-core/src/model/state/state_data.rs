use crate::model::mode::TraverseMode;
use crate::model::request::RequestContext;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// a type-erased annotation attached to a state by an edge variant.
pub type ExtensionValue = Arc<dyn Any + Send + Sync>;

/// the known extension slots. edge variants that need to smuggle richer
/// bookkeeping through the state (the boarded trip entry, the service day it
/// was resolved against, the pattern last ridden) use these instead of an
/// open key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionSlot {
    BoardedTrip,
    ServiceDay,
    LastPattern,
}

/// slow-changing path-state fields, shared between a parent and its children
/// until one of them is edited (copy-on-write; see
/// `PathStateEditor::data_mut`).
#[derive(Clone)]
pub struct StateData {
    pub ctx: Arc<RequestContext>,
    pub start_time_ms: i64,

    pub non_transit_mode: TraverseMode,
    /// the mode used on the edge that produced this state.
    pub back_mode: Option<TraverseMode>,
    pub back_walking_bike: bool,

    pub renting_bike: bool,
    /// networks of the currently held rental; empty when not renting.
    pub rental_networks: Arc<HashSet<String>>,
    pub car_parked: bool,
    pub bike_parked: bool,

    pub num_boardings: u32,
    pub ever_boarded: bool,
    pub trip_id: Option<String>,
    pub route_id: Option<String>,
    pub previous_stop: Option<String>,
    pub previous_trip: Option<String>,
    pub last_alighted_time_ms: Option<i64>,
    /// walk distance accumulated at the moment of the last alight, used to
    /// measure walking since leaving transit.
    pub last_transit_walk: f64,
    /// routes ridden so far, in order; consulted by path-diversity checks.
    pub route_sequence: Arc<Vec<String>>,
    /// wait before the first boarded vehicle, recorded so that analyst-style
    /// searches can subtract it in lieu of reverse optimization.
    pub initial_wait_time_ms: Option<i64>,

    pub extensions: Option<Arc<HashMap<ExtensionSlot, ExtensionValue>>>,
}

impl StateData {
    /// initial state data for a search. for park-and-ride the arrive-by
    /// direction starts with the vehicle already parked, since time runs
    /// backward from the destination.
    pub fn initial(ctx: Arc<RequestContext>, start_time_ms: i64) -> StateData {
        let request = &ctx.request;
        let (non_transit_mode, car_parked, bike_parked) = if request.park_and_ride {
            if request.arrive_by {
                (TraverseMode::Walk, true, false)
            } else {
                (TraverseMode::Car, false, false)
            }
        } else if request.bike_park_and_ride {
            if request.arrive_by {
                (TraverseMode::Walk, false, true)
            } else {
                (TraverseMode::Bicycle, false, false)
            }
        } else if request.modes.bicycle {
            (TraverseMode::Bicycle, false, false)
        } else if request.modes.car {
            (TraverseMode::Car, false, false)
        } else {
            (TraverseMode::Walk, false, false)
        };
        StateData {
            ctx,
            start_time_ms,
            non_transit_mode,
            back_mode: None,
            back_walking_bike: false,
            renting_bike: false,
            rental_networks: Arc::new(HashSet::new()),
            car_parked,
            bike_parked,
            num_boardings: 0,
            ever_boarded: false,
            trip_id: None,
            route_id: None,
            previous_stop: None,
            previous_trip: None,
            last_alighted_time_ms: None,
            last_transit_walk: 0.0,
            route_sequence: Arc::new(vec![]),
            initial_wait_time_ms: None,
            extensions: None,
        }
    }

    pub fn extension(&self, slot: ExtensionSlot) -> Option<&ExtensionValue> {
        self.extensions.as_ref().and_then(|map| map.get(&slot))
    }
}
