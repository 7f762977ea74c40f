use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// seconds in one service day, used to resolve state times to a time-of-day
/// for facility opening-hours checks.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// below this many free spaces a car park is treated as effectively full
/// when the request asks for availability-aware routing.
pub const FEW_SPACES_THRESHOLD: i32 = 5;

/// a vertex in the transportation graph. graph construction is an external
/// collaborator; edges hold their endpoints directly, so a vertex only
/// carries identity, a display name, and its kind.
#[derive(Debug)]
pub struct Vertex {
    pub vertex_id: usize,
    pub name: String,
    pub kind: VertexKind,
}

/// vertex variants, flattened to a single tagged enum rather than a
/// subtype hierarchy. facility-backed variants share their facility record
/// so that availability updates are visible through every referencing vertex.
#[derive(Debug)]
pub enum VertexKind {
    Street,
    TransitStop { stop_id: String },
    CarPark(Arc<CarParkFacility>),
    BikePark(Arc<BikeParkFacility>),
    BikeRental(Arc<BikeRentalStation>),
    /// a splice vertex created for one request's origin or destination.
    /// states reaching a temporary vertex registered to a different request
    /// are rejected by the state editor.
    Temporary { request_id: u64 },
}

impl Vertex {
    pub fn new(vertex_id: usize, name: &str, kind: VertexKind) -> Vertex {
        Vertex {
            vertex_id,
            name: name.to_string(),
            kind,
        }
    }

    pub fn street(vertex_id: usize, name: &str) -> Arc<Vertex> {
        Arc::new(Vertex::new(vertex_id, name, VertexKind::Street))
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self.kind, VertexKind::Temporary { .. })
    }
}

/// a park-and-ride facility. `spaces_available` is written only by the
/// single-writer update stream and read without locking by searches.
#[derive(Debug)]
pub struct CarParkFacility {
    pub park_id: String,
    pub name: String,
    spaces_available: AtomicI32,
    /// open interval in seconds-of-day `[open, close)`. `None` means the
    /// facility never closes.
    pub open_window: Option<(i64, i64)>,
}

impl CarParkFacility {
    pub fn new(
        park_id: &str,
        name: &str,
        spaces_available: i32,
        open_window: Option<(i64, i64)>,
    ) -> CarParkFacility {
        CarParkFacility {
            park_id: park_id.to_string(),
            name: name.to_string(),
            spaces_available: AtomicI32::new(spaces_available),
            open_window,
        }
    }

    pub fn spaces_available(&self) -> i32 {
        self.spaces_available.load(Ordering::Relaxed)
    }

    pub fn set_spaces_available(&self, spaces: i32) {
        self.spaces_available.store(spaces, Ordering::Relaxed)
    }

    pub fn has_few_spaces_available(&self) -> bool {
        self.spaces_available() < FEW_SPACES_THRESHOLD
    }

    pub fn is_closed_at(&self, second_of_day: i64) -> bool {
        match self.open_window {
            None => false,
            Some((open, close)) => second_of_day < open || second_of_day >= close,
        }
    }

    /// the next second-of-day (possibly beyond midnight) at which the
    /// facility opens, or `None` if it never closes.
    pub fn opens_next(&self, second_of_day: i64) -> Option<i64> {
        match self.open_window {
            None => None,
            Some((open, _)) => {
                if second_of_day < open {
                    Some(open)
                } else {
                    Some(open + SECONDS_PER_DAY)
                }
            }
        }
    }
}

/// a bike parking facility.
#[derive(Debug)]
pub struct BikeParkFacility {
    pub park_id: String,
    pub name: String,
    spaces_available: AtomicI32,
}

impl BikeParkFacility {
    pub fn new(park_id: &str, name: &str, spaces_available: i32) -> BikeParkFacility {
        BikeParkFacility {
            park_id: park_id.to_string(),
            name: name.to_string(),
            spaces_available: AtomicI32::new(spaces_available),
        }
    }

    pub fn spaces_available(&self) -> i32 {
        self.spaces_available.load(Ordering::Relaxed)
    }

    pub fn set_spaces_available(&self, spaces: i32) {
        self.spaces_available.store(spaces, Ordering::Relaxed)
    }
}

/// a bike rental station (or free-floating rental zone anchor). membership
/// in one or more rental networks drives pickup/drop-off compatibility.
#[derive(Debug)]
pub struct BikeRentalStation {
    pub station_id: String,
    pub name: String,
    pub networks: HashSet<String>,
    bikes_available: AtomicI32,
    spaces_available: AtomicI32,
    /// whether this station accepts returns at all (some zones are
    /// pickup-only anchors).
    pub allow_drop_off: bool,
}

impl BikeRentalStation {
    pub fn new(
        station_id: &str,
        name: &str,
        networks: HashSet<String>,
        bikes_available: i32,
        spaces_available: i32,
        allow_drop_off: bool,
    ) -> BikeRentalStation {
        BikeRentalStation {
            station_id: station_id.to_string(),
            name: name.to_string(),
            networks,
            bikes_available: AtomicI32::new(bikes_available),
            spaces_available: AtomicI32::new(spaces_available),
            allow_drop_off,
        }
    }

    pub fn bikes_available(&self) -> i32 {
        self.bikes_available.load(Ordering::Relaxed)
    }

    pub fn spaces_available(&self) -> i32 {
        self.spaces_available.load(Ordering::Relaxed)
    }

    pub fn set_bikes_available(&self, bikes: i32) {
        self.bikes_available.store(bikes, Ordering::Relaxed)
    }

    pub fn set_spaces_available(&self, spaces: i32) {
        self.spaces_available.store(spaces, Ordering::Relaxed)
    }

    /// whether this station belongs to any of the given networks.
    pub fn compatible_with(&self, networks: &HashSet<String>) -> bool {
        !self.networks.is_disjoint(networks)
    }
}

/// maps an epoch-second instant onto a second-of-day for opening-hours
/// checks. local-time resolution is an external concern; the caller supplies
/// times already shifted into the facility's frame.
pub fn second_of_day(epoch_seconds: i64) -> i64 {
    epoch_seconds.rem_euclid(SECONDS_PER_DAY)
}
