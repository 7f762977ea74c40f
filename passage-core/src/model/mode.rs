use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// the mode a traveler is using at a point along a path. `LegSwitch` is the
/// pseudo-mode produced by mode-transition edges (parking, rental pickup and
/// drop-off) which have no geometry of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraverseMode {
    Walk,
    Bicycle,
    Car,
    Transit,
    LegSwitch,
}

impl TraverseMode {
    /// whether this mode travels over street geometry.
    pub fn is_on_street(&self) -> bool {
        matches!(
            self,
            TraverseMode::Walk | TraverseMode::Bicycle | TraverseMode::Car
        )
    }
}

impl Display for TraverseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TraverseMode::Walk => "walk",
            TraverseMode::Bicycle => "bicycle",
            TraverseMode::Car => "car",
            TraverseMode::Transit => "transit",
            TraverseMode::LegSwitch => "leg_switch",
        };
        write!(f, "{s}")
    }
}

/// the set of modes a request (or a street edge's permission mask) allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ModeSet {
    pub walk: bool,
    pub bicycle: bool,
    pub car: bool,
    pub transit: bool,
}

impl ModeSet {
    pub const WALK_ONLY: ModeSet = ModeSet {
        walk: true,
        bicycle: false,
        car: false,
        transit: false,
    };

    pub fn new(walk: bool, bicycle: bool, car: bool, transit: bool) -> ModeSet {
        ModeSet {
            walk,
            bicycle,
            car,
            transit,
        }
    }

    pub fn allows(&self, mode: TraverseMode) -> bool {
        match mode {
            TraverseMode::Walk => self.walk,
            TraverseMode::Bicycle => self.bicycle,
            TraverseMode::Car => self.car,
            TraverseMode::Transit => self.transit,
            TraverseMode::LegSwitch => true,
        }
    }

    pub fn has_transit(&self) -> bool {
        self.transit
    }
}
