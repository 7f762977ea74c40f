use std::collections::HashSet;

/// a journey pattern: the ordered stops shared by a set of trips on one
/// route. the pattern's timetables live in the published snapshot, keyed by
/// pattern id, so patterns themselves stay immutable under realtime churn.
#[derive(Debug, Clone)]
pub struct TripPattern {
    pub pattern_id: String,
    pub route_id: String,
    pub stop_ids: Vec<String>,
    /// service codes of all trips grouped under this pattern, for cheap
    /// does-anything-run-today pruning.
    pub services: HashSet<usize>,
}

impl TripPattern {
    pub fn new(
        pattern_id: &str,
        route_id: &str,
        stop_ids: Vec<String>,
        services: HashSet<usize>,
    ) -> TripPattern {
        TripPattern {
            pattern_id: pattern_id.to_string(),
            route_id: route_id.to_string(),
            stop_ids,
            services,
        }
    }

    pub fn num_stops(&self) -> usize {
        self.stop_ids.len()
    }

    pub fn stop_index_of(&self, stop_id: &str) -> Option<usize> {
        self.stop_ids.iter().position(|s| s == stop_id)
    }
}
