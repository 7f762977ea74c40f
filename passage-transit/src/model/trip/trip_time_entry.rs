/// the stop times of one trip on one pattern: scheduled times plus the
/// realtime layer (updated times, per-stop cancellation and no-data flags,
/// whole-trip cancellation). all times are seconds since the service day's
/// midnight; overnight trips simply exceed 86400.
///
/// entries are shared immutably between snapshots. realtime merging clones
/// an entry, edits the copy through the mutators, and swaps it in; a
/// published entry is never written.
#[derive(Debug, Clone)]
pub struct TripTimeEntry {
    trip_id: String,
    service_code: usize,
    stop_sequences: Vec<u32>,
    scheduled_arrivals: Vec<i64>,
    scheduled_departures: Vec<i64>,
    arrivals: Vec<i64>,
    departures: Vec<i64>,
    stop_canceled: Vec<bool>,
    stop_no_data: Vec<bool>,
    trip_canceled: bool,
    realtime: bool,
    wheelchair_accessible: bool,
    bikes_allowed: bool,
    /// whole-trip shift, used to materialize frequency-based boardings from
    /// a template entry.
    time_shift: i64,
    /// demand-response travel-time scaling for flex direct-ride windows:
    /// max ride time = direct time * factor + constant.
    drt_factor: f64,
    drt_constant: i64,
}

impl TripTimeEntry {
    /// a purely scheduled entry. `arrivals` and `departures` must be the
    /// same length and non-decreasing.
    pub fn scheduled(
        trip_id: &str,
        service_code: usize,
        arrivals: Vec<i64>,
        departures: Vec<i64>,
    ) -> TripTimeEntry {
        assert_eq!(
            arrivals.len(),
            departures.len(),
            "arrival and departure lists must be parallel"
        );
        let n = arrivals.len();
        TripTimeEntry {
            trip_id: trip_id.to_string(),
            service_code,
            stop_sequences: (0..n as u32).collect(),
            arrivals: arrivals.clone(),
            departures: departures.clone(),
            scheduled_arrivals: arrivals,
            scheduled_departures: departures,
            stop_canceled: vec![false; n],
            stop_no_data: vec![false; n],
            trip_canceled: false,
            realtime: false,
            wheelchair_accessible: true,
            bikes_allowed: true,
            time_shift: 0,
            drt_factor: 1.0,
            drt_constant: 0,
        }
    }

    pub fn with_stop_sequences(mut self, stop_sequences: Vec<u32>) -> TripTimeEntry {
        assert_eq!(stop_sequences.len(), self.arrivals.len());
        self.stop_sequences = stop_sequences;
        self
    }

    pub fn with_accessibility(
        mut self,
        wheelchair_accessible: bool,
        bikes_allowed: bool,
    ) -> TripTimeEntry {
        self.wheelchair_accessible = wheelchair_accessible;
        self.bikes_allowed = bikes_allowed;
        self
    }

    pub fn with_demand_response(mut self, factor: f64, constant: i64) -> TripTimeEntry {
        self.drt_factor = factor;
        self.drt_constant = constant;
        self
    }

    pub fn trip_id(&self) -> &str {
        &self.trip_id
    }

    pub fn service_code(&self) -> usize {
        self.service_code
    }

    pub fn num_stops(&self) -> usize {
        self.arrivals.len()
    }

    pub fn stop_sequence(&self, stop: usize) -> u32 {
        self.stop_sequences[stop]
    }

    pub fn arrival_time(&self, stop: usize) -> i64 {
        self.arrivals[stop] + self.time_shift
    }

    pub fn departure_time(&self, stop: usize) -> i64 {
        self.departures[stop] + self.time_shift
    }

    pub fn scheduled_arrival_time(&self, stop: usize) -> i64 {
        self.scheduled_arrivals[stop] + self.time_shift
    }

    pub fn scheduled_departure_time(&self, stop: usize) -> i64 {
        self.scheduled_departures[stop] + self.time_shift
    }

    pub fn arrival_delay(&self, stop: usize) -> i64 {
        self.arrivals[stop] - self.scheduled_arrivals[stop]
    }

    pub fn departure_delay(&self, stop: usize) -> i64 {
        self.departures[stop] - self.scheduled_departures[stop]
    }

    pub fn is_stop_canceled(&self, stop: usize) -> bool {
        self.stop_canceled[stop]
    }

    pub fn has_no_data(&self, stop: usize) -> bool {
        self.stop_no_data[stop]
    }

    pub fn is_canceled(&self) -> bool {
        self.trip_canceled
    }

    pub fn is_realtime(&self) -> bool {
        self.realtime
    }

    pub fn is_wheelchair_accessible(&self) -> bool {
        self.wheelchair_accessible
    }

    pub fn bikes_allowed(&self) -> bool {
        self.bikes_allowed
    }

    /// travel time between consecutive stops.
    pub fn running_time(&self, hop: usize) -> i64 {
        self.arrivals[hop + 1] - self.departures[hop]
    }

    pub fn dwell_time(&self, stop: usize) -> i64 {
        self.departures[stop] - self.arrivals[stop]
    }

    /// whether this trip can serve the rider at all, before any time check.
    pub fn acceptable(&self, wheelchair: bool, carrying_bike: bool, omit_canceled: bool) -> bool {
        if omit_canceled && self.trip_canceled {
            return false;
        }
        if wheelchair && !self.wheelchair_accessible {
            return false;
        }
        if carrying_bike && !self.bikes_allowed {
            return false;
        }
        true
    }

    /// the longest acceptable ride for a demand-response (flex) segment with
    /// the given direct travel time.
    pub fn demand_response_max_time(&self, direct_seconds: i64) -> i64 {
        (direct_seconds as f64 * self.drt_factor).round() as i64 + self.drt_constant
    }

    /// a copy shifted whole by `shift` seconds; used to materialize one
    /// concrete run out of a frequency template.
    pub fn time_shifted_copy(&self, shift: i64) -> TripTimeEntry {
        let mut copy = self.clone();
        copy.time_shift += shift;
        copy
    }

    /* realtime mutators, used only on freshly-cloned entries */

    pub fn update_arrival_time(&mut self, stop: usize, time: i64) {
        self.arrivals[stop] = time - self.time_shift;
        self.realtime = true;
    }

    pub fn update_arrival_delay(&mut self, stop: usize, delay: i64) {
        self.arrivals[stop] = self.scheduled_arrivals[stop] + delay;
        self.realtime = true;
    }

    pub fn update_departure_time(&mut self, stop: usize, time: i64) {
        self.departures[stop] = time - self.time_shift;
        self.realtime = true;
    }

    pub fn update_departure_delay(&mut self, stop: usize, delay: i64) {
        self.departures[stop] = self.scheduled_departures[stop] + delay;
        self.realtime = true;
    }

    pub fn cancel_stop(&mut self, stop: usize) {
        self.stop_canceled[stop] = true;
        self.realtime = true;
    }

    pub fn set_no_data(&mut self, stop: usize) {
        self.stop_no_data[stop] = true;
        self.arrivals[stop] = self.scheduled_arrivals[stop];
        self.departures[stop] = self.scheduled_departures[stop];
        self.realtime = true;
    }

    pub fn cancel_trip(&mut self) {
        self.trip_canceled = true;
        self.realtime = true;
    }

    /// the first stop index at which times stop being non-decreasing, or
    /// `None` when the entry is temporally coherent. canceled stops are
    /// skipped; their times are meaningless.
    pub fn first_decreasing_stop(&self) -> Option<usize> {
        let mut previous_departure: Option<i64> = None;
        for stop in 0..self.num_stops() {
            if self.stop_canceled[stop] {
                continue;
            }
            if self.departures[stop] < self.arrivals[stop] {
                return Some(stop);
            }
            if let Some(prev) = previous_departure {
                if self.arrivals[stop] < prev {
                    return Some(stop);
                }
            }
            previous_departure = Some(self.departures[stop]);
        }
        None
    }

    pub fn times_increasing(&self) -> bool {
        self.first_decreasing_stop().is_none()
    }
}
