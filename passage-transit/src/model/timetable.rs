use crate::error::RealtimeError;
use crate::model::realtime::{StopScheduleRelationship, TripScheduleRelationship, TripUpdate};
use crate::model::service_day::ServiceDay;
use crate::model::transfer::TransferTable;
use crate::model::trip::{FrequencyEntry, TripPattern, TripTimeEntry};
use chrono::NaiveDate;
use std::sync::Arc;

/// everything a timetable search needs to know about the searching path,
/// decoupled from the path-state machinery so the engine can be driven (and
/// tested) directly.
#[derive(Debug, Clone, Default)]
pub struct TripSearchContext {
    /// the nominal search instant, already adjusted for board or alight
    /// slack by the caller.
    pub time_epoch_seconds: i64,
    pub ever_boarded: bool,
    /// stop where the path last left (forward) or will next board
    /// (arrive-by) a vehicle; anchors transfer rules.
    pub previous_stop: Option<String>,
    pub previous_trip: Option<String>,
    pub last_alighted_epoch_seconds: Option<i64>,
    pub wheelchair: bool,
    pub carrying_bike: bool,
    pub omit_canceled: bool,
}

/// flex-service shifts applied to a timetable search. flag-stop boardings
/// happen partway along a hop, so the stop call moves by a fraction of that
/// trip's own running time (`offset_scale`, negative on the alight side);
/// deviated-route boardings add the vehicle's off-route travel, bounded by
/// the trip's demand-response window. zero everywhere for fixed-route stops.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlexAdjustment {
    pub offset_scale: f64,
    /// direct vehicle travel time off-route before rejoining to board.
    pub pre_board_direct_seconds: i64,
    /// direct vehicle travel time off-route after leaving to drop off.
    pub post_alight_direct_seconds: i64,
}

impl FlexAdjustment {
    /// the per-trip shift of the stop call at `stop_index`. running times
    /// differ between trips, so this is computed against each candidate
    /// entry rather than once per search.
    pub fn time_adjustment(&self, entry: &TripTimeEntry, stop_index: usize, boarding: bool) -> i64 {
        if boarding {
            let mut into_hop = 0;
            if self.offset_scale != 0.0 && stop_index + 1 < entry.num_stops() {
                into_hop =
                    (self.offset_scale * entry.running_time(stop_index) as f64).round() as i64;
            }
            let vehicle = if self.pre_board_direct_seconds == 0 {
                0
            } else {
                entry.demand_response_max_time(self.pre_board_direct_seconds)
            };
            into_hop - vehicle
        } else {
            let mut into_hop = 0;
            if self.offset_scale != 0.0 && stop_index >= 1 {
                into_hop =
                    (self.offset_scale * entry.running_time(stop_index - 1) as f64).round() as i64;
            }
            let vehicle = if self.post_alight_direct_seconds == 0 {
                0
            } else {
                entry.demand_response_max_time(self.post_alight_direct_seconds)
            };
            into_hop + vehicle
        }
    }
}

/// a successful timetable search: the matched entry and the boarding (or
/// alighting) time at the queried stop, in seconds since the service day's
/// midnight. frequency matches have no trip index; their entry is a
/// materialized run.
#[derive(Debug, Clone)]
pub struct TripMatch {
    pub trip_index: Option<usize>,
    pub entry: Arc<TripTimeEntry>,
    pub time: i64,
}

/// the trips of one pattern on one service day (or the scheduled baseline
/// when `service_date` is `None`). published timetables are immutable; the
/// realtime buffer clones a timetable, swaps one trip entry, and re-runs
/// [`finish`](Timetable::finish) before the copy is published.
#[derive(Debug, Clone)]
pub struct Timetable {
    pattern: Arc<TripPattern>,
    trip_times: Vec<Arc<TripTimeEntry>>,
    frequency_entries: Vec<FrequencyEntry>,
    service_date: Option<NaiveDate>,
    /// per-hop minimum running times over all trips, for lower-bound
    /// heuristics.
    min_running_times: Vec<i64>,
    min_dwell_times: Vec<i64>,
    /// earliest departure from the first stop and latest arrival at the
    /// last, the timetable's temporal envelope.
    min_time: i64,
    max_time: i64,
}

impl Timetable {
    pub fn new(pattern: Arc<TripPattern>) -> Timetable {
        let num_stops = pattern.num_stops();
        Timetable {
            pattern,
            trip_times: vec![],
            frequency_entries: vec![],
            service_date: None,
            min_running_times: vec![i64::MAX; num_stops.saturating_sub(1)],
            min_dwell_times: vec![i64::MAX; num_stops],
            min_time: i64::MAX,
            max_time: i64::MIN,
        }
    }

    pub fn pattern(&self) -> &Arc<TripPattern> {
        &self.pattern
    }

    pub fn service_date(&self) -> Option<NaiveDate> {
        self.service_date
    }

    pub fn set_service_date(&mut self, date: NaiveDate) {
        self.service_date = Some(date);
    }

    pub fn trip_times(&self) -> &[Arc<TripTimeEntry>] {
        &self.trip_times
    }

    pub fn frequency_entries(&self) -> &[FrequencyEntry] {
        &self.frequency_entries
    }

    pub fn add_trip(&mut self, entry: Arc<TripTimeEntry>) {
        self.trip_times.push(entry);
    }

    pub fn add_frequency(&mut self, entry: FrequencyEntry) {
        self.frequency_entries.push(entry);
    }

    pub fn trip_index(&self, trip_id: &str) -> Option<usize> {
        self.trip_times.iter().position(|t| t.trip_id() == trip_id)
    }

    pub fn set_trip(&mut self, trip_index: usize, entry: Arc<TripTimeEntry>) {
        self.trip_times[trip_index] = entry;
    }

    /// recomputes the per-hop minima and the temporal envelope. call after
    /// the trip list settles or changes.
    pub fn finish(&mut self) {
        let num_stops = self.pattern.num_stops();
        let last = num_stops.saturating_sub(1);
        self.min_running_times = vec![i64::MAX; last];
        self.min_dwell_times = vec![i64::MAX; num_stops];
        self.min_time = i64::MAX;
        self.max_time = i64::MIN;

        let templates = self
            .frequency_entries
            .iter()
            .map(|f| f.template().as_ref());
        for entry in self.trip_times.iter().map(|t| t.as_ref()).chain(templates) {
            for hop in 0..last {
                self.min_running_times[hop] = self.min_running_times[hop].min(entry.running_time(hop));
            }
            for stop in 0..num_stops {
                self.min_dwell_times[stop] = self.min_dwell_times[stop].min(entry.dwell_time(stop));
            }
        }
        for entry in &self.trip_times {
            self.min_time = self.min_time.min(entry.departure_time(0));
            self.max_time = self.max_time.max(entry.arrival_time(last));
        }
        for freq in &self.frequency_entries {
            self.min_time = self.min_time.min(freq.min_departure_time());
            self.max_time = self.max_time.max(freq.max_arrival_time());
        }
    }

    pub fn min_running_time(&self, hop: usize) -> i64 {
        self.min_running_times[hop]
    }

    pub fn min_dwell_time(&self, stop: usize) -> i64 {
        self.min_dwell_times[stop]
    }

    /// cheap admissibility pre-filter: can any trip here beat a wait of
    /// `best_wait_seconds` from the search instant? boarding compares
    /// against the earliest departure, alighting against the latest arrival.
    pub fn temporally_viable(
        &self,
        service_day: &ServiceDay,
        search_epoch_seconds: i64,
        best_wait_seconds: i64,
        boarding: bool,
    ) -> bool {
        let service_time = service_day.seconds_since_midnight(search_epoch_seconds);
        if boarding {
            service_time <= self.max_time
                && service_time.saturating_add(best_wait_seconds) > self.min_time
        } else {
            service_time >= self.min_time
                && service_time.saturating_sub(best_wait_seconds) < self.max_time
        }
    }

    /// finds the best boarding (earliest departure at or after the search
    /// time) or alighting (latest arrival at or before it) at `stop_index`.
    /// `flex` shifts each candidate's stop call for flag-stop and
    /// deviated-route service; frequency runs are fixed-route only and take
    /// no flex shift. fixed trips and frequency entries compete on equal
    /// footing.
    pub fn get_next_trip(
        &self,
        search: &TripSearchContext,
        service_day: &ServiceDay,
        stop_index: usize,
        boarding: bool,
        flex: &FlexAdjustment,
        transfers: Option<&TransferTable>,
    ) -> Option<TripMatch> {
        let service_time = service_day.seconds_since_midnight(search.time_epoch_seconds);
        let mut best: Option<TripMatch> = None;

        let improves = |candidate: i64, best: &Option<TripMatch>| match best {
            None => true,
            Some(b) => {
                if boarding {
                    candidate < b.time
                } else {
                    candidate > b.time
                }
            }
        };

        for (i, entry) in self.trip_times.iter().enumerate() {
            if !service_day.serves(entry.service_code()) {
                continue;
            }
            if !entry.acceptable(search.wheelchair, search.carrying_bike, search.omit_canceled) {
                continue;
            }
            if search.omit_canceled && entry.is_stop_canceled(stop_index) {
                continue;
            }
            let reference = match self.transfer_reference_time(
                search,
                service_day,
                stop_index,
                boarding,
                entry.trip_id(),
                transfers,
                service_time,
            ) {
                Some(reference) => reference,
                None => continue,
            };
            let candidate = if boarding {
                entry.departure_time(stop_index)
                    + flex.time_adjustment(entry, stop_index, boarding)
            } else {
                entry.arrival_time(stop_index) + flex.time_adjustment(entry, stop_index, boarding)
            };
            if candidate < 0 {
                continue;
            }
            let reachable = if boarding {
                candidate >= reference
            } else {
                candidate <= reference
            };
            if reachable && improves(candidate, &best) {
                best = Some(TripMatch {
                    trip_index: Some(i),
                    entry: entry.clone(),
                    time: candidate,
                });
            }
        }

        for freq in &self.frequency_entries {
            let template = freq.template();
            if !service_day.serves(template.service_code()) {
                continue;
            }
            if !template.acceptable(search.wheelchair, search.carrying_bike, search.omit_canceled)
            {
                continue;
            }
            let reference = match self.transfer_reference_time(
                search,
                service_day,
                stop_index,
                boarding,
                template.trip_id(),
                transfers,
                service_time,
            ) {
                Some(reference) => reference,
                None => continue,
            };
            if boarding {
                if let Some(departure) = freq.next_departure_time(stop_index, reference) {
                    if improves(departure, &best) {
                        best = Some(TripMatch {
                            trip_index: None,
                            entry: Arc::new(freq.materialize(stop_index, departure)),
                            time: departure,
                        });
                    }
                }
            } else if let Some(arrival) = freq.prev_arrival_time(stop_index, reference) {
                if improves(arrival, &best) {
                    best = Some(TripMatch {
                        trip_index: None,
                        entry: Arc::new(freq.materialize_by_arrival(stop_index, arrival)),
                        time: arrival,
                    });
                }
            }
        }

        best
    }

    /// the transfer-adjusted reference time a candidate trip must meet, or
    /// `None` when a transfer rule forbids the connection. only a timed
    /// transfer can move the reference before the nominal search time; a
    /// min-time rule floors at it.
    fn transfer_reference_time(
        &self,
        search: &TripSearchContext,
        service_day: &ServiceDay,
        stop_index: usize,
        boarding: bool,
        candidate_trip: &str,
        transfers: Option<&TransferTable>,
        service_time: i64,
    ) -> Option<i64> {
        let table = match transfers {
            Some(table) => table,
            None => return Some(service_time),
        };
        if !search.ever_boarded {
            return Some(service_time);
        }
        let (previous_stop, anchor_epoch) =
            match (&search.previous_stop, search.last_alighted_epoch_seconds) {
                (Some(stop), Some(epoch)) => (stop.as_str(), epoch),
                _ => return Some(service_time),
            };
        let anchor = service_day.seconds_since_midnight(anchor_epoch);
        let this_stop = &self.pattern.stop_ids[stop_index];
        let previous_trip = search.previous_trip.as_deref();
        if boarding {
            let rule = table.rule(previous_stop, this_stop, previous_trip, Some(candidate_trip));
            TransferTable::adjusted_board_time(rule, anchor, service_time)
        } else {
            let rule = table.rule(this_stop, previous_stop, Some(candidate_trip), previous_trip);
            TransferTable::adjusted_alight_time(rule, anchor, service_time)
        }
    }

    /// merges a realtime update into a fresh copy of the matching trip's
    /// entry. the timetable itself is not modified; the caller swaps the
    /// returned entry in. any rejection leaves the previous entry standing.
    pub fn apply_update(
        &self,
        update: &TripUpdate,
        midnight_epoch_seconds: i64,
    ) -> Result<(usize, Arc<TripTimeEntry>), RealtimeError> {
        let trip_index = self.trip_index(&update.trip_id).ok_or_else(|| {
            RealtimeError::UnknownTrip(update.trip_id.clone(), self.pattern.pattern_id.clone())
        })?;
        let mut entry = (*self.trip_times[trip_index]).clone();

        if update.schedule_relationship == TripScheduleRelationship::Canceled {
            entry.cancel_trip();
            return Ok((trip_index, Arc::new(entry)));
        }
        if update.stop_time_updates.is_empty() {
            return Err(RealtimeError::EmptyUpdate(update.trip_id.clone()));
        }

        let mut revisions = update.stop_time_updates.iter().peekable();
        // running delay carried forward to stops with no revision of their own
        let mut delay: Option<i64> = None;
        let mut first_updated: Option<(usize, i64)> = None;
        for stop in 0..entry.num_stops() {
            let matched = revisions
                .peek()
                .is_some_and(|r| r.matches(entry.stop_sequence(stop), &self.pattern.stop_ids[stop]));
            if !matched {
                if let Some(d) = delay {
                    entry.update_arrival_delay(stop, d);
                    entry.update_departure_delay(stop, d);
                }
                continue;
            }
            let revision = match revisions.next() {
                Some(revision) => revision,
                None => break,
            };
            match revision.schedule_relationship {
                StopScheduleRelationship::Skipped => {
                    entry.cancel_stop(stop);
                }
                StopScheduleRelationship::NoData => {
                    // scheduled times stand and propagation stops here
                    entry.set_no_data(stop);
                    delay = None;
                }
                StopScheduleRelationship::Scheduled => {
                    let scheduled_arrival = entry.scheduled_arrival_time(stop);
                    let scheduled_departure = entry.scheduled_departure_time(stop);
                    let arrival = match &revision.arrival {
                        Some(event) => Some(
                            event
                                .resolve(scheduled_arrival, midnight_epoch_seconds)
                                .ok_or_else(|| {
                                    RealtimeError::MissingEventTime(update.trip_id.clone())
                                })?,
                        ),
                        None => None,
                    };
                    let departure = match &revision.departure {
                        Some(event) => Some(
                            event
                                .resolve(scheduled_departure, midnight_epoch_seconds)
                                .ok_or_else(|| {
                                    RealtimeError::MissingEventTime(update.trip_id.clone())
                                })?,
                        ),
                        None => None,
                    };
                    if arrival.is_none() && departure.is_none() {
                        return Err(RealtimeError::MissingEventTime(update.trip_id.clone()));
                    }
                    // a one-sided revision applies its delay to both sides
                    let arrival = arrival
                        .unwrap_or_else(|| {
                            scheduled_arrival + (departure.unwrap_or(scheduled_departure) - scheduled_departure)
                        });
                    let departure =
                        departure.unwrap_or(scheduled_departure + (arrival - scheduled_arrival));
                    entry.update_arrival_time(stop, arrival);
                    entry.update_departure_time(stop, departure);
                    delay = Some(departure - scheduled_departure);
                    if first_updated.is_none() {
                        first_updated = Some((stop, arrival - scheduled_arrival));
                    }
                }
            }
        }
        let unmatched = revisions.count();
        if unmatched > 0 {
            return Err(RealtimeError::UnmatchedStops(update.trip_id.clone(), unmatched));
        }

        // an early first revision would put earlier untouched stops after it;
        // propagate a negative first delay backward to keep times coherent
        if let Some((first_stop, delta)) = first_updated {
            if delta < 0 {
                for stop in 0..first_stop {
                    entry.update_arrival_delay(stop, delta);
                    entry.update_departure_delay(stop, delta);
                }
            }
        }

        if let Some(stop) = entry.first_decreasing_stop() {
            return Err(RealtimeError::NonIncreasingTimes(update.trip_id.clone(), stop));
        }
        Ok((trip_index, Arc::new(entry)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::realtime::{StopTimeEvent, StopTimeUpdate};
    use crate::model::transfer::TransferRule;
    use std::collections::HashSet;

    const MIDNIGHT: i64 = 1_000_000;

    fn pattern() -> Arc<TripPattern> {
        Arc::new(TripPattern::new(
            "p1",
            "r1",
            vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
            HashSet::from([1]),
        ))
    }

    fn service_day() -> ServiceDay {
        ServiceDay::new(
            "2026-08-25".parse().expect("date should parse"),
            MIDNIGHT,
            HashSet::from([1]),
        )
    }

    /// departures from s1 at 28800, 29400, 30000, each a 10-minute run.
    fn timetable() -> Timetable {
        let mut timetable = Timetable::new(pattern());
        for (trip, start) in [("t1", 28_800), ("t2", 29_400), ("t3", 30_000)] {
            timetable.add_trip(Arc::new(TripTimeEntry::scheduled(
                trip,
                1,
                vec![start, start + 300, start + 600],
                vec![start, start + 300, start + 600],
            )));
        }
        timetable.finish();
        timetable
    }

    fn search_at(seconds_since_midnight: i64) -> TripSearchContext {
        TripSearchContext {
            time_epoch_seconds: MIDNIGHT + seconds_since_midnight,
            omit_canceled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_boarding_finds_earliest_departure_at_or_after() {
        let timetable = timetable();
        let day = service_day();
        let board = |t: i64| {
            timetable
                .get_next_trip(&search_at(t), &day, 0, true, &FlexAdjustment::default(), None)
                .map(|m| m.time)
        };
        assert_eq!(board(29_000), Some(29_400));
        assert_eq!(board(30_000), Some(30_000));
        assert_eq!(board(30_001), None);
    }

    #[test]
    fn test_alighting_finds_latest_arrival_at_or_before() {
        let timetable = timetable();
        let day = service_day();
        let alight = |t: i64| {
            timetable
                .get_next_trip(&search_at(t), &day, 2, false, &FlexAdjustment::default(), None)
                .map(|m| m.time)
        };
        assert_eq!(alight(30_500), Some(30_000));
        assert_eq!(alight(29_400), Some(29_400));
        assert_eq!(alight(29_399), None);
    }

    #[test]
    fn test_wrong_service_day_matches_nothing() {
        let timetable = timetable();
        let other_day = ServiceDay::new(
            "2026-08-26".parse().expect("date should parse"),
            MIDNIGHT + 86_400,
            HashSet::from([2]),
        );
        assert!(timetable
            .get_next_trip(&search_at(29_000), &other_day, 0, true, &FlexAdjustment::default(), None)
            .is_none());
    }

    #[test]
    fn test_canceled_trip_is_skipped_unless_requested() {
        let mut timetable = timetable();
        let mut canceled = (*timetable.trip_times()[1]).clone();
        canceled.cancel_trip();
        timetable.set_trip(1, Arc::new(canceled));
        let day = service_day();
        let found = timetable
            .get_next_trip(&search_at(29_000), &day, 0, true, &FlexAdjustment::default(), None)
            .expect("a later trip should be found");
        assert_eq!(found.time, 30_000);

        let mut lenient = search_at(29_000);
        lenient.omit_canceled = false;
        let found = timetable
            .get_next_trip(&lenient, &day, 0, true, &FlexAdjustment::default(), None)
            .expect("the canceled trip should be boardable when not omitted");
        assert_eq!(found.time, 29_400);
    }

    #[test]
    fn test_forbidden_transfer_blocks_the_connection() {
        let timetable = timetable();
        let day = service_day();
        let mut transfers = TransferTable::new();
        transfers.add_stop_rule("x1", "s1", TransferRule::Forbidden);
        let search = TripSearchContext {
            ever_boarded: true,
            previous_stop: Some("x1".to_string()),
            previous_trip: Some("t0".to_string()),
            last_alighted_epoch_seconds: Some(MIDNIGHT + 28_900),
            ..search_at(29_000)
        };
        assert!(timetable
            .get_next_trip(&search, &day, 0, true, &FlexAdjustment::default(), Some(&transfers))
            .is_none());
    }

    #[test]
    fn test_timed_transfer_boards_before_the_nominal_search_time() {
        let timetable = timetable();
        let day = service_day();
        let mut transfers = TransferTable::new();
        transfers.add_stop_rule("x1", "s1", TransferRule::Timed);
        // alighted at 29300; nominal search time already past t2's departure
        let search = TripSearchContext {
            ever_boarded: true,
            previous_stop: Some("x1".to_string()),
            previous_trip: Some("t0".to_string()),
            last_alighted_epoch_seconds: Some(MIDNIGHT + 29_300),
            ..search_at(29_500)
        };
        let found = timetable
            .get_next_trip(&search, &day, 0, true, &FlexAdjustment::default(), Some(&transfers))
            .expect("timed transfer should reach the waiting vehicle");
        assert_eq!(found.time, 29_400);
    }

    #[test]
    fn test_satisfied_min_time_transfer_cannot_board_a_departed_trip() {
        let timetable = timetable();
        let day = service_day();
        let mut transfers = TransferTable::new();
        transfers.add_stop_rule("x1", "s1", TransferRule::MinTime(120));
        // alighted at 28000; by 29500 the minimum is long satisfied, so t1
        // (gone at 28800) and t2 (gone at 29400) are out of reach
        let search = TripSearchContext {
            ever_boarded: true,
            previous_stop: Some("x1".to_string()),
            previous_trip: Some("t0".to_string()),
            last_alighted_epoch_seconds: Some(MIDNIGHT + 28_000),
            ..search_at(29_500)
        };
        let found = timetable
            .get_next_trip(&search, &day, 0, true, &FlexAdjustment::default(), Some(&transfers))
            .expect("a trip still ahead of the rider should be found");
        assert_eq!(found.time, 30_000);
    }

    #[test]
    fn test_flag_stop_offset_scales_each_trips_own_hop() {
        // two trips leave s1 together but run the first hop at different
        // speeds, so the same flag stop sits at different times into it
        let mut timetable = Timetable::new(pattern());
        timetable.add_trip(Arc::new(TripTimeEntry::scheduled(
            "quick",
            1,
            vec![28_800, 29_100, 29_400],
            vec![28_800, 29_100, 29_400],
        )));
        timetable.add_trip(Arc::new(TripTimeEntry::scheduled(
            "slow",
            1,
            vec![28_800, 29_400, 30_000],
            vec![28_800, 29_400, 30_000],
        )));
        timetable.finish();
        let day = service_day();
        let flex = FlexAdjustment {
            offset_scale: 0.5,
            ..Default::default()
        };
        // halfway along the hop: quick passes at 28950, slow at 29100
        let found = timetable
            .get_next_trip(&search_at(29_000), &day, 0, true, &flex, None)
            .expect("the slower trip should still be catchable");
        assert_eq!(found.entry.trip_id(), "slow");
        assert_eq!(found.time, 29_100);
    }

    #[test]
    fn test_deviated_route_board_subtracts_the_vehicle_detour() {
        let mut timetable = Timetable::new(pattern());
        timetable.add_trip(Arc::new(
            TripTimeEntry::scheduled(
                "drt",
                1,
                vec![28_800, 29_100, 29_400],
                vec![28_800, 29_100, 29_400],
            )
            .with_demand_response(2.0, 60),
        ));
        timetable.finish();
        let day = service_day();
        let flex = FlexAdjustment {
            pre_board_direct_seconds: 100,
            ..Default::default()
        };
        // the vehicle leaves the route 2.0 * 100 + 60 = 260s before the
        // scheduled timepoint to pick the rider up
        let found = timetable
            .get_next_trip(&search_at(28_500), &day, 0, true, &flex, None)
            .expect("the deviated board should be found");
        assert_eq!(found.time, 28_540);
    }

    #[test]
    fn test_frequency_entries_compete_with_fixed_trips() {
        let mut timetable = timetable();
        let template = Arc::new(TripTimeEntry::scheduled(
            "freq",
            1,
            vec![0, 300, 600],
            vec![0, 300, 600],
        ));
        timetable.add_frequency(FrequencyEntry::new(28_800, 32_400, 120, true, template));
        timetable.finish();
        let day = service_day();
        let found = timetable
            .get_next_trip(&search_at(29_000), &day, 0, true, &FlexAdjustment::default(), None)
            .expect("the frequency run should win");
        assert_eq!(found.time, 29_040);
        assert!(found.trip_index.is_none());
        assert_eq!(found.entry.departure_time(0), 29_040);
    }

    #[test]
    fn test_temporal_viability_envelope() {
        let timetable = timetable();
        let day = service_day();
        assert!(timetable.temporally_viable(&day, MIDNIGHT + 29_000, i64::MAX, true));
        // the last departure has left
        assert!(!timetable.temporally_viable(&day, MIDNIGHT + 31_000, i64::MAX, true));
        // a better wait already exists; the earliest departure cannot beat it
        assert!(!timetable.temporally_viable(&day, MIDNIGHT + 28_000, 800, true));
        assert!(timetable.temporally_viable(&day, MIDNIGHT + 30_700, i64::MAX, false));
        assert!(!timetable.temporally_viable(&day, MIDNIGHT + 28_000, i64::MAX, false));
    }

    #[test]
    fn test_finish_computes_minima() {
        let timetable = timetable();
        assert_eq!(timetable.min_running_time(0), 300);
        assert_eq!(timetable.min_dwell_time(1), 0);
    }

    /* realtime merging */

    fn delay_update(trip: &str, stop_sequence: u32, delay: i64) -> TripUpdate {
        TripUpdate {
            trip_id: trip.to_string(),
            service_date: "2026-08-25".parse().expect("date should parse"),
            schedule_relationship: TripScheduleRelationship::Scheduled,
            stop_time_updates: vec![StopTimeUpdate {
                stop_sequence: Some(stop_sequence),
                stop_id: None,
                arrival: Some(StopTimeEvent::delay(delay)),
                departure: Some(StopTimeEvent::delay(delay)),
                schedule_relationship: StopScheduleRelationship::Scheduled,
            }],
        }
    }

    #[test]
    fn test_delay_propagates_forward() {
        let timetable = timetable();
        let (index, entry) = timetable
            .apply_update(&delay_update("t1", 1, 120), MIDNIGHT)
            .expect("update should apply");
        assert_eq!(index, 0);
        assert_eq!(entry.departure_time(0), 28_800);
        assert_eq!(entry.departure_time(1), 29_220);
        // the unrevised downstream stop inherits the delay
        assert_eq!(entry.arrival_time(2), 29_520);
        assert!(entry.is_realtime());
    }

    #[test]
    fn test_negative_first_delay_propagates_backward() {
        let timetable = timetable();
        let (_, entry) = timetable
            .apply_update(&delay_update("t1", 1, -120), MIDNIGHT)
            .expect("update should apply");
        // without backward propagation stop 0's departure would sit after
        // stop 1's arrival
        assert_eq!(entry.departure_time(0), 28_680);
        assert_eq!(entry.arrival_time(1), 28_980);
        assert!(entry.times_increasing());
    }

    #[test]
    fn test_skipped_stop_is_canceled_but_trip_survives() {
        let timetable = timetable();
        let update = TripUpdate {
            trip_id: "t2".to_string(),
            service_date: "2026-08-25".parse().expect("date should parse"),
            schedule_relationship: TripScheduleRelationship::Scheduled,
            stop_time_updates: vec![StopTimeUpdate {
                stop_sequence: None,
                stop_id: Some("s2".to_string()),
                arrival: None,
                departure: None,
                schedule_relationship: StopScheduleRelationship::Skipped,
            }],
        };
        let (_, entry) = timetable
            .apply_update(&update, MIDNIGHT)
            .expect("update should apply");
        assert!(entry.is_stop_canceled(1));
        assert!(!entry.is_canceled());
        assert!(!entry.is_stop_canceled(0));
    }

    #[test]
    fn test_non_monotonic_update_is_rejected_whole() {
        let timetable = timetable();
        let update = TripUpdate {
            trip_id: "t1".to_string(),
            service_date: "2026-08-25".parse().expect("date should parse"),
            schedule_relationship: TripScheduleRelationship::Scheduled,
            stop_time_updates: vec![
                StopTimeUpdate {
                    stop_sequence: Some(1),
                    stop_id: None,
                    arrival: Some(StopTimeEvent::delay(900)),
                    departure: Some(StopTimeEvent::delay(900)),
                    schedule_relationship: StopScheduleRelationship::Scheduled,
                },
                StopTimeUpdate {
                    stop_sequence: Some(2),
                    stop_id: None,
                    arrival: Some(StopTimeEvent::delay(0)),
                    departure: Some(StopTimeEvent::delay(0)),
                    schedule_relationship: StopScheduleRelationship::Scheduled,
                },
            ],
        };
        let result = timetable.apply_update(&update, MIDNIGHT);
        assert!(matches!(
            result,
            Err(RealtimeError::NonIncreasingTimes(_, 2))
        ));
    }

    #[test]
    fn test_unknown_trip_and_unmatched_stops_are_rejected() {
        let timetable = timetable();
        assert!(matches!(
            timetable.apply_update(&delay_update("ghost", 0, 60), MIDNIGHT),
            Err(RealtimeError::UnknownTrip(_, _))
        ));
        assert!(matches!(
            timetable.apply_update(&delay_update("t1", 9, 60), MIDNIGHT),
            Err(RealtimeError::UnmatchedStops(_, 1))
        ));
    }

    #[test]
    fn test_whole_trip_cancellation() {
        let timetable = timetable();
        let update = TripUpdate {
            trip_id: "t3".to_string(),
            service_date: "2026-08-25".parse().expect("date should parse"),
            schedule_relationship: TripScheduleRelationship::Canceled,
            stop_time_updates: vec![],
        };
        let (index, entry) = timetable
            .apply_update(&update, MIDNIGHT)
            .expect("cancellation should apply");
        assert_eq!(index, 2);
        assert!(entry.is_canceled());
        // the source timetable still carries the scheduled entry
        assert!(!timetable.trip_times()[2].is_canceled());
    }
}
