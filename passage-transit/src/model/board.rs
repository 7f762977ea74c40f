use crate::model::service_day::{ServiceCalendar, ServiceDay};
use crate::model::snapshot::SnapshotPublisher;
use crate::model::timetable::{FlexAdjustment, TripMatch, TripSearchContext};
use crate::model::transfer::TransferTable;
use crate::model::trip::{TripPattern, TripTimeEntry};
use passage_core::model::mode::TraverseMode;
use passage_core::model::network::Vertex;
use passage_core::model::request::RoutingRequest;
use passage_core::model::state::{ExtensionSlot, PathState};
use passage_core::model::traversal::TraversableEdge;
use std::sync::Arc;

/// the edge between a stop and a pattern: the board side or the alight side
/// of riding that pattern at one stop.
///
/// whichever side the search direction *enters* transit through runs the
/// timetable search against the current published snapshot: the board side
/// in a departure search, the alight side in an arrive-by search (looking
/// for the latest acceptable arrival). the opposite side simply steps off,
/// reading times from the trip entry the entering side pinned onto the
/// state.
pub struct BoardAlightEdge {
    from: Arc<Vertex>,
    to: Arc<Vertex>,
    pattern: Arc<TripPattern>,
    stop_index: usize,
    boarding: bool,
    publisher: Arc<SnapshotPublisher>,
    calendar: Arc<ServiceCalendar>,
    transfers: Option<Arc<TransferTable>>,
    /// flag-stop / deviated-route shifts; zero for plain stops.
    flex: FlexAdjustment,
}

impl BoardAlightEdge {
    #[allow(clippy::too_many_arguments)]
    fn new(
        from: Arc<Vertex>,
        to: Arc<Vertex>,
        pattern: Arc<TripPattern>,
        stop_index: usize,
        boarding: bool,
        publisher: Arc<SnapshotPublisher>,
        calendar: Arc<ServiceCalendar>,
        transfers: Option<Arc<TransferTable>>,
    ) -> BoardAlightEdge {
        BoardAlightEdge {
            from,
            to,
            pattern,
            stop_index,
            boarding,
            publisher,
            calendar,
            transfers,
            flex: FlexAdjustment::default(),
        }
    }

    pub fn board(
        stop_vertex: Arc<Vertex>,
        pattern_vertex: Arc<Vertex>,
        pattern: Arc<TripPattern>,
        stop_index: usize,
        publisher: Arc<SnapshotPublisher>,
        calendar: Arc<ServiceCalendar>,
        transfers: Option<Arc<TransferTable>>,
    ) -> BoardAlightEdge {
        BoardAlightEdge::new(
            stop_vertex,
            pattern_vertex,
            pattern,
            stop_index,
            true,
            publisher,
            calendar,
            transfers,
        )
    }

    pub fn alight(
        pattern_vertex: Arc<Vertex>,
        stop_vertex: Arc<Vertex>,
        pattern: Arc<TripPattern>,
        stop_index: usize,
        publisher: Arc<SnapshotPublisher>,
        calendar: Arc<ServiceCalendar>,
        transfers: Option<Arc<TransferTable>>,
    ) -> BoardAlightEdge {
        BoardAlightEdge::new(
            pattern_vertex,
            stop_vertex,
            pattern,
            stop_index,
            false,
            publisher,
            calendar,
            transfers,
        )
    }

    pub fn with_flex(mut self, flex: FlexAdjustment) -> BoardAlightEdge {
        self.flex = flex;
        self
    }

    fn stop_id(&self) -> &str {
        &self.pattern.stop_ids[self.stop_index]
    }

    /// runs the timetable search over every relevant service day and keeps
    /// the best event time (earliest when boarding, latest when alighting).
    fn search_timetables(
        &self,
        search: &TripSearchContext,
        search_epoch: i64,
    ) -> Option<(TripMatch, Arc<ServiceDay>, i64)> {
        let snapshot = self.publisher.current();
        let mut best: Option<(TripMatch, Arc<ServiceDay>, i64)> = None;
        for day in self.calendar.relevant(search_epoch) {
            if !day.serves_any(&self.pattern.services) {
                continue;
            }
            let timetable = match snapshot.resolve(&self.pattern.pattern_id, Some(day.date())) {
                Some(timetable) => timetable,
                None => continue,
            };
            let best_wait = best
                .as_ref()
                .map_or(i64::MAX, |(_, _, epoch)| (epoch - search_epoch).abs());
            if !timetable.temporally_viable(&day, search_epoch, best_wait, self.boarding) {
                continue;
            }
            let matched = timetable.get_next_trip(
                search,
                &day,
                self.stop_index,
                self.boarding,
                &self.flex,
                self.transfers.as_deref(),
            );
            if let Some(matched) = matched {
                let epoch = day.time(matched.time);
                let better = best.as_ref().is_none_or(|(_, _, e)| {
                    if self.boarding {
                        epoch < *e
                    } else {
                        epoch > *e
                    }
                });
                if better {
                    best = Some((matched, day, epoch));
                }
            }
        }
        best
    }

    /// the search-direction side that enters transit: find a trip, advance
    /// to its stop event, and pin the ride onto the state.
    fn traverse_entering(
        self: Arc<Self>,
        state: &Arc<PathState>,
        request: &RoutingRequest,
    ) -> Option<Arc<PathState>> {
        if state.trip_id().is_some() {
            return None;
        }
        // street-leg obligations are settled before transit
        if request.park_and_ride && !state.is_car_parked() {
            return None;
        }
        if request.bike_park_and_ride && !state.is_bike_parked() {
            return None;
        }
        if state.is_bike_renting() {
            return None;
        }
        if state.non_transit_mode() == TraverseMode::Car && !request.park_and_ride {
            return None;
        }

        let slack = if self.boarding {
            request.board_slack
        } else {
            request.alight_slack
        };
        let search_epoch = if request.arrive_by {
            state.time_seconds() - slack
        } else {
            state.time_seconds() + slack
        };
        let search = TripSearchContext {
            time_epoch_seconds: search_epoch,
            ever_boarded: state.is_ever_boarded(),
            previous_stop: state.previous_stop().map(str::to_string),
            previous_trip: state.previous_trip().map(str::to_string),
            last_alighted_epoch_seconds: state.last_alighted_time_seconds(),
            wheelchair: request.wheelchair_accessible,
            carrying_bike: state.non_transit_mode() == TraverseMode::Bicycle,
            omit_canceled: request.omit_canceled,
        };
        let (matched, day, event_epoch) = self.search_timetables(&search, search_epoch)?;

        // a transfer rule can select a vehicle whose nominal time lies on
        // the wrong side of the state's own clock (a guaranteed connection
        // tighter than the slack); the path then resumes immediately
        let child_time = if request.arrive_by {
            event_epoch.min(state.time_seconds())
        } else {
            event_epoch.max(state.time_seconds())
        };
        let wait = (child_time - state.time_seconds()).abs();
        let first_board = state.num_boardings() == 0;
        let wait_factor = if first_board {
            request.wait_at_beginning_factor
        } else {
            1.0
        };
        let weight = wait as f64 * request.wait_reluctance * wait_factor + request.board_cost;

        let trip_id = matched.entry.trip_id().to_string();
        let route_id = self.pattern.route_id.clone();
        let entry = matched.entry.clone();
        let pattern = self.pattern.clone();
        let edge: Arc<dyn TraversableEdge> = self;
        let mut editor = state.edit(&edge);
        editor.set_time_seconds(child_time);
        editor.increment_weight(weight);
        editor.set_back_mode(TraverseMode::Transit);
        editor.increment_num_boardings();
        editor.set_trip_id(Some(trip_id.as_str()));
        editor.set_route_id(Some(route_id.as_str()));
        editor.add_route_to_sequence(&route_id);
        editor.set_extension(ExtensionSlot::BoardedTrip, entry);
        editor.set_extension(ExtensionSlot::ServiceDay, day);
        editor.set_extension(ExtensionSlot::LastPattern, pattern);
        if first_board {
            editor.set_initial_wait_time_seconds(wait);
        }
        editor.make_state()
    }

    /// the side that leaves transit: step off the pinned trip at this stop.
    /// `reference_time` is the reverse-optimization hook; when given, the
    /// state walks on to that instant and the gap is recorded as the
    /// initial wait.
    fn traverse_leaving(
        self: Arc<Self>,
        state: &Arc<PathState>,
        request: &RoutingRequest,
        reference_time: Option<i64>,
    ) -> Option<Arc<PathState>> {
        if state.trip_id().is_none() {
            return None;
        }
        let entry: Arc<TripTimeEntry> = state.extension(ExtensionSlot::BoardedTrip)?;
        let day: Arc<ServiceDay> = state.extension(ExtensionSlot::ServiceDay)?;
        let riding: Arc<TripPattern> = state.extension(ExtensionSlot::LastPattern)?;
        if riding.pattern_id != self.pattern.pattern_id {
            return None;
        }
        if request.omit_canceled && entry.is_stop_canceled(self.stop_index) {
            return None;
        }

        let flex_shift = self
            .flex
            .time_adjustment(&entry, self.stop_index, self.boarding);
        let (event_time, slack) = if self.boarding {
            (
                entry.departure_time(self.stop_index) + flex_shift,
                request.board_slack,
            )
        } else {
            (
                entry.arrival_time(self.stop_index) + flex_shift,
                request.alight_slack,
            )
        };
        let event_epoch = day.time(event_time);
        let child_time = if request.arrive_by {
            event_epoch - slack
        } else {
            event_epoch + slack
        };
        // riding backward along the pattern is not a thing
        let ride = if request.arrive_by {
            state.time_seconds() - child_time
        } else {
            child_time - state.time_seconds()
        };
        if ride < 0 {
            return None;
        }

        let stop_id = self.stop_id().to_string();
        let trip_id = entry.trip_id().to_string();
        let wait_reluctance = request.wait_reluctance;
        let begin_factor = request.wait_at_beginning_factor;
        let edge: Arc<dyn TraversableEdge> = self;
        let mut editor = state.edit(&edge);
        editor.set_time_seconds(child_time);
        editor.increment_weight(ride as f64);
        editor.set_back_mode(TraverseMode::Transit);
        editor.set_previous_stop(&stop_id);
        editor.set_previous_trip(&trip_id);
        editor.record_alighting();
        editor.set_trip_id(None);
        editor.clear_extension(ExtensionSlot::BoardedTrip);
        editor.clear_extension(ExtensionSlot::ServiceDay);
        if let Some(reference) = reference_time {
            // collapse the wait into the boarding: continue to the instant
            // the original traversal reached this stop and book the gap as
            // the path's initial wait
            let wait = (child_time - reference).abs();
            editor.set_time_seconds(reference);
            editor.increment_weight(wait as f64 * wait_reluctance * begin_factor);
            editor.set_initial_wait_time_seconds(wait);
        }
        editor.make_state()
    }
}

impl TraversableEdge for BoardAlightEdge {
    fn from_vertex(&self) -> &Arc<Vertex> {
        &self.from
    }

    fn to_vertex(&self) -> &Arc<Vertex> {
        &self.to
    }

    fn traverse(self: Arc<Self>, state: &Arc<PathState>) -> Option<Arc<PathState>> {
        let request = state.request().clone();
        if !request.modes.has_transit() {
            return None;
        }
        let entering = self.boarding != request.arrive_by;
        if entering {
            self.traverse_entering(state, &request)
        } else {
            self.traverse_leaving(state, &request, None)
        }
    }

    fn traverse_with_reference_time(
        self: Arc<Self>,
        state: &Arc<PathState>,
        reference_time_seconds: i64,
    ) -> Option<Arc<PathState>> {
        let request = state.request().clone();
        if !request.modes.has_transit() {
            return None;
        }
        let entering = self.boarding != request.arrive_by;
        if entering {
            self.traverse_entering(state, &request)
        } else {
            self.traverse_leaving(state, &request, Some(reference_time_seconds))
        }
    }

    fn name(&self) -> String {
        let side = if self.boarding { "board" } else { "alight" };
        format!(
            "{side} pattern {} at {}",
            self.pattern.pattern_id,
            self.stop_id()
        )
    }

    fn board_alight_role(&self) -> Option<bool> {
        Some(self.boarding)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::snapshot::{TimetableSnapshot, TimetableSnapshotBuffer};
    use crate::model::timetable::Timetable;
    use crate::model::transfer::TransferRule;
    use passage_core::model::request::RequestContext;
    use std::collections::{HashMap, HashSet};

    const MIDNIGHT: i64 = 1_000_000;

    struct Fixture {
        publisher: Arc<SnapshotPublisher>,
        calendar: Arc<ServiceCalendar>,
        pattern: Arc<TripPattern>,
        stop_vertices: Vec<Arc<Vertex>>,
        /// the riding-the-pattern vertex shared by all of its board and
        /// alight edges
        ride_vertex: Arc<Vertex>,
    }

    impl Fixture {
        /// departures from s1 at 28800, 29400, 30000; 5 minutes per hop.
        fn new() -> Fixture {
            let pattern = Arc::new(TripPattern::new(
                "p1",
                "r1",
                vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
                HashSet::from([1]),
            ));
            let mut timetable = Timetable::new(pattern.clone());
            for (trip, start) in [("t1", 28_800), ("t2", 29_400), ("t3", 30_000)] {
                timetable.add_trip(Arc::new(TripTimeEntry::scheduled(
                    trip,
                    1,
                    vec![start, start + 300, start + 600],
                    vec![start, start + 300, start + 600],
                )));
            }
            timetable.finish();
            let scheduled = Arc::new(HashMap::from([(
                "p1".to_string(),
                Arc::new(timetable),
            )]));
            let publisher = Arc::new(SnapshotPublisher::new(Arc::new(
                TimetableSnapshot::scheduled_only(scheduled),
            )));
            let calendar = Arc::new(ServiceCalendar::new(vec![Arc::new(ServiceDay::new(
                "2026-08-25".parse().expect("date should parse"),
                MIDNIGHT,
                HashSet::from([1]),
            ))]));
            let stop_vertices = (0..3)
                .map(|i| Vertex::street(i, &format!("s{}", i + 1)))
                .collect();
            let ride_vertex = Vertex::street(10, "riding p1");
            Fixture {
                publisher,
                calendar,
                pattern,
                stop_vertices,
                ride_vertex,
            }
        }

        fn board_edge(&self, stop: usize) -> Arc<BoardAlightEdge> {
            Arc::new(BoardAlightEdge::board(
                self.stop_vertices[stop].clone(),
                self.ride_vertex.clone(),
                self.pattern.clone(),
                stop,
                self.publisher.clone(),
                self.calendar.clone(),
                None,
            ))
        }

        fn alight_edge(&self, stop: usize) -> Arc<BoardAlightEdge> {
            Arc::new(BoardAlightEdge::alight(
                self.ride_vertex.clone(),
                self.stop_vertices[stop].clone(),
                self.pattern.clone(),
                stop,
                self.publisher.clone(),
                self.calendar.clone(),
                None,
            ))
        }
    }

    fn request() -> RoutingRequest {
        RoutingRequest {
            wait_at_beginning_factor: 1.0,
            ..Default::default()
        }
    }

    fn state_at(fixture: &Fixture, stop: usize, request: RoutingRequest, t: i64) -> Arc<PathState> {
        let ctx = RequestContext::new(request, 1);
        PathState::initial(fixture.stop_vertices[stop].clone(), MIDNIGHT + t, ctx)
    }

    #[test]
    fn test_board_waits_for_the_next_departure() {
        let fixture = Fixture::new();
        let state = state_at(&fixture, 0, request(), 29_000);
        let boarded = fixture
            .board_edge(0)
            .traverse(&state)
            .expect("boarding should succeed");
        assert_eq!(boarded.time_seconds(), MIDNIGHT + 29_400);
        assert_eq!(boarded.trip_id(), Some("t2"));
        assert_eq!(boarded.num_boardings(), 1);
        assert_eq!(boarded.route_sequence(), ["r1".to_string()]);
        assert_eq!(boarded.initial_wait_time_seconds(), Some(400));
        // 400s wait + 600 board cost
        assert_eq!(boarded.weight(), 1_000.0);
    }

    #[test]
    fn test_board_then_alight_reads_trip_times() {
        let fixture = Fixture::new();
        let state = state_at(&fixture, 0, request(), 29_000);
        let boarded = fixture
            .board_edge(0)
            .traverse(&state)
            .expect("boarding should succeed");
        let alighted = fixture
            .alight_edge(2)
            .traverse(&boarded)
            .expect("alighting should succeed");
        assert_eq!(alighted.time_seconds(), MIDNIGHT + 30_000);
        assert_eq!(alighted.trip_id(), None);
        assert_eq!(alighted.previous_trip(), Some("t2"));
        assert_eq!(alighted.previous_stop(), Some("s3"));
        assert_eq!(
            alighted.last_alighted_time_seconds(),
            Some(MIDNIGHT + 30_000)
        );
        // the ride leg costs its 600 seconds
        assert_eq!(alighted.weight() - boarded.weight(), 600.0);
    }

    #[test]
    fn test_alight_before_board_stop_is_pruned() {
        let fixture = Fixture::new();
        let state = state_at(&fixture, 1, request(), 29_000);
        let boarded = fixture
            .board_edge(1)
            .traverse(&state)
            .expect("boarding mid-pattern should succeed");
        assert!(fixture.alight_edge(0).traverse(&boarded).is_none());
    }

    #[test]
    fn test_arrive_by_enters_through_the_alight_side() {
        let fixture = Fixture::new();
        let arrive_by = RoutingRequest {
            arrive_by: true,
            ..request()
        };
        let state = state_at(&fixture, 2, arrive_by, 30_500);
        let riding = fixture
            .alight_edge(2)
            .traverse(&state)
            .expect("arrive-by alight search should succeed");
        // t3 arrives at 30600, too late; t2 at 30000 is the latest fit
        assert_eq!(riding.time_seconds(), MIDNIGHT + 30_000);
        assert_eq!(riding.trip_id(), Some("t2"));
        let off = fixture
            .board_edge(0)
            .traverse(&riding)
            .expect("stepping off backward at the board stop should succeed");
        assert_eq!(off.time_seconds(), MIDNIGHT + 29_400);
        assert_eq!(off.trip_id(), None);
    }

    #[test]
    fn test_no_transit_mode_prunes() {
        let fixture = Fixture::new();
        let no_transit = RoutingRequest {
            modes: passage_core::model::mode::ModeSet::WALK_ONLY,
            ..request()
        };
        let state = state_at(&fixture, 0, no_transit, 29_000);
        assert!(fixture.board_edge(0).traverse(&state).is_none());
    }

    #[test]
    fn test_unparked_car_cannot_board() {
        let fixture = Fixture::new();
        let park_and_ride = RoutingRequest {
            modes: passage_core::model::mode::ModeSet::new(true, false, true, true),
            park_and_ride: true,
            ..request()
        };
        let state = state_at(&fixture, 0, park_and_ride, 29_000);
        assert!(!state.is_car_parked());
        assert!(fixture.board_edge(0).traverse(&state).is_none());
    }

    #[test]
    fn test_forbidden_transfer_blocks_reboarding() {
        let fixture = Fixture::new();
        let mut transfers = TransferTable::new();
        transfers.add_stop_rule("s9", "s1", TransferRule::Forbidden);
        let transfers = Arc::new(transfers);
        let edge = Arc::new(BoardAlightEdge::board(
            fixture.stop_vertices[0].clone(),
            fixture.ride_vertex.clone(),
            fixture.pattern.clone(),
            0,
            fixture.publisher.clone(),
            fixture.calendar.clone(),
            Some(transfers),
        ));
        let state = state_at(&fixture, 0, request(), 29_000);
        // synthesize an earlier leg ending at s9
        let prior = {
            let free: Arc<dyn TraversableEdge> = Arc::new(
                passage_core::model::traversal::FreeEdge::new(
                    fixture.stop_vertices[0].clone(),
                    fixture.stop_vertices[0].clone(),
                ),
            );
            let mut editor = state.edit(&free);
            editor.increment_num_boardings();
            editor.set_previous_stop("s9");
            editor.set_previous_trip("t0");
            editor.record_alighting();
            editor.set_trip_id(None);
            editor.make_state().expect("setup traversal should succeed")
        };
        assert!(edge.traverse(&prior).is_none());
    }

    #[test]
    fn test_realtime_delay_moves_the_boarding() {
        use crate::model::realtime::{
            StopScheduleRelationship, StopTimeEvent, StopTimeUpdate, TripScheduleRelationship,
            TripUpdate,
        };
        let fixture = Fixture::new();
        let snapshot = fixture.publisher.current();
        let scheduled = snapshot
            .resolve("p1", None)
            .expect("scheduled timetable should resolve");
        let mut buffer = TimetableSnapshotBuffer::new(Arc::new(HashMap::from([(
            "p1".to_string(),
            scheduled,
        )])));
        let update = TripUpdate {
            trip_id: "t2".to_string(),
            service_date: "2026-08-25".parse().expect("date should parse"),
            schedule_relationship: TripScheduleRelationship::Scheduled,
            stop_time_updates: vec![StopTimeUpdate {
                stop_sequence: Some(0),
                stop_id: None,
                arrival: Some(StopTimeEvent::delay(300)),
                departure: Some(StopTimeEvent::delay(300)),
                schedule_relationship: StopScheduleRelationship::Scheduled,
            }],
        };
        buffer
            .apply_trip_update("p1", update.service_date, MIDNIGHT, &update)
            .expect("update should apply");
        fixture.publisher.publish(buffer.commit());

        let state = state_at(&fixture, 0, request(), 29_000);
        let boarded = fixture
            .board_edge(0)
            .traverse(&state)
            .expect("boarding should succeed");
        // t2 now leaves at 29700
        assert_eq!(boarded.time_seconds(), MIDNIGHT + 29_700);
        assert_eq!(boarded.trip_id(), Some("t2"));
    }

    #[test]
    fn test_flag_stop_boarding_shifts_into_the_hop() {
        let fixture = Fixture::new();
        let edge = Arc::new(
            BoardAlightEdge::board(
                fixture.stop_vertices[0].clone(),
                fixture.ride_vertex.clone(),
                fixture.pattern.clone(),
                0,
                fixture.publisher.clone(),
                fixture.calendar.clone(),
                None,
            )
            .with_flex(FlexAdjustment {
                offset_scale: 0.5,
                ..Default::default()
            }),
        );
        let state = state_at(&fixture, 0, request(), 29_000);
        // t1 passes the flag stop at 28950, already gone; t2 at 29550
        let boarded = edge.traverse(&state).expect("flag-stop boarding should succeed");
        assert_eq!(boarded.time_seconds(), MIDNIGHT + 29_550);
        assert_eq!(boarded.trip_id(), Some("t2"));
    }

    #[test]
    fn test_reverse_optimization_collapses_the_initial_wait() {
        let fixture = Fixture::new();
        let state = state_at(&fixture, 0, request(), 28_000);
        let boarded = fixture
            .board_edge(0)
            .traverse(&state)
            .expect("boarding should succeed");
        assert_eq!(boarded.trip_id(), Some("t1"));
        let alighted = fixture
            .alight_edge(2)
            .traverse(&boarded)
            .expect("alighting should succeed");

        let optimized = alighted.optimize_or_reverse(true, true);
        assert_eq!(
            optimized.elapsed_time_seconds(),
            alighted.elapsed_time_seconds()
        );
        assert!(optimized.weight() <= alighted.weight());
        assert_eq!(optimized.initial_wait_time_seconds(), Some(800));
        assert_eq!(optimized.time_seconds(), alighted.time_seconds());
    }
}
