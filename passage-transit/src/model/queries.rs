use crate::model::service_day::ServiceCalendar;
use crate::model::snapshot::SnapshotPublisher;
use crate::model::timetable::Timetable;
use crate::model::trip::TripPattern;
use chrono::NaiveDate;
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// one upcoming vehicle call at a stop.
#[derive(Debug, Clone, Serialize)]
pub struct Departure {
    pub route_id: String,
    pub trip_id: String,
    pub pattern_id: String,
    pub departure_epoch_seconds: i64,
    /// whether the time comes from a realtime-updated timetable rather than
    /// the scheduled baseline.
    pub realtime: bool,
}

/// read-side stop queries answered against one pinned snapshot, so a board
/// never mixes two realtime generations.
pub struct DepartureBoard {
    publisher: Arc<SnapshotPublisher>,
    calendar: Arc<ServiceCalendar>,
    /// patterns serving each stop, prebuilt from the network.
    patterns_by_stop: HashMap<String, Vec<Arc<TripPattern>>>,
}

impl DepartureBoard {
    pub fn new(
        publisher: Arc<SnapshotPublisher>,
        calendar: Arc<ServiceCalendar>,
        patterns: &[Arc<TripPattern>],
    ) -> DepartureBoard {
        let mut patterns_by_stop: HashMap<String, Vec<Arc<TripPattern>>> = HashMap::new();
        for pattern in patterns {
            for stop_id in &pattern.stop_ids {
                patterns_by_stop
                    .entry(stop_id.clone())
                    .or_default()
                    .push(pattern.clone());
            }
        }
        DepartureBoard {
            publisher,
            calendar,
            patterns_by_stop,
        }
    }

    /// the timetable effective for a pattern on a date in the snapshot
    /// published right now.
    pub fn current_snapshot_for(
        &self,
        pattern_id: &str,
        date: NaiveDate,
    ) -> Option<Arc<Timetable>> {
        self.publisher.current().resolve(pattern_id, Some(date))
    }

    /// position of a trip within its pattern's timetable on a date.
    pub fn trip_index_for_id(
        &self,
        pattern_id: &str,
        date: NaiveDate,
        trip_id: &str,
    ) -> Option<usize> {
        self.current_snapshot_for(pattern_id, date)?.trip_index(trip_id)
    }

    /// the next departures from a stop inside `[start, start + time_range)`,
    /// realtime included, sorted by time and truncated to `count`. canceled
    /// calls are omitted. a stop this board has no pattern for yields an
    /// empty list.
    pub fn next_departures(
        &self,
        stop_id: &str,
        start_epoch_seconds: i64,
        time_range_seconds: i64,
        count: usize,
    ) -> Vec<Departure> {
        let snapshot = self.publisher.current();
        let end_epoch_seconds = start_epoch_seconds + time_range_seconds;
        let mut departures = vec![];
        let patterns = match self.patterns_by_stop.get(stop_id) {
            Some(patterns) => patterns,
            None => return departures,
        };
        for day in self.calendar.relevant(start_epoch_seconds) {
            for pattern in patterns {
                if !day.serves_any(&pattern.services) {
                    continue;
                }
                let timetable = match snapshot.resolve(&pattern.pattern_id, Some(day.date())) {
                    Some(timetable) => timetable,
                    None => continue,
                };
                let realtime_timetable = timetable.service_date().is_some();
                // the same stop can appear more than once on a loop pattern
                for (stop_index, id) in pattern.stop_ids.iter().enumerate() {
                    if id != stop_id {
                        continue;
                    }
                    for entry in timetable.trip_times() {
                        if entry.is_canceled() || entry.is_stop_canceled(stop_index) {
                            continue;
                        }
                        if !day.serves(entry.service_code()) {
                            continue;
                        }
                        let departure = day.time(entry.departure_time(stop_index));
                        if departure < start_epoch_seconds || departure >= end_epoch_seconds {
                            continue;
                        }
                        departures.push(Departure {
                            route_id: pattern.route_id.clone(),
                            trip_id: entry.trip_id().to_string(),
                            pattern_id: pattern.pattern_id.clone(),
                            departure_epoch_seconds: departure,
                            realtime: realtime_timetable && entry.is_realtime(),
                        });
                    }
                    for frequency in timetable.frequency_entries() {
                        let mut service_time =
                            day.seconds_since_midnight(start_epoch_seconds);
                        while let Some(time) =
                            frequency.next_departure_time(stop_index, service_time)
                        {
                            let departure = day.time(time);
                            if departure >= end_epoch_seconds {
                                break;
                            }
                            departures.push(Departure {
                                route_id: pattern.route_id.clone(),
                                trip_id: frequency.template().trip_id().to_string(),
                                pattern_id: pattern.pattern_id.clone(),
                                departure_epoch_seconds: departure,
                                realtime: false,
                            });
                            service_time = time + 1;
                        }
                    }
                }
            }
        }
        departures
            .into_iter()
            .sorted_by_key(|d| d.departure_epoch_seconds)
            .take(count)
            .collect()
    }
}
