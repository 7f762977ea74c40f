use crate::model::trip::TripTimeEntry;
use std::sync::Arc;

/// a headway-based service window: a template trip repeated every `headway`
/// seconds between `start_time` and `end_time`. with `exact_times` the runs
/// leave on a fixed grid anchored at `start_time`; otherwise departures are
/// stochastic and a boarding costs a full headway of expected wait.
#[derive(Debug, Clone)]
pub struct FrequencyEntry {
    start_time: i64,
    end_time: i64,
    headway_seconds: i64,
    exact_times: bool,
    entry: Arc<TripTimeEntry>,
}

impl FrequencyEntry {
    pub fn new(
        start_time: i64,
        end_time: i64,
        headway_seconds: i64,
        exact_times: bool,
        entry: Arc<TripTimeEntry>,
    ) -> FrequencyEntry {
        // the grid scans step by the headway
        assert!(headway_seconds > 0, "frequency headway must be positive");
        FrequencyEntry {
            start_time,
            end_time,
            headway_seconds,
            exact_times,
            entry,
        }
    }

    pub fn template(&self) -> &Arc<TripTimeEntry> {
        &self.entry
    }

    fn departure_offset(&self, stop: usize) -> i64 {
        self.entry.departure_time(stop) - self.entry.departure_time(0)
    }

    fn arrival_offset(&self, stop: usize) -> i64 {
        self.entry.arrival_time(stop) - self.entry.departure_time(0)
    }

    /// the earliest departure from `stop` at or after `time`, or `None`
    /// when the window has passed.
    pub fn next_departure_time(&self, stop: usize, time: i64) -> Option<i64> {
        let offset = self.departure_offset(stop);
        let window_start = self.start_time + offset;
        let window_end = self.end_time + offset;
        if self.exact_times {
            let mut departure = window_start;
            while departure <= window_end {
                if departure >= time {
                    return Some(departure);
                }
                departure += self.headway_seconds;
            }
            None
        } else {
            let departure = time + self.headway_seconds;
            if departure > window_end {
                None
            } else {
                Some(departure.max(window_start))
            }
        }
    }

    /// the latest arrival at `stop` at or before `time`, or `None` when the
    /// window has not started.
    pub fn prev_arrival_time(&self, stop: usize, time: i64) -> Option<i64> {
        let offset = self.arrival_offset(stop);
        let window_start = self.start_time + offset;
        let window_end = self.end_time + offset;
        if self.exact_times {
            let mut best = None;
            let mut arrival = window_start;
            while arrival <= window_end {
                if arrival <= time {
                    best = Some(arrival);
                } else {
                    break;
                }
                arrival += self.headway_seconds;
            }
            best
        } else {
            let arrival = time - self.headway_seconds;
            if arrival < window_start {
                None
            } else {
                Some(arrival.min(window_end))
            }
        }
    }

    /// earliest possible departure from the first stop, for the timetable's
    /// temporal envelope.
    pub fn min_departure_time(&self) -> i64 {
        self.start_time
    }

    /// latest possible arrival at the last stop.
    pub fn max_arrival_time(&self) -> i64 {
        let last = self.entry.num_stops() - 1;
        self.end_time + self.arrival_offset(last)
    }

    /// one concrete run, shifted so that its departure from `stop` is
    /// exactly `departure_time`.
    pub fn materialize(&self, stop: usize, departure_time: i64) -> TripTimeEntry {
        let shift = departure_time - self.entry.departure_time(stop);
        self.entry.time_shifted_copy(shift)
    }

    /// a run shifted so its arrival at `stop` is exactly `arrival_time`,
    /// for arrive-by boardings.
    pub fn materialize_by_arrival(&self, stop: usize, arrival_time: i64) -> TripTimeEntry {
        let shift = arrival_time - self.entry.arrival_time(stop);
        self.entry.time_shifted_copy(shift)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn template() -> Arc<TripTimeEntry> {
        // 10-minute run with one intermediate stop
        Arc::new(TripTimeEntry::scheduled(
            "freq-template",
            1,
            vec![0, 300, 600],
            vec![0, 300, 600],
        ))
    }

    fn exact_entry() -> FrequencyEntry {
        FrequencyEntry::new(28_800, 32_400, 600, true, template())
    }

    #[test]
    fn test_exact_times_snap_to_the_grid() {
        let entry = exact_entry();
        assert_eq!(entry.next_departure_time(0, 28_000), Some(28_800));
        assert_eq!(entry.next_departure_time(0, 29_001), Some(29_400));
        // intermediate stop trails the first by its offset
        assert_eq!(entry.next_departure_time(1, 29_000), Some(29_100));
        assert_eq!(entry.next_departure_time(0, 33_000), None);
    }

    #[test]
    fn test_inexact_times_cost_a_full_headway() {
        let entry = FrequencyEntry::new(28_800, 32_400, 600, false, template());
        assert_eq!(entry.next_departure_time(0, 30_000), Some(30_600));
        // before the window, the wait ends at the window start
        assert_eq!(entry.next_departure_time(0, 27_000), Some(28_800));
        assert_eq!(entry.next_departure_time(0, 32_500), None);
    }

    #[test]
    fn test_prev_arrival_mirrors_next_departure() {
        let entry = exact_entry();
        // arrivals at the last stop run 29400..33000 on the grid
        assert_eq!(entry.prev_arrival_time(2, 33_500), Some(33_000));
        assert_eq!(entry.prev_arrival_time(2, 29_500), Some(29_400));
        assert_eq!(entry.prev_arrival_time(2, 29_000), None);
    }

    #[test]
    #[should_panic(expected = "headway must be positive")]
    fn test_non_positive_headway_is_rejected() {
        FrequencyEntry::new(28_800, 32_400, 0, true, template());
    }

    #[test]
    fn test_materialized_run_carries_the_boarding_time() {
        let entry = exact_entry();
        let run = entry.materialize(1, 29_100);
        assert_eq!(run.departure_time(1), 29_100);
        assert_eq!(run.arrival_time(2), 29_400);
    }
}
