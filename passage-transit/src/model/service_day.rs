use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;

/// seconds spanned by one nominal service day. service days can exceed this
/// (trips past midnight run with times above 86400 on the previous day).
pub const SECONDS_PER_SERVICE_DAY: i64 = 86_400;

/// one operating day of the transit system: a calendar date, the epoch
/// instant of its (noon-minus-twelve-hours) midnight, and the set of service
/// codes running on it. converts between epoch seconds and the
/// seconds-since-midnight frame all timetable times live in.
#[derive(Debug, Clone)]
pub struct ServiceDay {
    date: NaiveDate,
    midnight_epoch_seconds: i64,
    running_services: HashSet<usize>,
}

impl ServiceDay {
    pub fn new(
        date: NaiveDate,
        midnight_epoch_seconds: i64,
        running_services: HashSet<usize>,
    ) -> ServiceDay {
        ServiceDay {
            date,
            midnight_epoch_seconds,
            running_services,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn midnight_epoch_seconds(&self) -> i64 {
        self.midnight_epoch_seconds
    }

    /// may be negative (before this day's midnight) or beyond 86400; both
    /// are meaningful for overnight trips.
    pub fn seconds_since_midnight(&self, epoch_seconds: i64) -> i64 {
        epoch_seconds - self.midnight_epoch_seconds
    }

    pub fn time(&self, seconds_since_midnight: i64) -> i64 {
        self.midnight_epoch_seconds + seconds_since_midnight
    }

    pub fn serves(&self, service_code: usize) -> bool {
        self.running_services.contains(&service_code)
    }

    pub fn serves_any(&self, service_codes: &HashSet<usize>) -> bool {
        !self.running_services.is_disjoint(service_codes)
    }
}

/// the service days a deployment knows about, ordered by date. searches only
/// ever consult the few days overlapping their time window.
#[derive(Debug, Default)]
pub struct ServiceCalendar {
    days: Vec<Arc<ServiceDay>>,
}

impl ServiceCalendar {
    pub fn new(mut days: Vec<Arc<ServiceDay>>) -> ServiceCalendar {
        days.sort_by_key(|day| day.midnight_epoch_seconds);
        ServiceCalendar { days }
    }

    /// the service days whose trips could be running at the given instant:
    /// the day containing it plus the previous day (overnight trips) and the
    /// next (searches crossing midnight).
    pub fn relevant(&self, epoch_seconds: i64) -> Vec<Arc<ServiceDay>> {
        self.days
            .iter()
            .filter(|day| {
                let since = day.seconds_since_midnight(epoch_seconds);
                (-SECONDS_PER_SERVICE_DAY..2 * SECONDS_PER_SERVICE_DAY).contains(&since)
            })
            .cloned()
            .collect()
    }

    pub fn day_for_date(&self, date: NaiveDate) -> Option<Arc<ServiceDay>> {
        self.days.iter().find(|day| day.date == date).cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn day(date: &str, midnight: i64) -> Arc<ServiceDay> {
        let date = date.parse().expect("test date should parse");
        Arc::new(ServiceDay::new(date, midnight, HashSet::from([1])))
    }

    #[test]
    fn test_seconds_since_midnight_round_trips() {
        let day = day("2026-08-25", 1_787_000_000);
        assert_eq!(day.seconds_since_midnight(1_787_028_800), 28_800);
        assert_eq!(day.time(28_800), 1_787_028_800);
    }

    #[test]
    fn test_relevant_includes_adjacent_days() {
        let calendar = ServiceCalendar::new(vec![
            day("2026-08-24", 1_000_000 - 86_400),
            day("2026-08-25", 1_000_000),
            day("2026-08-26", 1_000_000 + 86_400),
            day("2026-08-30", 1_000_000 + 5 * 86_400),
        ]);
        let relevant = calendar.relevant(1_000_000 + 3_600);
        let dates: Vec<_> = relevant.iter().map(|d| d.date().to_string()).collect();
        assert_eq!(dates, ["2026-08-24", "2026-08-25", "2026-08-26"]);
    }
}
