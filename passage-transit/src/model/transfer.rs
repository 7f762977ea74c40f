use std::collections::HashMap;

/// a transfer constraint between two stops, optionally specific to a trip
/// pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferRule {
    /// no constraint recorded; board at the nominal search time.
    Unknown,
    /// the transfer may not be made at all.
    Forbidden,
    /// a guaranteed (timed) transfer: the connecting vehicle waits, so
    /// boarding is possible the moment the traveler alights.
    Timed,
    /// the transfer takes at least this many seconds.
    MinTime(i64),
}

/// transfer constraints keyed by stop pair, with trip-pair overrides. a
/// min-time transfer can only push the boarding reference later than the
/// nominal search time, never earlier; once the minimum is already satisfied
/// the nominal time stands. only a timed transfer (the vehicle waits) may
/// move the reference before the nominal time. nothing clamps to zero: the
/// nominal time itself can be negative early in a service day.
#[derive(Debug, Default)]
pub struct TransferTable {
    stop_rules: HashMap<(String, String), TransferRule>,
    trip_rules: HashMap<(String, String, String, String), TransferRule>,
}

impl TransferTable {
    pub fn new() -> TransferTable {
        TransferTable::default()
    }

    pub fn add_stop_rule(&mut self, from_stop: &str, to_stop: &str, rule: TransferRule) {
        self.stop_rules
            .insert((from_stop.to_string(), to_stop.to_string()), rule);
    }

    pub fn add_trip_rule(
        &mut self,
        from_stop: &str,
        to_stop: &str,
        from_trip: &str,
        to_trip: &str,
        rule: TransferRule,
    ) {
        self.trip_rules.insert(
            (
                from_stop.to_string(),
                to_stop.to_string(),
                from_trip.to_string(),
                to_trip.to_string(),
            ),
            rule,
        );
    }

    /// the most specific rule for this transfer: trip-pair override first,
    /// then the stop pair, then `Unknown`.
    pub fn rule(
        &self,
        from_stop: &str,
        to_stop: &str,
        from_trip: Option<&str>,
        to_trip: Option<&str>,
    ) -> TransferRule {
        if let (Some(from_trip), Some(to_trip)) = (from_trip, to_trip) {
            let key = (
                from_stop.to_string(),
                to_stop.to_string(),
                from_trip.to_string(),
                to_trip.to_string(),
            );
            if let Some(rule) = self.trip_rules.get(&key) {
                return *rule;
            }
        }
        let key = (from_stop.to_string(), to_stop.to_string());
        self.stop_rules.get(&key).copied().unwrap_or(TransferRule::Unknown)
    }

    /// the earliest permissible boarding time for a forward search, or
    /// `None` when the transfer is forbidden. times are in the same frame
    /// the caller supplies (seconds since midnight of the boarding day).
    pub fn adjusted_board_time(
        rule: TransferRule,
        last_alighted_time: i64,
        default_time: i64,
    ) -> Option<i64> {
        match rule {
            TransferRule::Unknown => Some(default_time),
            TransferRule::Forbidden => None,
            TransferRule::Timed => Some(last_alighted_time),
            TransferRule::MinTime(seconds) => {
                Some((last_alighted_time + seconds).max(default_time))
            }
        }
    }

    /// the latest permissible alighting time for an arrive-by search.
    pub fn adjusted_alight_time(
        rule: TransferRule,
        next_boarded_time: i64,
        default_time: i64,
    ) -> Option<i64> {
        match rule {
            TransferRule::Unknown => Some(default_time),
            TransferRule::Forbidden => None,
            TransferRule::Timed => Some(next_boarded_time),
            TransferRule::MinTime(seconds) => {
                Some((next_boarded_time - seconds).min(default_time))
            }
        }
    }
}
