use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// whether an update describes a running trip or withdraws it entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripScheduleRelationship {
    #[default]
    Scheduled,
    Canceled,
}

/// per-stop relationship: a time revision, a skipped stop call, or an
/// explicit no-data marker (the stop keeps its scheduled times and breaks
/// delay propagation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopScheduleRelationship {
    #[default]
    Scheduled,
    Skipped,
    NoData,
}

/// one side (arrival or departure) of a stop revision: an absolute epoch
/// time or a delay against schedule. delay wins when both are present.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct StopTimeEvent {
    pub time: Option<i64>,
    pub delay: Option<i64>,
}

impl StopTimeEvent {
    pub fn delay(delay: i64) -> StopTimeEvent {
        StopTimeEvent {
            time: None,
            delay: Some(delay),
        }
    }

    pub fn time(epoch_seconds: i64) -> StopTimeEvent {
        StopTimeEvent {
            time: Some(epoch_seconds),
            delay: None,
        }
    }

    /// resolves to seconds since the service day's midnight, or `None` when
    /// the event carries neither field.
    pub fn resolve(&self, scheduled: i64, midnight_epoch_seconds: i64) -> Option<i64> {
        match (self.delay, self.time) {
            (Some(delay), _) => Some(scheduled + delay),
            (None, Some(time)) => Some(time - midnight_epoch_seconds),
            (None, None) => None,
        }
    }
}

/// a revision for one stop call, keyed by stop sequence or, failing that,
/// stop id. revisions arrive in travel order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopTimeUpdate {
    #[serde(default)]
    pub stop_sequence: Option<u32>,
    #[serde(default)]
    pub stop_id: Option<String>,
    #[serde(default)]
    pub arrival: Option<StopTimeEvent>,
    #[serde(default)]
    pub departure: Option<StopTimeEvent>,
    #[serde(default)]
    pub schedule_relationship: StopScheduleRelationship,
}

impl StopTimeUpdate {
    pub fn matches(&self, stop_sequence: u32, stop_id: &str) -> bool {
        match (&self.stop_sequence, &self.stop_id) {
            (Some(seq), _) => *seq == stop_sequence,
            (None, Some(id)) => id == stop_id,
            (None, None) => false,
        }
    }
}

/// a realtime update for one trip on one service date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripUpdate {
    pub trip_id: String,
    pub service_date: NaiveDate,
    #[serde(default)]
    pub schedule_relationship: TripScheduleRelationship,
    #[serde(default)]
    pub stop_time_updates: Vec<StopTimeUpdate>,
}

impl TripUpdate {
    /// parses one update from its wire form.
    pub fn from_json(json: &str) -> Result<TripUpdate, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_delay_wins_over_time() {
        let event = StopTimeEvent {
            time: Some(1_000_300),
            delay: Some(120),
        };
        assert_eq!(event.resolve(28_800, 1_000_000), Some(28_920));
        let time_only = StopTimeEvent::time(1_029_000);
        assert_eq!(time_only.resolve(28_800, 1_000_000), Some(29_000));
        assert_eq!(StopTimeEvent::default().resolve(28_800, 1_000_000), None);
    }

    #[test]
    fn test_wire_round_trip() {
        let json = r#"{
            "trip_id": "t1",
            "service_date": "2026-08-25",
            "schedule_relationship": "SCHEDULED",
            "stop_time_updates": [
                { "stop_sequence": 2, "departure": { "delay": 60 } },
                { "stop_id": "s3", "schedule_relationship": "SKIPPED" }
            ]
        }"#;
        let update = TripUpdate::from_json(json).expect("wire message should deserialize");
        assert_eq!(update.trip_id, "t1");
        assert_eq!(update.stop_time_updates.len(), 2);
        assert!(update.stop_time_updates[0].matches(2, "anything"));
        assert!(update.stop_time_updates[1].matches(9, "s3"));
        assert_eq!(
            update.stop_time_updates[1].schedule_relationship,
            StopScheduleRelationship::Skipped
        );
    }
}
