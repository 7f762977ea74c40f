#[derive(thiserror::Error, Debug)]
pub enum TransitError {
    #[error("unknown pattern id: {0}")]
    UnknownPattern(String),
    #[error("update scheduler is not running: {0}")]
    SchedulerStopped(String),
    #[error(transparent)]
    Realtime(#[from] RealtimeError),
}

/// rejection reasons for a realtime trip update. a rejected update leaves
/// the previous timetable entry for that trip in place.
#[derive(thiserror::Error, Debug)]
pub enum RealtimeError {
    #[error("trip {0} not found in timetable for pattern {1}")]
    UnknownTrip(String, String),
    #[error("update for trip {0} contains no stop time revisions")]
    EmptyUpdate(String),
    #[error("update for trip {0} has {1} stop revisions that match no stop on the pattern")]
    UnmatchedStops(String, usize),
    #[error("stop revision for trip {0} carries neither a time nor a delay")]
    MissingEventTime(String),
    #[error("updated times for trip {0} are not non-decreasing at stop index {1}")]
    NonIncreasingTimes(String, usize),
}
