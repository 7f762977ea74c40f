use crate::error::TransitError;
use crate::model::realtime::TripUpdate;
use crate::model::timetable::Timetable;
use arc_swap::ArcSwap;
use chrono::NaiveDate;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// an immutable view of every timetable at one instant: the scheduled
/// baseline plus realtime overrides keyed by pattern and service date.
/// readers resolve against one pinned snapshot for the whole of a lookup,
/// so a search never sees a half-applied batch.
#[derive(Debug, Clone, Default)]
pub struct TimetableSnapshot {
    scheduled: Arc<HashMap<String, Arc<Timetable>>>,
    updated: HashMap<(String, NaiveDate), Arc<Timetable>>,
}

impl TimetableSnapshot {
    pub fn scheduled_only(scheduled: Arc<HashMap<String, Arc<Timetable>>>) -> TimetableSnapshot {
        TimetableSnapshot {
            scheduled,
            updated: HashMap::new(),
        }
    }

    /// the timetable for a pattern on a date: the realtime override when one
    /// exists, otherwise the scheduled baseline.
    pub fn resolve(&self, pattern_id: &str, date: Option<NaiveDate>) -> Option<Arc<Timetable>> {
        if let Some(date) = date {
            let key = (pattern_id.to_string(), date);
            if let Some(timetable) = self.updated.get(&key) {
                return Some(timetable.clone());
            }
        }
        self.scheduled.get(pattern_id).cloned()
    }

    pub fn num_updated(&self) -> usize {
        self.updated.len()
    }
}

/// the single writer's working copy. edits clone a timetable the first time
/// it is touched after a commit (dirty tracking), so timetables inside
/// published snapshots are never aliased by a mutable handle.
#[derive(Debug)]
pub struct TimetableSnapshotBuffer {
    scheduled: Arc<HashMap<String, Arc<Timetable>>>,
    updated: HashMap<(String, NaiveDate), Arc<Timetable>>,
    dirty: HashSet<(String, NaiveDate)>,
}

impl TimetableSnapshotBuffer {
    pub fn new(scheduled: Arc<HashMap<String, Arc<Timetable>>>) -> TimetableSnapshotBuffer {
        TimetableSnapshotBuffer {
            scheduled,
            updated: HashMap::new(),
            dirty: HashSet::new(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// applies one trip update against the timetable currently effective for
    /// (pattern, date). rejections propagate; the buffer is unchanged by a
    /// rejected update.
    pub fn apply_trip_update(
        &mut self,
        pattern_id: &str,
        date: NaiveDate,
        midnight_epoch_seconds: i64,
        update: &TripUpdate,
    ) -> Result<(), TransitError> {
        let key = (pattern_id.to_string(), date);
        let base = self
            .updated
            .get(&key)
            .cloned()
            .or_else(|| self.scheduled.get(pattern_id).cloned())
            .ok_or_else(|| TransitError::UnknownPattern(pattern_id.to_string()))?;
        let (trip_index, entry) = base.apply_update(update, midnight_epoch_seconds)?;

        if self.dirty.contains(&key) {
            // already private to this buffer generation; edit in place
            if let Some(timetable) = self.updated.get_mut(&key) {
                let timetable = Arc::make_mut(timetable);
                timetable.set_trip(trip_index, entry);
                timetable.finish();
            }
        } else {
            let mut copy = (*base).clone();
            copy.set_service_date(date);
            copy.set_trip(trip_index, entry);
            copy.finish();
            self.updated.insert(key.clone(), Arc::new(copy));
            self.dirty.insert(key);
        }
        debug!(
            "applied update for trip {} on pattern {} ({})",
            update.trip_id, pattern_id, date
        );
        Ok(())
    }

    /// seals the current state into an immutable snapshot. edits after a
    /// commit clone their timetable again before touching it.
    pub fn commit(&mut self) -> Arc<TimetableSnapshot> {
        self.dirty.clear();
        Arc::new(TimetableSnapshot {
            scheduled: self.scheduled.clone(),
            updated: self.updated.clone(),
        })
    }

    /// drops realtime overrides for service dates before `before`, returning
    /// how many were removed. run daily so the buffer does not grow without
    /// bound.
    pub fn purge_expired(&mut self, before: NaiveDate) -> usize {
        let before_len = self.updated.len();
        self.updated.retain(|(_, date), _| *date >= before);
        self.dirty.retain(|(_, date)| *date >= before);
        before_len - self.updated.len()
    }
}

/// the atomically-swapped handle readers load the current snapshot from.
/// loads are wait-free; publication is a single pointer swap.
#[derive(Debug, Default)]
pub struct SnapshotPublisher {
    current: ArcSwap<TimetableSnapshot>,
}

impl SnapshotPublisher {
    pub fn new(initial: Arc<TimetableSnapshot>) -> SnapshotPublisher {
        SnapshotPublisher {
            current: ArcSwap::new(initial),
        }
    }

    pub fn current(&self) -> Arc<TimetableSnapshot> {
        self.current.load_full()
    }

    pub fn publish(&self, snapshot: Arc<TimetableSnapshot>) {
        self.current.store(snapshot);
    }
}
