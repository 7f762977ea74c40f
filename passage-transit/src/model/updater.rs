use crate::error::TransitError;
use crate::model::snapshot::{SnapshotPublisher, TimetableSnapshotBuffer};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// a mutation executed against the snapshot buffer on the writer thread.
pub type WriteTask = Box<dyn FnOnce(&mut TimetableSnapshotBuffer) + Send>;

enum Message {
    Task(WriteTask),
    /// run pending work and publish immediately, then signal back. used by
    /// tests and shutdown to make the published snapshot deterministic.
    Flush(Sender<()>),
    Shutdown,
}

/// serializes all timetable writes onto one thread. tasks mutate the buffer;
/// the scheduler commits and publishes a fresh snapshot at most once per
/// `max_snapshot_frequency`, batching bursts of updates into one swap.
/// dropping the scheduler publishes whatever is pending and joins the
/// thread.
pub struct UpdateScheduler {
    sender: Sender<Message>,
    handle: Option<JoinHandle<()>>,
}

impl UpdateScheduler {
    pub fn start(
        buffer: TimetableSnapshotBuffer,
        publisher: Arc<SnapshotPublisher>,
        max_snapshot_frequency: Duration,
    ) -> UpdateScheduler {
        let (sender, receiver) = unbounded();
        let handle = std::thread::Builder::new()
            .name("timetable-writer".to_string())
            .spawn(move || run_writer(buffer, publisher, max_snapshot_frequency, receiver))
            .expect("spawning the timetable writer thread should not fail");
        UpdateScheduler {
            sender,
            handle: Some(handle),
        }
    }

    /// queues a write task. tasks run in submission order.
    pub fn execute(&self, task: WriteTask) -> Result<(), TransitError> {
        self.sender
            .send(Message::Task(task))
            .map_err(|e| TransitError::SchedulerStopped(e.to_string()))
    }

    /// blocks until all previously queued tasks have run and their result
    /// has been published.
    pub fn flush(&self) -> Result<(), TransitError> {
        let (done_tx, done_rx) = bounded(1);
        self.sender
            .send(Message::Flush(done_tx))
            .map_err(|e| TransitError::SchedulerStopped(e.to_string()))?;
        done_rx
            .recv()
            .map_err(|e| TransitError::SchedulerStopped(e.to_string()))
    }

    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.sender.send(Message::Shutdown);
            if handle.join().is_err() {
                error!("timetable writer thread panicked");
            }
        }
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

fn run_writer(
    mut buffer: TimetableSnapshotBuffer,
    publisher: Arc<SnapshotPublisher>,
    max_snapshot_frequency: Duration,
    receiver: Receiver<Message>,
) {
    info!("timetable writer started");
    let mut last_publish: Option<Instant> = None;
    let mut pending = false;
    loop {
        match receiver.recv_timeout(max_snapshot_frequency) {
            Ok(Message::Task(task)) => {
                task(&mut buffer);
                pending = pending || buffer.is_dirty();
                let due = last_publish.is_none_or(|t| t.elapsed() >= max_snapshot_frequency);
                if pending && due {
                    publisher.publish(buffer.commit());
                    last_publish = Some(Instant::now());
                    pending = false;
                    debug!("published timetable snapshot");
                }
            }
            Ok(Message::Flush(done)) => {
                publisher.publish(buffer.commit());
                last_publish = Some(Instant::now());
                pending = false;
                let _ = done.send(());
            }
            Ok(Message::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => {
                // publish work that arrived inside the rate-limit window
                if pending {
                    publisher.publish(buffer.commit());
                    last_publish = Some(Instant::now());
                    pending = false;
                    debug!("published timetable snapshot");
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    if pending {
        publisher.publish(buffer.commit());
    }
    info!("timetable writer stopped");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::realtime::{
        StopScheduleRelationship, StopTimeEvent, StopTimeUpdate, TripScheduleRelationship,
        TripUpdate,
    };
    use crate::model::snapshot::TimetableSnapshot;
    use crate::model::timetable::Timetable;
    use crate::model::trip::{TripPattern, TripTimeEntry};
    use chrono::NaiveDate;
    use std::collections::{HashMap, HashSet};

    const MIDNIGHT: i64 = 1_000_000;

    fn buffer() -> TimetableSnapshotBuffer {
        let pattern = Arc::new(TripPattern::new(
            "p1",
            "r1",
            vec!["s1".to_string(), "s2".to_string()],
            HashSet::from([1]),
        ));
        let mut timetable = Timetable::new(pattern);
        timetable.add_trip(Arc::new(TripTimeEntry::scheduled(
            "t1",
            1,
            vec![28_800, 29_400],
            vec![28_800, 29_400],
        )));
        timetable.finish();
        TimetableSnapshotBuffer::new(Arc::new(HashMap::from([(
            "p1".to_string(),
            Arc::new(timetable),
        )])))
    }

    fn delay_update(delay: i64) -> TripUpdate {
        TripUpdate {
            trip_id: "t1".to_string(),
            service_date: date(),
            schedule_relationship: TripScheduleRelationship::Scheduled,
            stop_time_updates: vec![StopTimeUpdate {
                stop_sequence: Some(0),
                stop_id: None,
                arrival: Some(StopTimeEvent::delay(delay)),
                departure: Some(StopTimeEvent::delay(delay)),
                schedule_relationship: StopScheduleRelationship::Scheduled,
            }],
        }
    }

    fn date() -> NaiveDate {
        "2026-08-25".parse().expect("date should parse")
    }

    fn init_test_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_tasks_apply_serially_and_publish_on_flush() {
        init_test_logger();
        let publisher = Arc::new(SnapshotPublisher::new(Arc::new(
            TimetableSnapshot::default(),
        )));
        let scheduler =
            UpdateScheduler::start(buffer(), publisher.clone(), Duration::from_secs(3600));
        for delay in [60, 120, 180] {
            scheduler
                .execute(Box::new(move |buffer| {
                    buffer
                        .apply_trip_update("p1", date(), MIDNIGHT, &delay_update(delay))
                        .expect("update should apply");
                }))
                .expect("scheduler should accept tasks");
        }
        scheduler.flush().expect("flush should complete");
        let snapshot = publisher.current();
        let departure = snapshot
            .resolve("p1", Some(date()))
            .expect("timetable should resolve")
            .trip_times()[0]
            .departure_time(0);
        // the last task in submission order wins
        assert_eq!(departure, 28_980);
        scheduler.shutdown();
    }

    #[test]
    fn test_shutdown_publishes_pending_work() {
        init_test_logger();
        let publisher = Arc::new(SnapshotPublisher::new(Arc::new(
            TimetableSnapshot::default(),
        )));
        {
            let scheduler =
                UpdateScheduler::start(buffer(), publisher.clone(), Duration::from_secs(3600));
            scheduler
                .execute(Box::new(|buffer| {
                    buffer
                        .apply_trip_update("p1", date(), MIDNIGHT, &delay_update(60))
                        .expect("update should apply");
                }))
                .expect("scheduler should accept tasks");
            // dropped here without an explicit flush
        }
        assert_eq!(publisher.current().num_updated(), 1);
    }
}
