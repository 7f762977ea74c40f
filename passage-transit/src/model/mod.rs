pub mod board;
pub mod queries;
pub mod realtime;
pub mod service_day;
pub mod snapshot;
pub mod timetable;
pub mod transfer;
pub mod trip;
pub mod updater;
