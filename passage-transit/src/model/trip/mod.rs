mod frequency;
mod pattern;
mod trip_time_entry;

pub use frequency::FrequencyEntry;
pub use pattern::TripPattern;
pub use trip_time_entry::TripTimeEntry;
