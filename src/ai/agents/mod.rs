pub mod calendar;
pub use calendar::CalendarAgent;
