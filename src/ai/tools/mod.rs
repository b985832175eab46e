pub mod calendar;
pub use calendar::{CreateEventTool, ListEventsTool};

pub mod datetime;
pub use datetime::CurrentDateTimeTool;
