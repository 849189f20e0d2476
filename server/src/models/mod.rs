pub mod booking;
pub mod event;

pub use booking::Booking;
pub use event::{Event, EventChanges, EventFields, EventMode, NewEvent};
