pub mod authz;
pub mod bookings;
pub mod events;
pub mod slug;

#[cfg(test)]
pub(crate) mod fixtures;

pub use bookings::BookingService;
pub use events::EventService;
pub use slug::slugify;
