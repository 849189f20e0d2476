//! Persistence boundary for events and bookings.
//!
//! Slug uniqueness and `(event_id, email)` uniqueness are hard constraints
//! of every implementation. Services pre-check them for a friendlier
//! early exit, but a racing writer is only stopped here, surfacing as
//! [`StoreError::UniqueViolation`]. A booking for an event that no longer
//! exists is refused with [`StoreError::ForeignKeyViolation`].

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Booking, Event};

pub mod memory;
pub mod postgres;

pub use memory::{FailPoint, MemoryStore};
pub use postgres::PgStore;

pub const EVENTS_SLUG_KEY: &str = "events_slug_key";
pub const BOOKINGS_EVENT_EMAIL_KEY: &str = "bookings_event_id_email_key";
pub const BOOKINGS_EVENT_FKEY: &str = "bookings_event_id_fkey";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn violates(&self, constraint: &str) -> bool {
        match self {
            StoreError::UniqueViolation { constraint: c }
            | StoreError::ForeignKeyViolation { constraint: c } => c == constraint,
            _ => false,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or_default().to_string(),
                };
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation {
                    constraint: db_err.constraint().unwrap_or_default().to_string(),
                };
            }
        }
        StoreError::Database(err)
    }
}

/// Document-store operations the event and booking services rely on.
///
/// Event listings are ordered by `created_at` descending.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_event(&self, event: &Event) -> Result<Event, StoreError>;

    async fn find_event_by_id(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    async fn find_event_by_slug(&self, slug: &str) -> Result<Option<Event>, StoreError>;

    async fn list_events(&self) -> Result<Vec<Event>, StoreError>;

    async fn list_events_by_creator(&self, email: &str) -> Result<Vec<Event>, StoreError>;

    /// Events other than `exclude` with at least one tag in `tags`.
    async fn list_events_sharing_tags(
        &self,
        exclude: Uuid,
        tags: &[String],
    ) -> Result<Vec<Event>, StoreError>;

    /// Writes the mutable fields of `event` by id. Slug, title, creator and
    /// creation time are left untouched. `None` if the event is gone.
    async fn update_event(&self, event: &Event) -> Result<Option<Event>, StoreError>;

    /// Returns whether a row was removed.
    async fn delete_event(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn insert_booking(&self, booking: &Booking) -> Result<Booking, StoreError>;

    async fn find_booking(&self, event_id: Uuid, email: &str)
        -> Result<Option<Booking>, StoreError>;

    async fn count_bookings(&self, event_id: Uuid) -> Result<i64, StoreError>;

    async fn list_bookings_by_email(&self, email: &str) -> Result<Vec<Booking>, StoreError>;

    async fn delete_bookings_for_event(&self, event_id: Uuid) -> Result<u64, StoreError>;

    /// Removes bookings whose event no longer exists.
    async fn delete_orphaned_bookings(&self) -> Result<u64, StoreError>;
}
