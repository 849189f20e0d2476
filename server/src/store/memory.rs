use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Barrier, RwLock};
use uuid::Uuid;

use super::{Store, StoreError, BOOKINGS_EVENT_EMAIL_KEY, BOOKINGS_EVENT_FKEY, EVENTS_SLUG_KEY};
use crate::models::{Booking, Event};

/// Store operations that can be told to fail or to wait, for exercising
/// error paths and interleavings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    InsertEvent,
    UpdateEvent,
    DeleteEvent,
    InsertBooking,
    CountBookings,
    DeleteBookings,
}

#[derive(Default)]
struct Tables {
    events: HashMap<Uuid, Event>,
    bookings: HashMap<Uuid, Booking>,
}

struct Hold {
    barrier: Arc<Barrier>,
    remaining: usize,
}

/// In-process store with the same constraints as [`super::PgStore`].
///
/// Used by the test suite and when the server runs without `DATABASE_URL`.
/// Unlike Postgres, deleting an event leaves its bookings behind; the
/// cascade is the service's job.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failures: Mutex<HashMap<FailPoint, u32>>,
    holds: Mutex<HashMap<FailPoint, Hold>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` calls of `point` fail with `Unavailable`.
    pub fn fail_next(&self, point: FailPoint, times: u32) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.insert(point, times);
    }

    /// Parks the next `calls` calls of `point` until the returned barrier
    /// has been waited on by the caller as well.
    pub fn hold(&self, point: FailPoint, calls: usize) -> Arc<Barrier> {
        let barrier = Arc::new(Barrier::new(calls + 1));
        let mut holds = self.holds.lock().unwrap_or_else(|e| e.into_inner());
        holds.insert(
            point,
            Hold {
                barrier: Arc::clone(&barrier),
                remaining: calls,
            },
        );
        barrier
    }

    pub async fn booking_count(&self) -> usize {
        self.tables.read().await.bookings.len()
    }

    async fn wait_if_held(&self, point: FailPoint) {
        let barrier = {
            let mut holds = self.holds.lock().unwrap_or_else(|e| e.into_inner());
            match holds.get_mut(&point) {
                Some(hold) if hold.remaining > 0 => {
                    hold.remaining -= 1;
                    Some(Arc::clone(&hold.barrier))
                }
                _ => None,
            }
        };
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
    }

    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        match failures.get_mut(&point) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Unavailable(format!("injected failure at {:?}", point)))
            }
            _ => Ok(()),
        }
    }
}

fn newest_first(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    events
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_event(&self, event: &Event) -> Result<Event, StoreError> {
        self.wait_if_held(FailPoint::InsertEvent).await;
        self.check(FailPoint::InsertEvent)?;
        let mut tables = self.tables.write().await;

        if tables.events.values().any(|e| e.slug == event.slug) {
            return Err(StoreError::UniqueViolation {
                constraint: EVENTS_SLUG_KEY.to_string(),
            });
        }

        tables.events.insert(event.id, event.clone());
        Ok(event.clone())
    }

    async fn find_event_by_id(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.tables.read().await.events.get(&id).cloned())
    }

    async fn find_event_by_slug(&self, slug: &str) -> Result<Option<Event>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.events.values().find(|e| e.slug == slug).cloned())
    }

    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        let tables = self.tables.read().await;
        Ok(newest_first(tables.events.values().cloned().collect()))
    }

    async fn list_events_by_creator(&self, email: &str) -> Result<Vec<Event>, StoreError> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .events
                .values()
                .filter(|e| e.creator_email == email)
                .cloned()
                .collect(),
        ))
    }

    async fn list_events_sharing_tags(
        &self,
        exclude: Uuid,
        tags: &[String],
    ) -> Result<Vec<Event>, StoreError> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .events
                .values()
                .filter(|e| e.id != exclude && e.shares_tag_with(tags))
                .cloned()
                .collect(),
        ))
    }

    async fn update_event(&self, event: &Event) -> Result<Option<Event>, StoreError> {
        self.wait_if_held(FailPoint::UpdateEvent).await;
        self.check(FailPoint::UpdateEvent)?;
        let mut tables = self.tables.write().await;

        let Some(stored) = tables.events.get_mut(&event.id) else {
            return Ok(None);
        };

        stored.description = event.description.clone();
        stored.overview = event.overview.clone();
        stored.venue = event.venue.clone();
        stored.location = event.location.clone();
        stored.date = event.date;
        stored.time = event.time;
        stored.mode = event.mode;
        stored.audience = event.audience.clone();
        stored.organizer = event.organizer.clone();
        stored.tags = event.tags.clone();
        stored.agenda = event.agenda.clone();
        stored.image = event.image.clone();
        stored.updated_at = event.updated_at;

        Ok(Some(stored.clone()))
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool, StoreError> {
        self.wait_if_held(FailPoint::DeleteEvent).await;
        self.check(FailPoint::DeleteEvent)?;
        Ok(self.tables.write().await.events.remove(&id).is_some())
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<Booking, StoreError> {
        self.wait_if_held(FailPoint::InsertBooking).await;
        self.check(FailPoint::InsertBooking)?;
        let mut tables = self.tables.write().await;

        if !tables.events.contains_key(&booking.event_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: BOOKINGS_EVENT_FKEY.to_string(),
            });
        }

        if tables
            .bookings
            .values()
            .any(|b| b.event_id == booking.event_id && b.email == booking.email)
        {
            return Err(StoreError::UniqueViolation {
                constraint: BOOKINGS_EVENT_EMAIL_KEY.to_string(),
            });
        }

        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking.clone())
    }

    async fn find_booking(
        &self,
        event_id: Uuid,
        email: &str,
    ) -> Result<Option<Booking>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .find(|b| b.event_id == event_id && b.email == email)
            .cloned())
    }

    async fn count_bookings(&self, event_id: Uuid) -> Result<i64, StoreError> {
        self.wait_if_held(FailPoint::CountBookings).await;
        self.check(FailPoint::CountBookings)?;
        let tables = self.tables.read().await;
        let count = tables
            .bookings
            .values()
            .filter(|b| b.event_id == event_id)
            .count();
        Ok(count as i64)
    }

    async fn list_bookings_by_email(&self, email: &str) -> Result<Vec<Booking>, StoreError> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.email == email)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn delete_bookings_for_event(&self, event_id: Uuid) -> Result<u64, StoreError> {
        self.wait_if_held(FailPoint::DeleteBookings).await;
        self.check(FailPoint::DeleteBookings)?;
        let mut tables = self.tables.write().await;
        let before = tables.bookings.len();
        tables.bookings.retain(|_, b| b.event_id != event_id);
        Ok((before - tables.bookings.len()) as u64)
    }

    async fn delete_orphaned_bookings(&self) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let Tables { events, bookings } = &mut *tables;
        let before = bookings.len();
        bookings.retain(|_, b| events.contains_key(&b.event_id));
        Ok((before - bookings.len()) as u64)
    }
}
