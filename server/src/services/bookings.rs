use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::authz::{authorize, require_principal, Action};
use crate::auth::Principal;
use crate::cache::{ListingCache, EVENTS_TAG};
use crate::models::{Booking, Event};
use crate::store::{Store, BOOKINGS_EVENT_EMAIL_KEY, BOOKINGS_EVENT_FKEY};
use crate::utils::error::AppError;

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn Store>,
    cache: Arc<ListingCache>,
}

impl BookingService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<ListingCache>) -> Self {
        Self { store, cache }
    }

    /// Books the caller onto an event.
    ///
    /// The duplicate lookup is only an early exit; the store's
    /// `(event_id, email)` constraint decides races.
    pub async fn create_booking(
        &self,
        principal: Option<&Principal>,
        event_id: Uuid,
    ) -> Result<Booking, AppError> {
        let principal = require_principal(principal)?;

        let event = self
            .store
            .find_event_by_id(event_id)
            .await?
            .ok_or_else(event_gone)?;
        authorize(Some(principal), Action::Book, &event).ensure()?;

        if self
            .store
            .find_booking(event_id, &principal.email)
            .await?
            .is_some()
        {
            return Err(already_booked());
        }

        let booking = match self
            .store
            .insert_booking(&Booking::new(event_id, principal.email.clone()))
            .await
        {
            Ok(booking) => booking,
            Err(e) if e.violates(BOOKINGS_EVENT_EMAIL_KEY) => return Err(already_booked()),
            Err(e) if e.violates(BOOKINGS_EVENT_FKEY) => return Err(event_gone()),
            Err(e) => return Err(e.into()),
        };

        self.cache.invalidate(EVENTS_TAG);
        info!(%event_id, email = %booking.email, "Booking created");
        Ok(booking)
    }

    /// Number of bookings for display. Failures read as zero.
    pub async fn count_by_event(&self, event_id: Uuid) -> i64 {
        match self.store.count_bookings(event_id).await {
            Ok(count) => count,
            Err(e) => {
                warn!(%event_id, error = %e, "Failed to count bookings");
                0
            }
        }
    }

    /// Events the caller has booked, newest booking first. Bookings whose
    /// event has since been deleted are skipped.
    pub async fn list_for_attendee(
        &self,
        principal: Option<&Principal>,
    ) -> Result<Vec<Event>, AppError> {
        let Some(principal) = principal else {
            return Ok(Vec::new());
        };

        let bookings = self.store.list_bookings_by_email(&principal.email).await?;
        let mut events = Vec::with_capacity(bookings.len());
        for booking in bookings {
            match self.store.find_event_by_id(booking.event_id).await? {
                Some(event) => events.push(event),
                None => debug!(booking_id = %booking.id, event_id = %booking.event_id, "Skipping orphaned booking"),
            }
        }
        Ok(events)
    }

    /// Removes bookings left behind by an interrupted event delete.
    pub async fn reconcile_orphans(&self) -> Result<u64, AppError> {
        let removed = self.store.delete_orphaned_bookings().await?;
        if removed > 0 {
            info!(removed, "Removed orphaned bookings");
        }
        Ok(removed)
    }
}

fn event_gone() -> AppError {
    AppError::NotFound("Event not found or deleted".to_string())
}

fn already_booked() -> AppError {
    AppError::Duplicate("You have already booked this event with this email".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::{fields, png, principal, Harness};
    use crate::store::FailPoint;

    async fn create(h: &Harness, owner: &str, title: &str) -> Event {
        h.events
            .create_event(Some(&principal(owner)), fields(title, "rust"), Some(png()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_anonymous_cannot_book() {
        let h = Harness::new();
        let event = create(&h, "owner@example.com", "Meetup").await;

        let err = h.bookings.create_booking(None, event.id).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
        assert_eq!(h.bookings.count_by_event(event.id).await, 0);
    }

    #[tokio::test]
    async fn test_missing_event_is_not_found() {
        let h = Harness::new();
        let err = h
            .bookings
            .create_booking(Some(&principal("a@example.com")), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_creator_cannot_book_own_event() {
        let h = Harness::new();
        let event = create(&h, "owner@example.com", "Meetup").await;

        let err = h
            .bookings
            .create_booking(Some(&principal("OWNER@example.com")), event.id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::SelfBooking(_)));
        assert_eq!(h.store.booking_count().await, 0);
    }

    #[tokio::test]
    async fn test_booking_invalidates_listing() {
        let h = Harness::new();
        let event = create(&h, "owner@example.com", "Meetup").await;
        h.events.list_all().await.unwrap();
        assert!(h.cache.get().is_some());

        h.bookings
            .create_booking(Some(&principal("a@example.com")), event.id)
            .await
            .unwrap();
        assert!(h.cache.get().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_bookings_keep_one() {
        let h = Harness::new();
        let event = create(&h, "owner@example.com", "Meetup").await;
        let attendee = principal("alice@example.com");
        let event_id = event.id;

        let attempts = (0..16).map(|_| {
            let bookings = h.bookings.clone();
            let attendee = attendee.clone();
            tokio::spawn(async move { bookings.create_booking(Some(&attendee), event_id).await })
        });
        let results = futures::future::join_all(attempts).await;

        let mut created = 0;
        for result in results {
            match result.unwrap() {
                Ok(_) => created += 1,
                Err(AppError::Duplicate(_)) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(h.bookings.count_by_event(event_id).await, 1);
    }

    #[tokio::test]
    async fn test_count_failure_reads_as_zero() {
        let h = Harness::new();
        let event = create(&h, "owner@example.com", "Meetup").await;
        h.bookings
            .create_booking(Some(&principal("a@example.com")), event.id)
            .await
            .unwrap();

        h.store.fail_next(FailPoint::CountBookings, 1);
        assert_eq!(h.bookings.count_by_event(event.id).await, 0);
        assert_eq!(h.bookings.count_by_event(event.id).await, 1);
    }

    #[tokio::test]
    async fn test_insert_failure_is_surfaced() {
        let h = Harness::new();
        let event = create(&h, "owner@example.com", "Meetup").await;

        h.store.fail_next(FailPoint::InsertBooking, 1);
        let err = h
            .bookings
            .create_booking(Some(&principal("a@example.com")), event.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(_)));
    }

    #[tokio::test]
    async fn test_list_for_attendee_skips_orphans() {
        let h = Harness::new();
        let first = create(&h, "owner@example.com", "First").await;
        let second = create(&h, "owner@example.com", "Second").await;
        let alice = principal("alice@example.com");
        for event in [&first, &second] {
            h.bookings
                .create_booking(Some(&alice), event.id)
                .await
                .unwrap();
        }
        let deleted = create(&h, "owner@example.com", "Deleted").await;
        h.bookings
            .create_booking(Some(&alice), deleted.id)
            .await
            .unwrap();
        h.store.delete_event(deleted.id).await.unwrap();

        let events = h.bookings.list_for_attendee(Some(&alice)).await.unwrap();
        let mut slugs: Vec<&str> = events.iter().map(|e| e.slug.as_str()).collect();
        slugs.sort();
        assert_eq!(slugs, vec!["first", "second"]);

        assert!(h.bookings.list_for_attendee(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_orphans() {
        let h = Harness::new();
        let event = create(&h, "owner@example.com", "Meetup").await;
        h.bookings
            .create_booking(Some(&principal("a@example.com")), event.id)
            .await
            .unwrap();
        let deleted = create(&h, "owner@example.com", "Deleted").await;
        h.bookings
            .create_booking(Some(&principal("b@example.com")), deleted.id)
            .await
            .unwrap();
        h.store.delete_event(deleted.id).await.unwrap();

        assert_eq!(h.bookings.reconcile_orphans().await.unwrap(), 1);
        assert_eq!(h.bookings.reconcile_orphans().await.unwrap(), 0);
        assert_eq!(h.bookings.count_by_event(event.id).await, 1);
    }

    #[tokio::test]
    async fn test_booking_racing_event_delete_is_not_found() {
        let h = Harness::new();
        let owner = principal("owner@example.com");
        let event = create(&h, "owner@example.com", "Meetup").await;
        let gate = h.store.hold(FailPoint::InsertBooking, 1);
        let alice = principal("alice@example.com");

        let (booked, deleted) = tokio::join!(
            h.bookings.create_booking(Some(&alice), event.id),
            async {
                let deleted = h.events.delete_event(Some(&owner), event.id).await;
                gate.wait().await;
                deleted
            }
        );

        deleted.unwrap();
        assert!(matches!(booked.unwrap_err(), AppError::NotFound(_)));
        assert_eq!(h.store.booking_count().await, 0);
    }

    #[tokio::test]
    async fn test_dev_conf_walkthrough() {
        let h = Harness::new();
        let organizer = principal("organizer@example.com");
        let alice = principal("alice@example.com");

        let e1 = h
            .events
            .create_event(Some(&organizer), fields("Dev Conf 2025", "dev"), Some(png()))
            .await
            .unwrap();
        assert_eq!(e1.slug, "dev-conf-2025");

        let err = h
            .events
            .create_event(Some(&organizer), fields("Dev Conf 2025", "dev"), Some(png()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        h.bookings.create_booking(Some(&alice), e1.id).await.unwrap();
        assert_eq!(h.bookings.count_by_event(e1.id).await, 1);

        let err = h
            .bookings
            .create_booking(Some(&alice), e1.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));
        assert_eq!(h.bookings.count_by_event(e1.id).await, 1);

        h.events.delete_event(Some(&organizer), e1.id).await.unwrap();
        assert!(h.events.get_by_slug("dev-conf-2025").await.unwrap().is_none());
        assert!(h
            .bookings
            .list_for_attendee(Some(&alice))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(h.store.booking_count().await, 0);
    }
}
