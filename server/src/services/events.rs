use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::authz::{authorize, require_principal, Action};
use super::slug::slugify;
use crate::auth::Principal;
use crate::cache::{ListingCache, EVENTS_TAG};
use crate::images::{ImageStore, ImageUpload};
use crate::models::{Event, EventFields};
use crate::store::{Store, StoreError, EVENTS_SLUG_KEY};
use crate::utils::error::AppError;

/// Attempts at the two-phase delete before giving up.
pub const CASCADE_ATTEMPTS: u32 = 3;

/// Pause before the first retry; doubles for each one after.
pub const CASCADE_BACKOFF: Duration = Duration::from_millis(50);

/// Event reads and owner-guarded event mutations.
#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn Store>,
    images: Arc<dyn ImageStore>,
    cache: Arc<ListingCache>,
}

impl EventService {
    pub fn new(store: Arc<dyn Store>, images: Arc<dyn ImageStore>, cache: Arc<ListingCache>) -> Self {
        Self {
            store,
            images,
            cache,
        }
    }

    pub async fn create_event(
        &self,
        principal: Option<&Principal>,
        fields: EventFields,
        image: Option<ImageUpload>,
    ) -> Result<Event, AppError> {
        let principal = require_principal(principal)?;
        let input = fields.into_new_event()?;

        let slug = slugify(&input.title);
        if slug.is_empty() {
            return Err(AppError::ValidationError(
                "Title must contain at least one letter or digit".to_string(),
            ));
        }

        let image = image
            .ok_or_else(|| AppError::ValidationError("An event image is required".to_string()))?;
        let extension = image.extension()?;

        if self.store.find_event_by_slug(&slug).await?.is_some() {
            return Err(slug_conflict(&slug));
        }

        let image_url = self.images.upload(&image, extension).await?;

        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            slug,
            title: input.title,
            description: input.description,
            overview: input.overview,
            venue: input.venue,
            location: input.location,
            date: input.date,
            time: input.time,
            mode: input.mode,
            audience: input.audience,
            organizer: input.organizer,
            tags: input.tags,
            agenda: input.agenda,
            image: image_url,
            creator_email: principal.email.clone(),
            created_at: now,
            updated_at: now,
        };

        let event = match self.store.insert_event(&event).await {
            Ok(event) => event,
            Err(e) if e.violates(EVENTS_SLUG_KEY) => return Err(slug_conflict(&event.slug)),
            Err(e) => return Err(e.into()),
        };

        self.cache.invalidate(EVENTS_TAG);
        info!(slug = %event.slug, event_id = %event.id, creator = %event.creator_email, "Event created");
        Ok(event)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Event>, AppError> {
        let slug = slugify(slug);
        if slug.is_empty() {
            return Ok(None);
        }
        Ok(self.store.find_event_by_slug(&slug).await?)
    }

    /// Fetches an event to prefill its edit form. Only the creator may.
    pub async fn get_for_edit(
        &self,
        principal: Option<&Principal>,
        slug: &str,
    ) -> Result<Event, AppError> {
        let event = self.require_by_slug(slug).await?;
        authorize(principal, Action::Manage, &event).ensure()?;
        Ok(event)
    }

    pub async fn list_all(&self) -> Result<Vec<Event>, AppError> {
        if let Some(events) = self.cache.get() {
            return Ok(events.as_ref().clone());
        }

        let generation = self.cache.generation();
        let events = self.store.list_events().await?;
        Ok(self.cache.put(generation, events).as_ref().clone())
    }

    pub async fn list_by_creator(&self, principal: Option<&Principal>) -> Result<Vec<Event>, AppError> {
        match principal {
            Some(principal) => Ok(self.store.list_events_by_creator(&principal.email).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Other events sharing at least one tag. Unknown slugs yield nothing.
    pub async fn list_similar(&self, slug: &str) -> Result<Vec<Event>, AppError> {
        let Some(event) = self.get_by_slug(slug).await? else {
            return Ok(Vec::new());
        };
        Ok(self
            .store
            .list_events_sharing_tags(event.id, &event.tags)
            .await?)
    }

    pub async fn update_event(
        &self,
        principal: Option<&Principal>,
        slug: &str,
        fields: EventFields,
        image: Option<ImageUpload>,
    ) -> Result<Event, AppError> {
        let principal = require_principal(principal)?;
        let event = self.require_by_slug(slug).await?;
        authorize(Some(principal), Action::Manage, &event).ensure()?;

        let changes = fields.into_changes()?;
        let extension = image.as_ref().map(ImageUpload::extension).transpose()?;

        let mut updated = event.clone();
        changes.apply_to(&mut updated);
        if let (Some(image), Some(extension)) = (image.as_ref(), extension) {
            updated.image = self.images.upload(image, extension).await?;
        }
        updated.updated_at = Utc::now();

        let updated = self
            .store
            .update_event(&updated)
            .await?
            .ok_or_else(|| event_not_found(&event.slug))?;

        self.cache.invalidate(EVENTS_TAG);
        info!(slug = %updated.slug, event_id = %updated.id, "Event updated");
        Ok(updated)
    }

    /// Deletes an event and every booking that references it.
    ///
    /// Bookings go first, then the event. Both steps are idempotent, so a
    /// failure in either one retries the whole cascade.
    pub async fn delete_event(
        &self,
        principal: Option<&Principal>,
        event_id: Uuid,
    ) -> Result<(), AppError> {
        let principal = require_principal(principal)?;
        let event = self
            .store
            .find_event_by_id(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event '{}' was not found", event_id)))?;
        authorize(Some(principal), Action::Manage, &event).ensure()?;

        let mut attempt = 1;
        loop {
            match self.cascade_delete(event_id).await {
                Ok(bookings) => {
                    self.cache.invalidate(EVENTS_TAG);
                    info!(slug = %event.slug, %event_id, bookings, "Event deleted");
                    return Ok(());
                }
                Err(e) if attempt < CASCADE_ATTEMPTS => {
                    let backoff = CASCADE_BACKOFF * 2u32.pow(attempt - 1);
                    warn!(%event_id, attempt, error = %e, ?backoff, "Event delete failed, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn cascade_delete(&self, event_id: Uuid) -> Result<u64, StoreError> {
        let bookings = self.store.delete_bookings_for_event(event_id).await?;
        // false means an earlier attempt already removed it
        self.store.delete_event(event_id).await?;
        Ok(bookings)
    }

    async fn require_by_slug(&self, slug: &str) -> Result<Event, AppError> {
        self.get_by_slug(slug)
            .await?
            .ok_or_else(|| event_not_found(slug))
    }
}

fn event_not_found(slug: &str) -> AppError {
    AppError::NotFound(format!("Event with slug '{}' was not found", slug))
}

fn slug_conflict(slug: &str) -> AppError {
    AppError::Conflict(format!("An event with slug '{}' already exists", slug))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::{fields, png, principal, Harness};
    use crate::store::FailPoint;

    #[tokio::test]
    async fn test_create_derives_slug_and_creator() {
        let h = Harness::new();
        let owner = principal("Owner@Example.com");

        let event = h
            .events
            .create_event(Some(&owner), fields("Dev Conf 2025", "rust, web"), Some(png()))
            .await
            .unwrap();

        assert_eq!(event.slug, "dev-conf-2025");
        assert_eq!(event.creator_email, "owner@example.com");
        assert_eq!(event.created_at, event.updated_at);
        assert_eq!(h.images.uploaded(), vec![event.image.clone()]);
    }

    #[tokio::test]
    async fn test_titles_normalizing_alike_conflict() {
        let h = Harness::new();
        let owner = principal("owner@example.com");
        h.events
            .create_event(Some(&owner), fields("Dev Conf 2025", "rust"), Some(png()))
            .await
            .unwrap();

        let err = h
            .events
            .create_event(Some(&owner), fields("  dev   CONF 2025!", "rust"), Some(png()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(h.events.list_all().await.unwrap().len(), 1);
        assert_eq!(h.images.uploaded().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_creates_past_precheck_conflict_in_store() {
        let h = Harness::new();
        let owner = principal("owner@example.com");
        let gate = h.store.hold(FailPoint::InsertEvent, 2);

        let (first, second, _) = tokio::join!(
            h.events
                .create_event(Some(&owner), fields("Dev Conf 2025", "rust"), Some(png())),
            h.events
                .create_event(Some(&owner), fields("dev conf 2025", "rust"), Some(png())),
            gate.wait()
        );

        // both passed the lookup, so the store decided
        assert_eq!(h.images.uploaded().len(), 2);
        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::Conflict(_)))));
        assert_eq!(h.events.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_requires_principal_fields_and_image() {
        let h = Harness::new();
        let owner = principal("owner@example.com");

        let err = h
            .events
            .create_event(None, fields("Meetup", "rust"), Some(png()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));

        let mut missing = fields("Meetup", "rust");
        missing.venue = None;
        let err = h
            .events
            .create_event(Some(&owner), missing, Some(png()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = h
            .events
            .create_event(Some(&owner), fields("Meetup", "rust"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = h
            .events
            .create_event(Some(&owner), fields("???", "rust"), Some(png()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        assert!(h.events.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_upload_creates_nothing() {
        let h = Harness::new();
        h.images.set_failing(true);

        let err = h
            .events
            .create_event(
                Some(&principal("owner@example.com")),
                fields("Meetup", "rust"),
                Some(png()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UploadError(_)));
        assert!(h.events.get_by_slug("meetup").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_by_slug_normalizes_lookup() {
        let h = Harness::new();
        h.events
            .create_event(
                Some(&principal("owner@example.com")),
                fields("Dev Conf 2025", "rust"),
                Some(png()),
            )
            .await
            .unwrap();

        assert!(h.events.get_by_slug("  DEV-CONF-2025 ").await.unwrap().is_some());
        assert!(h.events.get_by_slug("unknown").await.unwrap().is_none());
        assert!(h.events.get_by_slug("   ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_all_is_cached_until_invalidated() {
        let h = Harness::new();
        let owner = principal("owner@example.com");
        h.events
            .create_event(Some(&owner), fields("First", "rust"), Some(png()))
            .await
            .unwrap();

        assert_eq!(h.events.list_all().await.unwrap().len(), 1);
        assert!(h.cache.get().is_some());

        h.events
            .create_event(Some(&owner), fields("Second", "rust"), Some(png()))
            .await
            .unwrap();
        assert!(h.cache.get().is_none());

        let slugs: Vec<String> = h
            .events
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.slug)
            .collect();
        assert_eq!(slugs, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_list_by_creator() {
        let h = Harness::new();
        let alice = principal("alice@example.com");
        let bob = principal("bob@example.com");
        h.events
            .create_event(Some(&alice), fields("Alice Talk", "rust"), Some(png()))
            .await
            .unwrap();
        h.events
            .create_event(Some(&bob), fields("Bob Talk", "rust"), Some(png()))
            .await
            .unwrap();

        let mine = h.events.list_by_creator(Some(&alice)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].slug, "alice-talk");
        assert!(h.events.list_by_creator(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_similar_excludes_self() {
        let h = Harness::new();
        let owner = principal("owner@example.com");
        for (title, tags) in [
            ("Rust Meetup", "rust, systems"),
            ("Systems Night", "systems"),
            ("Baking Class", "food"),
        ] {
            h.events
                .create_event(Some(&owner), fields(title, tags), Some(png()))
                .await
                .unwrap();
        }

        let similar = h.events.list_similar("rust-meetup").await.unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].slug, "systems-night");

        assert!(h.events.list_similar("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_by_owner() {
        let h = Harness::new();
        let owner = principal("owner@example.com");
        let event = h
            .events
            .create_event(Some(&owner), fields("Meetup", "rust"), Some(png()))
            .await
            .unwrap();

        let changes = EventFields {
            venue: Some("Hall B".to_string()),
            mode: Some("hybrid".to_string()),
            ..Default::default()
        };
        let updated = h
            .events
            .update_event(Some(&owner), "meetup", changes, Some(png()))
            .await
            .unwrap();

        assert_eq!(updated.venue, "Hall B");
        assert_eq!(updated.mode, crate::models::EventMode::Hybrid);
        assert_eq!(updated.description, event.description);
        assert_ne!(updated.image, event.image);
        assert!(updated.updated_at >= event.updated_at);
        assert_eq!(updated.created_at, event.created_at);
    }

    #[tokio::test]
    async fn test_update_by_non_creator_changes_nothing() {
        let h = Harness::new();
        let owner = principal("owner@example.com");
        h.events
            .create_event(Some(&owner), fields("Meetup", "rust"), Some(png()))
            .await
            .unwrap();
        let before = h.events.get_by_slug("meetup").await.unwrap().unwrap();

        let changes = EventFields {
            venue: Some("Somewhere else".to_string()),
            ..Default::default()
        };
        let err = h
            .events
            .update_event(Some(&principal("other@example.com")), "meetup", changes, Some(png()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
        let after = h.events.get_by_slug("meetup").await.unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(h.images.uploaded().len(), 1);
    }

    #[tokio::test]
    async fn test_update_rejects_title_and_missing_event() {
        let h = Harness::new();
        let owner = principal("owner@example.com");
        h.events
            .create_event(Some(&owner), fields("Meetup", "rust"), Some(png()))
            .await
            .unwrap();

        let rename = EventFields {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        let err = h
            .events
            .update_event(Some(&owner), "meetup", rename, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = h
            .events
            .update_event(Some(&owner), "nope", EventFields::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_for_edit_is_owner_only() {
        let h = Harness::new();
        let owner = principal("owner@example.com");
        h.events
            .create_event(Some(&owner), fields("Meetup", "rust"), Some(png()))
            .await
            .unwrap();

        assert!(h.events.get_for_edit(Some(&owner), "meetup").await.is_ok());
        assert!(matches!(
            h.events
                .get_for_edit(Some(&principal("x@example.com")), "meetup")
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            h.events.get_for_edit(Some(&owner), "other").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_bookings() {
        let h = Harness::new();
        let owner = principal("owner@example.com");
        let event = h
            .events
            .create_event(Some(&owner), fields("Meetup", "rust"), Some(png()))
            .await
            .unwrap();
        for email in ["a@example.com", "b@example.com", "c@example.com"] {
            h.bookings
                .create_booking(Some(&principal(email)), event.id)
                .await
                .unwrap();
        }

        h.events.delete_event(Some(&owner), event.id).await.unwrap();

        assert_eq!(h.store.count_bookings(event.id).await.unwrap(), 0);
        assert!(h.events.get_by_slug("meetup").await.unwrap().is_none());
        assert!(h.events.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_non_owner_is_rejected() {
        let h = Harness::new();
        let owner = principal("owner@example.com");
        let event = h
            .events
            .create_event(Some(&owner), fields("Meetup", "rust"), Some(png()))
            .await
            .unwrap();
        h.bookings
            .create_booking(Some(&principal("a@example.com")), event.id)
            .await
            .unwrap();

        let err = h
            .events
            .delete_event(Some(&principal("a@example.com")), event.id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(h.store.count_bookings(event.id).await.unwrap(), 1);
        assert!(h.events.get_by_slug("meetup").await.unwrap().is_some());

        let err = h
            .events
            .delete_event(Some(&owner), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_retries_after_partial_failure() {
        let h = Harness::new();
        let owner = principal("owner@example.com");
        let event = h
            .events
            .create_event(Some(&owner), fields("Meetup", "rust"), Some(png()))
            .await
            .unwrap();
        h.bookings
            .create_booking(Some(&principal("a@example.com")), event.id)
            .await
            .unwrap();

        // bookings are gone after the first attempt, the event delete fails once
        h.store.fail_next(FailPoint::DeleteEvent, 1);
        let started = std::time::Instant::now();
        h.events.delete_event(Some(&owner), event.id).await.unwrap();
        assert!(started.elapsed() >= CASCADE_BACKOFF);

        assert!(h.events.get_by_slug("meetup").await.unwrap().is_none());
        assert_eq!(h.store.booking_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_gives_up_after_attempts() {
        let h = Harness::new();
        let owner = principal("owner@example.com");
        let event = h
            .events
            .create_event(Some(&owner), fields("Meetup", "rust"), Some(png()))
            .await
            .unwrap();

        h.store.fail_next(FailPoint::DeleteBookings, CASCADE_ATTEMPTS);
        let err = h.events.delete_event(Some(&owner), event.id).await.unwrap_err();

        assert!(matches!(err, AppError::DatabaseError(_)));
        assert!(h.events.get_by_slug("meetup").await.unwrap().is_some());
    }
}
