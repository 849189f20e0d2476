use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::{Booking, Event};

const EVENT_COLUMNS: &str = "id, slug, title, description, overview, venue, location, date, time, \
     mode, audience, organizer, tags, agenda, image, creator_email, created_at, updated_at";

/// Postgres-backed store. The pool is created once at startup and shared.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_event(&self, event: &Event) -> Result<Event, StoreError> {
        let sql = format!(
            "INSERT INTO events ({EVENT_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
             RETURNING {EVENT_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Event>(&sql)
            .bind(event.id)
            .bind(&event.slug)
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.overview)
            .bind(&event.venue)
            .bind(&event.location)
            .bind(event.date)
            .bind(event.time)
            .bind(event.mode)
            .bind(&event.audience)
            .bind(&event.organizer)
            .bind(&event.tags)
            .bind(&event.agenda)
            .bind(&event.image)
            .bind(&event.creator_email)
            .bind(event.created_at)
            .bind(event.updated_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(inserted)
    }

    async fn find_event_by_id(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn find_event_by_slug(&self, slug: &str) -> Result<Option<Event>, StoreError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE slug = $1");
        sqlx::query_as::<_, Event>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY created_at DESC");
        sqlx::query_as::<_, Event>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn list_events_by_creator(&self, email: &str) -> Result<Vec<Event>, StoreError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE creator_email = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Event>(&sql)
            .bind(email)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn list_events_sharing_tags(
        &self,
        exclude: Uuid,
        tags: &[String],
    ) -> Result<Vec<Event>, StoreError> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE id <> $1 AND tags && $2
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Event>(&sql)
            .bind(exclude)
            .bind(tags)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn update_event(&self, event: &Event) -> Result<Option<Event>, StoreError> {
        let sql = format!(
            "UPDATE events SET
                description = $2,
                overview = $3,
                venue = $4,
                location = $5,
                date = $6,
                time = $7,
                mode = $8,
                audience = $9,
                organizer = $10,
                tags = $11,
                agenda = $12,
                image = $13,
                updated_at = $14
             WHERE id = $1
             RETURNING {EVENT_COLUMNS}"
        );
        sqlx::query_as::<_, Event>(&sql)
            .bind(event.id)
            .bind(&event.description)
            .bind(&event.overview)
            .bind(&event.venue)
            .bind(&event.location)
            .bind(event.date)
            .bind(event.time)
            .bind(event.mode)
            .bind(&event.audience)
            .bind(&event.organizer)
            .bind(&event.tags)
            .bind(&event.agenda)
            .bind(&event.image)
            .bind(event.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<Booking, StoreError> {
        sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (id, event_id, email, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING id, event_id, email, created_at",
        )
        .bind(booking.id)
        .bind(booking.event_id)
        .bind(&booking.email)
        .bind(booking.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn find_booking(
        &self,
        event_id: Uuid,
        email: &str,
    ) -> Result<Option<Booking>, StoreError> {
        sqlx::query_as::<_, Booking>(
            "SELECT id, event_id, email, created_at FROM bookings
             WHERE event_id = $1 AND email = $2",
        )
        .bind(event_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn count_bookings(&self, event_id: Uuid) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn list_bookings_by_email(&self, email: &str) -> Result<Vec<Booking>, StoreError> {
        sqlx::query_as::<_, Booking>(
            "SELECT id, event_id, email, created_at FROM bookings
             WHERE email = $1
             ORDER BY created_at DESC",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn delete_bookings_for_event(&self, event_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM bookings WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_orphaned_bookings(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM bookings b
             WHERE NOT EXISTS (SELECT 1 FROM events e WHERE e.id = b.event_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
