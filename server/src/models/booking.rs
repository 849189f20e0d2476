use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One attendee's spot at an event. `(event_id, email)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(event_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            email: email.into(),
            created_at: Utc::now(),
        }
    }
}
