use std::sync::Arc;

use crate::auth::Principal;
use crate::cache::ListingCache;
use crate::images::{ImageUpload, MemoryImageStore};
use crate::models::EventFields;
use crate::store::MemoryStore;

use super::{BookingService, EventService};

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub images: Arc<MemoryImageStore>,
    pub cache: Arc<ListingCache>,
    pub events: EventService,
    pub bookings: BookingService,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let images = Arc::new(MemoryImageStore::new());
        let cache = Arc::new(ListingCache::new());
        let events = EventService::new(store.clone(), images.clone(), cache.clone());
        let bookings = BookingService::new(store.clone(), cache.clone());

        Self {
            store,
            images,
            cache,
            events,
            bookings,
        }
    }
}

pub fn principal(email: &str) -> Principal {
    Principal::new(email, None, None)
}

pub fn fields(title: &str, tags: &str) -> EventFields {
    EventFields {
        title: Some(title.to_string()),
        description: Some("A day of talks".to_string()),
        overview: Some("Talks, workshops and a panel".to_string()),
        venue: Some("Hall A".to_string()),
        location: Some("Berlin".to_string()),
        date: Some("2025-06-12".to_string()),
        time: Some("09:00".to_string()),
        mode: Some("offline".to_string()),
        audience: Some("Developers".to_string()),
        organizer: Some("DevEvents".to_string()),
        tags: Some(tags.to_string()),
        agenda: Some("Welcome, Keynote".to_string()),
        ..Default::default()
    }
}

pub fn png() -> ImageUpload {
    ImageUpload::new(
        Some("banner.png".to_string()),
        Some("image/png".to_string()),
        vec![0x89, b'P', b'N', b'G'],
    )
}
