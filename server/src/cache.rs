//! Cached "all events" listing behind the `events` invalidation tag.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::models::Event;

pub const EVENTS_TAG: &str = "events";

/// Holds the last `list_all` result until a mutation invalidates it.
///
/// Readers note the generation before loading from the store and hand it
/// back to [`ListingCache::put`]; if an invalidation happened in between,
/// the stale result is returned to that caller but not cached.
#[derive(Default)]
pub struct ListingCache {
    generation: AtomicU64,
    entry: RwLock<Option<Arc<Vec<Event>>>>,
}

impl ListingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn get(&self) -> Option<Arc<Vec<Event>>> {
        self.entry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn put(&self, generation: u64, events: Vec<Event>) -> Arc<Vec<Event>> {
        let events = Arc::new(events);
        let mut entry = self.entry.write().unwrap_or_else(|e| e.into_inner());
        if self.generation() == generation {
            *entry = Some(Arc::clone(&events));
        }
        events
    }

    pub fn invalidate(&self, tag: &str) {
        if tag != EVENTS_TAG {
            debug!(tag, "Ignoring invalidation of unknown cache tag");
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.entry
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        debug!(tag, generation, "Cache tag invalidated");
    }
}
