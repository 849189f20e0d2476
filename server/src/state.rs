use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::IdentityResolver;
use crate::cache::ListingCache;
use crate::config::Config;
use crate::images::ImageStore;
use crate::services::{BookingService, EventService};
use crate::store::Store;

/// Process-wide state, built once at startup and cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub identity: Arc<IdentityResolver>,
    pub events: EventService,
    pub bookings: BookingService,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>, images: Arc<dyn ImageStore>) -> Self {
        let cache = Arc::new(ListingCache::new());
        let identity = IdentityResolver::new(
            &config.jwt_secret,
            config.jwt_issuer.clone(),
            config.sign_in_url.clone(),
        );

        Self {
            identity: Arc::new(identity),
            events: EventService::new(Arc::clone(&store), images, Arc::clone(&cache)),
            bookings: BookingService::new(store, cache),
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for Arc<IdentityResolver> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.identity)
    }
}
