use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{bookings, events, health_check};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/:slug",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:slug/edit", get(events::edit_event))
        .route("/events/:slug/similar", get(events::similar_events))
        .route("/events/:slug/detail", get(events::event_detail))
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/count", get(bookings::booking_count))
        .route("/me/events", get(events::my_events))
        .route("/me/bookings", get(bookings::my_bookings))
        .nest_service("/uploads", ServeDir::new(&config.image_upload_dir))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(&config))
        .layer(create_cors_layer(&config.cors_allowed_origins))
}
