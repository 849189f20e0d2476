use axum::extract::{Multipart, Path, State};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use super::form::read_event_form;
use crate::auth::{MaybePrincipal, RequirePrincipal};
use crate::models::Event;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    pub event: Event,
    pub bookings: i64,
    pub similar_events: Vec<Event>,
}

pub async fn list_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = state.events.list_all().await?;
    Ok(success(events, "Events fetched successfully").into_response())
}

pub async fn create_event(
    State(state): State<AppState>,
    RequirePrincipal(principal): RequirePrincipal,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let (fields, image) = read_event_form(multipart).await?;
    let event = state
        .events
        .create_event(Some(&principal), fields, image)
        .await?;
    Ok(created(event, "Event created successfully").into_response())
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let event = state
        .events
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| not_found(&slug))?;
    Ok(success(event, "Event fetched successfully").into_response())
}

pub async fn update_event(
    State(state): State<AppState>,
    RequirePrincipal(principal): RequirePrincipal,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let (fields, image) = read_event_form(multipart).await?;
    let event = state
        .events
        .update_event(Some(&principal), &slug, fields, image)
        .await?;
    Ok(success(event, "Event updated successfully").into_response())
}

pub async fn delete_event(
    State(state): State<AppState>,
    RequirePrincipal(principal): RequirePrincipal,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let event = state
        .events
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| not_found(&slug))?;
    state.events.delete_event(Some(&principal), event.id).await?;
    Ok(empty_success("Event deleted successfully").into_response())
}

pub async fn edit_event(
    State(state): State<AppState>,
    RequirePrincipal(principal): RequirePrincipal,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let event = state.events.get_for_edit(Some(&principal), &slug).await?;
    Ok(success(event, "Event fetched successfully").into_response())
}

pub async fn similar_events(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let events = state.events.list_similar(&slug).await?;
    Ok(success(events, "Similar events fetched successfully").into_response())
}

/// Everything the event page shows: the event, its booking count and
/// events sharing a tag with it.
pub async fn event_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let event = state
        .events
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| not_found(&slug))?;
    let bookings = state.bookings.count_by_event(event.id).await;
    let similar_events = state.events.list_similar(&event.slug).await?;

    let detail = EventDetail {
        event,
        bookings,
        similar_events,
    };
    Ok(success(detail, "Event fetched successfully").into_response())
}

pub async fn my_events(
    State(state): State<AppState>,
    MaybePrincipal(principal): MaybePrincipal,
) -> Result<Response, AppError> {
    let events = state.events.list_by_creator(principal.as_ref()).await?;
    Ok(success(events, "Events fetched successfully").into_response())
}

fn not_found(slug: &str) -> AppError {
    AppError::NotFound(format!("Event with slug \"{}\" not found", slug.trim()))
}
