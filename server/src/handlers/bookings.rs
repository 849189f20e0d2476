use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{MaybePrincipal, RequirePrincipal};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub event_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCountQuery {
    pub event_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingCount {
    event_id: Uuid,
    count: i64,
}

pub async fn create_booking(
    State(state): State<AppState>,
    RequirePrincipal(principal): RequirePrincipal,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let booking = state
        .bookings
        .create_booking(Some(&principal), request.event_id)
        .await?;
    Ok(created(booking, "Booking created successfully").into_response())
}

pub async fn booking_count(
    State(state): State<AppState>,
    query: Result<Query<BookingCountQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let count = state.bookings.count_by_event(query.event_id).await;
    Ok(success(
        BookingCount {
            event_id: query.event_id,
            count,
        },
        "Booking count fetched successfully",
    )
    .into_response())
}

pub async fn my_bookings(
    State(state): State<AppState>,
    MaybePrincipal(principal): MaybePrincipal,
) -> Result<Response, AppError> {
    let events = state.bookings.list_for_attendee(principal.as_ref()).await?;
    Ok(success(events, "Bookings fetched successfully").into_response())
}
