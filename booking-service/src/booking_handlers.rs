use crate::app::AppState;
use crate::booking::{self, BookingView};
use crate::extract::AuthenticatedUser;
use axum::extract::{Path, State};
use axum::Json;
use common_http_errors::ApiError;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub event_id: Uuid,
}

pub async fn create_booking(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<Json<BookingView>, ApiError> {
    let view = booking::reserve(&state, user_id, payload.event_id).await?;
    Ok(Json(view))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<Vec<BookingView>>, ApiError> {
    let views = booking::list_for_user(&state, user_id).await?;
    Ok(Json(views))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingView>, ApiError> {
    let view = booking::cancel(&state, user_id, booking_id).await?;
    Ok(Json(view))
}
