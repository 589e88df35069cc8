use crate::app::AppState;
use axum::extract::{Path, State};
use axum::Json;
use common_http_errors::ApiError;
use serde::Serialize;
use sqlx::Row;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct Availability {
    pub event_id: Uuid,
    pub remaining_tickets: i32,
    pub total_tickets: i32,
}

/// Authoritative availability read. Observers that missed feed updates
/// (disconnects, lag) reconcile through this instead of trusting the feed.
pub async fn get_availability(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Availability>, ApiError> {
    let row = sqlx::query("SELECT remaining_tickets, total_tickets FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|err| ApiError::internal(err, None))?;
    let Some(row) = row else {
        return Err(ApiError::not_found("event_not_found"));
    };
    Ok(Json(Availability {
        event_id,
        remaining_tickets: row.get("remaining_tickets"),
        total_tickets: row.get("total_tickets"),
    }))
}
