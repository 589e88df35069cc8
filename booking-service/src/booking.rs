//! Reservation and cancellation coordinators.
//!
//! Both operations run as a single Postgres transaction serialized on a
//! `SELECT ... FOR UPDATE` row lock against the event. The event row lock is
//! the only lock either path takes, so reservation and cancellation of the
//! same event can never interleave unsafely and no lock-order inversion is
//! possible. Everything observable (ticket decrement + ledger write) commits
//! or rolls back together.

use crate::app::AppState;
use chrono::{DateTime, Utc};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, query_scalar, Postgres, Row, Transaction};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown booking status: {0}")]
pub struct UnknownBookingStatus(String);

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownBookingStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(UnknownBookingStatus(other.to_string())),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub title: String,
    pub venue: String,
    pub starts_at: DateTime<Utc>,
    pub price_cents: i64,
    pub total_tickets: i32,
    pub remaining_tickets: i32,
}

#[derive(Debug, sqlx::FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct EventView {
    pub id: Uuid,
    pub title: String,
    pub venue: String,
    pub starts_at: DateTime<Utc>,
    pub price_cents: i64,
    pub total_tickets: i32,
    pub remaining_tickets: i32,
}

#[derive(Debug, Serialize)]
pub struct BookingView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub event: EventView,
}

impl BookingView {
    fn from_parts(booking: BookingRow, event: EventView) -> ApiResult<Self> {
        let status = booking
            .status
            .parse::<BookingStatus>()
            .map_err(|err| ApiError::internal(err, None))?;
        Ok(BookingView {
            id: booking.id,
            user_id: booking.user_id,
            event_id: booking.event_id,
            status,
            created_at: booking.created_at,
            event,
        })
    }
}

const EVENT_COLUMNS: &str =
    "id, title, venue, starts_at, price_cents, total_tickets, remaining_tickets";
const BOOKING_COLUMNS: &str = "id, user_id, event_id, status, created_at";

/// What the reservation transaction should do with the ledger after the
/// eligibility checks pass.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReserveAction {
    /// No prior row for this (user, event); insert a fresh CONFIRMED one.
    Insert,
    /// A CANCELLED row exists; flip it back to CONFIRMED.
    Reconfirm(Uuid),
}

pub(crate) fn admission_guard(remaining_tickets: i32) -> ApiResult<()> {
    if remaining_tickets <= 0 {
        return Err(ApiError::conflict("sold_out"));
    }
    Ok(())
}

pub(crate) fn reserve_action(existing: Option<&BookingRow>) -> ApiResult<ReserveAction> {
    match existing {
        Some(row) if row.status == BookingStatus::Confirmed.as_str() => {
            Err(ApiError::conflict("already_booked"))
        }
        Some(row) => Ok(ReserveAction::Reconfirm(row.id)),
        None => Ok(ReserveAction::Insert),
    }
}

pub(crate) fn cancel_guard(booking: &BookingRow, caller: Uuid) -> ApiResult<()> {
    if booking.user_id != caller {
        return Err(ApiError::Forbidden { trace_id: None });
    }
    if booking.status == BookingStatus::Cancelled.as_str() {
        return Err(ApiError::conflict("already_cancelled"));
    }
    Ok(())
}

/// Map Postgres conflict signals onto the client-facing taxonomy instead of
/// letting a raw driver error escape as a 500. Anything else stays internal.
pub(crate) fn classify_pg_code(code: &str) -> Option<ApiError> {
    match code {
        // lock_not_available: the bounded lock wait expired
        "55P03" => Some(ApiError::busy("lock_timeout")),
        // serialization_failure / deadlock_detected: a concurrent commit
        // invalidated this transaction; client may retry
        "40001" | "40P01" => Some(ApiError::conflict("booking_conflict")),
        // unique_violation on (user_id, event_id): upsert raced
        "23505" => Some(ApiError::conflict("already_booked")),
        _ => None,
    }
}

fn classify_db_error(err: sqlx::Error) -> ApiError {
    if let Some(db_err) = err.as_database_error() {
        if let Some(code) = db_err.code() {
            if let Some(api) = classify_pg_code(&code) {
                return api;
            }
        }
    }
    ApiError::internal(err, None)
}

async fn set_lock_timeout(
    tx: &mut Transaction<'_, Postgres>,
    wait: Duration,
) -> ApiResult<()> {
    // SET LOCAL takes no bind parameters; the value comes from service
    // config, never from the request.
    let millis = wait.as_millis().max(1);
    query(&format!("SET LOCAL lock_timeout = '{millis}ms'"))
        .execute(&mut **tx)
        .await
        .map_err(classify_db_error)?;
    Ok(())
}

/// Reserve one ticket for `user_id` on `event_id`.
pub async fn reserve(state: &AppState, user_id: Uuid, event_id: Uuid) -> ApiResult<BookingView> {
    let timer = state.metrics.reserve_txn_duration_seconds.start_timer();
    let result = reserve_txn(state, user_id, event_id).await;
    timer.observe_duration();

    match &result {
        Ok(view) => {
            state.metrics.bookings_confirmed.inc();
            tracing::info!(
                booking_id = %view.id,
                user_id = %user_id,
                event_id = %event_id,
                "Booking confirmed"
            );
            publish_remaining(state, event_id).await;
        }
        Err(err) => {
            state
                .metrics
                .reserve_rejections
                .with_label_values(&[err.code()])
                .inc();
        }
    }
    result
}

async fn reserve_txn(state: &AppState, user_id: Uuid, event_id: Uuid) -> ApiResult<BookingView> {
    let mut tx = state.db.begin().await.map_err(classify_db_error)?;
    set_lock_timeout(&mut tx, state.lock_wait_timeout).await?;

    // Exclusive row lock: serializes every reservation/cancellation attempt
    // against this event. Plain reads outside the transaction are unaffected.
    let event = query_as::<_, EventRow>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"
    ))
    .bind(event_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(classify_db_error)?;
    let Some(event) = event else {
        return Err(ApiError::not_found("event_not_found"));
    };

    admission_guard(event.remaining_tickets)?;

    let existing = query_as::<_, BookingRow>(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 AND event_id = $2"
    ))
    .bind(user_id)
    .bind(event_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(classify_db_error)?;
    let action = reserve_action(existing.as_ref())?;

    if !state.reserve_hold_delay.is_zero() {
        // Stress hook: keep holding the row lock to widen the race window
        // under test. Outcome-neutral, duration only.
        tokio::time::sleep(state.reserve_hold_delay).await;
    }

    let (remaining_tickets, total_tickets): (i32, i32) = query_as(
        "UPDATE events SET remaining_tickets = remaining_tickets - 1, updated_at = NOW() \
         WHERE id = $1 RETURNING remaining_tickets, total_tickets",
    )
    .bind(event_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(classify_db_error)?;

    let booking = match action {
        ReserveAction::Reconfirm(booking_id) => query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET status = 'CONFIRMED', updated_at = NOW() \
             WHERE id = $1 RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify_db_error)?,
        ReserveAction::Insert => query_as::<_, BookingRow>(&format!(
            "INSERT INTO bookings (user_id, event_id, status) VALUES ($1, $2, 'CONFIRMED') \
             ON CONFLICT (user_id, event_id) DO UPDATE SET status = 'CONFIRMED', updated_at = NOW() \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(user_id)
        .bind(event_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify_db_error)?,
    };

    tx.commit().await.map_err(classify_db_error)?;

    BookingView::from_parts(
        booking,
        EventView {
            id: event.id,
            title: event.title,
            venue: event.venue,
            starts_at: event.starts_at,
            price_cents: event.price_cents,
            total_tickets,
            remaining_tickets,
        },
    )
}

/// Cancel a confirmed booking owned by `user_id` and restore one ticket.
pub async fn cancel(state: &AppState, user_id: Uuid, booking_id: Uuid) -> ApiResult<BookingView> {
    let result = cancel_txn(state, user_id, booking_id).await;

    if let Ok(view) = &result {
        state.metrics.bookings_cancelled.inc();
        tracing::info!(
            booking_id = %view.id,
            user_id = %user_id,
            event_id = %view.event_id,
            "Booking cancelled"
        );
        publish_remaining(state, view.event_id).await;
    }
    result
}

async fn cancel_txn(state: &AppState, user_id: Uuid, booking_id: Uuid) -> ApiResult<BookingView> {
    let mut tx = state.db.begin().await.map_err(classify_db_error)?;
    set_lock_timeout(&mut tx, state.lock_wait_timeout).await?;

    let booking = query_as::<_, BookingRow>(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
    ))
    .bind(booking_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(classify_db_error)?;
    let Some(booking) = booking else {
        return Err(ApiError::not_found("booking_not_found"));
    };

    cancel_guard(&booking, user_id)?;

    // Same lock the reservation path takes, so the two never interleave.
    let event = query_as::<_, EventRow>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"
    ))
    .bind(booking.event_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(classify_db_error)?;
    let Some(event) = event else {
        return Err(ApiError::not_found("event_not_found"));
    };

    // Guarded transition: a cancel that committed between our unlocked read
    // and the row lock acquisition shows up as zero rows here.
    let cancelled = query_as::<_, BookingRow>(&format!(
        "UPDATE bookings SET status = 'CANCELLED', updated_at = NOW() \
         WHERE id = $1 AND status = 'CONFIRMED' RETURNING {BOOKING_COLUMNS}"
    ))
    .bind(booking.id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(classify_db_error)?;
    let Some(cancelled) = cancelled else {
        return Err(ApiError::conflict("already_cancelled"));
    };

    let (remaining_tickets, total_tickets): (i32, i32) = query_as(
        "UPDATE events SET remaining_tickets = remaining_tickets + 1, updated_at = NOW() \
         WHERE id = $1 RETURNING remaining_tickets, total_tickets",
    )
    .bind(booking.event_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(classify_db_error)?;

    tx.commit().await.map_err(classify_db_error)?;

    BookingView::from_parts(
        cancelled,
        EventView {
            id: event.id,
            title: event.title,
            venue: event.venue,
            starts_at: event.starts_at,
            price_cents: event.price_cents,
            total_tickets,
            remaining_tickets,
        },
    )
}

/// The caller's CONFIRMED bookings, newest first, with the embedded event.
pub async fn list_for_user(state: &AppState, user_id: Uuid) -> ApiResult<Vec<BookingView>> {
    let rows = query(
        "SELECT b.id, b.user_id, b.event_id, b.status, b.created_at, \
                e.title, e.venue, e.starts_at, e.price_cents, e.total_tickets, e.remaining_tickets \
         FROM bookings b JOIN events e ON e.id = b.event_id \
         WHERE b.user_id = $1 AND b.status = 'CONFIRMED' \
         ORDER BY b.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&state.db)
    .await
    .map_err(classify_db_error)?;

    let mut views = Vec::with_capacity(rows.len());
    for r in rows {
        let event_id: Uuid = r.get("event_id");
        let booking = BookingRow {
            id: r.get("id"),
            user_id: r.get("user_id"),
            event_id,
            status: r.get("status"),
            created_at: r.get("created_at"),
        };
        let event = EventView {
            id: event_id,
            title: r.get("title"),
            venue: r.get("venue"),
            starts_at: r.get("starts_at"),
            price_cents: r.get("price_cents"),
            total_tickets: r.get("total_tickets"),
            remaining_tickets: r.get("remaining_tickets"),
        };
        views.push(BookingView::from_parts(booking, event)?);
    }
    Ok(views)
}

/// Read the post-commit remaining count and hand it to the notifier.
/// This read may race with other commits; the value was true at some point
/// no earlier than our own commit. Failures are logged, never propagated.
async fn publish_remaining(state: &AppState, event_id: Uuid) {
    match query_scalar::<_, i32>("SELECT remaining_tickets FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_optional(&state.db)
        .await
    {
        Ok(Some(remaining_tickets)) => {
            state.feed.publish(event_id, remaining_tickets);
            state.metrics.ticket_updates_published.inc();
        }
        Ok(None) => {
            tracing::warn!(event_id = %event_id, "Event row missing during post-commit read");
        }
        Err(err) => {
            tracing::warn!(?err, event_id = %event_id, "Post-commit availability read failed");
        }
    }
}
