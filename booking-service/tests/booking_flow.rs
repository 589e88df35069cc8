//! Booking lifecycle against a real Postgres (testcontainers).
//! Skipped unless ENABLE_ITESTS=1; requires Docker.

mod test_utils;

use axum::http::{Request, StatusCode};
use booking_service::booking::{self, BookingStatus};
use booking_service::build_router;
use http_body_util::BodyExt;
use std::time::Duration;
use test_utils::*;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn reserve_cancel_rebook_lifecycle() {
    if !itests_enabled() {
        return;
    }
    let (_pg, pool) = start_postgres().await;
    let state = test_state(pool.clone());
    let event_id = seed_event(&pool, 2).await;
    let user = Uuid::new_v4();

    // A subscribed observer sees the post-commit remaining count.
    let mut feed_rx = state.feed.subscribe();

    let booked = booking::reserve(&state, user, event_id).await.expect("reserve");
    assert_eq!(booked.status, BookingStatus::Confirmed);
    assert_eq!(booked.event.remaining_tickets, 1);
    assert_eq!(remaining_tickets(&pool, event_id).await, 1);

    let update = tokio::time::timeout(Duration::from_secs(1), feed_rx.recv())
        .await
        .expect("feed update within 1s")
        .expect("feed open");
    assert_eq!(update.event_id, event_id);
    assert_eq!(update.remaining_tickets, 1);

    // Double reserve is rejected and consumes nothing.
    let err = booking::reserve(&state, user, event_id).await.unwrap_err();
    assert_eq!(err.code(), "already_booked");
    assert_eq!(remaining_tickets(&pool, event_id).await, 1);

    // Only the owner may cancel.
    let stranger = Uuid::new_v4();
    let err = booking::cancel(&state, stranger, booked.id).await.unwrap_err();
    assert_eq!(err.code(), "forbidden");
    assert_eq!(remaining_tickets(&pool, event_id).await, 1);

    // Cancellation restores exactly one ticket.
    let cancelled = booking::cancel(&state, user, booked.id).await.expect("cancel");
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(remaining_tickets(&pool, event_id).await, 2);

    // Second cancel is a state-machine violation; inventory untouched.
    let err = booking::cancel(&state, user, booked.id).await.unwrap_err();
    assert_eq!(err.code(), "already_cancelled");
    assert_eq!(remaining_tickets(&pool, event_id).await, 2);

    // Re-reservation converges onto the same ledger row.
    let rebooked = booking::reserve(&state, user, event_id).await.expect("rebook");
    assert_eq!(rebooked.id, booked.id);
    assert_eq!(rebooked.status, BookingStatus::Confirmed);
    assert_eq!(ledger_rows(&pool, user, event_id).await, 1);
    assert_eq!(remaining_tickets(&pool, event_id).await, 1);
}

#[tokio::test]
async fn missing_rows_surface_as_not_found() {
    if !itests_enabled() {
        return;
    }
    let (_pg, pool) = start_postgres().await;
    let state = test_state(pool.clone());
    let user = Uuid::new_v4();

    let err = booking::reserve(&state, user, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.code(), "event_not_found");

    let err = booking::cancel(&state, user, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.code(), "booking_not_found");
}

#[tokio::test]
async fn sold_out_event_rejects_reserve() {
    if !itests_enabled() {
        return;
    }
    let (_pg, pool) = start_postgres().await;
    let state = test_state(pool.clone());
    let event_id = seed_event(&pool, 1).await;

    booking::reserve(&state, Uuid::new_v4(), event_id).await.expect("first");
    let err = booking::reserve(&state, Uuid::new_v4(), event_id).await.unwrap_err();
    assert_eq!(err.code(), "sold_out");
    assert_eq!(remaining_tickets(&pool, event_id).await, 0);
    assert_eq!(confirmed_count(&pool, event_id).await, 1);
}

#[tokio::test]
async fn list_returns_confirmed_bookings_newest_first() {
    if !itests_enabled() {
        return;
    }
    let (_pg, pool) = start_postgres().await;
    let state = test_state(pool.clone());
    let user = Uuid::new_v4();
    let first_event = seed_event(&pool, 5).await;
    let second_event = seed_event(&pool, 5).await;

    let first = booking::reserve(&state, user, first_event).await.expect("first");
    let second = booking::reserve(&state, user, second_event).await.expect("second");
    booking::cancel(&state, user, first.id).await.expect("cancel first");

    let listed = booking::list_for_user(&state, user).await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[0].event.id, second_event);
}

#[tokio::test]
async fn availability_endpoint_reports_authoritative_counts() {
    if !itests_enabled() {
        return;
    }
    let (_pg, pool) = start_postgres().await;
    let state = test_state(pool.clone());
    let event_id = seed_event(&pool, 3).await;
    booking::reserve(&state, Uuid::new_v4(), event_id).await.expect("reserve");

    let app = build_router(state);
    let req = Request::builder()
        .uri(format!("/events/{event_id}/availability"))
        .method("GET")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["remaining_tickets"], 2);
    assert_eq!(body["total_tickets"], 3);
}
