use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use booking_service::{build_router, AppState, TicketFeed};
use common_observability::BookingMetrics;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::info;

fn env_millis(name: &str, default_ms: u64) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(default_ms))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let db = PgPool::connect(&database_url).await?;
    sqlx::migrate!().run(&db).await?;

    let lock_wait_timeout = env_millis("LOCK_WAIT_TIMEOUT_MS", 5_000);
    let reserve_hold_delay = env_millis("RESERVE_HOLD_DELAY_MS", 0);
    let feed_capacity = env::var("TICKET_FEED_CAPACITY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(256);

    let state = AppState {
        db,
        feed: TicketFeed::new(feed_capacity),
        metrics: Arc::new(BookingMetrics::new()),
        lock_wait_timeout,
        reserve_hold_delay,
    };
    let app = build_router(state);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8091);
    let ip: std::net::IpAddr = host.parse()?;
    let addr = SocketAddr::from((ip, port));
    info!(%addr, "starting booking-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
