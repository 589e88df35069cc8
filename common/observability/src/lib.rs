use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};

#[derive(Clone)]
pub struct BookingMetrics {
    pub registry: Registry,
    pub bookings_confirmed: IntCounter,
    pub bookings_cancelled: IntCounter,
    pub reserve_rejections: IntCounterVec,
    pub ticket_updates_published: IntCounter,
    pub reserve_txn_duration_seconds: Histogram,
    pub http_errors_total: IntCounterVec,
}

impl BookingMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let bookings_confirmed = IntCounter::new(
            "bookings_confirmed_total",
            "Bookings committed in CONFIRMED state",
        ).unwrap();
        let bookings_cancelled = IntCounter::new(
            "bookings_cancelled_total",
            "Bookings transitioned to CANCELLED",
        ).unwrap();
        let reserve_rejections = IntCounterVec::new(
            prometheus::Opts::new(
                "reserve_rejections_total",
                "Reservation attempts rejected, labelled by reason code",
            ),
            &["reason"],
        ).unwrap();
        let ticket_updates_published = IntCounter::new(
            "ticket_updates_published_total",
            "Remaining-count updates handed to the change notifier",
        ).unwrap();
        let reserve_txn_duration_seconds = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "reserve_txn_duration_seconds",
                "Duration of a reservation transaction including lock wait",
            ).buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        ).unwrap();
        let http_errors_total = IntCounterVec::new(
            prometheus::Opts::new(
                "http_errors_total",
                "Count of HTTP error responses emitted (status >= 400)",
            ),
            &["service", "code", "status"],
        ).unwrap();
        let _ = registry.register(Box::new(bookings_confirmed.clone()));
        let _ = registry.register(Box::new(bookings_cancelled.clone()));
        let _ = registry.register(Box::new(reserve_rejections.clone()));
        let _ = registry.register(Box::new(ticket_updates_published.clone()));
        let _ = registry.register(Box::new(reserve_txn_duration_seconds.clone()));
        let _ = registry.register(Box::new(http_errors_total.clone()));
        BookingMetrics {
            registry,
            bookings_confirmed,
            bookings_cancelled,
            reserve_rejections,
            ticket_updates_published,
            reserve_txn_duration_seconds,
            http_errors_total,
        }
    }
}

impl Default for BookingMetrics {
    fn default() -> Self { Self::new() }
}
