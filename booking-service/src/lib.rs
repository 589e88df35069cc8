pub mod app;
pub mod booking;
pub mod booking_handlers;
pub mod event_handlers;
pub mod extract;
pub mod notifier;

pub use app::{build_router, AppState};
pub use notifier::{TicketFeed, TicketUpdate};
