//! Change notifier: best-effort fan-out of remaining-ticket counts.
//!
//! Observers register by subscribing and deregister by dropping their
//! receiver. Delivery is at-most-once per observer per publish; a slow
//! observer that lags past the channel capacity loses the oldest updates
//! and is expected to reconcile through the availability endpoint. Publish
//! runs outside any transaction and can never fail the owning operation.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketUpdate {
    pub event_id: Uuid,
    pub remaining_tickets: i32,
}

#[derive(Clone)]
pub struct TicketFeed {
    tx: broadcast::Sender<TicketUpdate>,
}

impl TicketFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        TicketFeed { tx }
    }

    /// Register an observer. Dropping the receiver deregisters it.
    pub fn subscribe(&self) -> broadcast::Receiver<TicketUpdate> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Fire-and-forget broadcast. A send error only means no observer is
    /// currently connected, which is not a failure of the caller.
    pub fn publish(&self, event_id: Uuid, remaining_tickets: i32) {
        let update = TicketUpdate { event_id, remaining_tickets };
        match self.tx.send(update) {
            Ok(observers) => {
                tracing::debug!(
                    event_id = %event_id,
                    remaining_tickets,
                    observers,
                    "Published ticket update"
                );
            }
            Err(_) => {
                tracing::debug!(
                    event_id = %event_id,
                    remaining_tickets,
                    "No observers connected; ticket update dropped"
                );
            }
        }
    }
}
