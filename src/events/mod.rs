use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the checkout pipeline and the ledgers. Consumers are
/// in-process; delivery is best-effort and never blocks the request path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderCancelled(Uuid),

    // Checkout events
    CheckoutCompleted {
        customer_id: Uuid,
        order_ids: Vec<Uuid>,
        total: Decimal,
    },

    // Wallet ledger events
    WalletCredited {
        wallet_id: Uuid,
        amount: Decimal,
    },
    WalletDebited {
        wallet_id: Uuid,
        amount: Decimal,
    },

    // Points ledger events
    PointsEarned {
        account_id: Uuid,
        points: i64,
    },
    PointsSpent {
        account_id: Uuid,
        points: i64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed
    /// or full. Used on paths where event delivery must not abort the
    /// surrounding operation.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event: {}", e);
        }
    }
}

/// Creates the event channel with the given capacity
pub fn create_event_channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Runs until every sender
/// is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "Order created");
            }
            Event::OrderCancelled(order_id) => {
                info!(order_id = %order_id, "Order cancelled");
            }
            Event::CheckoutCompleted {
                customer_id,
                order_ids,
                total,
            } => {
                info!(
                    customer_id = %customer_id,
                    orders = order_ids.len(),
                    total = %total,
                    "Checkout completed"
                );
            }
            Event::WalletCredited { wallet_id, amount } => {
                info!(wallet_id = %wallet_id, amount = %amount, "Wallet credited");
            }
            Event::WalletDebited { wallet_id, amount } => {
                info!(wallet_id = %wallet_id, amount = %amount, "Wallet debited");
            }
            Event::PointsEarned { account_id, points } => {
                info!(account_id = %account_id, points, "Points earned");
            }
            Event::PointsSpent { account_id, points } => {
                info!(account_id = %account_id, points, "Points spent");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event() {
        let (sender, mut rx) = create_event_channel(8);
        sender.send(Event::OrderCreated(Uuid::new_v4())).await.unwrap();
        assert!(matches!(rx.recv().await, Some(Event::OrderCreated(_))));
    }

    #[tokio::test]
    async fn send_or_log_survives_closed_channel() {
        let (sender, rx) = create_event_channel(1);
        drop(rx);
        sender.send_or_log(Event::OrderCancelled(Uuid::new_v4())).await;
    }
}
