use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Domain events emitted after a lifecycle mutation commits. Delivery of an
/// event is best-effort: a send failure is logged, never surfaced to the
/// caller whose transaction already committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    PaymentConfirmed(Uuid),
    PaymentRejected(Uuid),
    OrderReadyForDelivery(Uuid),
    OrderCancelled(Uuid),
    OrderDelivered(Uuid),

    // Delivery events
    DeliveryCreated {
        delivery_id: Uuid,
        order_id: Uuid,
    },
    DeliveryAccepted {
        delivery_id: Uuid,
        driver_id: Uuid,
    },
    DeliveryPickedUp(Uuid),
    DeliveryCompleted(Uuid),
    DeliveryCancelled(Uuid),

    // Delivery request events
    DeliveryRequestCreated {
        request_id: Uuid,
        delivery_id: Uuid,
        driver_id: Uuid,
    },
    DeliveryRequestAccepted {
        request_id: Uuid,
        delivery_id: Uuid,
        driver_id: Uuid,
    },
    DeliveryRequestRejected(Uuid),

    // Commission events
    CommissionSettled {
        request_id: Uuid,
        driver_id: Uuid,
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
}

/// Background consumer for the event channel. Currently logs events; the
/// channel boundary is where outbound notifications would hang off.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processor started");
    while let Some(event) = receiver.recv().await {
        debug!(?event, "Processing domain event");
    }
    info!("Event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_through_the_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        let order_id = Uuid::new_v4();
        sender.send(Event::OrderCreated(order_id)).await.unwrap();

        match rx.recv().await {
            Some(Event::OrderCreated(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender.send(Event::OrderCancelled(Uuid::new_v4())).await.is_err());
    }
}
