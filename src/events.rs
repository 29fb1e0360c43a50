use crate::models::{Order, StoreData};
use crate::status::{pickup_progress, OrderStatus, PaymentStatus, PickupProgress};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// A status or payment change on one order, fanned out to live trackers.
#[derive(Debug, Clone, Serialize)]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub number: u64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub progress: PickupProgress,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderEvent {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            number: order.number,
            status: order.status,
            payment_status: order.payment_status,
            progress: pickup_progress(order.status, order.payment_status),
            updated_at: order.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<OrderEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, order: &Order) {
        // No subscribers is the common case; nothing to do then.
        let receivers = self.sender.send(OrderEvent::from(order)).unwrap_or(0);
        debug!(order_id = %order.id, status = %order.status, receivers, "order event published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Changes to one order. When the receiver falls behind, the skipped
/// events are replaced by a snapshot of the order read from the store.
pub fn order_updates(
    data: Arc<Mutex<StoreData>>,
    receiver: broadcast::Receiver<OrderEvent>,
    order_id: Uuid,
) -> impl Stream<Item = OrderEvent> + Send + 'static {
    BroadcastStream::new(receiver)
        .then(move |message| {
            let data = data.clone();
            async move {
                match message {
                    Ok(event) if event.order_id == order_id => Some(event),
                    Ok(_) => None,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(%order_id, skipped, "order event stream lagged, resending current state");
                        data.lock().await.orders.get(&order_id).map(OrderEvent::from)
                    }
                }
            }
        })
        .filter_map(|event| event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contact, PaymentMethod, StatusTimestamps, Totals};
    use crate::status::Fulfillment;
    use std::time::Duration;

    fn sample_order(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            number: 1007,
            location_id: Uuid::new_v4(),
            customer_id: None,
            fulfillment: Fulfillment::Pickup,
            contact: Contact {
                name: "Ana".into(),
                phone: "555-0100".into(),
                email: None,
            },
            delivery_address: None,
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::PayOnSite,
            payment_session_id: None,
            status,
            items: Vec::new(),
            totals: Totals::default(),
            promo_code: None,
            coupon_id: None,
            points_awarded: 0,
            timestamps: StatusTimestamps::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_changes() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        let order = sample_order(OrderStatus::Preparing);

        bus.publish(&order);
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.order_id, order.id);
        assert_eq!(event.progress, PickupProgress::Step(2));
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_the_current_state() {
        let bus = EventBus::new();
        let ours = sample_order(OrderStatus::Ready);
        let other = sample_order(OrderStatus::Preparing);
        let mut data = StoreData::default();
        data.orders.insert(ours.id, ours.clone());
        let data = Arc::new(Mutex::new(data));

        let updates = order_updates(data, bus.subscribe(), ours.id);
        tokio::pin!(updates);
        for _ in 0..CHANNEL_CAPACITY + 50 {
            bus.publish(&other);
        }

        let event = tokio::time::timeout(Duration::from_secs(2), updates.next())
            .await
            .expect("no event within timeout")
            .expect("stream ended");
        assert_eq!(event.order_id, ours.id);
        assert_eq!(event.status, OrderStatus::Ready);
    }

    #[tokio::test]
    async fn other_orders_are_filtered_out() {
        let bus = EventBus::new();
        let ours = sample_order(OrderStatus::Preparing);
        let other = sample_order(OrderStatus::Preparing);
        let data = Arc::new(Mutex::new(StoreData::default()));

        let updates = order_updates(data, bus.subscribe(), ours.id);
        tokio::pin!(updates);
        bus.publish(&other);
        bus.publish(&ours);

        let event = tokio::time::timeout(Duration::from_secs(2), updates.next())
            .await
            .expect("no event within timeout")
            .expect("stream ended");
        assert_eq!(event.order_id, ours.id);
    }
}
