use dashmap::DashMap;
use shared::FeedEvent;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Fans new thread events out to the feed connections subscribed to each order
pub struct MessageHub {
    /// Map of connection ID -> sender to that connection
    connections: DashMap<Uuid, mpsc::Sender<FeedEvent>>,
    /// Map of order ID -> subscribed connection IDs
    subscriptions: DashMap<Uuid, Vec<Uuid>>,
}

impl MessageHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            subscriptions: DashMap::new(),
        }
    }

    // Connection management
    pub fn register(&self, connection_id: Uuid, sender: mpsc::Sender<FeedEvent>) {
        self.connections.insert(connection_id, sender);
        tracing::info!("Feed connection registered: {}", connection_id);
    }

    pub fn unregister(&self, connection_id: &Uuid) {
        self.connections.remove(connection_id);
        for mut subscribers in self.subscriptions.iter_mut() {
            subscribers.retain(|id| id != connection_id);
        }
        self.subscriptions.retain(|_, subscribers| !subscribers.is_empty());
        tracing::info!("Feed connection unregistered: {}", connection_id);
    }

    // Subscription management
    pub fn subscribe(&self, connection_id: Uuid, order_id: Uuid) -> bool {
        if !self.connections.contains_key(&connection_id) {
            return false;
        }
        let mut subscribers = self.subscriptions.entry(order_id).or_default();
        if !subscribers.contains(&connection_id) {
            subscribers.push(connection_id);
        }
        tracing::debug!("Connection {} subscribed to order {}", connection_id, order_id);
        true
    }

    pub fn unsubscribe(&self, connection_id: &Uuid, order_id: &Uuid) {
        if let Some(mut subscribers) = self.subscriptions.get_mut(order_id) {
            subscribers.retain(|id| id != connection_id);
        }
        self.subscriptions.remove_if(order_id, |_, subscribers| subscribers.is_empty());
    }

    pub fn subscriber_count(&self, order_id: &Uuid) -> usize {
        self.subscriptions
            .get(order_id)
            .map(|subscribers| subscribers.len())
            .unwrap_or_default()
    }

    // Event routing
    pub async fn send_to(&self, connection_id: &Uuid, event: FeedEvent) -> bool {
        let sender = self.connections.get(connection_id).map(|s| s.clone());
        match sender {
            Some(sender) => sender.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Deliver to every subscriber of the order without waiting; returns how many received it.
    /// A subscriber whose buffer is full misses the event. Closed connections are dropped.
    pub fn publish(&self, order_id: Uuid, event: FeedEvent) -> usize {
        let subscriber_ids = self
            .subscriptions
            .get(&order_id)
            .map(|subscribers| subscribers.clone())
            .unwrap_or_default();

        let mut delivered = 0;
        for connection_id in subscriber_ids {
            let sender = self.connections.get(&connection_id).map(|s| s.clone());
            let Some(sender) = sender else {
                self.unregister(&connection_id);
                continue;
            };
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Feed connection {} is not draining, event dropped", connection_id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Dropping closed feed connection {}", connection_id);
                    self.unregister(&connection_id);
                }
            }
        }

        tracing::debug!("Published event for order {} to {} subscribers", order_id, delivered);
        delivered
    }
}

impl Default for MessageHub {
    fn default() -> Self {
        Self::new()
    }
}
