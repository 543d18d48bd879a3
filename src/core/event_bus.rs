use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 1024;

/// Review lifecycle events. The per-product quality-score aggregation and
/// other downstream consumers subscribe here; nothing inside this service
/// depends on a subscriber being present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ReviewEvent {
    #[serde(rename = "REVIEW_CREATED")]
    ReviewCreated(ReviewCreatedPayload),

    #[serde(rename = "REVIEW_UPDATED")]
    ReviewUpdated(ReviewUpdatedPayload),

    #[serde(rename = "REVIEW_DELETED")]
    ReviewDeleted(ReviewDeletedPayload),
}

impl ReviewEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ReviewEvent::ReviewCreated(_) => "REVIEW_CREATED",
            ReviewEvent::ReviewUpdated(_) => "REVIEW_UPDATED",
            ReviewEvent::ReviewDeleted(_) => "REVIEW_DELETED",
        }
    }

    pub fn product_id(&self) -> i64 {
        match self {
            ReviewEvent::ReviewCreated(p) => p.product_id,
            ReviewEvent::ReviewUpdated(p) => p.product_id,
            ReviewEvent::ReviewDeleted(p) => p.product_id,
        }
    }

    pub fn user_id(&self) -> i64 {
        match self {
            ReviewEvent::ReviewCreated(p) => p.user_id,
            ReviewEvent::ReviewUpdated(p) => p.user_id,
            ReviewEvent::ReviewDeleted(p) => p.user_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCreatedPayload {
    pub review_id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub rating: i32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewUpdatedPayload {
    pub review_id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub rating: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDeletedPayload {
    pub review_id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub timestamp: DateTime<Utc>,
}

pub struct EventBus {
    sender: broadcast::Sender<ReviewEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, event: ReviewEvent) {
        let event_type = event.event_type();
        let product_id = event.product_id();

        if self.sender.send(event).is_err() {
            debug!(event_type, product_id, "no subscribers for review event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReviewEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.publish(ReviewEvent::ReviewCreated(ReviewCreatedPayload {
            review_id: 1,
            user_id: 7,
            product_id: 42,
            rating: 5,
            timestamp: Utc::now(),
        }));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "REVIEW_CREATED");
        assert_eq!(event.product_id(), 42);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(ReviewEvent::ReviewDeleted(ReviewDeletedPayload {
            review_id: 1,
            user_id: 7,
            product_id: 42,
            timestamp: Utc::now(),
        }));
    }
}
