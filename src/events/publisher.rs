//! # Domain Event Publisher
//!
//! In-process broadcast of [`FleetEvent`]s. Subscribers that fall behind lose
//! the oldest events; publishing never blocks the writer.
//!
//! ```rust
//! use fleetops_core::events::{EventPublisher, FleetEvent};
//! use chrono::Utc;
//!
//! # tokio_test::block_on(async {
//! let publisher = EventPublisher::new(16);
//! let mut rx = publisher.subscribe();
//!
//! publisher.publish(
//!     FleetEvent::LowStockDetected {
//!         item_id: uuid::Uuid::nil(),
//!         sku: "SUG-1KG".to_string(),
//!         quantity: 3,
//!         min_quantity: 10,
//!     },
//!     Utc::now(),
//! );
//!
//! let received = rx.recv().await.unwrap();
//! assert_eq!(received.event.name(), "low_stock_detected");
//! # });
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Notifications exposed to external subscribers (push delivery lives elsewhere).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FleetEvent {
    TaskCreated {
        task_id: Uuid,
        task_type: String,
        machine_id: Option<Uuid>,
        template_id: Option<Uuid>,
        due_date: Option<DateTime<Utc>>,
    },
    LowStockDetected {
        item_id: Uuid,
        sku: String,
        quantity: i64,
        min_quantity: i64,
    },
}

impl FleetEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskCreated { .. } => "task_created",
            Self::LowStockDetected { .. } => "low_stock_detected",
        }
    }
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub event: FleetEvent,
    pub published_at: DateTime<Utc>,
}

/// Fan-out publisher for domain events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: FleetEvent, published_at: DateTime<Utc>) {
        let name = event.name();
        match self.sender.send(PublishedEvent {
            event,
            published_at,
        }) {
            Ok(receivers) => tracing::debug!(event = name, receivers = receivers, "Event published"),
            Err(broadcast::error::SendError(_)) => {
                tracing::trace!(event = name, "Event published without subscribers")
            }
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
