use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::entities::shipment::ShipmentStatus;

/// Domain events emitted by the engine after a transaction commits.
///
/// Consumers are external collaborators (notification senders, audit trails);
/// the engine itself never reads these back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderLineAdded {
        order_id: Uuid,
        order_line_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    OrderLocked(Uuid),
    OrderUnlocked(Uuid),

    BatchCreated {
        order_id: Uuid,
        batch_id: Uuid,
        code: String,
    },
    BatchStatusChanged {
        batch_id: Uuid,
        old_status: String,
        new_status: String,
    },
    AllocationCommitted {
        batch_id: Uuid,
        order_line_id: Uuid,
        batch_item_id: Uuid,
        quantity: i32,
        remaining: i32,
    },
    AllocationReleased {
        batch_item_id: Uuid,
        order_line_id: Uuid,
        quantity: i32,
    },

    PackagingVersionCreated {
        product_id: Uuid,
        version_id: Uuid,
        sealed_version_id: Option<Uuid>,
        valid_from: DateTime<Utc>,
    },

    ShipmentCreated {
        shipment_id: Uuid,
        batch_ids: Vec<Uuid>,
    },
    ShipmentStatusChanged {
        shipment_id: Uuid,
        old_status: ShipmentStatus,
        new_status: ShipmentStatus,
    },
    StageCompleted {
        stage_instance_id: Uuid,
        stage_name: String,
        actual_completion: NaiveDate,
    },
    StageReopened {
        stage_instance_id: Uuid,
        stage_name: String,
    },
}

/// Cloneable handle for emitting events into the processing channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender wired to a spawned [`process_events`] consumer.
    /// Convenient for tests and embedders that do not consume events.
    pub fn spawn_default(buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer);
        tokio::spawn(process_events(rx));
        Self::new(tx)
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Fire-and-forget variant used after a transaction has already
    /// committed: the state change stands even if the channel is closed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!(error = %e, "dropping domain event");
        }
    }
}

/// Drains the event channel, logging each event. Real deployments replace
/// this with their own consumer.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        debug!(?event, "domain event");
    }
}
