use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::stock::{MaterialId, OrderId, OrderStatus};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
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

    /// Sends and logs on failure. Events are announced after commit, so a
    /// closed channel must not turn a committed change into an error.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "dropping stock event");
        }
    }
}

/// Stock movements announced after the owning transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderStatusChanged {
        order_id: OrderId,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderDeleted(OrderId),
    PackagingDeducted {
        order_id: OrderId,
        rules_applied: usize,
    },
    OrderStockConsumed {
        order_id: OrderId,
        complete: bool,
    },
    OrderStockRestored {
        order_id: OrderId,
        complete: bool,
        ledger_entries_cleared: u64,
    },
    MaterialAdjusted {
        material_id: MaterialId,
        delta: Decimal,
        new_quantity: Decimal,
        reason: String,
    },
    MaterialLowStock {
        material_id: MaterialId,
        name: String,
        stock_quantity: Decimal,
        threshold: Decimal,
        detected_at: DateTime<Utc>,
    },
}

pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::MaterialLowStock {
                material_id,
                name,
                stock_quantity,
                threshold,
                ..
            } => {
                warn!(
                    material_id,
                    material = %name,
                    %stock_quantity,
                    %threshold,
                    "Low stock alert"
                );
            }
            Event::OrderStockRestored {
                order_id,
                complete: false,
                ..
            } => {
                warn!(order_id, "Order stock restored with failures");
            }
            Event::OrderStockConsumed {
                order_id,
                complete: false,
            } => {
                warn!(order_id, "Order stock consumed with failures");
            }
            other => {
                info!(event = ?other, "Received event");
            }
        }
    }

    warn!("Event processing loop has ended");
}
