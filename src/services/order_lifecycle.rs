use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::finish_tx;
use super::stock_engine::StockEngine;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::stock::{
    Material, OrderId, OrderStatus, OrderStockReport, PackagingReport, StockBackend, StockTx,
};

/// Outcome of a status transition, including any stock movement it triggered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatusChange {
    pub order_id: OrderId,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packaging: Option<PackagingReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restoration: Option<OrderStockReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderDeletion {
    pub order_id: OrderId,
    /// `None` when the order was already cancelled (and restored then).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restoration: Option<OrderStockReport>,
}

/// Applies order status changes and deletions together with their stock
/// effects in one transaction.
#[derive(Clone)]
pub struct OrderLifecycleService {
    backend: Arc<dyn StockBackend>,
    engine: Arc<StockEngine>,
    event_sender: Arc<EventSender>,
}

impl OrderLifecycleService {
    pub fn new(
        backend: Arc<dyn StockBackend>,
        engine: Arc<StockEngine>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            backend,
            engine,
            event_sender,
        }
    }

    /// Moves an order to `new_status`. Entering `processing` deducts
    /// packaging; entering `cancelled` restores all order stock.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<StatusChange, ServiceError> {
        let tx = self.backend.begin().await?;
        let outcome = self.update_status_in(tx.as_ref(), order_id, new_status).await;
        let (change, low_stock) = finish_tx(tx, outcome).await?;

        counter!("orders.status_changes", 1, "status" => new_status.to_string());
        info!(
            order_id,
            old_status = %change.old_status,
            new_status = %change.new_status,
            "Order status updated"
        );

        if let Some(packaging) = &change.packaging {
            self.engine.announce_packaging(packaging, &low_stock).await;
        }
        if let Some(restoration) = &change.restoration {
            self.engine.announce_restoration(restoration).await;
        }
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: change.old_status,
                new_status: change.new_status,
            })
            .await;

        Ok(change)
    }

    async fn update_status_in(
        &self,
        tx: &dyn StockTx,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<(StatusChange, Vec<Material>), ServiceError> {
        let order = tx
            .find_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("order", order_id))?;

        if !order.status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "order {} cannot move from {} to {}",
                order_id, order.status, new_status
            )));
        }

        let mut change = StatusChange {
            order_id,
            old_status: order.status,
            new_status,
            packaging: None,
            restoration: None,
        };
        let mut low_stock = Vec::new();

        match new_status {
            OrderStatus::Processing => {
                let report = self.engine.deduct_packaging_in(tx, order_id).await?;
                let touched: Vec<_> = report
                    .rules
                    .iter()
                    .filter(|rule| rule.new_quantity.is_some())
                    .map(|rule| rule.material_id)
                    .collect();
                low_stock = self.engine.low_stock_in(tx, touched).await;
                change.packaging = Some(report);
            }
            OrderStatus::Cancelled => {
                change.restoration = Some(self.engine.restore_order_stock_in(tx, order_id).await?);
            }
            _ => {}
        }

        tx.set_status(order_id, new_status).await?;
        Ok((change, low_stock))
    }

    /// Deletes an order and its lines. Stock is restored first unless the
    /// order was already cancelled.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<OrderDeletion, ServiceError> {
        let tx = self.backend.begin().await?;
        let outcome = async {
            let order = tx
                .find_order(order_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("order", order_id))?;

            let restoration = if order.status == OrderStatus::Cancelled {
                info!(order_id, "Order already cancelled; stock was restored then");
                None
            } else {
                Some(self.engine.restore_order_stock_in(tx.as_ref(), order_id).await?)
            };

            tx.delete_order(order_id).await?;
            Ok::<_, ServiceError>(OrderDeletion {
                order_id,
                restoration,
            })
        }
        .await;

        let deletion = finish_tx(tx, outcome).await?;
        counter!("orders.deleted", 1);

        if let Some(restoration) = &deletion.restoration {
            self.engine.announce_restoration(restoration).await;
        }
        self.event_sender
            .send_or_log(Event::OrderDeleted(order_id))
            .await;

        Ok(deletion)
    }
}
