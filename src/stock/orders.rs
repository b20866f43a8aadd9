use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

use super::{LineRef, OrderId, ProductId, VariantId};
use crate::errors::ServiceError;

/// Order lifecycle status, stored as its snake_case name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Delivered)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
                | (Shipped, Cancelled)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderRecord {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

/// One order line. Normally exactly one of `product_id` / `variant_id` is set;
/// when both are, the variant wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderLine {
    pub fn line_ref(&self) -> Option<LineRef> {
        match (self.variant_id, self.product_id) {
            (Some(variant_id), _) => Some(LineRef::Variant(variant_id)),
            (None, Some(product_id)) => Some(LineRef::Product(product_id)),
            (None, None) => None,
        }
    }
}

/// Sum of line quantities, used to pick single vs multiple packaging.
pub fn total_item_count(lines: &[OrderLine]) -> i64 {
    lines.iter().map(|line| i64::from(line.quantity)).sum()
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>, ServiceError>;

    /// Lines of the order. An unknown order has no lines.
    async fn lines_for(&self, order_id: OrderId) -> Result<Vec<OrderLine>, ServiceError>;

    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> Result<(), ServiceError>;

    /// Removes the order and its lines.
    async fn delete_order(&self, order_id: OrderId) -> Result<(), ServiceError>;

    /// Orders created in `[from, to]`, any status.
    async fn orders_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OrderRecord>, ServiceError>;
}
