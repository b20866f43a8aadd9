use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{MaterialId, OrderId};
use crate::errors::ServiceError;

/// Packaging material drawn for an order. Existence of any entry for an
/// order is the idempotency gate for packaging deduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntry {
    pub id: i32,
    pub order_id: OrderId,
    pub material_id: MaterialId,
    pub quantity_deducted: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Append-only deduction ledger.
#[async_trait]
pub trait DeductionLedger: Send + Sync {
    async fn has_deductions_for(&self, order_id: OrderId) -> Result<bool, ServiceError>;

    /// Appends one entry; existing entries are never updated.
    async fn record(
        &self,
        order_id: OrderId,
        material_id: MaterialId,
        quantity: Decimal,
    ) -> Result<LedgerEntry, ServiceError>;

    async fn entries_for(&self, order_id: OrderId) -> Result<Vec<LedgerEntry>, ServiceError>;

    /// Deletes every entry for the order and returns how many were removed.
    async fn clear(&self, order_id: OrderId) -> Result<u64, ServiceError>;
}
