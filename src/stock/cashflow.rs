use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

use crate::errors::ServiceError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CashflowKind {
    Income,
    Expense,
}

/// Money in or out that is not an order: ads, rent, supplier refunds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CashflowEntry {
    pub id: i32,
    pub kind: CashflowKind,
    pub category: String,
    pub amount: Decimal,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[async_trait]
pub trait CashflowStore: Send + Sync {
    /// Entries with `from <= occurred_at <= to`, oldest first.
    async fn cashflow_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CashflowEntry>, ServiceError>;
}
