//! Domain model of the stock ledger: materials, BOM, packaging rules, the
//! deduction ledger and the store traits the engine runs against.
//!
//! Every store is reached through a [`StockTx`] obtained from an injected
//! [`StockBackend`], so one engine run can span all of them atomically.

pub mod bom;
pub mod cashflow;
pub mod ledger;
pub mod orders;
pub mod packaging;
pub mod report;
pub mod store;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ServiceError;

pub use bom::{select_components, BomComponent, BomEntry, BomIndex};
pub use cashflow::{CashflowEntry, CashflowKind, CashflowStore};
pub use ledger::{DeductionLedger, LedgerEntry};
pub use orders::{total_item_count, OrderLine, OrderRecord, OrderStatus, OrderStore};
pub use packaging::{AppliesTo, DeductionType, NewPackagingRule, PackagingRule, PackagingRuleSet};
pub use report::{
    AdjustmentStatus, OrderStockReport, PackagingReport, PackagingStatus, RuleEvaluation,
    RuleOutcome, StockAdjustment, StockTarget, TargetKind,
};
pub use store::{ItemStockStore, MaterialStore, StockBackend, StockTx};

pub type MaterialId = i32;
pub type ProductId = i32;
pub type VariantId = i32;
pub type OrderId = i32;
pub type RuleId = i32;

/// A raw or packaging material tracked in grams or units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub unit: String,
    pub stock_quantity: Decimal,
    pub unit_price: Decimal,
    pub low_stock_threshold: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    /// At or below the configured threshold. Materials without a threshold never alert.
    pub fn is_low_stock(&self) -> bool {
        self.low_stock_threshold
            .map(|threshold| self.stock_quantity <= threshold)
            .unwrap_or(false)
    }
}

/// A sellable item an order line points at. Variants are distinct from their
/// parent product for stock and BOM purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineRef {
    Product(ProductId),
    Variant(VariantId),
}

impl LineRef {
    pub fn id(&self) -> i32 {
        match self {
            LineRef::Product(id) | LineRef::Variant(id) => *id,
        }
    }
}

impl std::fmt::Display for LineRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineRef::Product(id) => write!(f, "product {}", id),
            LineRef::Variant(id) => write!(f, "variant {}", id),
        }
    }
}

/// Stock floor applied by every store: quantities never go below zero.
///
/// Restorations have no upper bound, so a sum past `Decimal::MAX` is rejected
/// rather than wrapped or panicked on.
pub fn floor_at_zero(old: Decimal, delta: Decimal) -> Result<Decimal, ServiceError> {
    old.checked_add(delta)
        .map(|sum| sum.max(Decimal::ZERO))
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "adjusting stock {} by {} overflows the quantity range",
                old, delta
            ))
        })
}
