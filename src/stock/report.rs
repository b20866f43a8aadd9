//! Per-item outcomes of an engine run. A run that commits always returns a
//! report; failures of individual writes are recorded here instead of
//! aborting the run.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::Display;
use utoipa::ToSchema;

use super::{LineRef, MaterialId, OrderId, RuleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetKind {
    Material,
    Product,
    Variant,
    /// Order line naming neither a product nor a variant.
    Unreferenced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockTarget {
    pub kind: TargetKind,
    pub id: i32,
}

impl StockTarget {
    pub fn material(id: MaterialId) -> Self {
        Self {
            kind: TargetKind::Material,
            id,
        }
    }

    pub fn unreferenced() -> Self {
        Self {
            kind: TargetKind::Unreferenced,
            id: 0,
        }
    }
}

impl From<LineRef> for StockTarget {
    fn from(item: LineRef) -> Self {
        match item {
            LineRef::Product(id) => Self {
                kind: TargetKind::Product,
                id,
            },
            LineRef::Variant(id) => Self {
                kind: TargetKind::Variant,
                id,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdjustmentStatus {
    Ok,
    NotFound,
    WriteFailed,
}

/// One stock write attempted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StockAdjustment {
    pub target: StockTarget,
    pub delta: Decimal,
    pub outcome: AdjustmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_quantity: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StockAdjustment {
    pub fn ok(target: StockTarget, delta: Decimal, new_quantity: Decimal) -> Self {
        Self {
            target,
            delta,
            outcome: AdjustmentStatus::Ok,
            new_quantity: Some(new_quantity),
            error: None,
        }
    }

    pub fn failed(
        target: StockTarget,
        delta: Decimal,
        outcome: AdjustmentStatus,
        error: impl Into<String>,
    ) -> Self {
        Self {
            target,
            delta,
            outcome,
            new_quantity: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == AdjustmentStatus::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RuleOutcome {
    Deducted,
    NotApplicable,
    NonPositiveQuantity,
    NotFound,
    WriteFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RuleEvaluation {
    pub rule_id: RuleId,
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub outcome: RuleOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_quantity: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PackagingStatus {
    Applied,
    AlreadyApplied,
    NoActiveRules,
    NoLines,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PackagingReport {
    pub order_id: OrderId,
    pub status: PackagingStatus,
    pub rules: Vec<RuleEvaluation>,
}

impl PackagingReport {
    pub fn skipped(order_id: OrderId, status: PackagingStatus) -> Self {
        Self {
            order_id,
            status,
            rules: Vec::new(),
        }
    }

    pub fn deducted_count(&self) -> usize {
        self.rules
            .iter()
            .filter(|rule| rule.outcome == RuleOutcome::Deducted)
            .count()
    }

    pub fn is_complete(&self) -> bool {
        !self
            .rules
            .iter()
            .any(|rule| matches!(rule.outcome, RuleOutcome::NotFound | RuleOutcome::WriteFailed))
    }
}

/// Result of consuming or restoring all stock for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderStockReport {
    pub order_id: OrderId,
    /// Product and variant stock writes, one per line.
    pub items: Vec<StockAdjustment>,
    /// BOM material writes, one per (line, component).
    pub materials: Vec<StockAdjustment>,
    /// Packaging material writes, one per ledger entry (restore only).
    pub packaging: Vec<StockAdjustment>,
    pub ledger_entries_cleared: u64,
}

impl OrderStockReport {
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            items: Vec::new(),
            materials: Vec::new(),
            packaging: Vec::new(),
            ledger_entries_cleared: 0,
        }
    }

    /// Every attempted write succeeded.
    pub fn is_complete(&self) -> bool {
        self.items
            .iter()
            .chain(&self.materials)
            .chain(&self.packaging)
            .all(StockAdjustment::is_ok)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StockAdjustment> {
        self.items
            .iter()
            .chain(&self.materials)
            .chain(&self.packaging)
            .filter(|adjustment| !adjustment.is_ok())
    }
}
