use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::stock::{
    BomComponent, CashflowKind, LineRef, MaterialId, OrderStatus, StockBackend, StockTx,
};

/// Revenue, cost of goods sold and profit over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BusinessAnalysis {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Orders in range, cancelled orders excluded.
    pub order_count: usize,
    pub units_sold: i64,
    pub revenue: Decimal,
    /// BOM materials consumed by the sold items, at current unit prices.
    pub material_cost: Decimal,
    /// Packaging materials recorded in the deduction ledger.
    pub packaging_cost: Decimal,
    pub cogs: Decimal,
    pub gross_profit: Decimal,
    /// Percent of revenue, two decimals. `None` without revenue.
    pub gross_margin: Option<Decimal>,
    pub other_income: Decimal,
    pub expenses: Decimal,
    pub expenses_by_category: BTreeMap<String, Decimal>,
    pub net_profit: Decimal,
}

#[derive(Clone)]
pub struct BusinessAnalysisService {
    backend: Arc<dyn StockBackend>,
}

impl BusinessAnalysisService {
    pub fn new(backend: Arc<dyn StockBackend>) -> Self {
        Self { backend }
    }

    #[instrument(skip(self))]
    pub async fn analyze(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BusinessAnalysis, ServiceError> {
        if from > to {
            return Err(ServiceError::ValidationError(format!(
                "range start {} is after range end {}",
                from, to
            )));
        }

        let tx = self.backend.begin().await?;
        let result = analyze_in(tx.as_ref(), from, to).await;
        if let Err(e) = tx.rollback().await {
            warn!(error = %e, "failed to release analysis transaction");
        }
        result
    }
}

async fn analyze_in(
    tx: &dyn StockTx,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<BusinessAnalysis, ServiceError> {
    let prices: HashMap<MaterialId, Decimal> = tx
        .list_materials()
        .await?
        .into_iter()
        .map(|material| (material.id, material.unit_price))
        .collect();
    let price_of = |material_id: MaterialId| {
        prices.get(&material_id).copied().unwrap_or_else(|| {
            warn!(material_id, "material missing from price list; costed at zero");
            Decimal::ZERO
        })
    };

    let orders: Vec<_> = tx
        .orders_between(from, to)
        .await?
        .into_iter()
        .filter(|order| order.status != OrderStatus::Cancelled)
        .collect();

    let mut boms: HashMap<LineRef, Vec<BomComponent>> = HashMap::new();
    let mut revenue = Decimal::ZERO;
    let mut units_sold = 0i64;
    let mut material_cost = Decimal::ZERO;
    let mut packaging_cost = Decimal::ZERO;

    for order in &orders {
        revenue += order.total;

        for line in tx.lines_for(order.id).await? {
            units_sold += i64::from(line.quantity);
            let Some(item) = line.line_ref() else {
                continue;
            };

            if !boms.contains_key(&item) {
                boms.insert(item, tx.materials_for(item).await?);
            }
            for component in boms.get(&item).into_iter().flatten() {
                material_cost += component.quantity_per_unit
                    * Decimal::from(line.quantity)
                    * price_of(component.material_id);
            }
        }

        for entry in tx.entries_for(order.id).await? {
            packaging_cost += entry.quantity_deducted * price_of(entry.material_id);
        }
    }

    let mut other_income = Decimal::ZERO;
    let mut expenses = Decimal::ZERO;
    let mut expenses_by_category = BTreeMap::new();
    for entry in tx.cashflow_between(from, to).await? {
        match entry.kind {
            CashflowKind::Income => other_income += entry.amount,
            CashflowKind::Expense => {
                expenses += entry.amount;
                *expenses_by_category
                    .entry(entry.category)
                    .or_insert(Decimal::ZERO) += entry.amount;
            }
        }
    }

    let cogs = material_cost + packaging_cost;
    let gross_profit = revenue - cogs;
    let gross_margin = (revenue > Decimal::ZERO)
        .then(|| (gross_profit / revenue * Decimal::ONE_HUNDRED).round_dp(2));

    Ok(BusinessAnalysis {
        from,
        to,
        order_count: orders.len(),
        units_sold,
        revenue,
        material_cost,
        packaging_cost,
        cogs,
        gross_profit,
        gross_margin,
        other_income,
        expenses,
        expenses_by_category,
        net_profit: gross_profit + other_income - expenses,
    })
}
