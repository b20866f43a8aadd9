//! Packaging deduction, order stock consumption and restoration.
//!
//! Each public operation runs in one backend transaction. Every single
//! stock write (and every `(adjust, record)` pair) runs in its own
//! savepoint, so one failing write is rolled back and reported while the
//! rest of the order still applies.

use metrics::counter;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::finish_tx;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::stock::{
    total_item_count, AdjustmentStatus, LineRef, Material, MaterialId, OrderId, OrderLine,
    OrderStockReport, PackagingReport, PackagingRule, PackagingStatus, RuleEvaluation,
    RuleOutcome, StockAdjustment, StockBackend, StockTarget, StockTx, TargetKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Consume,
    Restore,
}

impl Direction {
    fn sign(self) -> i32 {
        match self {
            Direction::Consume => -1,
            Direction::Restore => 1,
        }
    }
}

#[derive(Clone)]
pub struct StockEngine {
    backend: Arc<dyn StockBackend>,
    event_sender: Arc<EventSender>,
}

impl StockEngine {
    pub fn new(backend: Arc<dyn StockBackend>, event_sender: Arc<EventSender>) -> Self {
        Self {
            backend,
            event_sender,
        }
    }

    /// Draws packaging materials for an order once. Later calls for the same
    /// order return `already_applied` while ledger entries exist.
    #[instrument(skip(self))]
    pub async fn deduct_packaging(&self, order_id: OrderId) -> Result<PackagingReport, ServiceError> {
        let tx = self.backend.begin().await?;
        let outcome = async {
            let report = self.deduct_packaging_in(tx.as_ref(), order_id).await?;
            let low_stock = self
                .low_stock_in(tx.as_ref(), packaging_materials(&report))
                .await;
            Ok::<_, ServiceError>((report, low_stock))
        }
        .await;

        let (report, low_stock) = finish_tx(tx, outcome).await?;
        self.announce_packaging(&report, &low_stock).await;
        Ok(report)
    }

    /// Returns item, BOM and packaging stock taken by an order and clears
    /// its ledger. Call before the order is cancelled or deleted.
    #[instrument(skip(self))]
    pub async fn restore_order_stock(
        &self,
        order_id: OrderId,
    ) -> Result<OrderStockReport, ServiceError> {
        let tx = self.backend.begin().await?;
        let outcome = self.restore_order_stock_in(tx.as_ref(), order_id).await;
        let report = finish_tx(tx, outcome).await?;
        self.announce_restoration(&report).await;
        Ok(report)
    }

    /// Restores only the ledger-recorded packaging materials and clears the ledger.
    #[instrument(skip(self))]
    pub async fn restore_packaging_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<OrderStockReport, ServiceError> {
        let tx = self.backend.begin().await?;
        let outcome = async {
            let mut report = OrderStockReport::new(order_id);
            self.restore_packaging_into(tx.as_ref(), order_id, &mut report)
                .await?;
            Ok::<_, ServiceError>(report)
        }
        .await;
        let report = finish_tx(tx, outcome).await?;
        self.announce_restoration(&report).await;
        Ok(report)
    }

    /// Purchase-time consumption: item stock and BOM materials go down by the
    /// line quantities, floored at zero.
    #[instrument(skip(self))]
    pub async fn consume_order_stock(
        &self,
        order_id: OrderId,
    ) -> Result<OrderStockReport, ServiceError> {
        let tx = self.backend.begin().await?;
        let outcome = async {
            let report = self.consume_order_stock_in(tx.as_ref(), order_id).await?;
            let low_stock = self
                .low_stock_in(tx.as_ref(), consumed_materials(&report))
                .await;
            Ok::<_, ServiceError>((report, low_stock))
        }
        .await;

        let (report, low_stock) = finish_tx(tx, outcome).await?;
        counter!("stock.orders.consumed", 1);
        self.event_sender
            .send_or_log(Event::OrderStockConsumed {
                order_id,
                complete: report.is_complete(),
            })
            .await;
        self.announce_low_stock(&low_stock).await;
        Ok(report)
    }

    pub(crate) async fn deduct_packaging_in(
        &self,
        tx: &dyn StockTx,
        order_id: OrderId,
    ) -> Result<PackagingReport, ServiceError> {
        if tx.has_deductions_for(order_id).await? {
            info!(order_id, "Packaging already deducted");
            return Ok(PackagingReport::skipped(
                order_id,
                PackagingStatus::AlreadyApplied,
            ));
        }

        let rules = tx.active_rules().await?;
        if rules.is_empty() {
            debug!(order_id, "No active packaging rules");
            return Ok(PackagingReport::skipped(
                order_id,
                PackagingStatus::NoActiveRules,
            ));
        }

        let lines = tx.lines_for(order_id).await?;
        if lines.is_empty() {
            debug!(order_id, "Order has no lines; nothing to pack");
            return Ok(PackagingReport::skipped(order_id, PackagingStatus::NoLines));
        }

        let item_count = total_item_count(&lines);
        let mut evaluations = Vec::with_capacity(rules.len());

        for rule in &rules {
            if !rule.applies_to_order(&lines) {
                evaluations.push(skipped_rule(rule, Decimal::ZERO, RuleOutcome::NotApplicable));
                continue;
            }

            let Some(quantity) = rule.quantity_for(item_count) else {
                warn!(order_id, rule_id = rule.id, item_count, "Packaging quantity overflowed");
                evaluations.push(RuleEvaluation {
                    error: Some(format!(
                        "rule quantity for {} items overflows the quantity range",
                        item_count
                    )),
                    ..skipped_rule(rule, Decimal::ZERO, RuleOutcome::WriteFailed)
                });
                continue;
            };
            if quantity <= Decimal::ZERO {
                evaluations.push(skipped_rule(rule, quantity, RuleOutcome::NonPositiveQuantity));
                continue;
            }

            evaluations.push(self.apply_rule(tx, order_id, rule, quantity).await);
        }

        let report = PackagingReport {
            order_id,
            status: PackagingStatus::Applied,
            rules: evaluations,
        };
        info!(
            order_id,
            deducted = report.deducted_count(),
            evaluated = report.rules.len(),
            "Packaging deducted"
        );
        Ok(report)
    }

    pub(crate) async fn restore_order_stock_in(
        &self,
        tx: &dyn StockTx,
        order_id: OrderId,
    ) -> Result<OrderStockReport, ServiceError> {
        let mut report = OrderStockReport::new(order_id);

        let lines = tx.lines_for(order_id).await?;
        if lines.is_empty() {
            info!(order_id, "Order has no lines; nothing to restore");
            return Ok(report);
        }

        self.walk_lines(tx, &lines, Direction::Restore, &mut report)
            .await?;
        self.restore_packaging_into(tx, order_id, &mut report)
            .await?;

        counter!("stock.orders.restored", 1);
        info!(
            order_id,
            complete = report.is_complete(),
            ledger_entries_cleared = report.ledger_entries_cleared,
            "Order stock restored"
        );
        Ok(report)
    }

    pub(crate) async fn consume_order_stock_in(
        &self,
        tx: &dyn StockTx,
        order_id: OrderId,
    ) -> Result<OrderStockReport, ServiceError> {
        let mut report = OrderStockReport::new(order_id);

        let lines = tx.lines_for(order_id).await?;
        if lines.is_empty() {
            info!(order_id, "Order has no lines; nothing to consume");
            return Ok(report);
        }

        self.walk_lines(tx, &lines, Direction::Consume, &mut report)
            .await?;
        Ok(report)
    }

    /// Item stock then BOM materials, line by line.
    async fn walk_lines(
        &self,
        tx: &dyn StockTx,
        lines: &[OrderLine],
        direction: Direction,
        report: &mut OrderStockReport,
    ) -> Result<(), ServiceError> {
        for line in lines {
            let Some(item) = line.line_ref() else {
                warn!(
                    order_id = line.order_id,
                    "Order line names neither a product nor a variant; skipped"
                );
                report.items.push(StockAdjustment::failed(
                    StockTarget::unreferenced(),
                    Decimal::from(line.quantity),
                    AdjustmentStatus::NotFound,
                    "order line has no product or variant",
                ));
                continue;
            };

            let item_delta = direction.sign() * line.quantity;
            report
                .items
                .push(adjust_item_isolated(tx, item, item_delta).await);

            for component in tx.materials_for(item).await? {
                let delta = component
                    .quantity_per_unit
                    .checked_mul(Decimal::from(line.quantity))
                    .map(|amount| amount * Decimal::from(direction.sign()));
                let adjustment = match delta {
                    Some(delta) => adjust_material_isolated(tx, component.material_id, delta).await,
                    None => StockAdjustment::failed(
                        StockTarget::material(component.material_id),
                        Decimal::ZERO,
                        AdjustmentStatus::WriteFailed,
                        format!(
                            "{} x {} overflows the quantity range",
                            component.quantity_per_unit, line.quantity
                        ),
                    ),
                };
                report.materials.push(adjustment);
            }
        }

        let failures = report.failures().count();
        if failures > 0 {
            counter!("stock.write_failures", failures as u64);
        }
        Ok(())
    }

    async fn restore_packaging_into(
        &self,
        tx: &dyn StockTx,
        order_id: OrderId,
        report: &mut OrderStockReport,
    ) -> Result<(), ServiceError> {
        let entries = tx.entries_for(order_id).await?;
        if entries.is_empty() {
            return Ok(());
        }

        for entry in &entries {
            report.packaging.push(
                adjust_material_isolated(tx, entry.material_id, entry.quantity_deducted).await,
            );
        }

        report.ledger_entries_cleared = tx.clear(order_id).await?;
        debug!(
            order_id,
            cleared = report.ledger_entries_cleared,
            "Deduction ledger cleared"
        );
        Ok(())
    }

    async fn apply_rule(
        &self,
        tx: &dyn StockTx,
        order_id: OrderId,
        rule: &PackagingRule,
        quantity: Decimal,
    ) -> RuleEvaluation {
        let result = match tx.savepoint().await {
            Ok(sp) => {
                let written = deduct_and_record(sp.as_ref(), order_id, rule.material_id, quantity)
                    .await;
                finish_tx(sp, written).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(new_quantity) => {
                counter!("stock.packaging.deducted", 1);
                RuleEvaluation {
                    rule_id: rule.id,
                    material_id: rule.material_id,
                    quantity,
                    outcome: RuleOutcome::Deducted,
                    new_quantity: Some(new_quantity),
                    error: None,
                }
            }
            Err(e) => {
                error!(
                    order_id,
                    rule_id = rule.id,
                    material_id = rule.material_id,
                    error = %e,
                    "Packaging rule failed"
                );
                counter!("stock.packaging.rule_failures", 1);
                RuleEvaluation {
                    rule_id: rule.id,
                    material_id: rule.material_id,
                    quantity,
                    outcome: if e.is_not_found() {
                        RuleOutcome::NotFound
                    } else {
                        RuleOutcome::WriteFailed
                    },
                    new_quantity: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Materials among `ids` at or below their threshold. Lookup failures
    /// are logged and skipped.
    pub(crate) async fn low_stock_in(
        &self,
        tx: &dyn StockTx,
        ids: impl IntoIterator<Item = MaterialId>,
    ) -> Vec<Material> {
        let mut low = Vec::new();
        for id in ids.into_iter().collect::<BTreeSet<_>>() {
            match tx.find_material(id).await {
                Ok(Some(material)) if material.is_low_stock() => low.push(material),
                Ok(_) => {}
                Err(e) => warn!(material_id = id, error = %e, "Low-stock check failed"),
            }
        }
        low
    }

    pub(crate) async fn announce_packaging(&self, report: &PackagingReport, low_stock: &[Material]) {
        if report.status == PackagingStatus::Applied {
            self.event_sender
                .send_or_log(Event::PackagingDeducted {
                    order_id: report.order_id,
                    rules_applied: report.deducted_count(),
                })
                .await;
        }
        self.announce_low_stock(low_stock).await;
    }

    pub(crate) async fn announce_restoration(&self, report: &OrderStockReport) {
        self.event_sender
            .send_or_log(Event::OrderStockRestored {
                order_id: report.order_id,
                complete: report.is_complete(),
                ledger_entries_cleared: report.ledger_entries_cleared,
            })
            .await;
    }

    pub(crate) async fn announce_low_stock(&self, materials: &[Material]) {
        for material in materials {
            let Some(threshold) = material.low_stock_threshold else {
                continue;
            };
            warn!(
                material_id = material.id,
                stock_quantity = %material.stock_quantity,
                %threshold,
                "Material at or below low-stock threshold"
            );
            self.event_sender
                .send_or_log(Event::MaterialLowStock {
                    material_id: material.id,
                    name: material.name.clone(),
                    stock_quantity: material.stock_quantity,
                    threshold,
                    detected_at: chrono::Utc::now(),
                })
                .await;
        }
    }
}

async fn deduct_and_record(
    sp: &dyn StockTx,
    order_id: OrderId,
    material_id: MaterialId,
    quantity: Decimal,
) -> Result<Decimal, ServiceError> {
    let new_quantity = sp.adjust_stock(material_id, -quantity).await?;
    sp.record(order_id, material_id, quantity).await?;
    Ok(new_quantity)
}

async fn adjust_material_isolated(
    tx: &dyn StockTx,
    material_id: MaterialId,
    delta: Decimal,
) -> StockAdjustment {
    let result = match tx.savepoint().await {
        Ok(sp) => {
            let written = sp.adjust_stock(material_id, delta).await;
            finish_tx(sp, written).await
        }
        Err(e) => Err(e),
    };
    to_adjustment(StockTarget::material(material_id), delta, result)
}

async fn adjust_item_isolated(tx: &dyn StockTx, item: LineRef, delta: i32) -> StockAdjustment {
    let result = match tx.savepoint().await {
        Ok(sp) => {
            let written = sp.adjust_item_stock(item, delta).await;
            finish_tx(sp, written).await
        }
        Err(e) => Err(e),
    };
    to_adjustment(
        StockTarget::from(item),
        Decimal::from(delta),
        result.map(Decimal::from),
    )
}

fn to_adjustment(
    target: StockTarget,
    delta: Decimal,
    result: Result<Decimal, ServiceError>,
) -> StockAdjustment {
    match result {
        Ok(new_quantity) => StockAdjustment::ok(target, delta, new_quantity),
        Err(e) => {
            error!(kind = %target.kind, id = target.id, %delta, error = %e, "Stock write failed");
            let outcome = if e.is_not_found() {
                AdjustmentStatus::NotFound
            } else {
                AdjustmentStatus::WriteFailed
            };
            StockAdjustment::failed(target, delta, outcome, e.to_string())
        }
    }
}

fn skipped_rule(rule: &PackagingRule, quantity: Decimal, outcome: RuleOutcome) -> RuleEvaluation {
    RuleEvaluation {
        rule_id: rule.id,
        material_id: rule.material_id,
        quantity,
        outcome,
        new_quantity: None,
        error: None,
    }
}

fn packaging_materials(report: &PackagingReport) -> Vec<MaterialId> {
    report
        .rules
        .iter()
        .filter(|rule| rule.outcome == RuleOutcome::Deducted)
        .map(|rule| rule.material_id)
        .collect()
}

fn consumed_materials(report: &OrderStockReport) -> Vec<MaterialId> {
    report
        .materials
        .iter()
        .filter(|adjustment| adjustment.is_ok() && adjustment.target.kind == TargetKind::Material)
        .map(|adjustment| adjustment.target.id)
        .collect()
}
