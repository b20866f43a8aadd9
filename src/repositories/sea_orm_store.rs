use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction,
    EntityTrait, NotSet, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::entities::{
    bom_entry, cashflow_transaction, material, order, order_item, packaging_deduction,
    packaging_rule, product, product_variant,
};
use crate::errors::ServiceError;
use crate::stock::{
    floor_at_zero, BomComponent, BomIndex, CashflowEntry, CashflowKind, CashflowStore,
    DeductionLedger, ItemStockStore, LedgerEntry, LineRef, Material, MaterialId, MaterialStore,
    NewPackagingRule, OrderId, OrderLine, OrderRecord, OrderStatus, OrderStore, PackagingRule,
    PackagingRuleSet, RuleId, StockBackend, StockTx,
};

/// SQL backend. Each [`StockBackend::begin`] opens a database transaction;
/// savepoints map to nested SeaORM transactions.
#[derive(Debug, Clone)]
pub struct SeaOrmBackend {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmBackend {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StockBackend for SeaOrmBackend {
    async fn begin(&self) -> Result<Box<dyn StockTx>, ServiceError> {
        let txn = self.db.begin().await?;
        Ok(Box::new(SeaOrmTx { txn }))
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        self.db.ping().await.map_err(ServiceError::DatabaseError)
    }
}

pub struct SeaOrmTx {
    txn: DatabaseTransaction,
}

fn parse_column<T>(column: &str, value: &str) -> Result<T, ServiceError>
where
    T: std::str::FromStr,
{
    value.parse::<T>().map_err(|_| {
        ServiceError::InternalError(format!("unexpected {} value '{}'", column, value))
    })
}

impl From<material::Model> for Material {
    fn from(model: material::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            unit: model.unit,
            stock_quantity: model.stock_quantity,
            unit_price: model.unit_price,
            low_stock_threshold: model.low_stock_threshold,
            updated_at: model.updated_at,
        }
    }
}

impl From<order_item::Model> for OrderLine {
    fn from(model: order_item::Model) -> Self {
        Self {
            order_id: model.order_id,
            product_id: model.product_id,
            variant_id: model.variant_id,
            quantity: model.quantity,
            unit_price: model.unit_price,
        }
    }
}

impl From<packaging_deduction::Model> for LedgerEntry {
    fn from(model: packaging_deduction::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            material_id: model.material_id,
            quantity_deducted: model.quantity_deducted,
            created_at: model.created_at,
        }
    }
}

impl TryFrom<packaging_rule::Model> for PackagingRule {
    type Error = ServiceError;

    fn try_from(model: packaging_rule::Model) -> Result<Self, Self::Error> {
        let target_product_ids: Vec<i32> = serde_json::from_value(model.target_product_ids)
            .map_err(|e| {
                ServiceError::InternalError(format!(
                    "packaging rule {} has malformed target_product_ids: {}",
                    model.id, e
                ))
            })?;

        Ok(Self {
            id: model.id,
            name: model.name,
            is_active: model.is_active,
            applies_to: parse_column("applies_to", &model.applies_to)?,
            target_product_ids,
            material_id: model.material_id,
            deduction_type: parse_column("deduction_type", &model.deduction_type)?,
            quantity_single: model.quantity_single,
            quantity_multiple: model.quantity_multiple,
        })
    }
}

impl TryFrom<order::Model> for OrderRecord {
    type Error = ServiceError;

    fn try_from(model: order::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            status: parse_column("status", &model.status)?,
            order_number: model.order_number,
            total: model.total,
            created_at: model.created_at,
        })
    }
}

impl TryFrom<cashflow_transaction::Model> for CashflowEntry {
    type Error = ServiceError;

    fn try_from(model: cashflow_transaction::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            kind: parse_column::<CashflowKind>("kind", &model.kind)?,
            category: model.category,
            amount: model.amount,
            note: model.note,
            occurred_at: model.occurred_at,
        })
    }
}

/// BOM rows selected for an item, matching `stock::select_components`.
fn bom_condition(item: LineRef) -> Condition {
    match item {
        LineRef::Variant(id) => Condition::all().add(bom_entry::Column::VariantId.eq(id)),
        LineRef::Product(id) => Condition::all()
            .add(bom_entry::Column::ProductId.eq(id))
            .add(bom_entry::Column::VariantId.is_null()),
    }
}

#[async_trait]
impl MaterialStore for SeaOrmTx {
    async fn get_stock(&self, material_id: MaterialId) -> Result<Decimal, ServiceError> {
        material::Entity::find_by_id(material_id)
            .one(&self.txn)
            .await?
            .map(|m| m.stock_quantity)
            .ok_or_else(|| ServiceError::not_found("material", material_id))
    }

    #[instrument(skip(self))]
    async fn adjust_stock(
        &self,
        material_id: MaterialId,
        delta: Decimal,
    ) -> Result<Decimal, ServiceError> {
        let current = material::Entity::find_by_id(material_id)
            .one(&self.txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("material", material_id))?;

        let new_quantity = floor_at_zero(current.stock_quantity, delta)?;
        let mut active: material::ActiveModel = current.into();
        active.stock_quantity = Set(new_quantity);
        let updated = active.update(&self.txn).await?;

        debug!(material_id, %delta, new_quantity = %updated.stock_quantity, "material stock adjusted");
        Ok(updated.stock_quantity)
    }

    async fn find_material(
        &self,
        material_id: MaterialId,
    ) -> Result<Option<Material>, ServiceError> {
        Ok(material::Entity::find_by_id(material_id)
            .one(&self.txn)
            .await?
            .map(Material::from))
    }

    async fn list_materials(&self) -> Result<Vec<Material>, ServiceError> {
        Ok(material::Entity::find()
            .order_by_asc(material::Column::Name)
            .all(&self.txn)
            .await?
            .into_iter()
            .map(Material::from)
            .collect())
    }
}

#[async_trait]
impl ItemStockStore for SeaOrmTx {
    #[instrument(skip(self))]
    async fn adjust_item_stock(&self, item: LineRef, delta: i32) -> Result<i32, ServiceError> {
        let now = Utc::now();
        match item {
            LineRef::Product(id) => {
                let current = product::Entity::find_by_id(id)
                    .one(&self.txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("product", id))?;
                let new_quantity = current.stock_quantity.saturating_add(delta).max(0);
                let mut active: product::ActiveModel = current.into();
                active.stock_quantity = Set(new_quantity);
                active.updated_at = Set(now);
                Ok(active.update(&self.txn).await?.stock_quantity)
            }
            LineRef::Variant(id) => {
                let current = product_variant::Entity::find_by_id(id)
                    .one(&self.txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("variant", id))?;
                let new_quantity = current.stock_quantity.saturating_add(delta).max(0);
                let mut active: product_variant::ActiveModel = current.into();
                active.stock_quantity = Set(new_quantity);
                active.updated_at = Set(now);
                Ok(active.update(&self.txn).await?.stock_quantity)
            }
        }
    }
}

#[async_trait]
impl BomIndex for SeaOrmTx {
    async fn materials_for(&self, item: LineRef) -> Result<Vec<BomComponent>, ServiceError> {
        Ok(bom_entry::Entity::find()
            .filter(bom_condition(item))
            .order_by_asc(bom_entry::Column::Id)
            .all(&self.txn)
            .await?
            .into_iter()
            .map(|row| BomComponent {
                material_id: row.material_id,
                quantity_per_unit: row.quantity_per_unit,
            })
            .collect())
    }
}

#[async_trait]
impl PackagingRuleSet for SeaOrmTx {
    async fn active_rules(&self) -> Result<Vec<PackagingRule>, ServiceError> {
        packaging_rule::Entity::find()
            .filter(packaging_rule::Column::IsActive.eq(true))
            .order_by_asc(packaging_rule::Column::Id)
            .all(&self.txn)
            .await?
            .into_iter()
            .map(PackagingRule::try_from)
            .collect()
    }

    async fn all_rules(&self) -> Result<Vec<PackagingRule>, ServiceError> {
        packaging_rule::Entity::find()
            .order_by_asc(packaging_rule::Column::Id)
            .all(&self.txn)
            .await?
            .into_iter()
            .map(PackagingRule::try_from)
            .collect()
    }

    async fn create_rule(&self, rule: NewPackagingRule) -> Result<PackagingRule, ServiceError> {
        let model = packaging_rule::ActiveModel {
            id: NotSet,
            name: Set(rule.name),
            is_active: Set(rule.is_active),
            applies_to: Set(rule.applies_to.to_string()),
            target_product_ids: Set(serde_json::json!(rule.target_product_ids)),
            material_id: Set(rule.material_id),
            deduction_type: Set(rule.deduction_type.to_string()),
            quantity_single: Set(rule.quantity_single),
            quantity_multiple: Set(rule.quantity_multiple),
            created_at: Set(Utc::now()),
        }
        .insert(&self.txn)
        .await?;

        PackagingRule::try_from(model)
    }

    async fn set_rule_active(
        &self,
        rule_id: RuleId,
        is_active: bool,
    ) -> Result<PackagingRule, ServiceError> {
        let current = packaging_rule::Entity::find_by_id(rule_id)
            .one(&self.txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("packaging rule", rule_id))?;

        let mut active: packaging_rule::ActiveModel = current.into();
        active.is_active = Set(is_active);
        PackagingRule::try_from(active.update(&self.txn).await?)
    }
}

#[async_trait]
impl DeductionLedger for SeaOrmTx {
    async fn has_deductions_for(&self, order_id: OrderId) -> Result<bool, ServiceError> {
        Ok(packaging_deduction::Entity::find()
            .filter(packaging_deduction::Column::OrderId.eq(order_id))
            .one(&self.txn)
            .await?
            .is_some())
    }

    async fn record(
        &self,
        order_id: OrderId,
        material_id: MaterialId,
        quantity: Decimal,
    ) -> Result<LedgerEntry, ServiceError> {
        let entry = packaging_deduction::ActiveModel {
            id: NotSet,
            order_id: Set(order_id),
            material_id: Set(material_id),
            quantity_deducted: Set(quantity),
            created_at: Set(Utc::now()),
        }
        .insert(&self.txn)
        .await?;

        Ok(entry.into())
    }

    async fn entries_for(&self, order_id: OrderId) -> Result<Vec<LedgerEntry>, ServiceError> {
        Ok(packaging_deduction::Entity::find()
            .filter(packaging_deduction::Column::OrderId.eq(order_id))
            .order_by_asc(packaging_deduction::Column::Id)
            .all(&self.txn)
            .await?
            .into_iter()
            .map(LedgerEntry::from)
            .collect())
    }

    async fn clear(&self, order_id: OrderId) -> Result<u64, ServiceError> {
        let result = packaging_deduction::Entity::delete_many()
            .filter(packaging_deduction::Column::OrderId.eq(order_id))
            .exec(&self.txn)
            .await?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl OrderStore for SeaOrmTx {
    async fn find_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>, ServiceError> {
        order::Entity::find_by_id(order_id)
            .one(&self.txn)
            .await?
            .map(OrderRecord::try_from)
            .transpose()
    }

    async fn lines_for(&self, order_id: OrderId) -> Result<Vec<OrderLine>, ServiceError> {
        Ok(order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Id)
            .all(&self.txn)
            .await?
            .into_iter()
            .map(OrderLine::from)
            .collect())
    }

    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> Result<(), ServiceError> {
        let current = order::Entity::find_by_id(order_id)
            .one(&self.txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("order", order_id))?;

        let mut active: order::ActiveModel = current.into();
        active.status = Set(status.to_string());
        active.updated_at = Set(Utc::now());
        active.update(&self.txn).await?;
        Ok(())
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<(), ServiceError> {
        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&self.txn)
            .await?;

        let result = order::Entity::delete_by_id(order_id)
            .exec(&self.txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("order", order_id));
        }
        Ok(())
    }

    async fn orders_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OrderRecord>, ServiceError> {
        order::Entity::find()
            .filter(order::Column::CreatedAt.between(from, to))
            .order_by_asc(order::Column::CreatedAt)
            .all(&self.txn)
            .await?
            .into_iter()
            .map(OrderRecord::try_from)
            .collect()
    }
}

#[async_trait]
impl CashflowStore for SeaOrmTx {
    async fn cashflow_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CashflowEntry>, ServiceError> {
        cashflow_transaction::Entity::find()
            .filter(cashflow_transaction::Column::OccurredAt.between(from, to))
            .order_by_asc(cashflow_transaction::Column::OccurredAt)
            .all(&self.txn)
            .await?
            .into_iter()
            .map(CashflowEntry::try_from)
            .collect()
    }
}

#[async_trait]
impl StockTx for SeaOrmTx {
    async fn savepoint(&self) -> Result<Box<dyn StockTx>, ServiceError> {
        let txn = self.txn.begin().await?;
        Ok(Box::new(SeaOrmTx { txn }))
    }

    async fn commit(self: Box<Self>) -> Result<(), ServiceError> {
        self.txn.commit().await.map_err(ServiceError::DatabaseError)
    }

    async fn rollback(self: Box<Self>) -> Result<(), ServiceError> {
        self.txn.rollback().await.map_err(ServiceError::DatabaseError)
    }
}
