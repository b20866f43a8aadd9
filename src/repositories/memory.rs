use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::errors::ServiceError;
use crate::stock::{
    floor_at_zero, select_components, BomComponent, BomEntry, BomIndex, CashflowEntry,
    CashflowStore, DeductionLedger, ItemStockStore, LedgerEntry, LineRef, Material, MaterialId,
    MaterialStore, NewPackagingRule, OrderId, OrderLine, OrderRecord, OrderStatus, OrderStore,
    PackagingRule, PackagingRuleSet, RuleId, StockBackend, StockTx,
};

/// Whole dataset of the in-memory backend. Public so callers can seed and
/// inspect it.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub materials: BTreeMap<MaterialId, Material>,
    pub product_stock: BTreeMap<i32, i32>,
    pub variant_stock: BTreeMap<i32, i32>,
    pub bom: Vec<BomEntry>,
    pub rules: BTreeMap<RuleId, PackagingRule>,
    pub ledger: Vec<LedgerEntry>,
    pub orders: BTreeMap<OrderId, OrderRecord>,
    pub lines: Vec<OrderLine>,
    pub cashflow: Vec<CashflowEntry>,
    /// Materials whose stock writes are rejected, to exercise failure paths.
    pub failing_materials: HashSet<MaterialId>,
    next_id: i32,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_material(
        &mut self,
        name: &str,
        unit: &str,
        stock_quantity: Decimal,
        unit_price: Decimal,
        low_stock_threshold: Option<Decimal>,
    ) -> MaterialId {
        let id = self.next_id();
        self.materials.insert(
            id,
            Material {
                id,
                name: name.to_string(),
                unit: unit.to_string(),
                stock_quantity,
                unit_price,
                low_stock_threshold,
                updated_at: Utc::now(),
            },
        );
        id
    }

    pub fn add_product(&mut self, stock: i32) -> i32 {
        let id = self.next_id();
        self.product_stock.insert(id, stock);
        id
    }

    pub fn add_variant(&mut self, stock: i32) -> i32 {
        let id = self.next_id();
        self.variant_stock.insert(id, stock);
        id
    }

    pub fn add_bom(&mut self, entry: BomEntry) {
        self.bom.push(entry);
    }

    pub fn add_rule(&mut self, rule: NewPackagingRule) -> RuleId {
        let id = self.next_id();
        self.rules.insert(id, new_rule(id, rule));
        id
    }

    pub fn add_order(
        &mut self,
        order_number: &str,
        status: OrderStatus,
        total: Decimal,
        created_at: DateTime<Utc>,
    ) -> OrderId {
        let id = self.next_id();
        self.orders.insert(
            id,
            OrderRecord {
                id,
                order_number: order_number.to_string(),
                status,
                total,
                created_at,
            },
        );
        id
    }

    pub fn add_line(&mut self, line: OrderLine) {
        self.lines.push(line);
    }

    pub fn add_cashflow(&mut self, mut entry: CashflowEntry) -> i32 {
        entry.id = self.next_id();
        let id = entry.id;
        self.cashflow.push(entry);
        id
    }

    pub fn material_stock(&self, material_id: MaterialId) -> Option<Decimal> {
        self.materials.get(&material_id).map(|m| m.stock_quantity)
    }

    pub fn ledger_for(&self, order_id: OrderId) -> Vec<&LedgerEntry> {
        self.ledger.iter().filter(|e| e.order_id == order_id).collect()
    }
}

fn new_rule(id: RuleId, rule: NewPackagingRule) -> PackagingRule {
    PackagingRule {
        id,
        name: rule.name,
        is_active: rule.is_active,
        applies_to: rule.applies_to,
        target_product_ids: rule.target_product_ids,
        material_id: rule.material_id,
        deduction_type: rule.deduction_type,
        quantity_single: rule.quantity_single,
        quantity_multiple: rule.quantity_multiple,
    }
}

/// In-process backend. Transactions are serialised behind one async mutex
/// and work on a private copy of the state that replaces the shared state
/// on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new(state: MemoryState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Copy of the committed state. Waits for any open transaction.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Mutates committed state directly, outside any transaction.
    pub async fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut MemoryState) -> R,
    {
        let mut guard = self.state.lock().await;
        f(&mut guard)
    }
}

#[async_trait]
impl StockBackend for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StockTx>, ServiceError> {
        Ok(Box::new(MemoryTx::open(self.state.clone()).await))
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Holds the parent's lock for its whole life; a savepoint is a `MemoryTx`
/// whose parent is another transaction's working copy.
pub struct MemoryTx {
    parent: OwnedMutexGuard<MemoryState>,
    working: Arc<Mutex<MemoryState>>,
}

impl MemoryTx {
    async fn open(parent: Arc<Mutex<MemoryState>>) -> Self {
        let parent = parent.lock_owned().await;
        let working = Arc::new(Mutex::new(parent.clone()));
        Self { parent, working }
    }
}

#[async_trait]
impl MaterialStore for MemoryTx {
    async fn get_stock(&self, material_id: MaterialId) -> Result<Decimal, ServiceError> {
        self.working
            .lock()
            .await
            .material_stock(material_id)
            .ok_or_else(|| ServiceError::not_found("material", material_id))
    }

    async fn adjust_stock(
        &self,
        material_id: MaterialId,
        delta: Decimal,
    ) -> Result<Decimal, ServiceError> {
        let mut state = self.working.lock().await;
        if !state.materials.contains_key(&material_id) {
            return Err(ServiceError::not_found("material", material_id));
        }
        if state.failing_materials.contains(&material_id) {
            return Err(ServiceError::WriteRejected(format!(
                "material {} rejected the write",
                material_id
            )));
        }

        let material = state
            .materials
            .get_mut(&material_id)
            .ok_or_else(|| ServiceError::not_found("material", material_id))?;
        material.stock_quantity = floor_at_zero(material.stock_quantity, delta)?;
        material.updated_at = Utc::now();
        Ok(material.stock_quantity)
    }

    async fn find_material(
        &self,
        material_id: MaterialId,
    ) -> Result<Option<Material>, ServiceError> {
        Ok(self.working.lock().await.materials.get(&material_id).cloned())
    }

    async fn list_materials(&self) -> Result<Vec<Material>, ServiceError> {
        let mut materials: Vec<Material> =
            self.working.lock().await.materials.values().cloned().collect();
        materials.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(materials)
    }
}

#[async_trait]
impl ItemStockStore for MemoryTx {
    async fn adjust_item_stock(&self, item: LineRef, delta: i32) -> Result<i32, ServiceError> {
        let mut state = self.working.lock().await;
        let (stock, kind) = match item {
            LineRef::Product(id) => (state.product_stock.get_mut(&id), "product"),
            LineRef::Variant(id) => (state.variant_stock.get_mut(&id), "variant"),
        };
        let stock = stock.ok_or_else(|| ServiceError::not_found(kind, item.id()))?;
        *stock = stock.saturating_add(delta).max(0);
        Ok(*stock)
    }
}

#[async_trait]
impl BomIndex for MemoryTx {
    async fn materials_for(&self, item: LineRef) -> Result<Vec<BomComponent>, ServiceError> {
        Ok(select_components(&self.working.lock().await.bom, item))
    }
}

#[async_trait]
impl PackagingRuleSet for MemoryTx {
    async fn active_rules(&self) -> Result<Vec<PackagingRule>, ServiceError> {
        Ok(self
            .working
            .lock()
            .await
            .rules
            .values()
            .filter(|rule| rule.is_active)
            .cloned()
            .collect())
    }

    async fn all_rules(&self) -> Result<Vec<PackagingRule>, ServiceError> {
        Ok(self.working.lock().await.rules.values().cloned().collect())
    }

    async fn create_rule(&self, rule: NewPackagingRule) -> Result<PackagingRule, ServiceError> {
        let mut state = self.working.lock().await;
        let id = state.add_rule(rule);
        state
            .rules
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::InternalError(format!("packaging rule {} vanished", id)))
    }

    async fn set_rule_active(
        &self,
        rule_id: RuleId,
        is_active: bool,
    ) -> Result<PackagingRule, ServiceError> {
        let mut state = self.working.lock().await;
        let rule = state
            .rules
            .get_mut(&rule_id)
            .ok_or_else(|| ServiceError::not_found("packaging rule", rule_id))?;
        rule.is_active = is_active;
        Ok(rule.clone())
    }
}

#[async_trait]
impl DeductionLedger for MemoryTx {
    async fn has_deductions_for(&self, order_id: OrderId) -> Result<bool, ServiceError> {
        Ok(self
            .working
            .lock()
            .await
            .ledger
            .iter()
            .any(|entry| entry.order_id == order_id))
    }

    async fn record(
        &self,
        order_id: OrderId,
        material_id: MaterialId,
        quantity: Decimal,
    ) -> Result<LedgerEntry, ServiceError> {
        let mut state = self.working.lock().await;
        let entry = LedgerEntry {
            id: state.next_id(),
            order_id,
            material_id,
            quantity_deducted: quantity,
            created_at: Utc::now(),
        };
        state.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn entries_for(&self, order_id: OrderId) -> Result<Vec<LedgerEntry>, ServiceError> {
        Ok(self
            .working
            .lock()
            .await
            .ledger_for(order_id)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn clear(&self, order_id: OrderId) -> Result<u64, ServiceError> {
        let mut state = self.working.lock().await;
        let before = state.ledger.len();
        state.ledger.retain(|entry| entry.order_id != order_id);
        Ok((before - state.ledger.len()) as u64)
    }
}

#[async_trait]
impl OrderStore for MemoryTx {
    async fn find_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>, ServiceError> {
        Ok(self.working.lock().await.orders.get(&order_id).cloned())
    }

    async fn lines_for(&self, order_id: OrderId) -> Result<Vec<OrderLine>, ServiceError> {
        Ok(self
            .working
            .lock()
            .await
            .lines
            .iter()
            .filter(|line| line.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> Result<(), ServiceError> {
        let mut state = self.working.lock().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| ServiceError::not_found("order", order_id))?;
        order.status = status;
        Ok(())
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<(), ServiceError> {
        let mut state = self.working.lock().await;
        if state.orders.remove(&order_id).is_none() {
            return Err(ServiceError::not_found("order", order_id));
        }
        state.lines.retain(|line| line.order_id != order_id);
        Ok(())
    }

    async fn orders_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OrderRecord>, ServiceError> {
        let mut orders: Vec<OrderRecord> = self
            .working
            .lock()
            .await
            .orders
            .values()
            .filter(|order| order.created_at >= from && order.created_at <= to)
            .cloned()
            .collect();
        orders.sort_by_key(|order| order.created_at);
        Ok(orders)
    }
}

#[async_trait]
impl CashflowStore for MemoryTx {
    async fn cashflow_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CashflowEntry>, ServiceError> {
        let mut entries: Vec<CashflowEntry> = self
            .working
            .lock()
            .await
            .cashflow
            .iter()
            .filter(|entry| entry.occurred_at >= from && entry.occurred_at <= to)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.occurred_at);
        Ok(entries)
    }
}

#[async_trait]
impl StockTx for MemoryTx {
    async fn savepoint(&self) -> Result<Box<dyn StockTx>, ServiceError> {
        Ok(Box::new(MemoryTx::open(self.working.clone()).await))
    }

    async fn commit(self: Box<Self>) -> Result<(), ServiceError> {
        let MemoryTx { mut parent, working } = *self;
        let state = working.lock().await.clone();
        *parent = state;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn store_with_material(stock: Decimal) -> (MemoryStore, MaterialId) {
        let mut state = MemoryState::default();
        let id = state.add_material("Jojoba oil", "g", stock, dec!(0.1), None);
        (MemoryStore::new(state), id)
    }

    #[tokio::test]
    async fn commit_publishes_writes() {
        let (store, id) = store_with_material(dec!(10));

        let tx = store.begin().await.unwrap();
        assert_eq!(tx.adjust_stock(id, dec!(-4)).await.unwrap(), dec!(6));
        tx.commit().await.unwrap();

        assert_eq!(store.snapshot().await.material_stock(id), Some(dec!(6)));
    }

    #[tokio::test]
    async fn dropping_transaction_discards_writes() {
        let (store, id) = store_with_material(dec!(10));

        {
            let tx = store.begin().await.unwrap();
            tx.adjust_stock(id, dec!(-4)).await.unwrap();
        }

        assert_eq!(store.snapshot().await.material_stock(id), Some(dec!(10)));
    }

    #[tokio::test]
    async fn savepoint_rollback_keeps_outer_writes() {
        let (store, id) = store_with_material(dec!(10));

        let tx = store.begin().await.unwrap();
        tx.adjust_stock(id, dec!(-1)).await.unwrap();

        let sp = tx.savepoint().await.unwrap();
        sp.adjust_stock(id, dec!(-5)).await.unwrap();
        sp.record(1, id, dec!(5)).await.unwrap();
        sp.rollback().await.unwrap();

        let sp = tx.savepoint().await.unwrap();
        sp.adjust_stock(id, dec!(-2)).await.unwrap();
        sp.commit().await.unwrap();

        assert!(!tx.has_deductions_for(1).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(store.snapshot().await.material_stock(id), Some(dec!(7)));
    }

    #[tokio::test]
    async fn adjust_stock_floors_at_zero_and_reports_missing() {
        let (store, id) = store_with_material(dec!(5));
        let tx = store.begin().await.unwrap();

        assert_eq!(tx.adjust_stock(id, dec!(-1000)).await.unwrap(), Decimal::ZERO);
        assert!(tx.adjust_stock(id + 1, dec!(1)).await.unwrap_err().is_not_found());
        assert!(tx.get_stock(id + 1).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn failing_material_rejects_writes() {
        let (store, id) = store_with_material(dec!(5));
        store.update(|state| state.failing_materials.insert(id)).await;

        let tx = store.begin().await.unwrap();
        let err = tx.adjust_stock(id, dec!(-1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::WriteRejected(_)));
    }

    #[tokio::test]
    async fn clear_counts_only_the_order() {
        let (store, id) = store_with_material(dec!(5));
        let tx = store.begin().await.unwrap();
        tx.record(1, id, dec!(1)).await.unwrap();
        tx.record(1, id, dec!(1)).await.unwrap();
        tx.record(2, id, dec!(1)).await.unwrap();

        assert_eq!(tx.clear(1).await.unwrap(), 2);
        assert_eq!(tx.entries_for(2).await.unwrap().len(), 1);
    }
}
