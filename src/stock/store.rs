use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{
    BomIndex, CashflowStore, DeductionLedger, LineRef, Material, MaterialId, OrderStore,
    PackagingRuleSet,
};
use crate::errors::ServiceError;

/// Material stock, prices and thresholds.
#[async_trait]
pub trait MaterialStore: Send + Sync {
    /// Current stock; `NotFound` when the material does not exist.
    async fn get_stock(&self, material_id: MaterialId) -> Result<Decimal, ServiceError>;

    /// Applies `max(0, old + delta)` and returns the new quantity. No upper bound.
    async fn adjust_stock(
        &self,
        material_id: MaterialId,
        delta: Decimal,
    ) -> Result<Decimal, ServiceError>;

    async fn find_material(&self, material_id: MaterialId)
        -> Result<Option<Material>, ServiceError>;

    async fn list_materials(&self) -> Result<Vec<Material>, ServiceError>;
}

/// Own stock of products and variants, in whole units.
#[async_trait]
pub trait ItemStockStore: Send + Sync {
    /// Same contract as [`MaterialStore::adjust_stock`], floored at zero.
    async fn adjust_item_stock(&self, item: LineRef, delta: i32) -> Result<i32, ServiceError>;
}

/// A unit of work over every store. Writes become visible to other
/// transactions only on [`StockTx::commit`]; dropping the handle without
/// committing discards them.
#[async_trait]
pub trait StockTx:
    MaterialStore
    + ItemStockStore
    + BomIndex
    + PackagingRuleSet
    + DeductionLedger
    + OrderStore
    + CashflowStore
{
    /// Opens a nested unit of work (a SAVEPOINT on SQL backends).
    async fn savepoint(&self) -> Result<Box<dyn StockTx>, ServiceError>;

    async fn commit(self: Box<Self>) -> Result<(), ServiceError>;

    async fn rollback(self: Box<Self>) -> Result<(), ServiceError>;
}

/// Entry point to a storage backend, injected into every service.
#[async_trait]
pub trait StockBackend: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StockTx>, ServiceError>;

    /// Liveness check used by the health endpoint.
    async fn ping(&self) -> Result<(), ServiceError>;
}
