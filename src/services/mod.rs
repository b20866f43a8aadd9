// Stock engine and the order lifecycle that drives it
pub mod order_lifecycle;
pub mod stock_engine;

// Admin services
pub mod materials;
pub mod packaging_rules;

// Analytics and Reporting
pub mod business_analysis;

use tracing::warn;

use crate::errors::ServiceError;
use crate::stock::StockTx;

/// Commits `tx` when `result` is `Ok`, rolls it back otherwise. Works for
/// top-level transactions and savepoints alike.
pub(crate) async fn finish_tx<T>(
    tx: Box<dyn StockTx>,
    result: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
