use std::sync::Arc;
use tracing::{info, instrument};

use super::finish_tx;
use crate::errors::ServiceError;
use crate::stock::{NewPackagingRule, PackagingRule, RuleId, StockBackend};

#[derive(Clone)]
pub struct PackagingRuleService {
    backend: Arc<dyn StockBackend>,
}

impl PackagingRuleService {
    pub fn new(backend: Arc<dyn StockBackend>) -> Self {
        Self { backend }
    }

    pub async fn list(&self) -> Result<Vec<PackagingRule>, ServiceError> {
        let tx = self.backend.begin().await?;
        let rules = tx.all_rules().await;
        tx.rollback().await?;
        rules
    }

    /// Validates and stores a rule. The target material must exist.
    #[instrument(skip(self, rule), fields(name = %rule.name))]
    pub async fn create(&self, rule: NewPackagingRule) -> Result<PackagingRule, ServiceError> {
        rule.validate()?;

        let tx = self.backend.begin().await?;
        let outcome = async {
            if tx.find_material(rule.material_id).await?.is_none() {
                return Err(ServiceError::InvalidInput(format!(
                    "material {} does not exist",
                    rule.material_id
                )));
            }
            tx.create_rule(rule).await
        }
        .await;
        let created = finish_tx(tx, outcome).await?;

        info!(rule_id = created.id, material_id = created.material_id, "Packaging rule created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn set_active(
        &self,
        rule_id: RuleId,
        is_active: bool,
    ) -> Result<PackagingRule, ServiceError> {
        let tx = self.backend.begin().await?;
        let outcome = tx.set_rule_active(rule_id, is_active).await;
        finish_tx(tx, outcome).await
    }
}
