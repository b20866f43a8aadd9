use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use super::finish_tx;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::stock::{Material, MaterialId, StockBackend};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AdjustMaterialRequest {
    /// Positive to receive stock, negative to write it off.
    pub delta: Decimal,
    #[validate(length(min = 1, max = 255))]
    pub reason: String,
}

/// Admin access to materials outside of order processing.
#[derive(Clone)]
pub struct MaterialService {
    backend: Arc<dyn StockBackend>,
    event_sender: Arc<EventSender>,
}

impl MaterialService {
    pub fn new(backend: Arc<dyn StockBackend>, event_sender: Arc<EventSender>) -> Self {
        Self {
            backend,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, low_stock_only: bool) -> Result<Vec<Material>, ServiceError> {
        let tx = self.backend.begin().await?;
        let materials = tx.list_materials().await;
        tx.rollback().await?;

        let mut materials = materials?;
        if low_stock_only {
            materials.retain(Material::is_low_stock);
        }
        Ok(materials)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, material_id: MaterialId) -> Result<Material, ServiceError> {
        let tx = self.backend.begin().await?;
        let material = tx.find_material(material_id).await;
        tx.rollback().await?;

        material?.ok_or_else(|| ServiceError::not_found("material", material_id))
    }

    /// Manual stock correction, floored at zero like every other write.
    #[instrument(skip(self))]
    pub async fn adjust(
        &self,
        material_id: MaterialId,
        request: AdjustMaterialRequest,
    ) -> Result<Material, ServiceError> {
        request.validate()?;
        if request.reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "adjustment reason must not be blank".to_string(),
            ));
        }

        let tx = self.backend.begin().await?;
        let outcome = async {
            tx.adjust_stock(material_id, request.delta).await?;
            tx.find_material(material_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("material", material_id))
        }
        .await;
        let material = finish_tx(tx, outcome).await?;

        info!(
            material_id,
            delta = %request.delta,
            new_quantity = %material.stock_quantity,
            reason = %request.reason,
            "Material stock adjusted"
        );
        self.event_sender
            .send_or_log(Event::MaterialAdjusted {
                material_id,
                delta: request.delta,
                new_quantity: material.stock_quantity,
                reason: request.reason,
            })
            .await;

        Ok(material)
    }
}
