pub mod materials;
pub mod orders;
pub mod packaging_rules;
pub mod reports;

use std::sync::Arc;

use crate::events::EventSender;
use crate::services::{
    business_analysis::BusinessAnalysisService, materials::MaterialService,
    order_lifecycle::OrderLifecycleService, packaging_rules::PackagingRuleService,
    stock_engine::StockEngine,
};
use crate::stock::StockBackend;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer used by HTTP handlers. Every service shares one backend.
#[derive(Clone)]
pub struct AppServices {
    pub stock_engine: Arc<StockEngine>,
    pub order_lifecycle: Arc<OrderLifecycleService>,
    pub materials: Arc<MaterialService>,
    pub packaging_rules: Arc<PackagingRuleService>,
    pub business_analysis: Arc<BusinessAnalysisService>,
}

impl AppServices {
    pub fn new(backend: Arc<dyn StockBackend>, event_sender: Arc<EventSender>) -> Self {
        let stock_engine = Arc::new(StockEngine::new(backend.clone(), event_sender.clone()));
        let order_lifecycle = Arc::new(OrderLifecycleService::new(
            backend.clone(),
            stock_engine.clone(),
            event_sender.clone(),
        ));

        Self {
            stock_engine,
            order_lifecycle,
            materials: Arc::new(MaterialService::new(backend.clone(), event_sender)),
            packaging_rules: Arc::new(PackagingRuleService::new(backend.clone())),
            business_analysis: Arc::new(BusinessAnalysisService::new(backend)),
        }
    }
}
