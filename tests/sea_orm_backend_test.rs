//! The SQL backend against a migrated in-memory SQLite database: savepoints,
//! BOM selection, the deduction ledger and decimal columns on a live
//! connection.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use common::rule_for_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, NotSet, PaginatorTrait, QueryFilter, Set,
};
use stock_ledger::db::{establish_connection_with_config, run_migrations, DbConfig};
use stock_ledger::entities::{
    bom_entry, material, order, order_item, packaging_deduction, product, product_variant,
};
use stock_ledger::events::{Event, EventSender};
use stock_ledger::handlers::AppServices;
use stock_ledger::repositories::SeaOrmBackend;
use stock_ledger::services::materials::AdjustMaterialRequest;
use stock_ledger::stock::{
    AdjustmentStatus, DeductionType, MaterialStore, OrderStatus, PackagingRuleSet, RuleId,
    RuleOutcome, StockBackend, StockTx,
};
use tokio::sync::mpsc;

struct SqlHarness {
    db: Arc<DatabaseConnection>,
    backend: Arc<SeaOrmBackend>,
    services: AppServices,
    _events: mpsc::Receiver<Event>,
}

impl SqlHarness {
    async fn new() -> Self {
        // A single pooled connection keeps every query on the same in-memory database.
        let config = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(5),
        };
        let db = establish_connection_with_config(&config).await.unwrap();
        run_migrations(&db).await.unwrap();

        let db = Arc::new(db);
        let backend = Arc::new(SeaOrmBackend::new(db.clone()));
        let (tx, rx) = mpsc::channel(256);
        let services = AppServices::new(backend.clone(), Arc::new(EventSender::new(tx)));
        Self {
            db,
            backend,
            services,
            _events: rx,
        }
    }

    async fn material(&self, name: &str, stock: Decimal) -> i32 {
        material::ActiveModel {
            id: NotSet,
            name: Set(name.to_string()),
            unit: Set("g".to_string()),
            stock_quantity: Set(stock),
            unit_price: Set(dec!(0.5)),
            low_stock_threshold: Set(None),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .unwrap()
        .id
    }

    async fn product(&self, name: &str, stock: i32) -> i32 {
        product::ActiveModel {
            id: NotSet,
            name: Set(name.to_string()),
            price: Set(dec!(24)),
            stock_quantity: Set(stock),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await
        .unwrap()
        .id
    }

    async fn variant(&self, product_id: i32, stock: i32) -> i32 {
        product_variant::ActiveModel {
            id: NotSet,
            product_id: Set(product_id),
            name: Set("50 ml".to_string()),
            price: Set(dec!(30)),
            stock_quantity: Set(stock),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await
        .unwrap()
        .id
    }

    async fn bom(
        &self,
        product_id: Option<i32>,
        variant_id: Option<i32>,
        material_id: i32,
        quantity_per_unit: Decimal,
    ) -> Result<bom_entry::Model, sea_orm::DbErr> {
        bom_entry::ActiveModel {
            id: NotSet,
            product_id: Set(product_id),
            variant_id: Set(variant_id),
            material_id: Set(material_id),
            quantity_per_unit: Set(quantity_per_unit),
        }
        .insert(self.db.as_ref())
        .await
    }

    async fn rule(
        &self,
        material_id: i32,
        deduction_type: DeductionType,
        single: Decimal,
        multiple: Decimal,
    ) -> RuleId {
        let tx = self.backend.begin().await.unwrap();
        let rule = tx
            .create_rule(rule_for_all(material_id, deduction_type, single, multiple))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        rule.id
    }

    async fn pending_order(&self, number: &str) -> i32 {
        order::ActiveModel {
            id: NotSet,
            order_number: Set(number.to_string()),
            status: Set(OrderStatus::Pending.to_string()),
            total: Set(dec!(96)),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await
        .unwrap()
        .id
    }

    async fn line(
        &self,
        order_id: i32,
        product_id: Option<i32>,
        variant_id: Option<i32>,
        quantity: i32,
    ) {
        order_item::ActiveModel {
            id: NotSet,
            order_id: Set(order_id),
            product_id: Set(product_id),
            variant_id: Set(variant_id),
            quantity: Set(quantity),
            unit_price: Set(dec!(24)),
        }
        .insert(self.db.as_ref())
        .await
        .unwrap();
    }

    async fn material_row(&self, id: i32) -> material::Model {
        material::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .unwrap()
            .expect("material row")
    }

    async fn material_stock(&self, id: i32) -> Decimal {
        self.material_row(id).await.stock_quantity
    }

    async fn product_stock(&self, id: i32) -> i32 {
        product::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .unwrap()
            .expect("product row")
            .stock_quantity
    }

    async fn variant_stock(&self, id: i32) -> i32 {
        product_variant::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .unwrap()
            .expect("variant row")
            .stock_quantity
    }

    async fn ledger_len(&self, order_id: i32) -> u64 {
        packaging_deduction::Entity::find()
            .filter(packaging_deduction::Column::OrderId.eq(order_id))
            .count(self.db.as_ref())
            .await
            .unwrap()
    }

    async fn order_status(&self, order_id: i32) -> String {
        order::Entity::find_by_id(order_id)
            .one(self.db.as_ref())
            .await
            .unwrap()
            .expect("order row")
            .status
    }
}

#[tokio::test]
async fn order_100_processing_then_cancellation() {
    let h = SqlHarness::new().await;
    let wax = h.material("Candelilla wax", dec!(1000)).await;
    let mailer = h.material("Mailer box", dec!(50)).await;
    let product = h.product("Lip balm", 20).await;
    h.bom(Some(product), None, wax, dec!(10)).await.unwrap();
    h.rule(mailer, DeductionType::PerItem, dec!(0), dec!(1)).await;
    let order = h.pending_order("#100").await;
    h.line(order, Some(product), None, 4).await;

    let change = h
        .services
        .order_lifecycle
        .update_status(order, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(change.packaging.expect("packaging report").deducted_count(), 1);
    assert_eq!(h.material_stock(mailer).await, dec!(46));
    assert_eq!(h.material_stock(wax).await, dec!(1000));
    assert_eq!(h.ledger_len(order).await, 1);
    assert_eq!(h.order_status(order).await, "processing");

    let change = h
        .services
        .order_lifecycle
        .update_status(order, OrderStatus::Cancelled)
        .await
        .unwrap();
    let restoration = change.restoration.expect("restoration report");
    assert!(restoration.is_complete());
    assert_eq!(restoration.ledger_entries_cleared, 1);
    assert_eq!(h.material_stock(wax).await, dec!(1040));
    assert_eq!(h.material_stock(mailer).await, dec!(50));
    assert_eq!(h.product_stock(product).await, 24);
    assert_eq!(h.ledger_len(order).await, 0);
    assert_eq!(h.order_status(order).await, "cancelled");
}

#[tokio::test]
async fn rejected_ledger_write_rolls_back_only_that_rule() {
    let h = SqlHarness::new().await;
    let tissue = h.material("Tissue paper", dec!(100)).await;
    let mailer = h.material("Mailer box", dec!(10)).await;
    let product = h.product("Face oil", 10).await;
    let tissue_rule = h.rule(tissue, DeductionType::PerOrder, dec!(2), dec!(3)).await;
    let mailer_rule = h.rule(mailer, DeductionType::PerOrder, dec!(1), dec!(1)).await;
    let order = h.pending_order("#101").await;
    h.line(order, Some(product), None, 1).await;

    // The tissue stock write succeeds; its ledger row is then refused.
    h.db.execute_unprepared(&format!(
        "CREATE TRIGGER reject_tissue_ledger BEFORE INSERT ON packaging_deductions \
         WHEN NEW.material_id = {} BEGIN SELECT RAISE(ABORT, 'ledger rejected'); END;",
        tissue
    ))
    .await
    .unwrap();

    let report = h
        .services
        .stock_engine
        .deduct_packaging(order)
        .await
        .unwrap();

    let outcome_of = |rule_id| {
        report
            .rules
            .iter()
            .find(|rule| rule.rule_id == rule_id)
            .map(|rule| rule.outcome)
    };
    assert_eq!(outcome_of(tissue_rule), Some(RuleOutcome::WriteFailed));
    assert_eq!(outcome_of(mailer_rule), Some(RuleOutcome::Deducted));
    assert!(!report.is_complete());

    assert_eq!(h.material_stock(tissue).await, dec!(100));
    assert_eq!(h.material_stock(mailer).await, dec!(9));
    assert_eq!(h.ledger_len(order).await, 1);
}

#[tokio::test]
async fn savepoint_rollback_keeps_parent_writes() {
    let h = SqlHarness::new().await;
    let mailer = h.material("Mailer box", dec!(50)).await;

    let tx = h.backend.begin().await.unwrap();
    assert_eq!(tx.adjust_stock(mailer, dec!(-4)).await.unwrap(), dec!(46));

    let sp = tx.savepoint().await.unwrap();
    assert_eq!(sp.adjust_stock(mailer, dec!(-1)).await.unwrap(), dec!(45));
    sp.rollback().await.unwrap();

    assert_eq!(tx.get_stock(mailer).await.unwrap(), dec!(46));
    tx.commit().await.unwrap();
    assert_eq!(h.material_stock(mailer).await, dec!(46));
}

#[tokio::test]
async fn variant_lines_use_only_variant_bom_rows() {
    let h = SqlHarness::new().await;
    let oil = h.material("Rosehip oil", dec!(200)).await;
    let bottle = h.material("Dropper bottle", dec!(30)).await;
    let product = h.product("Serum", 10).await;
    let variant = h.variant(product, 6).await;
    h.bom(Some(product), None, oil, dec!(5)).await.unwrap();
    h.bom(None, Some(variant), bottle, dec!(1)).await.unwrap();
    let order = h.pending_order("#102").await;
    h.line(order, Some(product), Some(variant), 2).await;

    let report = h
        .services
        .stock_engine
        .restore_order_stock(order)
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.materials.len(), 1);
    assert_eq!(report.materials[0].target.id, bottle);
    assert_eq!(h.material_stock(bottle).await, dec!(32));
    assert_eq!(h.material_stock(oil).await, dec!(200));
    assert_eq!(h.variant_stock(variant).await, 8);
    assert_eq!(h.product_stock(product).await, 10);
}

#[tokio::test]
async fn missing_items_are_reported_and_the_rest_restored() {
    let h = SqlHarness::new().await;
    let oil = h.material("Argan oil", dec!(100)).await;
    let product = h.product("Hair oil", 4).await;
    h.bom(Some(product), None, oil, dec!(10)).await.unwrap();
    let order = h.pending_order("#103").await;
    h.line(order, Some(4_242), None, 1).await;
    h.line(order, Some(product), None, 1).await;

    let report = h
        .services
        .stock_engine
        .restore_order_stock(order)
        .await
        .unwrap();

    assert_eq!(report.items.len(), 2);
    assert_eq!(report.items[0].outcome, AdjustmentStatus::NotFound);
    assert!(report.items[1].is_ok());
    assert_eq!(h.material_stock(oil).await, dec!(110));
    assert_eq!(h.product_stock(product).await, 5);
}

#[tokio::test]
async fn bom_rows_need_exactly_one_owner() {
    let h = SqlHarness::new().await;
    let wax = h.material("Beeswax", dec!(10)).await;
    let product = h.product("Balm", 1).await;
    let variant = h.variant(product, 1).await;

    assert!(h.bom(Some(product), Some(variant), wax, dec!(1)).await.is_err());
    assert!(h.bom(None, None, wax, dec!(1)).await.is_err());
    assert!(h.bom(Some(product), None, wax, dec!(1)).await.is_ok());
    assert!(h.bom(None, Some(variant), wax, dec!(1)).await.is_ok());
}

#[tokio::test]
async fn manual_adjustment_persists_quantity_and_timestamp() {
    let h = SqlHarness::new().await;
    let butter = h.material("Shea butter", dec!(100)).await;
    let stale = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    material::Entity::update_many()
        .col_expr(material::Column::UpdatedAt, Expr::value(stale))
        .filter(material::Column::Id.eq(butter))
        .exec(h.db.as_ref())
        .await
        .unwrap();

    let adjusted = h
        .services
        .materials
        .adjust(
            butter,
            AdjustMaterialRequest {
                delta: dec!(2.5),
                reason: "receipt".into(),
            },
        )
        .await
        .unwrap();

    assert_eq!(adjusted.stock_quantity, dec!(102.5));
    let row = h.material_row(butter).await;
    assert_eq!(row.stock_quantity, dec!(102.5));
    assert!(row.updated_at > stale);
}
