mod common;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use common::{product_line, rule_for_all, TestHarness};
use rust_decimal_macros::dec;
use stock_ledger::errors::ServiceError;
use stock_ledger::repositories::MemoryState;
use stock_ledger::stock::{BomEntry, CashflowEntry, CashflowKind, DeductionType, OrderStatus};

#[tokio::test]
async fn cogs_combines_bom_and_packaging_and_skips_cancelled_orders() {
    let day = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
    let mut state = MemoryState::default();
    let oil = state.add_material("Squalane", "ml", dec!(1000), dec!(0.10), None);
    let box_id = state.add_material("Box", "unit", dec!(100), dec!(0.50), None);
    let serum = state.add_product(50);
    state.add_bom(BomEntry::for_product(serum, oil, dec!(30)));
    state.add_rule(rule_for_all(box_id, DeductionType::PerOrder, dec!(1), dec!(1)));

    let shipped = state.add_order("#300", OrderStatus::Processing, dec!(40), day);
    state.add_line(product_line(shipped, serum, 2));
    let cancelled = state.add_order("#301", OrderStatus::Cancelled, dec!(999), day);
    state.add_line(product_line(cancelled, serum, 10));
    let outside = state.add_order("#302", OrderStatus::Delivered, dec!(500), day - Duration::days(30));
    state.add_line(product_line(outside, serum, 5));

    state.add_cashflow(CashflowEntry {
        id: 0,
        kind: CashflowKind::Expense,
        category: "ads".to_string(),
        amount: dec!(5),
        note: None,
        occurred_at: day,
    });
    state.add_cashflow(CashflowEntry {
        id: 0,
        kind: CashflowKind::Income,
        category: "refund".to_string(),
        amount: dec!(2),
        note: Some("supplier credit".to_string()),
        occurred_at: day,
    });
    let harness = TestHarness::new(state);

    harness
        .services
        .stock_engine
        .deduct_packaging(shipped)
        .await
        .unwrap();

    let analysis = harness
        .services
        .business_analysis
        .analyze(day - Duration::days(1), day + Duration::days(1))
        .await
        .unwrap();

    assert_eq!(analysis.order_count, 1);
    assert_eq!(analysis.units_sold, 2);
    assert_eq!(analysis.revenue, dec!(40));
    // 30 ml x 2 units x 0.10
    assert_eq!(analysis.material_cost, dec!(6.00));
    assert_eq!(analysis.packaging_cost, dec!(0.50));
    assert_eq!(analysis.cogs, dec!(6.50));
    assert_eq!(analysis.gross_profit, dec!(33.50));
    assert_eq!(analysis.gross_margin, Some(dec!(83.75)));
    assert_eq!(analysis.other_income, dec!(2));
    assert_eq!(analysis.expenses, dec!(5));
    assert_eq!(analysis.expenses_by_category.get("ads"), Some(&dec!(5)));
    assert_eq!(analysis.net_profit, dec!(30.50));
}

#[tokio::test]
async fn empty_range_has_no_margin() {
    let harness = TestHarness::new(MemoryState::default());
    let now = Utc::now();

    let analysis = harness
        .services
        .business_analysis
        .analyze(now - Duration::days(7), now)
        .await
        .unwrap();

    assert_eq!(analysis.order_count, 0);
    assert_eq!(analysis.cogs, dec!(0));
    assert_eq!(analysis.gross_margin, None);
}

#[tokio::test]
async fn reversed_range_is_rejected() {
    let harness = TestHarness::new(MemoryState::default());
    let now = Utc::now();

    let err = harness
        .services
        .business_analysis
        .analyze(now, now - Duration::days(1))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
}
