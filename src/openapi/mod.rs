use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stock Ledger API",
        version = "0.1.0",
        description = r#"
# Stock Ledger & Deduction Engine

Back-office stock tracking for a skincare storefront.

## Features

- **Order stock**: consume and restore product, variant and bill-of-materials stock per order
- **Packaging rules**: per-order and per-item packaging deductions recorded in an append-only ledger
- **Order lifecycle**: status transitions that trigger packaging deduction and stock restoration
- **Materials**: stock levels, low-stock listing and manual adjustments
- **Business analysis**: revenue, COGS and net profit for a date range

## Stock floor

Every stock write is clamped at zero. Restorations are not bounded above.

## Error Handling

Errors share one body shape:

```json
{
  "error": "Not Found",
  "message": "Not found: order 100",
  "request_id": "4f1c...",
  "timestamp": "2025-03-01T10:30:00Z"
}
```

Partial failures inside an engine run are not errors: they are reported per item
in the response body and the remaining items are still processed.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "orders", description = "Order status transitions and deletion"),
        (name = "stock", description = "Order-driven stock consumption, restoration and packaging"),
        (name = "materials", description = "Material stock"),
        (name = "packaging", description = "Packaging rule management"),
        (name = "reports", description = "Business analysis")
    ),
    paths(
        // Orders
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::delete_order,

        // Stock engine
        crate::handlers::orders::consume_order_stock,
        crate::handlers::orders::restore_order_stock,
        crate::handlers::orders::deduct_packaging,
        crate::handlers::orders::restore_packaging,

        // Materials
        crate::handlers::materials::list_materials,
        crate::handlers::materials::get_material,
        crate::handlers::materials::adjust_material,

        // Packaging rules
        crate::handlers::packaging_rules::list_rules,
        crate::handlers::packaging_rules::create_rule,
        crate::handlers::packaging_rules::set_rule_active,

        // Reports
        crate::handlers::reports::business_analysis,
    ),
    components(
        schemas(
            // Request types
            crate::handlers::orders::UpdateOrderStatusRequest,
            crate::handlers::packaging_rules::SetRuleActiveRequest,
            crate::services::materials::AdjustMaterialRequest,
            crate::stock::NewPackagingRule,

            // Domain types
            crate::stock::Material,
            crate::stock::OrderStatus,
            crate::stock::PackagingRule,
            crate::stock::AppliesTo,
            crate::stock::DeductionType,

            // Reports
            crate::stock::OrderStockReport,
            crate::stock::PackagingReport,
            crate::stock::StockAdjustment,
            crate::stock::RuleEvaluation,
            crate::services::order_lifecycle::StatusChange,
            crate::services::order_lifecycle::OrderDeletion,
            crate::services::business_analysis::BusinessAnalysis,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
