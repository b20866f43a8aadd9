//! SeaORM entities for the stock ledger schema (see the `migrations` crate).

pub mod bom_entry;
pub mod cashflow_transaction;
pub mod material;
pub mod order;
pub mod order_item;
pub mod packaging_deduction;
pub mod packaging_rule;
pub mod product;
pub mod product_variant;
