use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{LineRef, MaterialId, ProductId, VariantId};
use crate::errors::ServiceError;

/// A bill-of-materials row as stored. Exactly one of `product_id` /
/// `variant_id` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomEntry {
    pub product_id: Option<ProductId>,
    pub variant_id: Option<VariantId>,
    pub material_id: MaterialId,
    pub quantity_per_unit: Decimal,
}

impl BomEntry {
    pub fn for_product(product_id: ProductId, material_id: MaterialId, qty: Decimal) -> Self {
        Self {
            product_id: Some(product_id),
            variant_id: None,
            material_id,
            quantity_per_unit: qty,
        }
    }

    pub fn for_variant(variant_id: VariantId, material_id: MaterialId, qty: Decimal) -> Self {
        Self {
            product_id: None,
            variant_id: Some(variant_id),
            material_id,
            quantity_per_unit: qty,
        }
    }
}

/// One material consumed per unit of a sellable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BomComponent {
    pub material_id: MaterialId,
    pub quantity_per_unit: Decimal,
}

/// BOM selection rule.
///
/// A variant reference selects only rows keyed by that variant. A product
/// reference selects only product rows with no variant set. Variant rows are
/// never merged with their parent product's rows.
pub fn select_components(entries: &[BomEntry], item: LineRef) -> Vec<BomComponent> {
    entries
        .iter()
        .filter(|entry| match item {
            LineRef::Variant(id) => entry.variant_id == Some(id),
            LineRef::Product(id) => entry.product_id == Some(id) && entry.variant_id.is_none(),
        })
        .map(|entry| BomComponent {
            material_id: entry.material_id,
            quantity_per_unit: entry.quantity_per_unit,
        })
        .collect()
}

#[async_trait]
pub trait BomIndex: Send + Sync {
    /// Materials consumed by one unit of `item`. An empty list is valid.
    async fn materials_for(&self, item: LineRef) -> Result<Vec<BomComponent>, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entries() -> Vec<BomEntry> {
        vec![
            BomEntry::for_product(1, 10, dec!(5)),
            BomEntry::for_product(1, 11, dec!(1)),
            BomEntry::for_variant(7, 12, dec!(3)),
            // variant row that also carries its parent product id
            BomEntry {
                product_id: Some(1),
                variant_id: Some(8),
                material_id: 13,
                quantity_per_unit: dec!(2),
            },
        ]
    }

    #[test]
    fn product_selects_base_rows_only() {
        let components = select_components(&entries(), LineRef::Product(1));
        let ids: Vec<_> = components.iter().map(|c| c.material_id).collect();
        assert_eq!(ids, vec![10, 11]);
    }

    #[test]
    fn variant_does_not_inherit_product_rows() {
        let components = select_components(&entries(), LineRef::Variant(8));
        assert_eq!(
            components,
            vec![BomComponent {
                material_id: 13,
                quantity_per_unit: dec!(2)
            }]
        );
    }

    #[test]
    fn unknown_item_has_empty_bom() {
        assert!(select_components(&entries(), LineRef::Product(99)).is_empty());
        assert!(select_components(&entries(), LineRef::Variant(1)).is_empty());
    }
}
