use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

use super::{MaterialId, OrderLine, RuleId};
use crate::errors::ServiceError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AppliesTo {
    All,
    Specific,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeductionType {
    PerOrder,
    PerItem,
}

/// Auxiliary material (box, tape, tissue) drawn for an order independent of BOM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PackagingRule {
    pub id: RuleId,
    pub name: String,
    pub is_active: bool,
    pub applies_to: AppliesTo,
    /// Product or variant ids; only read when `applies_to` is `specific`.
    pub target_product_ids: Vec<i32>,
    pub material_id: MaterialId,
    pub deduction_type: DeductionType,
    /// Used when the order holds a single item.
    pub quantity_single: Decimal,
    /// Used when the order holds more than one item.
    pub quantity_multiple: Decimal,
}

impl PackagingRule {
    /// True for `all` rules, or `specific` rules naming any line's product or variant.
    pub fn applies_to_order(&self, lines: &[OrderLine]) -> bool {
        match self.applies_to {
            AppliesTo::All => true,
            AppliesTo::Specific => lines.iter().any(|line| {
                line.product_id
                    .map_or(false, |id| self.target_product_ids.contains(&id))
                    || line
                        .variant_id
                        .map_or(false, |id| self.target_product_ids.contains(&id))
            }),
        }
    }

    /// Quantity to draw for an order of `total_item_count` items. Zero or
    /// less means the rule is skipped; `None` when a per-item product
    /// overflows the decimal range.
    pub fn quantity_for(&self, total_item_count: i64) -> Option<Decimal> {
        let base = if total_item_count <= 1 {
            self.quantity_single
        } else {
            self.quantity_multiple
        };

        match self.deduction_type {
            DeductionType::PerOrder => Some(base),
            DeductionType::PerItem => base.checked_mul(Decimal::from(total_item_count)),
        }
    }
}

/// Admin input for a new rule.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewPackagingRule {
    pub name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub applies_to: AppliesTo,
    #[serde(default)]
    pub target_product_ids: Vec<i32>,
    pub material_id: MaterialId,
    pub deduction_type: DeductionType,
    pub quantity_single: Decimal,
    pub quantity_multiple: Decimal,
}

fn default_active() -> bool {
    true
}

impl NewPackagingRule {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "packaging rule name must not be blank".to_string(),
            ));
        }
        if self.applies_to == AppliesTo::Specific && self.target_product_ids.is_empty() {
            return Err(ServiceError::ValidationError(
                "a specific packaging rule needs at least one target product".to_string(),
            ));
        }
        if self.quantity_single.is_sign_negative() || self.quantity_multiple.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "packaging quantities must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
pub trait PackagingRuleSet: Send + Sync {
    async fn active_rules(&self) -> Result<Vec<PackagingRule>, ServiceError>;

    async fn all_rules(&self) -> Result<Vec<PackagingRule>, ServiceError>;

    async fn create_rule(&self, rule: NewPackagingRule) -> Result<PackagingRule, ServiceError>;

    async fn set_rule_active(
        &self,
        rule_id: RuleId,
        is_active: bool,
    ) -> Result<PackagingRule, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn rule(deduction_type: DeductionType, single: Decimal, multiple: Decimal) -> PackagingRule {
        PackagingRule {
            id: 1,
            name: "Mailer box".into(),
            is_active: true,
            applies_to: AppliesTo::All,
            target_product_ids: vec![],
            material_id: 40,
            deduction_type,
            quantity_single: single,
            quantity_multiple: multiple,
        }
    }

    fn line(product_id: Option<i32>, variant_id: Option<i32>, quantity: i32) -> OrderLine {
        OrderLine {
            order_id: 1,
            product_id,
            variant_id,
            quantity,
            unit_price: dec!(10),
        }
    }

    #[rstest]
    #[case(DeductionType::PerOrder, 1, dec!(1))]
    #[case(DeductionType::PerOrder, 3, dec!(2))]
    #[case(DeductionType::PerItem, 1, dec!(1))]
    #[case(DeductionType::PerItem, 3, dec!(6))]
    #[case(DeductionType::PerItem, 0, dec!(0))]
    fn quantity_for_order_shape(
        #[case] deduction_type: DeductionType,
        #[case] items: i64,
        #[case] expected: Decimal,
    ) {
        let rule = rule(deduction_type, dec!(1), dec!(2));
        assert_eq!(rule.quantity_for(items), Some(expected));
    }

    #[test]
    fn per_item_quantity_overflow_is_reported() {
        let per_item = rule(DeductionType::PerItem, dec!(1), Decimal::MAX);
        assert_eq!(per_item.quantity_for(2), None);

        let per_order = rule(DeductionType::PerOrder, dec!(1), Decimal::MAX);
        assert_eq!(per_order.quantity_for(2), Some(Decimal::MAX));
    }

    #[test]
    fn specific_rule_ignores_other_products() {
        let mut rule = rule(DeductionType::PerOrder, dec!(1), dec!(1));
        rule.applies_to = AppliesTo::Specific;
        rule.target_product_ids = vec![7];

        let lines = vec![line(Some(8), None, 1), line(Some(9), None, 2)];
        assert!(!rule.applies_to_order(&lines));

        let lines = vec![line(Some(8), None, 1), line(None, Some(7), 1)];
        assert!(rule.applies_to_order(&lines));
    }

    #[test]
    fn all_rule_applies_to_any_order() {
        let rule = rule(DeductionType::PerOrder, dec!(1), dec!(1));
        assert!(rule.applies_to_order(&[line(Some(3), None, 1)]));
    }

    #[test]
    fn enums_round_trip_through_storage_strings() {
        assert_eq!(AppliesTo::Specific.to_string(), "specific");
        assert_eq!("per_item".parse::<DeductionType>().unwrap(), DeductionType::PerItem);
        assert!("weekly".parse::<DeductionType>().is_err());
    }

    #[test]
    fn new_rule_validation() {
        let mut input = NewPackagingRule {
            name: "Tissue".into(),
            is_active: true,
            applies_to: AppliesTo::Specific,
            target_product_ids: vec![],
            material_id: 3,
            deduction_type: DeductionType::PerOrder,
            quantity_single: dec!(1),
            quantity_multiple: dec!(1),
        };
        assert!(input.validate().is_err());

        input.target_product_ids = vec![2];
        assert!(input.validate().is_ok());

        input.quantity_multiple = dec!(-1);
        assert!(input.validate().is_err());
    }

    proptest! {
        #[test]
        fn per_item_scales_per_order_base(items in 2i64..500, multiple in 0i64..50) {
            let per_order = rule(DeductionType::PerOrder, dec!(1), Decimal::from(multiple));
            let per_item = rule(DeductionType::PerItem, dec!(1), Decimal::from(multiple));
            prop_assert_eq!(
                per_item.quantity_for(items),
                per_order.quantity_for(items).map(|base| base * Decimal::from(items))
            );
        }
    }
}
