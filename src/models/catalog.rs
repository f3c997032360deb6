use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductInfo {
    pub product_id: i64,
    pub tax_class_id: i64,
    pub weight: Decimal,
    /// Unit of the product's weight class, e.g. `kg`
    pub weight_unit: String,
    /// Reward points needed to buy one unit
    pub points: i64,
}

/// Platform tax rate type: `P` (percentage) or `F` (fixed amount).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxRateKind {
    #[serde(rename = "P")]
    Percentage,
    #[serde(rename = "F")]
    Fixed,
}

/// A rate applicable to an amount under a tax class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRate {
    pub tax_rate_id: i64,
    pub name: String,
    pub rate: Decimal,
    pub kind: TaxRateKind,
    /// Tax amount for the queried base amount
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CouponKind {
    #[serde(rename = "P")]
    Percentage,
    #[serde(rename = "F")]
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub coupon_id: i64,
    pub code: String,
    pub name: String,
    pub kind: CouponKind,
    pub discount: Decimal,
    /// Free shipping waiver
    #[serde(default)]
    pub shipping: bool,
    /// Products the coupon is restricted to; empty means the whole cart
    #[serde(default)]
    pub product_ids: Vec<i64>,
}

impl Coupon {
    pub fn is_restricted(&self) -> bool {
        !self.product_ids.is_empty()
    }

    pub fn applies_to(&self, product_id: i64) -> bool {
        self.product_ids.contains(&product_id)
    }
}
