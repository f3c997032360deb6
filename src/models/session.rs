use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::Coupon;

/// Per-request customer session state the storefront holds during checkout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutSession {
    pub coupon: Option<Coupon>,
    /// Reward points the customer redeems on this order
    pub reward_points: Decimal,
    /// Store credit balance of the logged in customer
    pub customer_balance: Decimal,
    pub customer_id: i64,
    pub customer_group_id: Option<i64>,
    pub logged_in: bool,
}
