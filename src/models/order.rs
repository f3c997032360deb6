use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Postal address attached to an order (payment or shipping side).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub firstname: String,
    pub lastname: String,
    pub company: String,
    pub address_1: String,
    pub address_2: String,
    pub city: String,
    pub postcode: String,
    /// Zone (state / province) name
    pub zone: String,
    pub zone_id: i64,
    pub country_id: i64,
    pub iso_code_2: String,
}

/// A storefront order as the platform stores it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub order_id: i64,
    pub store_id: i64,
    pub invoice_no: i64,
    pub invoice_prefix: String,
    pub customer_id: i64,
    pub customer_group_id: i64,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub telephone: String,
    pub ip: String,
    pub forwarded_ip: String,
    pub user_agent: String,
    pub language_code: String,
    pub payment_address: Address,
    pub shipping_address: Address,
    /// Route of the selected payment method, e.g. `multisafepay/ideal`
    pub payment_code: String,
    pub payment_method: String,
    /// `<shipping extension>.<option>`, e.g. `flat.flat`
    pub shipping_code: String,
    pub shipping_method: String,
    pub total: Decimal,
    pub currency_code: String,
    pub currency_id: i64,
    pub currency_value: Decimal,
    pub order_status_id: i64,
}

impl Order {
    pub fn is_multisafepay(&self) -> bool {
        self.payment_code.contains("multisafepay")
    }

    pub fn requires_delivery(&self) -> bool {
        !self.shipping_method.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    #[default]
    Select,
    Radio,
    Checkbox,
    Text,
    Textarea,
    /// `value` holds an upload code, resolved through the catalog
    File,
    Date,
    Time,
    Datetime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderOption {
    pub order_option_id: i64,
    pub product_option_id: i64,
    pub name: String,
    pub value: String,
    pub kind: OptionKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderProduct {
    pub order_product_id: i64,
    pub product_id: i64,
    pub name: String,
    pub quantity: i64,
    /// Unit price before tax, in the store's default currency
    pub price: Decimal,
    /// `price * quantity`
    pub total: Decimal,
    /// Tax amount recorded on the line; `Some(0)` means taxes were removed
    pub tax: Option<Decimal>,
    pub options: Vec<OrderOption>,
}

/// One line of the order totals (sub_total, shipping, coupon, tax, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderTotal {
    pub code: String,
    pub title: String,
    pub value: Decimal,
    pub sort_order: i64,
}

/// Gift voucher bought as part of the order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderVoucher {
    pub order_voucher_id: i64,
    pub description: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderHistory {
    pub order_id: i64,
    pub order_status_id: i64,
    pub comment: String,
    pub notify: bool,
    pub date_added: DateTime<Utc>,
}

impl OrderHistory {
    pub fn new(order_id: i64, order_status_id: i64, comment: impl Into<String>, notify: bool) -> Self {
        Self {
            order_id,
            order_status_id,
            comment: comment.into(),
            notify,
            date_added: Utc::now(),
        }
    }
}
