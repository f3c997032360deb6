use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::EnumString;

use super::gateway;

/// Vendor transaction status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStatus {
    Initialized,
    Completed,
    Uncleared,
    Reserved,
    Void,
    Cancelled,
    Declined,
    Reversed,
    Refunded,
    PartialRefunded,
    Expired,
    Shipped,
    #[strum(default)]
    Unknown(String),
}

impl TransactionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initialized => "initialized",
            Self::Completed => "completed",
            Self::Uncleared => "uncleared",
            Self::Reserved => "reserved",
            Self::Void => "void",
            Self::Cancelled => "cancelled",
            Self::Declined => "declined",
            Self::Reversed => "reversed",
            Self::Refunded => "refunded",
            Self::PartialRefunded => "partial_refunded",
            Self::Expired => "expired",
            Self::Shipped => "shipped",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(raw: String) -> Self {
        raw.parse()
            .unwrap_or_else(|_| TransactionStatus::Unknown(raw.clone()))
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TransactionStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransactionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(TransactionStatus::from(String::deserialize(deserializer)?))
    }
}

impl Default for TransactionStatus {
    fn default() -> Self {
        TransactionStatus::Unknown(String::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentDetails {
    /// Vendor gateway id used for the payment, e.g. `IDEAL`
    #[serde(rename = "type")]
    pub gateway_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub account_holder_name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub recurring_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionCartItem {
    #[serde(deserialize_with = "string_or_number")]
    pub merchant_item_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionCart {
    pub items: Vec<TransactionCartItem>,
}

/// A vendor transaction as delivered by notifications and `GET /orders/{id}`.
/// Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    /// PSP id
    #[serde(deserialize_with = "string_or_number")]
    pub transaction_id: String,
    pub status: TransactionStatus,
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub payment_details: PaymentDetails,
    pub shopping_cart: Option<TransactionCart>,
}

impl Transaction {
    pub fn gateway_id(&self) -> &str {
        &self.payment_details.gateway_id
    }

    pub fn requires_shopping_cart(&self) -> bool {
        gateway::requires_shopping_cart(self.gateway_id())
    }

    pub fn cart_items(&self) -> &[TransactionCartItem] {
        self.shopping_cart
            .as_ref()
            .map(|cart| cart.items.as_slice())
            .unwrap_or(&[])
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("completed", TransactionStatus::Completed)]
    #[case("partial_refunded", TransactionStatus::PartialRefunded)]
    #[case("initialized", TransactionStatus::Initialized)]
    #[case("chargedback", TransactionStatus::Unknown("chargedback".into()))]
    fn parses_vendor_statuses(#[case] raw: &str, #[case] expected: TransactionStatus) {
        assert_eq!(TransactionStatus::from(raw.to_string()), expected);
        assert_eq!(expected.as_str(), raw);
    }

    #[test]
    fn parses_notification_leniently() {
        let body = r#"{
            "order_id": "1045",
            "transaction_id": 4051823,
            "status": "completed",
            "amount": 2420,
            "currency": "EUR",
            "payment_details": {"type": "IDEAL", "account_holder_name": null},
            "shopping_cart": {"items": [{"merchant_item_id": 40, "quantity": 2, "name": "Shirt"}]},
            "var1": null,
            "costs": []
        }"#;
        let transaction: Transaction = serde_json::from_str(body).unwrap();
        assert_eq!(transaction.order_id, "1045");
        assert_eq!(transaction.transaction_id, "4051823");
        assert_eq!(transaction.status, TransactionStatus::Completed);
        assert_eq!(transaction.gateway_id(), "IDEAL");
        assert_eq!(transaction.cart_items()[0].merchant_item_id, "40");
        assert!(!transaction.requires_shopping_cart());
    }
}
