//! Merchant-side actions: refunds, status pushes, the order tab and the
//! settings form.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::client::{ApiCredentials, OrderUpdate, PaymentClient, RefundCheckoutData, RefundItem, RefundRequest};
use crate::errors::ServiceError;
use crate::logging::OperatorLog;
use crate::models::{Order, OrderHistory, Transaction, TransactionStatus};
use crate::repositories::OrderRepository;
use crate::services::gateway_registry;
use crate::services::texts::{self, log};
use crate::settings::{payment_key, SettingsRepository, StoreSettings, SETTINGS_CODE};

/// JSON answer of an admin action: `{"success": ..}` or `{"error": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionResult {
    Success(String),
    Error(String),
}

impl ActionResult {
    /// Lookup and vendor failures are shown on the order page as is.
    fn failed(order_id: i64, err: ServiceError) -> Self {
        warn!(order_id, error = %err, "Admin action failed");
        Self::Error(err.to_string())
    }
}

/// Answer of the settings form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsResult {
    Success(String),
    Error(BTreeMap<String, String>),
}

/// Vendor status change a merchant can push from the order page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Cancelled,
    Shipped,
}

impl StatusChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Shipped => "shipped",
        }
    }

    fn success_text(&self) -> &'static str {
        match self {
            Self::Cancelled => texts::CANCELLED_SUCCESS,
            Self::Shipped => texts::SHIPPED_SUCCESS,
        }
    }
}

impl std::str::FromStr for StatusChange {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cancelled" => Ok(Self::Cancelled),
            "shipped" => Ok(Self::Shipped),
            other => Err(ServiceError::InvalidInput(format!(
                "unsupported status change '{}'",
                other
            ))),
        }
    }
}

/// Data for the MultiSafepay tab on the admin order page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub order_id: i64,
    pub status: TransactionStatus,
    pub total: String,
}

pub struct AdminService {
    orders: Arc<dyn OrderRepository>,
    settings: Arc<dyn SettingsRepository>,
    client: Arc<dyn PaymentClient>,
    operator_log: Arc<dyn OperatorLog>,
}

impl AdminService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        settings: Arc<dyn SettingsRepository>,
        client: Arc<dyn PaymentClient>,
        operator_log: Arc<dyn OperatorLog>,
    ) -> Self {
        Self {
            orders,
            settings,
            client,
            operator_log,
        }
    }

    async fn load(&self, order_id: i64) -> Result<(Order, StoreSettings), ServiceError> {
        let order = self
            .orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;
        let settings = self.settings.store_settings(order.store_id).await?;
        Ok((order, settings))
    }

    /// Refunds the whole vendor transaction of `order_id`.
    #[instrument(skip(self))]
    pub async fn refund_order(&self, order_id: i64) -> Result<ActionResult, ServiceError> {
        let (order, settings) = match self.load(order_id).await {
            Ok(loaded) => loaded,
            Err(err) => return Ok(ActionResult::failed(order_id, err)),
        };
        let credentials = ApiCredentials::from_settings(&settings);

        let transaction = match self.client.get_order(&credentials, &order_id.to_string()).await {
            Ok(Some(transaction)) => transaction,
            Ok(None) => {
                warn!(order_id, "No vendor transaction to refund");
                return Ok(ActionResult::Error(texts::REFUND_ERROR.to_string()));
            }
            Err(err) => return Ok(ActionResult::failed(order_id, err)),
        };

        let description = texts::refund_description(order_id, &texts::timestamp(Utc::now()));
        let refund = RefundRequest {
            currency: transaction.currency.clone(),
            amount: transaction.amount,
            description: description.clone(),
            checkout_data: refund_with_cart(&order, &transaction, &settings).then(|| RefundCheckoutData {
                items: transaction
                    .cart_items()
                    .iter()
                    .map(|item| RefundItem {
                        merchant_item_id: item.merchant_item_id.clone(),
                        quantity: -item.quantity.abs(),
                    })
                    .collect(),
            }),
        };

        if let Err(err) = self
            .client
            .refund_order(&credentials, &order_id.to_string(), &refund)
            .await
        {
            warn!(order_id, error = %err, "Refund rejected");
            if settings.debug_mode() {
                self.operator_log.write(&err.to_string());
            }
            counter!("multisafepay.refunds.failed", 1);
            return Ok(ActionResult::Error(texts::REFUND_ERROR.to_string()));
        }

        self.orders.remove_redemptions(order_id).await?;
        self.orders
            .add_history(OrderHistory::new(
                order_id,
                settings.order_status_id("refunded"),
                description,
                false,
            ))
            .await?;

        counter!("multisafepay.refunds.processed", 1);
        info!(order_id, amount = transaction.amount, "Order refunded");
        Ok(ActionResult::Success(texts::REFUND_SUCCESS.to_string()))
    }

    /// Pushes `change` to the vendor and records it in the order history.
    #[instrument(skip(self))]
    pub async fn change_order_status(
        &self,
        order_id: i64,
        change: StatusChange,
    ) -> Result<ActionResult, ServiceError> {
        let (_, settings) = match self.load(order_id).await {
            Ok(loaded) => loaded,
            Err(err) => return Ok(ActionResult::failed(order_id, err)),
        };
        let credentials = ApiCredentials::from_settings(&settings);

        let update = OrderUpdate {
            status: Some(change.as_str().to_string()),
            ..Default::default()
        };
        if let Err(err) = self
            .client
            .update_order(&credentials, &order_id.to_string(), &update)
            .await
        {
            return Ok(ActionResult::failed(order_id, err));
        }

        let status_id = settings.order_status_id(change.as_str());
        if settings.debug_mode() {
            self.operator_log
                .write(&log::status_pushed(change.as_str(), order_id, status_id));
        }
        self.orders
            .add_history(OrderHistory::new(
                order_id,
                status_id,
                texts::status_change_description(change.as_str()),
                false,
            ))
            .await?;

        info!(order_id, status = change.as_str(), "Vendor status updated");
        Ok(ActionResult::Success(change.success_text().to_string()))
    }

    /// `None` when the vendor has no transaction for the order.
    #[instrument(skip(self))]
    pub async fn order_summary(&self, order_id: i64) -> Result<Option<OrderSummary>, ServiceError> {
        let (_, settings) = self.load(order_id).await?;
        let credentials = ApiCredentials::from_settings(&settings);

        let transaction = match self.client.get_order(&credentials, &order_id.to_string()).await? {
            Some(transaction) if !transaction.transaction_id.is_empty() => transaction,
            _ => return Ok(None),
        };

        let total = Decimal::new(transaction.amount, 2);
        Ok(Some(OrderSummary {
            order_id,
            total: texts::format_price(total, &transaction.currency, Decimal::ONE),
            status: transaction.status,
        }))
    }

    /// Validates and stores the settings form of `store_id`.
    #[instrument(skip(self, form))]
    pub async fn save_settings(
        &self,
        store_id: i64,
        form: HashMap<String, Value>,
    ) -> Result<SettingsResult, ServiceError> {
        let errors = validate_settings(&form);
        if !errors.is_empty() {
            return Ok(SettingsResult::Error(errors));
        }

        self.settings.save(store_id, SETTINGS_CODE, form).await?;
        info!(store_id, "Settings saved");
        Ok(SettingsResult::Success(texts::SETTINGS_SAVED.to_string()))
    }
}

/// Refunds on the generic gateway (when configured) and on gateways with a
/// mandatory shopping cart must name the refunded items.
fn refund_with_cart(order: &Order, transaction: &Transaction, settings: &StoreSettings) -> bool {
    let generic = gateway_registry::by_id("GENERIC");
    if let Some(generic) = generic {
        if order.payment_code.contains(generic.route)
            && settings.gateway_flag(generic.code, "require_shopping_cart")
        {
            return true;
        }
    }
    transaction.requires_shopping_cart()
}

fn form_str(form: &HashMap<String, Value>, field: &str) -> Option<String> {
    form.get(&payment_key(field)).map(|value| match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) | Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Field errors of the settings form, with a `warning` when there are any.
pub fn validate_settings(form: &HashMap<String, Value>) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    let environment = form_str(form, "environment").unwrap_or_default();

    if environment == "1" && form_str(form, "sandbox_api_key").unwrap_or_default().is_empty() {
        errors.insert("sandbox_api_key".to_string(), texts::ERROR_EMPTY_API_KEY.to_string());
    }
    if environment == "0" && form_str(form, "api_key").unwrap_or_default().is_empty() {
        errors.insert("api_key".to_string(), texts::ERROR_EMPTY_API_KEY.to_string());
    }

    let days_active = form_str(form, "days_active")
        .and_then(|days| days.trim().parse::<i64>().ok())
        .unwrap_or(0);
    if days_active < 1 {
        errors.insert("days_active".to_string(), texts::ERROR_DAYS_ACTIVE.to_string());
    }

    if !errors.is_empty() {
        errors.insert("warning".to_string(), texts::ERROR_CHECK_FORM.to_string());
    }
    errors
}
