use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use crate::errors::ServiceError;
use crate::logging::OperatorLog;
use crate::models::{GatewayDescriptor, Order, OrderHistory, Transaction, TransactionStatus};
use crate::repositories::OrderRepository;
use crate::services::gateway_registry;
use crate::services::texts::{self, log};
use crate::settings::{gateway_key, SettingsRepository, StoreSettings};
use crate::webhooks::NotificationVerifier;

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// A vendor status notification as received over HTTP.
#[derive(Debug, Clone, Default)]
pub struct CallbackRequest {
    /// `transactionid` query parameter, the storefront order id
    pub transaction_id: Option<String>,
    pub timestamp: Option<String>,
    pub body: String,
    /// Value of the `Auth` header
    pub auth: Option<String>,
}

/// What a notification did to the order. The HTTP reply is the same for all
/// of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    MissingArguments,
    NotMultiSafepay,
    EmptyBody,
    OrderNotFound,
    InvalidSignature,
    MalformedPayload,
    /// History appended with the mapped status
    Transitioned { order_status_id: i64 },
    /// Status mapped to "do nothing"; recorded in debug mode only
    NotProcessed,
    /// Order already carries the mapped status
    Unchanged,
}

impl CallbackOutcome {
    fn metric(&self) -> &'static str {
        match self {
            Self::MissingArguments => "multisafepay.callbacks.missing_arguments",
            Self::NotMultiSafepay => "multisafepay.callbacks.not_multisafepay",
            Self::EmptyBody => "multisafepay.callbacks.empty_body",
            Self::OrderNotFound => "multisafepay.callbacks.order_not_found",
            Self::InvalidSignature => "multisafepay.callbacks.invalid_signature",
            Self::MalformedPayload => "multisafepay.callbacks.malformed_payload",
            Self::Transitioned { .. } => "multisafepay.callbacks.transitioned",
            Self::NotProcessed => "multisafepay.callbacks.not_processed",
            Self::Unchanged => "multisafepay.callbacks.unchanged",
        }
    }
}

/// Applies vendor notifications to the storefront's order history.
pub struct CallbackReconciler {
    orders: Arc<dyn OrderRepository>,
    settings: Arc<dyn SettingsRepository>,
    operator_log: Arc<dyn OperatorLog>,
    verifier: NotificationVerifier,
    clock: Clock,
}

impl CallbackReconciler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        settings: Arc<dyn SettingsRepository>,
        operator_log: Arc<dyn OperatorLog>,
        verifier: NotificationVerifier,
    ) -> Self {
        Self {
            orders,
            settings,
            operator_log,
            verifier,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Runs the notification through the guards and applies it. Collaborator
    /// failures are returned; everything the vendor sent is an outcome.
    #[instrument(skip(self, request), fields(transaction_id = ?request.transaction_id))]
    pub async fn handle(&self, request: &CallbackRequest) -> Result<CallbackOutcome, ServiceError> {
        let outcome = self.reconcile(request).await?;
        counter!(outcome.metric(), 1);
        info!(?outcome, "Notification handled");
        Ok(outcome)
    }

    async fn reconcile(&self, request: &CallbackRequest) -> Result<CallbackOutcome, ServiceError> {
        let (Some(transaction_id), Some(_)) = (
            non_empty(request.transaction_id.as_deref()),
            non_empty(request.timestamp.as_deref()),
        ) else {
            self.operator_log.write(log::MISSING_ARGUMENTS);
            return Ok(CallbackOutcome::MissingArguments);
        };

        let order_id = transaction_id.trim().parse::<i64>().unwrap_or(0);
        let order = self.orders.find_order(order_id).await?;
        if let Some(order) = order.as_ref().filter(|order| !order.is_multisafepay()) {
            debug!(payment_code = %order.payment_code, "Order paid with another extension");
            self.operator_log.write(log::NOT_MULTISAFEPAY);
            return Ok(CallbackOutcome::NotMultiSafepay);
        }

        if request.body.trim().is_empty() {
            self.operator_log.write(log::EMPTY_BODY);
            return Ok(CallbackOutcome::EmptyBody);
        }

        let Some(order) = order else {
            warn!(order_id, "Notification for an unknown order");
            self.operator_log.write(&log::no_transaction(order_id));
            return Ok(CallbackOutcome::OrderNotFound);
        };

        let settings = self.settings.store_settings(order.store_id).await?;
        let now = (self.clock)();
        let now_secs = now.timestamp_millis() as f64 / 1000.0;
        if let Err(err) = self.verifier.verify_at(
            &request.body,
            request.auth.as_deref(),
            &settings.api_key(),
            now_secs,
        ) {
            warn!(order_id, error = %err, "Notification signature rejected");
            self.operator_log.write(&log::invalid_signature(order_id));
            return Ok(CallbackOutcome::InvalidSignature);
        }

        let transaction: Transaction = match serde_json::from_str(&request.body) {
            Ok(transaction) => transaction,
            Err(err) => {
                warn!(order_id, error = %err, "Notification body is not a transaction");
                self.operator_log.write(&log::no_transaction(order_id));
                return Ok(CallbackOutcome::MalformedPayload);
            }
        };

        self.apply(&order, &transaction, &settings, now).await
    }

    async fn apply(
        &self,
        order: &Order,
        transaction: &Transaction,
        settings: &StoreSettings,
        now: DateTime<Utc>,
    ) -> Result<CallbackOutcome, ServiceError> {
        let order_id = order.order_id;
        let at = texts::timestamp(now);
        let status = transaction.status.as_str();
        let psp_id = transaction.transaction_id.as_str();
        let current = order.order_status_id;

        let gateway = gateway_registry::resolve_vendor_code(transaction.gateway_id(), settings);
        let target = target_status(&transaction.status, gateway, settings);

        match gateway {
            Some(gateway) if gateway.route != order.payment_code => {
                self.operator_log.write(&log::method_changed(
                    order_id,
                    &at,
                    status,
                    psp_id,
                    &order.payment_method,
                    gateway.description,
                ));
                self.orders
                    .update_payment_method(order_id, gateway.route, gateway.description)
                    .await?;
            }
            Some(_) => {}
            None => {
                self.operator_log
                    .write(&log::unregistered_method(order_id, &at, status, psp_id));
            }
        }

        if target != 0 && target != current {
            if settings.debug_mode() {
                self.operator_log
                    .write(&log::callback_received(order_id, &at, status, psp_id));
            }
            let comment = if current != 0 {
                texts::callback_comment(order_id, &at, status, psp_id)
            } else {
                String::new()
            };
            self.orders
                .add_history(history(order_id, target, comment, true, now))
                .await?;
            return Ok(CallbackOutcome::Transitioned {
                order_status_id: target,
            });
        }

        if target == 0 && current != 0 {
            if settings.debug_mode() {
                let comment = texts::callback_comment(order_id, &at, status, psp_id);
                self.orders
                    .add_history(history(order_id, current, comment, false, now))
                    .await?;
                self.operator_log.write(&log::not_processed(order_id));
            }
            return Ok(CallbackOutcome::NotProcessed);
        }

        Ok(CallbackOutcome::Unchanged)
    }
}

fn history(order_id: i64, status_id: i64, comment: String, notify: bool, at: DateTime<Utc>) -> OrderHistory {
    OrderHistory {
        date_added: at,
        ..OrderHistory::new(order_id, status_id, comment, notify)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

/// Storefront status a vendor status maps to; 0 means "leave the order
/// alone".
pub fn target_status(
    status: &TransactionStatus,
    gateway: Option<&GatewayDescriptor>,
    settings: &StoreSettings,
) -> i64 {
    match status {
        TransactionStatus::Initialized => gateway
            .and_then(|gateway| {
                settings.get_i64(&gateway_key(gateway.code, "order_status_id_initialized"))
            })
            .filter(|status_id| *status_id != 0)
            .unwrap_or_else(|| settings.order_status_id("initialized")),
        TransactionStatus::Unknown(_) => settings.order_status_id("initialized"),
        known => settings.order_status_id(known.as_str()),
    }
}
