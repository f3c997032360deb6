pub mod admin;
pub mod callback;
pub mod checkout;
pub mod health;
pub mod methods;

use std::sync::Arc;

use crate::client::PaymentClient;
use crate::config::AppConfig;
use crate::events::EventHooks;
use crate::logging::OperatorLog;
use crate::repositories::InMemoryStore;
use crate::services::admin::AdminService;
use crate::services::callback_reconciler::CallbackReconciler;
use crate::services::cart_assembler::CartAssembler;
use crate::services::checkout::CheckoutService;
use crate::services::gateway_registry::GatewaySelector;
use crate::services::order_request::{OrderRequestBuilder, PaymentService, ShopInfo};
use crate::settings::SettingsRepository;
use crate::webhooks::NotificationVerifier;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer used by the HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub settings: Arc<dyn SettingsRepository>,
    pub selector: Arc<GatewaySelector>,
    pub reconciler: Arc<CallbackReconciler>,
    pub checkout: Arc<CheckoutService>,
    pub payments: Arc<PaymentService>,
    pub admin: Arc<AdminService>,
    pub events: Arc<EventHooks>,
}

impl AppServices {
    /// Wires every service against the in-memory store.
    pub fn new(
        config: &AppConfig,
        store: Arc<InMemoryStore>,
        settings: Arc<dyn SettingsRepository>,
        client: Arc<dyn PaymentClient>,
        operator_log: Arc<dyn OperatorLog>,
    ) -> Self {
        let assembler = Arc::new(CartAssembler::new(store.clone(), store.clone(), store.clone()));
        let builder = OrderRequestBuilder::new(assembler, ShopInfo::from_config(config));

        let reconciler = CallbackReconciler::new(
            store.clone(),
            settings.clone(),
            operator_log.clone(),
            NotificationVerifier::new(config.notification_tolerance()),
        );

        Self {
            selector: Arc::new(GatewaySelector::new(store.clone())),
            reconciler: Arc::new(reconciler),
            checkout: Arc::new(CheckoutService::new(
                store.clone(),
                settings.clone(),
                client.clone(),
            )),
            payments: Arc::new(PaymentService::new(
                store.clone(),
                settings.clone(),
                client.clone(),
                builder,
                operator_log.clone(),
            )),
            admin: Arc::new(AdminService::new(
                store.clone(),
                settings.clone(),
                client.clone(),
                operator_log.clone(),
            )),
            events: Arc::new(EventHooks::new(store, settings.clone(), client, operator_log)),
            settings,
        }
    }
}
