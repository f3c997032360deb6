use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::MockServer;

use multisafepay_connector::{
    client::MultiSafepayClient,
    config::AppConfig,
    handlers::AppServices,
    logging::MemoryOperatorLog,
    models::{Address, Order, OrderProduct, OrderTotal},
    repositories::InMemoryStore,
    settings::{InMemorySettings, StoreSettings},
    AppState,
};

pub const ORDER_ID: i64 = 1045;
pub const API_KEY: &str = "test-key";

/// Application wired against in-memory repositories and a mocked vendor API.
pub struct TestApp {
    router: Router,
    pub store: Arc<InMemoryStore>,
    pub settings: Arc<InMemorySettings>,
    pub operator_log: Arc<MemoryOperatorLog>,
    pub vendor: MockServer,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(default_settings()).await
    }

    pub async fn with_settings(settings: StoreSettings) -> Self {
        let vendor = MockServer::start().await;

        let mut cfg = AppConfig::new("127.0.0.1".to_string(), 18_080, "test".to_string());
        cfg.shop_url = "https://shop.example.com/".to_string();
        cfg.live_api_base_url = format!("{}/live", vendor.uri());
        cfg.test_api_base_url = format!("{}/test", vendor.uri());

        let store = Arc::new(InMemoryStore::new());
        store.insert_order(sample_order());
        store.set_products(ORDER_ID, sample_products());
        store.set_totals(ORDER_ID, sample_totals());

        let settings = Arc::new(InMemorySettings::new().with_store(settings));
        let operator_log = Arc::new(MemoryOperatorLog::new());
        let client = MultiSafepayClient::from_config(&cfg).expect("client should build");

        let services = AppServices::new(
            &cfg,
            store.clone(),
            settings.clone(),
            Arc::new(client),
            operator_log.clone(),
        );
        let router = multisafepay_connector::app_router(AppState {
            config: cfg,
            services,
        });

        Self {
            router,
            store,
            settings,
            operator_log,
            vendor,
        }
    }

    /// Sends a JSON request (or none) and decodes the JSON answer.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                builder = builder.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request should build"))
            .await
            .expect("router should answer");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
        };
        (status, value)
    }

    /// Posts a raw notification body with optional `Auth` header.
    pub async fn notify(&self, uri: &str, body: &str, auth: Option<&str>) -> (StatusCode, String) {
        self.notify_raw(uri, body.as_bytes().to_vec(), auth).await
    }

    pub async fn notify_raw(
        &self,
        uri: &str,
        body: Vec<u8>,
        auth: Option<&str>,
    ) -> (StatusCode, String) {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header("Auth", auth);
        }
        let response = self
            .router
            .clone()
            .oneshot(builder.body(Body::from(body)).expect("request should build"))
            .await
            .expect("router should answer");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        (status, String::from_utf8_lossy(&bytes).to_string())
    }
}

/// Sandbox store with iDEAL and bank transfer enabled.
pub fn default_settings() -> StoreSettings {
    StoreSettings::default()
        .with("payment_multisafepay_status", json!("1"))
        .with("payment_multisafepay_environment", json!("1"))
        .with("payment_multisafepay_sandbox_api_key", json!(API_KEY))
        .with("payment_multisafepay_order_status_id_initialized", json!("1"))
        .with("payment_multisafepay_order_status_id_completed", json!("5"))
        .with("payment_multisafepay_order_status_id_cancelled", json!("7"))
        .with("payment_multisafepay_order_status_id_refunded", json!("11"))
        .with("payment_multisafepay_order_status_id_shipped", json!("3"))
        .with("payment_multisafepay_ideal_status", json!("1"))
        .with("payment_multisafepay_ideal_sort_order", json!("2"))
        .with("payment_multisafepay_banktrans_status", json!("1"))
        .with("payment_multisafepay_banktrans_sort_order", json!("1"))
        .with("total_sub_total_sort_order", json!("1"))
        .with("total_shipping_sort_order", json!("3"))
        .with("total_total_sort_order", json!("9"))
}

pub fn sample_order() -> Order {
    let address = Address {
        firstname: "Jan".into(),
        lastname: "Jansen".into(),
        address_1: "Kraanspoor 39".into(),
        city: "Amsterdam".into(),
        postcode: "1033SC".into(),
        country_id: 150,
        iso_code_2: "NL".into(),
        ..Default::default()
    };
    Order {
        order_id: ORDER_ID,
        firstname: "Jan".into(),
        lastname: "Jansen".into(),
        email: "jan@example.com".into(),
        telephone: "0208500500".into(),
        language_code: "nl-nl".into(),
        payment_address: address.clone(),
        shipping_address: address,
        payment_code: "multisafepay/ideal".into(),
        payment_method: "iDEAL".into(),
        shipping_code: "flat.flat".into(),
        shipping_method: "Flat Shipping Rate".into(),
        total: dec!(60),
        currency_code: "EUR".into(),
        currency_id: 3,
        currency_value: dec!(1),
        order_status_id: 1,
        ..Default::default()
    }
}

pub fn sample_products() -> Vec<OrderProduct> {
    vec![OrderProduct {
        order_product_id: 10,
        product_id: 1,
        name: "Shirt".into(),
        quantity: 2,
        price: dec!(25),
        total: dec!(50),
        tax: None,
        options: Vec::new(),
    }]
}

pub fn sample_totals() -> Vec<OrderTotal> {
    vec![
        OrderTotal {
            code: "sub_total".into(),
            title: "Sub-Total".into(),
            value: dec!(50),
            sort_order: 1,
        },
        OrderTotal {
            code: "shipping".into(),
            title: "Flat Shipping Rate".into(),
            value: dec!(10),
            sort_order: 3,
        },
        OrderTotal {
            code: "total".into(),
            title: "Total".into(),
            value: dec!(60),
            sort_order: 9,
        },
    ]
}

/// Vendor envelope around `data`.
pub fn envelope(data: Value) -> Value {
    json!({ "success": true, "data": data })
}
