//! Store settings as persisted by the storefront.
//!
//! Settings are flat key/value pairs scoped per store. Global keys look like
//! `payment_multisafepay_<field>`, per gateway keys like
//! `payment_multisafepay_<gateway code>_<field>` and order total extension
//! keys like `total_<code>_<field>`. Values follow the platform's loose
//! typing: numbers are often stored as strings and truthiness is PHP-like.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use crate::errors::ServiceError;

pub const KEY_PREFIX: &str = "payment_";
pub const SETTINGS_CODE: &str = "payment_multisafepay";

pub fn payment_key(field: &str) -> String {
    format!("{}_{}", SETTINGS_CODE, field)
}

pub fn gateway_key(gateway_code: &str, field: &str) -> String {
    format!("{}_{}_{}", SETTINGS_CODE, gateway_code, field)
}

pub fn total_key(total_code: &str, field: &str) -> String {
    format!("total_{}_{}", total_code, field)
}

/// PHP-style truthiness of a stored value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Values saved as JSON text (arrays and objects) are decoded on the way in.
fn decode_serialized(value: Value) -> Value {
    match value {
        Value::String(ref s) if s.starts_with('[') || s.starts_with('{') => {
            serde_json::from_str(s).unwrap_or(value)
        }
        other => other,
    }
}

/// Snapshot of one store's settings.
#[derive(Debug, Clone, Default)]
pub struct StoreSettings {
    store_id: i64,
    values: HashMap<String, Value>,
}

impl StoreSettings {
    pub fn new(store_id: i64, values: HashMap<String, Value>) -> Self {
        let values = values
            .into_iter()
            .map(|(key, value)| (key, decode_serialized(value)))
            .collect();
        Self { store_id, values }
    }

    pub fn store_id(&self) -> i64 {
        self.store_id
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), decode_serialized(value));
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(true) => Some("1".to_string()),
            Value::Bool(false) => Some(String::new()),
            other => Some(other.to_string()),
        }
    }

    /// Trimmed string value, `None` when absent or empty.
    pub fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get_str(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.values.get(key).map(is_truthy).unwrap_or(false)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn get_decimal(&self, key: &str) -> Option<Decimal> {
        match self.values.get(key)? {
            Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
            Value::String(s) => Decimal::from_str(s.trim()).ok(),
            _ => None,
        }
    }

    /// List of scalar entries rendered as strings.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            Some(Value::Number(n)) => vec![n.to_string()],
            _ => Vec::new(),
        }
    }

    /// Sort order of a setting; missing or unparsable counts as 0.
    pub fn sort_order(&self, key: &str) -> i64 {
        self.get_i64(key).unwrap_or(0)
    }

    pub fn payment(&self, field: &str) -> Option<String> {
        self.get_str(&payment_key(field))
    }

    pub fn payment_flag(&self, field: &str) -> bool {
        self.get_bool(&payment_key(field))
    }

    pub fn gateway_flag(&self, gateway_code: &str, field: &str) -> bool {
        self.get_bool(&gateway_key(gateway_code, field))
    }

    pub fn debug_mode(&self) -> bool {
        self.payment_flag("debug_mode")
    }

    /// Sandbox when `environment` is truthy.
    pub fn is_test_mode(&self) -> bool {
        self.payment_flag("environment")
    }

    /// API key of the active environment.
    pub fn api_key(&self) -> String {
        let field = if self.is_test_mode() {
            "sandbox_api_key"
        } else {
            "api_key"
        };
        self.payment(field).unwrap_or_default()
    }

    /// Order status mapped to a vendor status; 0 when not configured.
    pub fn order_status_id(&self, status: &str) -> i64 {
        self.get_i64(&payment_key(&format!("order_status_id_{}", status)))
            .unwrap_or(0)
    }

    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn store_settings(&self, store_id: i64) -> Result<StoreSettings, ServiceError>;

    /// Replaces every key starting with `prefix` by `values`.
    async fn save(
        &self,
        store_id: i64,
        prefix: &str,
        values: HashMap<String, Value>,
    ) -> Result<(), ServiceError>;
}

/// Settings kept in memory, one map per store.
#[derive(Default)]
pub struct InMemorySettings {
    stores: DashMap<i64, HashMap<String, Value>>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(self, settings: StoreSettings) -> Self {
        self.stores
            .insert(settings.store_id(), settings.values().clone());
        self
    }

    pub fn set(&self, store_id: i64, key: &str, value: Value) {
        self.stores
            .entry(store_id)
            .or_default()
            .insert(key.to_string(), decode_serialized(value));
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettings {
    async fn store_settings(&self, store_id: i64) -> Result<StoreSettings, ServiceError> {
        let values = self
            .stores
            .get(&store_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        Ok(StoreSettings::new(store_id, values))
    }

    async fn save(
        &self,
        store_id: i64,
        prefix: &str,
        values: HashMap<String, Value>,
    ) -> Result<(), ServiceError> {
        let mut entry = self.stores.entry(store_id).or_default();
        entry.retain(|key, _| !key.starts_with(prefix));
        for (key, value) in values {
            if key.starts_with(prefix) {
                entry.insert(key, decode_serialized(value));
            }
        }
        Ok(())
    }
}
