use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{CatalogRepository, GeoZoneRepository, OrderRepository, TaxRateLookup};
use crate::errors::ServiceError;
use crate::models::{
    Order, OrderHistory, OrderProduct, OrderTotal, OrderVoucher, ProductInfo, TaxRate,
    TaxRateKind,
};
use crate::settings::{InMemorySettings, StoreSettings};

/// Kind of balance an order consumed when it was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionKind {
    Coupon,
    Voucher,
    Reward,
    CustomerTransaction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redemption {
    pub kind: RedemptionKind,
    pub amount: Decimal,
}

/// A rate attached to a tax class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRule {
    pub tax_rate_id: i64,
    pub name: String,
    pub rate: Decimal,
    #[serde(rename = "type")]
    pub kind: TaxRateKind,
}

impl TaxRule {
    fn apply(&self, amount: Decimal) -> TaxRate {
        let tax = match self.kind {
            TaxRateKind::Percentage => amount * self.rate / dec!(100),
            TaxRateKind::Fixed => self.rate,
        };
        TaxRate {
            tax_rate_id: self.tax_rate_id,
            name: self.name.clone(),
            rate: self.rate,
            kind: self.kind,
            amount: tax,
        }
    }
}

/// Zone row of a geo zone; `zone_id` 0 covers every zone of the country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRow {
    pub country_id: i64,
    #[serde(default)]
    pub zone_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedOrder {
    pub order: Order,
    pub products: Vec<OrderProduct>,
    pub totals: Vec<OrderTotal>,
    pub vouchers: Vec<OrderVoucher>,
    pub history: Vec<OrderHistory>,
    pub redemptions: Vec<Redemption>,
}

/// Fixture document used to populate the in-memory store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub orders: Vec<SeedOrder>,
    pub products: Vec<ProductInfo>,
    pub uploads: HashMap<String, String>,
    pub total_codes: Vec<String>,
    pub tax_classes: HashMap<i64, Vec<TaxRule>>,
    pub geo_zones: HashMap<i64, Vec<ZoneRow>>,
    pub settings: HashMap<i64, HashMap<String, Value>>,
}

impl SeedData {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            ServiceError::InternalError(format!("cannot read seed {}: {}", path.display(), e))
        })?;
        let seed: SeedData = serde_json::from_str(&raw)?;
        info!(
            orders = seed.orders.len(),
            products = seed.products.len(),
            "Loaded seed data from {}",
            path.display()
        );
        Ok(seed)
    }

    pub fn settings(&self) -> InMemorySettings {
        self.settings
            .iter()
            .fold(InMemorySettings::new(), |repo, (store_id, values)| {
                repo.with_store(StoreSettings::new(*store_id, values.clone()))
            })
    }
}

/// Storefront data held in memory.
#[derive(Default)]
pub struct InMemoryStore {
    orders: DashMap<i64, Order>,
    products: DashMap<i64, Vec<OrderProduct>>,
    totals: DashMap<i64, Vec<OrderTotal>>,
    vouchers: DashMap<i64, Vec<OrderVoucher>>,
    history: DashMap<i64, Vec<OrderHistory>>,
    redemptions: DashMap<i64, Vec<Redemption>>,
    catalog: DashMap<i64, ProductInfo>,
    uploads: DashMap<String, String>,
    total_codes: RwLock<Vec<String>>,
    tax_classes: DashMap<i64, Vec<TaxRule>>,
    geo_zones: DashMap<i64, Vec<ZoneRow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let store = Self::new();
        for entry in seed.orders {
            let order_id = entry.order.order_id;
            store.insert_order(entry.order);
            store.products.insert(order_id, entry.products);
            store.totals.insert(order_id, entry.totals);
            store.vouchers.insert(order_id, entry.vouchers);
            store.history.insert(order_id, entry.history);
            store.redemptions.insert(order_id, entry.redemptions);
        }
        for product in seed.products {
            store.insert_product(product);
        }
        for (code, name) in seed.uploads {
            store.uploads.insert(code, name);
        }
        store.set_total_codes(seed.total_codes);
        for (class_id, rules) in seed.tax_classes {
            store.tax_classes.insert(class_id, rules);
        }
        for (geo_zone_id, rows) in seed.geo_zones {
            store.geo_zones.insert(geo_zone_id, rows);
        }
        store
    }

    pub fn insert_order(&self, order: Order) {
        self.orders.insert(order.order_id, order);
    }

    pub fn set_products(&self, order_id: i64, products: Vec<OrderProduct>) {
        self.products.insert(order_id, products);
    }

    pub fn set_totals(&self, order_id: i64, totals: Vec<OrderTotal>) {
        self.totals.insert(order_id, totals);
    }

    pub fn set_vouchers(&self, order_id: i64, vouchers: Vec<OrderVoucher>) {
        self.vouchers.insert(order_id, vouchers);
    }

    pub fn add_redemption(&self, order_id: i64, redemption: Redemption) {
        self.redemptions.entry(order_id).or_default().push(redemption);
    }

    pub fn redemptions(&self, order_id: i64) -> Vec<Redemption> {
        self.redemptions
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn insert_product(&self, product: ProductInfo) {
        self.catalog.insert(product.product_id, product);
    }

    pub fn insert_upload(&self, code: &str, name: &str) {
        self.uploads.insert(code.to_string(), name.to_string());
    }

    pub fn set_total_codes(&self, codes: Vec<String>) {
        if let Ok(mut guard) = self.total_codes.write() {
            *guard = codes;
        }
    }

    pub fn set_tax_class(&self, tax_class_id: i64, rules: Vec<TaxRule>) {
        self.tax_classes.insert(tax_class_id, rules);
    }

    pub fn set_geo_zone(&self, geo_zone_id: i64, rows: Vec<ZoneRow>) {
        self.geo_zones.insert(geo_zone_id, rows);
    }

    pub fn order(&self, order_id: i64) -> Option<Order> {
        self.orders.get(&order_id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn find_order(&self, order_id: i64) -> Result<Option<Order>, ServiceError> {
        Ok(self.order(order_id))
    }

    async fn order_products(&self, order_id: i64) -> Result<Vec<OrderProduct>, ServiceError> {
        Ok(self
            .products
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn order_totals(&self, order_id: i64) -> Result<Vec<OrderTotal>, ServiceError> {
        Ok(self
            .totals
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn order_vouchers(&self, order_id: i64) -> Result<Vec<OrderVoucher>, ServiceError> {
        Ok(self
            .vouchers
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn add_history(&self, history: OrderHistory) -> Result<(), ServiceError> {
        let order_id = history.order_id;
        {
            let mut order = self
                .orders
                .get_mut(&order_id)
                .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;
            order.order_status_id = history.order_status_id;
        }
        debug!(order_id, status_id = history.order_status_id, "Order history appended");
        self.history.entry(order_id).or_default().push(history);
        Ok(())
    }

    async fn history(&self, order_id: i64) -> Result<Vec<OrderHistory>, ServiceError> {
        Ok(self
            .history
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn update_payment_method(
        &self,
        order_id: i64,
        payment_code: &str,
        payment_method: &str,
    ) -> Result<(), ServiceError> {
        let mut order = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;
        order.payment_code = payment_code.to_string();
        order.payment_method = payment_method.to_string();
        Ok(())
    }

    async fn remove_redemptions(&self, order_id: i64) -> Result<(), ServiceError> {
        self.redemptions.remove(&order_id);
        Ok(())
    }

    async fn next_invoice_no(&self, order_id: i64) -> Result<i64, ServiceError> {
        let order = self
            .order(order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;
        if order.invoice_no != 0 {
            return Ok(1);
        }
        let highest = self
            .orders
            .iter()
            .filter(|entry| entry.invoice_prefix == order.invoice_prefix)
            .map(|entry| entry.invoice_no)
            .max()
            .unwrap_or(0);
        Ok(highest + 1)
    }
}

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn product(&self, product_id: i64) -> Result<Option<ProductInfo>, ServiceError> {
        Ok(self.catalog.get(&product_id).map(|entry| entry.value().clone()))
    }

    async fn upload_name(&self, code: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.uploads.get(code).map(|entry| entry.value().clone()))
    }

    async fn installed_total_codes(&self) -> Result<Vec<String>, ServiceError> {
        self.total_codes
            .read()
            .map(|codes| codes.clone())
            .map_err(|_| ServiceError::InternalError("total codes lock poisoned".to_string()))
    }
}

#[async_trait]
impl TaxRateLookup for InMemoryStore {
    async fn rates(&self, amount: Decimal, tax_class_id: i64) -> Result<Vec<TaxRate>, ServiceError> {
        Ok(self
            .tax_classes
            .get(&tax_class_id)
            .map(|rules| rules.iter().map(|rule| rule.apply(amount)).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl GeoZoneRepository for InMemoryStore {
    async fn zone_matches(
        &self,
        geo_zone_id: i64,
        country_id: i64,
        zone_id: i64,
    ) -> Result<bool, ServiceError> {
        Ok(self
            .geo_zones
            .get(&geo_zone_id)
            .map(|rows| {
                rows.iter().any(|row| {
                    row.country_id == country_id && (row.zone_id == 0 || row.zone_id == zone_id)
                })
            })
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(order_id: i64, invoice_no: i64, prefix: &str) -> Order {
        Order {
            order_id,
            invoice_no,
            invoice_prefix: prefix.to_string(),
            order_status_id: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn history_moves_current_status() {
        let store = InMemoryStore::new();
        store.insert_order(order(7, 0, "INV-"));

        store
            .add_history(OrderHistory::new(7, 2, "", true))
            .await
            .unwrap();

        assert_eq!(store.order(7).unwrap().order_status_id, 2);
        assert_eq!(store.history(7).await.unwrap().len(), 1);
        assert!(store.add_history(OrderHistory::new(8, 2, "", true)).await.is_err());
    }

    #[tokio::test]
    async fn next_invoice_number_is_scoped_by_prefix() {
        let store = InMemoryStore::new();
        store.insert_order(order(1, 4, "INV-"));
        store.insert_order(order(2, 9, "OTHER-"));
        store.insert_order(order(3, 0, "INV-"));

        assert_eq!(store.next_invoice_no(3).await.unwrap(), 5);
        assert_eq!(store.next_invoice_no(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn tax_rates_compute_amounts() {
        let store = InMemoryStore::new();
        store.set_tax_class(
            9,
            vec![
                TaxRule { tax_rate_id: 86, name: "VAT".into(), rate: dec!(20), kind: TaxRateKind::Percentage },
                TaxRule { tax_rate_id: 87, name: "Eco".into(), rate: dec!(2), kind: TaxRateKind::Fixed },
            ],
        );

        let rates = store.rates(dec!(50), 9).await.unwrap();
        assert_eq!(rates[0].amount, dec!(10));
        assert_eq!(rates[1].amount, dec!(2));
        assert!(store.rates(dec!(50), 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zone_zero_covers_country() {
        let store = InMemoryStore::new();
        store.set_geo_zone(3, vec![ZoneRow { country_id: 150, zone_id: 0 }]);
        store.set_geo_zone(4, vec![ZoneRow { country_id: 150, zone_id: 2335 }]);

        assert!(store.zone_matches(3, 150, 2331).await.unwrap());
        assert!(!store.zone_matches(4, 150, 2331).await.unwrap());
        assert!(!store.zone_matches(3, 21, 0).await.unwrap());
    }

    #[test]
    fn seed_parses_integer_keys() {
        let seed: SeedData = serde_json::from_str(
            r#"{
                "tax_classes": {"9": [{"tax_rate_id": 86, "name": "VAT", "rate": "21", "type": "P"}]},
                "settings": {"0": {"payment_multisafepay_status": "1"}}
            }"#,
        )
        .unwrap();
        assert_eq!(seed.tax_classes[&9].len(), 1);
        assert!(seed.settings.contains_key(&0));
    }
}
