//! Collaborator interfaces to the storefront's persistence layer.
//!
//! The connector never talks to the platform database directly. Every read
//! and write goes through these traits so services can be wired against the
//! in-memory store (tests, demo server) or any other backend.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::ServiceError;
use crate::models::{
    Order, OrderHistory, OrderProduct, OrderTotal, OrderVoucher, ProductInfo, TaxRate,
};

pub mod memory;

pub use memory::{InMemoryStore, SeedData};

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_order(&self, order_id: i64) -> Result<Option<Order>, ServiceError>;

    async fn order_products(&self, order_id: i64) -> Result<Vec<OrderProduct>, ServiceError>;

    /// Totals in the order they were calculated.
    async fn order_totals(&self, order_id: i64) -> Result<Vec<OrderTotal>, ServiceError>;

    async fn order_vouchers(&self, order_id: i64) -> Result<Vec<OrderVoucher>, ServiceError>;

    /// Appends a history record and moves the order's current status to it.
    async fn add_history(&self, history: OrderHistory) -> Result<(), ServiceError>;

    async fn history(&self, order_id: i64) -> Result<Vec<OrderHistory>, ServiceError>;

    async fn update_payment_method(
        &self,
        order_id: i64,
        payment_code: &str,
        payment_method: &str,
    ) -> Result<(), ServiceError>;

    /// Drops coupon, voucher, reward point and store credit redemptions
    /// recorded for the order.
    async fn remove_redemptions(&self, order_id: i64) -> Result<(), ServiceError>;

    /// Invoice number the order would receive next.
    async fn next_invoice_no(&self, order_id: i64) -> Result<i64, ServiceError>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn product(&self, product_id: i64) -> Result<Option<ProductInfo>, ServiceError>;

    /// Original file name of an upload code.
    async fn upload_name(&self, code: &str) -> Result<Option<String>, ServiceError>;

    /// Codes of the installed order total extensions.
    async fn installed_total_codes(&self) -> Result<Vec<String>, ServiceError>;
}

#[async_trait]
pub trait TaxRateLookup: Send + Sync {
    /// Rates of `tax_class_id` applied to `amount`.
    async fn rates(&self, amount: Decimal, tax_class_id: i64) -> Result<Vec<TaxRate>, ServiceError>;
}

#[async_trait]
pub trait GeoZoneRepository: Send + Sync {
    /// Whether the geo zone covers the country and zone. A zone row with
    /// `zone_id` 0 covers the whole country.
    async fn zone_matches(
        &self,
        geo_zone_id: i64,
        country_id: i64,
        zone_id: i64,
    ) -> Result<bool, ServiceError>;
}
