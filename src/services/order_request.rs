//! Vendor order requests.
//!
//! [`OrderRequestBuilder`] turns the confirmed checkout form, the stored order
//! and the assembled shopping cart into an immutable [`OrderRequest`] in one
//! pass. [`PaymentService`] submits it and hands back the payment URL.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use validator::Validate;

use crate::client::{ApiCredentials, CreatedOrder, PaymentClient};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::logging::OperatorLog;
use crate::models::gateway::has_issuers;
use crate::models::{Address, CheckoutSession, GatewayInfoKind, Money, Order, ShoppingCart};
use crate::repositories::OrderRepository;
use crate::services::cart_assembler::CartAssembler;
use crate::services::texts::{self, log};
use crate::settings::{SettingsRepository, StoreSettings};

pub const QR_SIZE: u32 = 250;
const DEFAULT_LOCALE: &str = "en_US";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[default]
    Redirect,
    Direct,
}

/// The storefront's confirm form.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
#[serde(default)]
pub struct ConfirmRequest {
    #[validate(range(min = 1))]
    pub order_id: i64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub gateway: Option<String>,
    /// Name of the gateway info shape, e.g. `Ideal` or `Meta`
    pub gateway_info: Option<String>,
    pub issuer_id: Option<String>,
    pub gender: Option<String>,
    pub birthday: Option<String>,
    pub bankaccount: Option<String>,
    pub account_holder_name: Option<String>,
    pub account_holder_iban: Option<String>,
    pub emandate: Option<String>,
    /// Encrypted card data from the payment component
    pub payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GatewayInfo {
    Issuer {
        issuer_id: String,
    },
    QrCode {
        qr_size: u32,
        allow_change_amount: bool,
        allow_multiple: bool,
    },
    Account {
        account_holder_name: String,
        account_id: String,
        account_holder_iban: String,
        emandate: String,
    },
    Meta {
        phone: String,
        email: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        gender: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        birthday: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        bank_account: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentData {
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginDetails {
    pub shop: String,
    pub shop_version: String,
    pub plugin_version: String,
    pub shop_root_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentOptions {
    pub notification_url: String,
    pub redirect_url: String,
    pub cancel_url: String,
    pub notification_method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecondChance {
    pub send_email: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorWeight {
    pub unit: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
}

/// Cart line as the vendor reads it; prices in major units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorCartItem {
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub quantity: i64,
    pub merchant_item_id: String,
    /// Name of the tax table the line uses
    pub tax_table_selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<VendorWeight>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorShoppingCart {
    pub items: Vec<VendorCartItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxRule {
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxTable {
    pub name: String,
    pub standalone: bool,
    pub rules: Vec<TaxRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefaultTaxTable {
    pub shipping_taxed: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxTables {
    pub default: DefaultTaxTable,
    pub alternate: Vec<TaxTable>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutOptions {
    pub tax_tables: TaxTables,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomerDetails {
    pub locale: String,
    pub ip_address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub forwarded_ip: String,
    pub user_agent: String,
    pub phone: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub company_name: String,
    pub address1: String,
    pub house_number: String,
    pub zip_code: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_info: Option<GatewayInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_data: Option<PaymentData>,
    pub plugin: PluginDetails,
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub payment_options: PaymentOptions,
    pub second_chance: SecondChance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shopping_cart: Option<VendorShoppingCart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_options: Option<CheckoutOptions>,
    pub customer: CustomerDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<CustomerDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_active: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_active: Option<i64>,
}

/// Facts about the storefront installation that end up in every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopInfo {
    /// Root URL with a trailing slash
    pub root_url: String,
    pub name: String,
    pub platform_version: String,
}

impl ShopInfo {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            root_url: config.shop_root_url(),
            name: config.shop_name.clone(),
            platform_version: config.platform_version.clone(),
        }
    }
}

/// Vendor locale for a storefront language code: `ab-cd` → `ab_CD`,
/// `ab` → `ab_AB`, anything else → `en_US`.
pub fn locale(language_code: &str) -> String {
    let locale = match language_code.len() {
        5 => match language_code.split_once(|c: char| c == '-' || c == '_') {
            Some((language, country)) => format!("{}_{}", language, country.to_uppercase()),
            None => return DEFAULT_LOCALE.to_string(),
        },
        2 => format!("{}_{}", language_code, language_code.to_uppercase()),
        _ => return DEFAULT_LOCALE.to_string(),
    };
    if locale == "en_EN" {
        return DEFAULT_LOCALE.to_string();
    }
    locale
}

static ADDRESS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s?(\d+\S*)(\s?[A-Za-z]*?)$").unwrap());

/// Splits street and house number out of the two address lines.
pub fn parse_address(address_1: &str, address_2: &str) -> (String, String) {
    let full = format!("{} {}", address_1, address_2);
    let full = full.split_whitespace().collect::<Vec<_>>().join(" ");

    match ADDRESS_PATTERN.captures(&full) {
        Some(caps) => {
            let street = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
            let number = format!(
                "{}{}",
                caps.get(2).map_or("", |m| m.as_str()),
                caps.get(3).map_or("", |m| m.as_str())
            );
            (street, number.trim().to_string())
        }
        None => (full, String::new()),
    }
}

fn is_blank(address: &Address) -> bool {
    address.address_1.trim().is_empty() && address.firstname.trim().is_empty()
}

/// Address the customer block is built from. Without a separate payment
/// address step the platform only collects the shipping address.
pub fn billing_address<'a>(order: &'a Order, settings: &StoreSettings) -> &'a Address {
    if settings.get_bool("config_checkout_address") || is_blank(&order.shipping_address) {
        &order.payment_address
    } else {
        &order.shipping_address
    }
}

fn customer_details(order: &Order, address: &Address) -> CustomerDetails {
    let (street, house_number) = parse_address(&address.address_1, &address.address_2);
    CustomerDetails {
        locale: locale(&order.language_code),
        ip_address: order.ip.clone(),
        forwarded_ip: order.forwarded_ip.clone(),
        user_agent: order.user_agent.clone(),
        phone: order.telephone.clone(),
        email: order.email.clone(),
        first_name: address.firstname.clone(),
        last_name: address.lastname.clone(),
        company_name: address.company.clone(),
        address1: street,
        house_number,
        zip_code: address.postcode.clone(),
        city: address.city.clone(),
        state: address.zone.clone(),
        country: address.iso_code_2.clone(),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn gateway_info(request: &ConfirmRequest, order: &Order) -> Option<GatewayInfo> {
    let kind = match non_empty(&request.gateway_info)?.as_str() {
        "Ideal" => GatewayInfoKind::Ideal,
        "MyBank" => GatewayInfoKind::MyBank,
        "QrCode" => GatewayInfoKind::QrCode,
        "Account" => GatewayInfoKind::Account,
        "Meta" => GatewayInfoKind::Meta,
        _ => return None,
    };

    Some(match kind {
        GatewayInfoKind::Ideal | GatewayInfoKind::MyBank => GatewayInfo::Issuer {
            issuer_id: non_empty(&request.issuer_id)?,
        },
        GatewayInfoKind::QrCode => GatewayInfo::QrCode {
            qr_size: QR_SIZE,
            allow_change_amount: false,
            allow_multiple: false,
        },
        GatewayInfoKind::Account => {
            let iban = request.account_holder_iban.clone().unwrap_or_default();
            GatewayInfo::Account {
                account_holder_name: request.account_holder_name.clone().unwrap_or_default(),
                account_id: iban.clone(),
                account_holder_iban: iban,
                emandate: request.emandate.clone().unwrap_or_default(),
            }
        }
        GatewayInfoKind::Meta => GatewayInfo::Meta {
            phone: order.telephone.clone(),
            email: order.email.clone(),
            gender: non_empty(&request.gender),
            birthday: non_empty(&request.birthday),
            bank_account: non_empty(&request.bankaccount),
        },
    })
}

/// Vendor cart lines plus the tax tables their selectors point at.
pub fn vendor_cart(cart: &ShoppingCart) -> (VendorShoppingCart, CheckoutOptions) {
    let items = cart
        .items
        .iter()
        .map(|item| VendorCartItem {
            name: item.name.clone(),
            description: item.description.clone(),
            unit_price: item.unit_price.to_major(),
            quantity: item.quantity,
            merchant_item_id: item.merchant_item_id.clone(),
            tax_table_selector: item.tax_rate.normalize().to_string(),
            weight: item.weight.as_ref().map(|weight| VendorWeight {
                unit: weight.unit.clone(),
                value: weight.value,
            }),
        })
        .collect();

    let alternate = cart
        .tax_rates()
        .into_iter()
        .map(|rate| TaxTable {
            name: rate.to_string(),
            standalone: true,
            rules: vec![TaxRule {
                rate: (rate / dec!(100)).normalize(),
            }],
        })
        .collect();

    (
        VendorShoppingCart { items },
        CheckoutOptions {
            tax_tables: TaxTables {
                default: DefaultTaxTable {
                    shipping_taxed: true,
                    rate: Decimal::ZERO,
                },
                alternate,
            },
        },
    )
}

/// Builds [`OrderRequest`]s.
pub struct OrderRequestBuilder {
    assembler: Arc<CartAssembler>,
    shop: ShopInfo,
}

impl OrderRequestBuilder {
    pub fn new(assembler: Arc<CartAssembler>, shop: ShopInfo) -> Self {
        Self { assembler, shop }
    }

    #[instrument(skip_all, fields(order_id = order.order_id))]
    pub async fn build(
        &self,
        request: &ConfirmRequest,
        order: &Order,
        session: &CheckoutSession,
        settings: &StoreSettings,
    ) -> Result<OrderRequest, ServiceError> {
        let gateway = non_empty(&request.gateway);

        let issuer_missing = gateway.as_deref().is_some_and(has_issuers)
            && non_empty(&request.issuer_id).is_none();
        let (transaction_type, gateway_info) = if issuer_missing {
            (TransactionType::Redirect, None)
        } else {
            (request.transaction_type, gateway_info(request, order))
        };

        let (shopping_cart, checkout_options) = if settings.payment_flag("shopping_cart_disabled") {
            (None, None)
        } else {
            let cart = self.assembler.assemble(order, session, settings).await?;
            let (cart, options) = vendor_cart(&cart);
            (Some(cart), Some(options))
        };

        let delivery = order
            .requires_delivery()
            .then(|| customer_details(order, &order.shipping_address));

        let (days_active, seconds_active) = self.lifetime(settings);
        let amount = Money::from_order_total(order.total, &order.currency_code, order.currency_value);

        Ok(OrderRequest {
            transaction_type,
            order_id: order.order_id.to_string(),
            gateway,
            gateway_info,
            payment_data: non_empty(&request.payload).map(|payload| PaymentData { payload }),
            plugin: PluginDetails {
                shop: "OpenCart".to_string(),
                shop_version: self.shop.platform_version.clone(),
                plugin_version: env!("CARGO_PKG_VERSION").to_string(),
                shop_root_url: self.shop.root_url.clone(),
            },
            amount: amount.minor_units(),
            currency: order.currency_code.clone(),
            description: self.description(order, settings),
            payment_options: self.payment_options(settings),
            second_chance: SecondChance {
                send_email: settings.payment_flag("second_chance"),
            },
            shopping_cart,
            checkout_options,
            customer: customer_details(order, billing_address(order, settings)),
            delivery,
            days_active,
            seconds_active,
        })
    }

    fn description(&self, order: &Order, settings: &StoreSettings) -> String {
        if let Some(template) = settings.payment("order_description").filter(|t| !t.is_empty()) {
            return template.replace("{order_id}", &order.order_id.to_string());
        }
        let store_name = settings
            .get_non_empty("config_name")
            .unwrap_or_else(|| self.shop.name.clone());
        texts::order_description(order.order_id, &store_name)
    }

    fn payment_options(&self, settings: &StoreSettings) -> PaymentOptions {
        let language = settings
            .get_non_empty("config_language")
            .unwrap_or_else(|| "en-gb".to_string());
        let root = &self.shop.root_url;
        PaymentOptions {
            notification_url: format!("{}multisafepay/callback", root),
            redirect_url: format!("{}index.php?route=checkout/success&language={}", root, language),
            cancel_url: format!("{}index.php?route=checkout/failure&language={}", root, language),
            notification_method: "POST".to_string(),
        }
    }

    fn lifetime(&self, settings: &StoreSettings) -> (Option<i64>, Option<i64>) {
        let active = settings
            .get_i64(&crate::settings::payment_key("days_active"))
            .filter(|n| *n != 0);
        let unit = settings.payment("unit_lifetime_payment_link");
        match (active, unit.as_deref()) {
            (Some(days), Some("days")) => (Some(days), None),
            (Some(hours), Some("hours")) => (None, hours.checked_mul(3600)),
            (Some(seconds), Some("seconds")) => (None, Some(seconds)),
            _ => (None, None),
        }
    }
}

/// Confirms checkouts with the vendor.
pub struct PaymentService {
    orders: Arc<dyn OrderRepository>,
    settings: Arc<dyn SettingsRepository>,
    client: Arc<dyn PaymentClient>,
    builder: OrderRequestBuilder,
    operator_log: Arc<dyn OperatorLog>,
}

impl PaymentService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        settings: Arc<dyn SettingsRepository>,
        client: Arc<dyn PaymentClient>,
        builder: OrderRequestBuilder,
        operator_log: Arc<dyn OperatorLog>,
    ) -> Self {
        Self {
            orders,
            settings,
            client,
            builder,
            operator_log,
        }
    }

    /// Submits the order and returns where to send the customer.
    #[instrument(skip(self, request, session), fields(order_id = request.order_id))]
    pub async fn confirm(
        &self,
        request: &ConfirmRequest,
        session: &CheckoutSession,
    ) -> Result<CreatedOrder, ServiceError> {
        request.validate()?;
        let order = self
            .orders
            .find_order(request.order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", request.order_id)))?;
        let settings = self.settings.store_settings(order.store_id).await?;

        let order_request = self.builder.build(request, &order, session, &settings).await?;
        let credentials = ApiCredentials::from_settings(&settings);

        let created = match self.client.create_order(&credentials, &order_request).await {
            Ok(created) => created,
            Err(err) => {
                error!(order_id = order.order_id, error = %err, "Order request rejected");
                if settings.debug_mode() {
                    self.operator_log.write(&err.to_string());
                }
                counter!("multisafepay.orders.failed", 1);
                return Err(err);
            }
        };

        if settings.debug_mode() {
            let at = texts::timestamp(Utc::now());
            self.operator_log
                .write(&log::transaction_started(order.order_id, &at));
            self.operator_log.write(&log::payment_link(&created.payment_url));
        }
        counter!("multisafepay.orders.submitted", 1);
        info!(order_id = order.order_id, "Order submitted to MultiSafepay");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderProduct, OrderTotal};
    use crate::repositories::InMemoryStore;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("en-gb", "en_GB")]
    #[case("nl-nl", "nl_NL")]
    #[case("de", "de_DE")]
    #[case("en", "en_US")]
    #[case("english", "en_US")]
    #[case("", "en_US")]
    fn locales(#[case] code: &str, #[case] expected: &str) {
        assert_eq!(locale(code), expected);
    }

    #[rstest]
    #[case("Kraanspoor 39", "", "Kraanspoor", "39")]
    #[case("Kraanspoor", "39C", "Kraanspoor", "39C")]
    #[case("Kraanspoor 39 C", "", "Kraanspoor", "39 C")]
    #[case("1e Constantijn Huygensstraat 12a", "", "1e Constantijn Huygensstraat", "12a")]
    #[case("Main Street", "", "Main Street", "")]
    fn splits_street_and_house_number(
        #[case] line1: &str,
        #[case] line2: &str,
        #[case] street: &str,
        #[case] number: &str,
    ) {
        assert_eq!(parse_address(line1, line2), (street.to_string(), number.to_string()));
    }

    fn order() -> Order {
        Order {
            order_id: 1045,
            store_id: 0,
            email: "jane@example.com".into(),
            telephone: "0201234567".into(),
            ip: "10.0.0.1".into(),
            language_code: "nl-nl".into(),
            total: dec!(24.2),
            currency_code: "EUR".into(),
            currency_value: dec!(1),
            payment_code: "multisafepay/ideal".into(),
            payment_address: Address {
                firstname: "Jane".into(),
                lastname: "Doe".into(),
                address_1: "Kraanspoor 39".into(),
                city: "Amsterdam".into(),
                postcode: "1033SC".into(),
                iso_code_2: "NL".into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn builder(store: &Arc<InMemoryStore>) -> OrderRequestBuilder {
        let assembler = CartAssembler::new(store.clone(), store.clone(), store.clone());
        OrderRequestBuilder::new(
            Arc::new(assembler),
            ShopInfo {
                root_url: "https://shop.example/".into(),
                name: "Example Shop".into(),
                platform_version: "4.0.2.3".into(),
            },
        )
    }

    fn store() -> Arc<InMemoryStore> {
        let store = InMemoryStore::new();
        store.insert_order(order());
        store.set_products(
            1045,
            vec![OrderProduct {
                product_id: 40,
                name: "Shirt".into(),
                quantity: 2,
                price: dec!(10),
                total: dec!(20),
                ..Default::default()
            }],
        );
        store.set_totals(
            1045,
            vec![OrderTotal {
                code: "sub_total".into(),
                title: "Sub-Total".into(),
                value: dec!(20),
                sort_order: 1,
            }],
        );
        Arc::new(store)
    }

    #[tokio::test]
    async fn ideal_without_issuer_falls_back_to_redirect() {
        let store = store();
        let request = ConfirmRequest {
            order_id: 1045,
            transaction_type: TransactionType::Direct,
            gateway: Some("IDEAL".into()),
            gateway_info: Some("Ideal".into()),
            issuer_id: Some(String::new()),
            ..Default::default()
        };

        let built = builder(&store)
            .build(&request, &order(), &CheckoutSession::default(), &StoreSettings::default())
            .await
            .unwrap();

        assert_eq!(built.transaction_type, TransactionType::Redirect);
        assert!(built.gateway_info.is_none());
    }

    #[tokio::test]
    async fn serializes_vendor_fields() {
        let store = store();
        let request = ConfirmRequest {
            order_id: 1045,
            transaction_type: TransactionType::Direct,
            gateway: Some("IN3".into()),
            gateway_info: Some("Meta".into()),
            gender: Some("female".into()),
            birthday: Some("1990-01-31".into()),
            ..Default::default()
        };
        let settings = StoreSettings::default()
            .with("payment_multisafepay_order_description", json!("Webshop order {order_id}"))
            .with("payment_multisafepay_days_active", json!("2"))
            .with("payment_multisafepay_unit_lifetime_payment_link", json!("hours"))
            .with("payment_multisafepay_second_chance", json!("1"))
            .with("config_checkout_address", json!("1"));

        let built = builder(&store)
            .build(&request, &order(), &CheckoutSession::default(), &settings)
            .await
            .unwrap();
        let body = serde_json::to_value(&built).unwrap();

        assert_eq!(body["type"], "direct");
        assert_eq!(body["order_id"], "1045");
        assert_eq!(body["gateway"], "IN3");
        assert_eq!(body["amount"], 2420);
        assert_eq!(body["description"], "Webshop order 1045");
        assert_eq!(body["seconds_active"], 7200);
        assert!(body.get("days_active").is_none());
        assert_eq!(body["second_chance"]["send_email"], true);
        assert_eq!(
            body["gateway_info"],
            json!({"phone": "0201234567", "email": "jane@example.com", "gender": "female", "birthday": "1990-01-31"})
        );
        assert_eq!(body["customer"]["locale"], "nl_NL");
        assert_eq!(body["customer"]["address1"], "Kraanspoor");
        assert_eq!(body["customer"]["house_number"], "39");
        assert!(body.get("delivery").is_none());
        assert_eq!(body["shopping_cart"]["items"][0]["unit_price"], 10.0);
        assert_eq!(body["shopping_cart"]["items"][0]["tax_table_selector"], "0");
        assert_eq!(body["checkout_options"]["tax_tables"]["alternate"][0]["name"], "0");
        assert_eq!(body["payment_options"]["notification_url"], "https://shop.example/multisafepay/callback");
        assert_eq!(body["plugin"]["shop"], "OpenCart");
    }

    #[rstest]
    #[case("2", "days", (Some(2), None))]
    #[case("2", "hours", (None, Some(7200)))]
    #[case("90", "seconds", (None, Some(90)))]
    #[case("0", "days", (None, None))]
    #[case("9223372036854775807", "hours", (None, None))]
    fn payment_link_lifetime(
        #[case] active: &str,
        #[case] unit: &str,
        #[case] expected: (Option<i64>, Option<i64>),
    ) {
        let settings = StoreSettings::default()
            .with("payment_multisafepay_days_active", json!(active))
            .with("payment_multisafepay_unit_lifetime_payment_link", json!(unit));

        assert_eq!(builder(&store()).lifetime(&settings), expected);
    }

    #[tokio::test]
    async fn shopping_cart_can_be_disabled() {
        let store = store();
        let settings = StoreSettings::default()
            .with("payment_multisafepay_shopping_cart_disabled", json!(true))
            .with("config_name", json!("Corner Shop"));
        let request = ConfirmRequest {
            order_id: 1045,
            ..Default::default()
        };

        let built = builder(&store)
            .build(&request, &order(), &CheckoutSession::default(), &settings)
            .await
            .unwrap();

        assert!(built.shopping_cart.is_none());
        assert!(built.checkout_options.is_none());
        assert_eq!(built.description, "Order ID #1045 from Corner Shop");
    }

    #[tokio::test]
    async fn direct_debit_account_info() {
        let store = store();
        let request = ConfirmRequest {
            order_id: 1045,
            transaction_type: TransactionType::Direct,
            gateway: Some("DIRDEB".into()),
            gateway_info: Some("Account".into()),
            account_holder_name: Some("J. Doe".into()),
            account_holder_iban: Some("NL87ABNA0000000001".into()),
            emandate: Some("mandate-1".into()),
            ..Default::default()
        };

        let built = builder(&store)
            .build(&request, &order(), &CheckoutSession::default(), &StoreSettings::default())
            .await
            .unwrap();

        assert_eq!(
            built.gateway_info,
            Some(GatewayInfo::Account {
                account_holder_name: "J. Doe".into(),
                account_id: "NL87ABNA0000000001".into(),
                account_holder_iban: "NL87ABNA0000000001".into(),
                emandate: "mandate-1".into(),
            })
        );
    }

    #[test]
    fn tax_tables_follow_cart_rates() {
        let cart = ShoppingCart::new(vec![
            crate::models::CartItem {
                name: "1 x Book".into(),
                description: String::new(),
                unit_price: Money::from_price(dec!(10), "EUR", dec!(1)),
                quantity: 1,
                merchant_item_id: "1".into(),
                tax_rate: dec!(9.00),
                weight: None,
            },
            crate::models::CartItem {
                name: "1 x Lamp".into(),
                description: String::new(),
                unit_price: Money::from_price(dec!(20), "EUR", dec!(1)),
                quantity: 1,
                merchant_item_id: "2".into(),
                tax_rate: dec!(21),
                weight: None,
            },
        ]);

        let (vendor, options) = vendor_cart(&cart);
        assert_eq!(vendor.items[0].tax_table_selector, "9");
        let names: Vec<_> = options.tax_tables.alternate.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["9", "21"]);
        assert_eq!(options.tax_tables.alternate[1].rules[0].rate, dec!(0.21));
    }
}
