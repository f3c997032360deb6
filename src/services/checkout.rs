//! Checkout view models and form validation.
//!
//! One builder serves every gateway: the descriptor's [`CheckoutProfile`]
//! decides which gateway info, fields and extras the storefront renders.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::client::{ApiCredentials, Issuer, PaymentClient};
use crate::errors::ServiceError;
use crate::models::{
    CheckoutField, CheckoutProfile, CheckoutSession, GatewayDescriptor, GatewayInfoKind, Money, Order,
};
use crate::repositories::OrderRepository;
use crate::services::gateway_registry::{self, vendor_gateway_code};
use crate::services::order_request::{billing_address, locale, TransactionType};
use crate::services::texts;
use crate::settings::{payment_key, SettingsRepository, StoreSettings};

/// Card payment form embedded in the checkout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentComponentData {
    pub payment_component_enabled: bool,
    pub tokenization: bool,
    pub currency: String,
    /// Minor units
    pub amount: i64,
    pub locale: String,
    pub country: String,
    pub api_token: String,
    pub env: String,
    /// JSON handed to the component as-is
    pub order_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutView {
    pub gateway: String,
    pub order_id: i64,
    pub route: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub test_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_info: Option<GatewayInfoKind>,
    pub fields: Vec<CheckoutField>,
    pub issuers: Vec<Issuer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_component: Option<PaymentComponentData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_pay_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub afterpay_terms_url: Option<String>,
}

pub struct CheckoutService {
    orders: Arc<dyn OrderRepository>,
    settings: Arc<dyn SettingsRepository>,
    client: Arc<dyn PaymentClient>,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        settings: Arc<dyn SettingsRepository>,
        client: Arc<dyn PaymentClient>,
    ) -> Self {
        Self {
            orders,
            settings,
            client,
        }
    }

    /// View model for `gateway` (code or vendor id) on `order_id`.
    #[instrument(skip(self, session))]
    pub async fn view(
        &self,
        gateway: &str,
        order_id: i64,
        session: &CheckoutSession,
    ) -> Result<CheckoutView, ServiceError> {
        let descriptor = gateway_registry::by_code(gateway)
            .or_else(|| gateway_registry::by_id(gateway))
            .ok_or_else(|| ServiceError::NotFound(format!("unknown payment method {}", gateway)))?;
        let order = self
            .orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;
        let settings = self.settings.store_settings(order.store_id).await?;

        self.build(descriptor, &order, session, &settings).await
    }

    async fn build(
        &self,
        descriptor: &GatewayDescriptor,
        order: &Order,
        session: &CheckoutSession,
        settings: &StoreSettings,
    ) -> Result<CheckoutView, ServiceError> {
        let credentials = ApiCredentials::from_settings(settings);
        let mut view = CheckoutView {
            gateway: descriptor.id.to_string(),
            order_id: order.order_id,
            route: descriptor.route.to_string(),
            transaction_type: initial_type(descriptor, settings),
            test_mode: settings.is_test_mode(),
            gateway_info: None,
            fields: Vec::new(),
            issuers: Vec::new(),
            payment_component: None,
            google_pay_mode: None,
            afterpay_terms_url: None,
        };

        if descriptor.supports_payment_component()
            && settings.gateway_flag(descriptor.code, "payment_component")
        {
            view.transaction_type = TransactionType::Direct;
            view.payment_component = Some(
                self.payment_component(descriptor, order, session, settings, &credentials)
                    .await,
            );
        }

        let direct = view.transaction_type == TransactionType::Direct;
        match descriptor.profile {
            CheckoutProfile::DirectFields { info, fields } if direct => {
                view.gateway_info = Some(info);
                view.fields = fields.to_vec();
            }
            CheckoutProfile::AlwaysInfo { info } => view.gateway_info = Some(info),
            CheckoutProfile::Issuers { info } if direct => {
                match self.client.issuers(&credentials, descriptor.id).await {
                    Ok(issuers) if !issuers.is_empty() => {
                        view.issuers = issuers;
                        view.gateway_info = Some(info);
                    }
                    Ok(_) => view.transaction_type = TransactionType::Redirect,
                    Err(err) => {
                        warn!(gateway = descriptor.id, error = %err, "Issuers unavailable");
                        view.transaction_type = TransactionType::Redirect;
                    }
                }
            }
            CheckoutProfile::GooglePay => {
                let mode = if view.test_mode { "TEST" } else { "PRODUCTION" };
                view.google_pay_mode = Some(mode.to_string());
            }
            CheckoutProfile::Generic => view.gateway = vendor_gateway_code(descriptor, settings),
            _ => {}
        }

        if descriptor.id == "AFTERPAY" {
            let language = order.language_code.get(..2).unwrap_or("en");
            let country = billing_address(order, settings).iso_code_2.to_lowercase();
            view.afterpay_terms_url = Some(afterpay_terms_url(&country, language));
        }

        Ok(view)
    }

    async fn payment_component(
        &self,
        descriptor: &GatewayDescriptor,
        order: &Order,
        session: &CheckoutSession,
        settings: &StoreSettings,
        credentials: &ApiCredentials,
    ) -> PaymentComponentData {
        let tokenization = descriptor.supports_tokenization()
            && settings.gateway_flag(descriptor.code, "tokenization");
        let amount = Money::from_order_total(order.total, &order.currency_code, order.currency_value)
            .minor_units();
        let locale = locale(&order.language_code);
        let country = billing_address(order, settings).iso_code_2.clone();

        let api_token = self.client.api_token(credentials).await.unwrap_or_else(|err| {
            warn!(error = %err, "Payment component token unavailable");
            String::new()
        });

        let mut order_data = json!({
            "currency": order.currency_code,
            "amount": amount,
            "customer": { "locale": locale, "country": country },
            "template": { "settings": { "embed_mode": true } },
        });
        if let Some(template_id) = settings.get_non_empty(&payment_key("payment_component_template_id")) {
            order_data["payment_options"] = json!({ "template_id": template_id });
        }
        if tokenization && session.logged_in && descriptor.supports_recurring() {
            let tokens = self
                .client
                .tokens(credentials, &session.customer_id.to_string(), descriptor.id)
                .await
                .unwrap_or_else(|err| {
                    warn!(error = %err, "Stored tokens unavailable");
                    Vec::new()
                });
            order_data["recurring"] = json!({ "model": "cardOnFile", "tokens": tokens });
        }

        PaymentComponentData {
            payment_component_enabled: true,
            tokenization,
            currency: order.currency_code.clone(),
            amount,
            locale,
            country,
            api_token,
            env: if credentials.test_mode { "test" } else { "live" }.to_string(),
            order_data: Value::to_string(&order_data),
        }
    }
}

fn initial_type(descriptor: &GatewayDescriptor, settings: &StoreSettings) -> TransactionType {
    if descriptor.profile == CheckoutProfile::AlwaysDirect {
        return TransactionType::Direct;
    }
    if descriptor.has_redirect_switch() && !settings.gateway_flag(descriptor.code, "redirect") {
        return TransactionType::Direct;
    }
    TransactionType::Redirect
}

/// Riverty terms page for the customer's billing country and language.
pub fn afterpay_terms_url(country: &str, language: &str) -> String {
    let base = match language {
        "de" => texts::AFTERPAY_TERMS_URL.replace("/nl_en/", "/de_de/"),
        "nl" => texts::AFTERPAY_TERMS_URL.replace("/nl_en/", "/nl_nl/"),
        _ => texts::AFTERPAY_TERMS_URL.to_string(),
    };
    let (from, to) = match (country, language) {
        ("de", "en") => ("/nl_en/", "/de_en/"),
        ("at", "de") => ("/de_de/", "/at_de/"),
        ("at", _) => ("/nl_en/", "/at_en/"),
        ("ch", "de") => ("/de_de/", "/ch_de/"),
        ("ch", "fr") => ("/nl_en/", "/ch_fr/"),
        ("ch", _) => ("/nl_en/", "/ch_en/"),
        ("be", "nl") => ("/nl_nl/", "/be_nl/"),
        ("be", "fr") => ("/nl_en/", "/be_fr/"),
        ("be", _) => ("/nl_en/", "/be_en/"),
        _ => return base,
    };
    base.replace(from, to)
}

/// Checks the extra checkout fields the customer submitted. Only fields
/// present in the form are checked; the result maps the storefront's error
/// keys to messages.
pub fn validate_form(form: &HashMap<String, String>) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    let mut error = |key: &str, message: &str| {
        errors.insert(key.to_string(), message.to_string());
    };

    if form.get("gender").is_some_and(|v| v.is_empty()) {
        error("gender", texts::ERROR_GENDER);
    }
    if form.get("birthday").is_some_and(|v| v.is_empty()) {
        error("birthday", texts::ERROR_BIRTHDAY);
    }
    match form.get("bankaccount") {
        Some(v) if v.is_empty() => error("bankaccount", texts::ERROR_BANK_ACCOUNT),
        Some(v) if !is_valid_iban(v) => error("bankaccount", texts::ERROR_INVALID_IBAN),
        _ => {}
    }
    if form.get("account_holder_name").is_some_and(|v| v.is_empty()) {
        error("account-holder-name", texts::ERROR_ACCOUNT_HOLDER_NAME);
    }
    match form.get("account_holder_iban") {
        Some(v) if v.is_empty() => error("account-holder-iban", texts::ERROR_ACCOUNT_HOLDER_IBAN),
        Some(v) if !is_valid_iban(v) => error("account-holder-iban", texts::ERROR_INVALID_IBAN),
        _ => {}
    }
    if form.get("afterpay_terms").is_some_and(|v| v != "1") {
        error("afterpay-terms", texts::ERROR_AFTERPAY_TERMS);
    }

    errors
}

const IBAN_LENGTHS: &[(&str, usize)] = &[
    ("AD", 24), ("AE", 23), ("AL", 28), ("AT", 20), ("AZ", 28), ("BA", 20), ("BE", 16),
    ("BG", 22), ("BH", 22), ("BR", 29), ("BY", 28), ("CH", 21), ("CR", 22), ("CY", 28),
    ("CZ", 24), ("DE", 22), ("DK", 18), ("DO", 28), ("EE", 20), ("EG", 29), ("ES", 24),
    ("FI", 18), ("FO", 18), ("FR", 27), ("GB", 22), ("GE", 22), ("GI", 23), ("GL", 18),
    ("GR", 27), ("GT", 28), ("HR", 21), ("HU", 28), ("IE", 22), ("IL", 23), ("IQ", 23),
    ("IS", 26), ("IT", 27), ("JO", 30), ("KW", 30), ("KZ", 20), ("LB", 28), ("LC", 32),
    ("LI", 21), ("LT", 20), ("LU", 20), ("LV", 21), ("MC", 27), ("MD", 24), ("ME", 22),
    ("MK", 19), ("MR", 27), ("MT", 31), ("MU", 30), ("NL", 18), ("NO", 15), ("PK", 24),
    ("PL", 28), ("PS", 29), ("PT", 25), ("QA", 29), ("RO", 24), ("RS", 22), ("SA", 24),
    ("SC", 31), ("SE", 24), ("SI", 19), ("SK", 24), ("SM", 27), ("ST", 25), ("SV", 28),
    ("TL", 23), ("TN", 24), ("TR", 26), ("UA", 29), ("VA", 22), ("VG", 24), ("XK", 20),
];

/// ISO 13616 check: known country length and mod-97 remainder of 1.
pub fn is_valid_iban(input: &str) -> bool {
    let iban: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if iban.len() < 4 || !iban.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }

    let country = &iban[..2];
    match IBAN_LENGTHS.iter().find(|(code, _)| *code == country) {
        Some((_, length)) if *length == iban.len() => {}
        _ => return false,
    }

    let rearranged = iban[4..].chars().chain(iban[..4].chars());
    let mut remainder: u32 = 0;
    for c in rearranged {
        let value = match c.to_digit(36) {
            Some(value) => value,
            None => return false,
        };
        remainder = if value < 10 {
            (remainder * 10 + value) % 97
        } else {
            (remainder * 100 + value) % 97
        };
    }
    remainder == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CreatedOrder, OrderUpdate, RefundRequest};
    use crate::models::{Address, Transaction};
    use crate::repositories::InMemoryStore;
    use crate::services::order_request::OrderRequest;
    use crate::settings::InMemorySettings;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use mockall::mock;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    mock! {
        Client {}

        #[async_trait]
        impl PaymentClient for Client {
            async fn create_order(&self, credentials: &ApiCredentials, request: &OrderRequest) -> Result<CreatedOrder, ServiceError>;
            async fn get_order(&self, credentials: &ApiCredentials, order_id: &str) -> Result<Option<Transaction>, ServiceError>;
            async fn update_order(&self, credentials: &ApiCredentials, order_id: &str, update: &OrderUpdate) -> Result<(), ServiceError>;
            async fn refund_order(&self, credentials: &ApiCredentials, order_id: &str, refund: &RefundRequest) -> Result<(), ServiceError>;
            async fn issuers(&self, credentials: &ApiCredentials, gateway_id: &str) -> Result<Vec<Issuer>, ServiceError>;
            async fn api_token(&self, credentials: &ApiCredentials) -> Result<String, ServiceError>;
            async fn tokens(&self, credentials: &ApiCredentials, customer_reference: &str, gateway_id: &str) -> Result<Vec<Value>, ServiceError>;
        }
    }

    fn service(client: MockClient, settings: StoreSettings) -> CheckoutService {
        let store = InMemoryStore::new();
        store.insert_order(Order {
            order_id: 7,
            language_code: "en-gb".into(),
            total: dec!(12.5),
            currency_code: "EUR".into(),
            currency_value: dec!(1),
            payment_address: Address {
                iso_code_2: "BE".into(),
                ..Default::default()
            },
            ..Default::default()
        });
        CheckoutService::new(
            Arc::new(store),
            Arc::new(InMemorySettings::new().with_store(settings)),
            Arc::new(client),
        )
    }

    #[tokio::test]
    async fn direct_ideal_lists_issuers() {
        let mut client = MockClient::new();
        client.expect_issuers().returning(|_, _| {
            Ok(vec![Issuer {
                code: "0031".into(),
                description: "ABN AMRO".into(),
            }])
        });

        let view = service(client, StoreSettings::default())
            .view("ideal", 7, &CheckoutSession::default())
            .await
            .unwrap();

        assert_eq!(view.transaction_type, TransactionType::Direct);
        assert_eq!(view.gateway_info, Some(GatewayInfoKind::Ideal));
        assert_eq!(view.issuers.len(), 1);
    }

    #[tokio::test]
    async fn ideal_without_issuers_redirects() {
        let mut client = MockClient::new();
        client
            .expect_issuers()
            .returning(|_, _| Err(ServiceError::ExternalServiceError("down".into())));

        let view = service(client, StoreSettings::default())
            .view("ideal", 7, &CheckoutSession::default())
            .await
            .unwrap();

        assert_eq!(view.transaction_type, TransactionType::Redirect);
        assert!(view.gateway_info.is_none());
    }

    #[tokio::test]
    async fn redirect_switch_hides_fields() {
        let settings = StoreSettings::default()
            .with("payment_multisafepay_afterpay_redirect", json!("1"));
        let view = service(MockClient::new(), settings)
            .view("afterpay", 7, &CheckoutSession::default())
            .await
            .unwrap();

        assert_eq!(view.transaction_type, TransactionType::Redirect);
        assert!(view.fields.is_empty());
        assert_eq!(
            view.afterpay_terms_url.as_deref(),
            Some("https://documents.riverty.com/terms_conditions/payment_methods/invoice/be_en/default")
        );
    }

    #[tokio::test]
    async fn direct_afterpay_asks_for_fields() {
        let view = service(MockClient::new(), StoreSettings::default())
            .view("afterpay", 7, &CheckoutSession::default())
            .await
            .unwrap();

        assert_eq!(view.transaction_type, TransactionType::Direct);
        assert_eq!(view.gateway_info, Some(GatewayInfoKind::Meta));
        assert_eq!(
            view.fields,
            vec![CheckoutField::Gender, CheckoutField::Birthday, CheckoutField::AfterpayTerms]
        );
    }

    #[tokio::test]
    async fn qr_info_is_always_attached() {
        let view = service(MockClient::new(), StoreSettings::default())
            .view("idealqr", 7, &CheckoutSession::default())
            .await
            .unwrap();

        assert_eq!(view.transaction_type, TransactionType::Redirect);
        assert_eq!(view.gateway_info, Some(GatewayInfoKind::QrCode));
    }

    #[tokio::test]
    async fn payment_component_with_stored_cards() {
        let mut client = MockClient::new();
        client.expect_api_token().returning(|_| Ok("token-123".into()));
        client
            .expect_tokens()
            .withf(|_, customer, gateway| customer.to_string() == "42" && gateway.to_string() == "VISA")
            .returning(|_, _, _| Ok(vec![json!({"token": "abc", "code": "VISA"})]));
        let settings = StoreSettings::default()
            .with("payment_multisafepay_visa_payment_component", json!("1"))
            .with("payment_multisafepay_visa_tokenization", json!("1"))
            .with("payment_multisafepay_payment_component_template_id", json!("tpl-1"))
            .with("payment_multisafepay_environment", json!("1"));
        let session = CheckoutSession {
            customer_id: 42,
            logged_in: true,
            ..Default::default()
        };

        let view = service(client, settings).view("visa", 7, &session).await.unwrap();
        let component = view.payment_component.unwrap();

        assert_eq!(view.transaction_type, TransactionType::Direct);
        assert_eq!(component.amount, 1250);
        assert_eq!(component.env, "test");
        assert_eq!(component.locale, "en_GB");
        assert_eq!(component.api_token, "token-123");
        let order_data: Value = serde_json::from_str(&component.order_data).unwrap();
        assert_eq!(order_data["payment_options"]["template_id"], "tpl-1");
        assert_eq!(order_data["recurring"]["model"], "cardOnFile");
        assert_eq!(order_data["recurring"]["tokens"][0]["token"], "abc");
    }

    #[tokio::test]
    async fn generic_gateway_uses_configured_code() {
        let settings = StoreSettings::default()
            .with("payment_multisafepay_generic_code", json!("MYGIFT"));
        let view = service(MockClient::new(), settings)
            .view("generic", 7, &CheckoutSession::default())
            .await
            .unwrap();
        assert_eq!(view.gateway, "MYGIFT");
    }

    #[tokio::test]
    async fn unknown_gateway_is_not_found() {
        let err = service(MockClient::new(), StoreSettings::default())
            .view("nope", 7, &CheckoutSession::default())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[rstest]
    #[case("nl", "en", "nl_en")]
    #[case("de", "en", "de_en")]
    #[case("de", "de", "de_de")]
    #[case("at", "de", "at_de")]
    #[case("at", "en", "at_en")]
    #[case("ch", "fr", "ch_fr")]
    #[case("be", "nl", "be_nl")]
    #[case("nl", "nl", "nl_nl")]
    fn riverty_terms_follow_country_and_language(
        #[case] country: &str,
        #[case] language: &str,
        #[case] segment: &str,
    ) {
        assert!(afterpay_terms_url(country, language).contains(&format!("/{}/", segment)));
    }

    #[rstest]
    #[case("NL91ABNA0417164300", true)]
    #[case("nl91 abna 0417 1643 00", true)]
    #[case("DE89370400440532013000", true)]
    #[case("GB82WEST12345698765432", true)]
    #[case("NL91ABNA0417164301", false)]
    #[case("NL91ABNA041716430", false)]
    #[case("XX91ABNA0417164300", false)]
    #[case("", false)]
    fn iban_check(#[case] iban: &str, #[case] valid: bool) {
        assert_eq!(is_valid_iban(iban), valid);
    }

    #[test]
    fn validates_present_fields_only() {
        let form: HashMap<String, String> = [
            ("gender", ""),
            ("bankaccount", "NL00ABNA0000000000"),
            ("account_holder_iban", ""),
            ("afterpay_terms", "0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let errors = validate_form(&form);

        assert_eq!(errors.get("gender").map(String::as_str), Some(texts::ERROR_GENDER));
        assert_eq!(errors.get("bankaccount").map(String::as_str), Some(texts::ERROR_INVALID_IBAN));
        assert_eq!(
            errors.get("account-holder-iban").map(String::as_str),
            Some(texts::ERROR_ACCOUNT_HOLDER_IBAN)
        );
        assert!(errors.contains_key("afterpay-terms"));
        assert!(!errors.contains_key("birthday"));
        assert!(!errors.contains_key("account-holder-name"));
        assert!(validate_form(&HashMap::new()).is_empty());
    }
}
