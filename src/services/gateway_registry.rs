use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::errors::ServiceError;
use crate::models::gateway::CheckoutField as F;
use crate::models::{CheckoutProfile, GatewayDescriptor, GatewayInfoKind, GatewayKind};
use crate::repositories::GeoZoneRepository;
use crate::settings::{gateway_key, StoreSettings};

const fn gw(
    id: &'static str,
    code: &'static str,
    route: &'static str,
    description: &'static str,
    kind: GatewayKind,
    profile: CheckoutProfile,
) -> GatewayDescriptor {
    GatewayDescriptor {
        id,
        code,
        route,
        description,
        kind,
        profile,
    }
}

use CheckoutProfile::{AlwaysDirect, Standard};
use GatewayKind::{Gateway, Giftcard};

/// Every payment method the connector can offer, in catalog order.
pub static GATEWAYS: &[GatewayDescriptor] = &[
    gw("MULTISAFEPAY", "multisafepay", "multisafepay", "MultiSafepay", Gateway, Standard),
    gw(
        "AFTERPAY",
        "afterpay",
        "multisafepay/afterPay",
        "Riverty",
        Gateway,
        CheckoutProfile::DirectFields {
            info: GatewayInfoKind::Meta,
            fields: &[F::Gender, F::Birthday, F::AfterpayTerms],
        },
    ),
    gw("ALIPAY", "alipay", "multisafepay/alipay", "Alipay", Gateway, AlwaysDirect),
    gw("ALIPAYPLUS", "alipayplus", "multisafepay/alipayplus", "Alipay+ &trade; Partner", Gateway, AlwaysDirect),
    gw("AMAZONBTN", "amazonbtn", "multisafepay/amazonPay", "Amazon Pay", Gateway, Standard),
    gw("AMEX", "amex", "multisafepay/amex", "American Express", Gateway, Standard),
    gw("APPLEPAY", "applepay", "multisafepay/applePay", "Apple Pay", Gateway, Standard),
    gw("MISTERCASH", "mistercash", "multisafepay/bancontact", "Bancontact", Gateway, Standard),
    gw("BABYCAD", "babycad", "multisafepay/babyCad", "Baby Cadeaubon", Giftcard, Standard),
    gw("BANKTRANS", "banktrans", "multisafepay/bankTransfer", "Bank Transfer", Gateway, Standard),
    gw("BEAUTYWELL", "beautywellness", "multisafepay/beautyWellness", "Beauty & Wellness", Giftcard, Standard),
    gw("BELFIUS", "belfius", "multisafepay/belfius", "Belfius", Gateway, Standard),
    gw("BOEKENBON", "boekenbon", "multisafepay/boekenbon", "Boekenbon", Giftcard, Standard),
    gw("CBC", "cbc", "multisafepay/cbc", "CBC", Gateway, AlwaysDirect),
    gw("CREDITCARD", "creditcard", "multisafepay/creditCard", "Credit Card", Gateway, Standard),
    gw("DBRTP", "dbrtp", "multisafepay/dbrtp", "Request to Pay powered by Deutsche Bank", Gateway, Standard),
    gw("DIRECTBANK", "directbank", "multisafepay/directBank", "Sofort", Gateway, Standard),
    gw(
        "DOTPAY",
        "dotpay",
        "multisafepay/dotpay",
        "Dotpay",
        Gateway,
        CheckoutProfile::AlwaysInfo { info: GatewayInfoKind::Meta },
    ),
    gw("EPS", "eps", "multisafepay/eps", "EPS", Gateway, Standard),
    gw(
        "EINVOICE",
        "einvoice",
        "multisafepay/eInvoice",
        "E-Invoicing",
        Gateway,
        CheckoutProfile::DirectFields {
            info: GatewayInfoKind::Meta,
            fields: &[F::Birthday, F::Bankaccount],
        },
    ),
    gw("FASHIONCHQ", "fashioncheque", "multisafepay/fashionCheque", "Fashioncheque", Giftcard, Standard),
    gw("FASHIONGFT", "fashiongiftcard", "multisafepay/fashionGiftCard", "Fashiongiftcard", Giftcard, Standard),
    gw("FIETSENBON", "fietsenbon", "multisafepay/fietsenbon", "Fietsenbon", Giftcard, Standard),
    gw("GEZONDHEID", "gezondheidsbon", "multisafepay/gezondheidsbon", "Gezondheidsbon", Giftcard, Standard),
    gw("GIVACARD", "givacard", "multisafepay/givaCard", "GivaCard", Giftcard, Standard),
    gw("GIROPAY", "giropay", "multisafepay/giroPay", "Giropay", Gateway, Standard),
    gw("GOOD4FUN", "good4fun", "multisafepay/good4fun", "Good4fun Giftcard", Giftcard, Standard),
    gw("GOODCARD", "goodcard", "multisafepay/goodCard", "Good Card", Giftcard, Standard),
    gw("GOOGLEPAY", "googlepay", "multisafepay/googlePay", "Google Pay", Gateway, CheckoutProfile::GooglePay),
    gw(
        "IN3",
        "in3",
        "multisafepay/in3",
        "in3: Pay in 3 instalments, 0% interest",
        Gateway,
        CheckoutProfile::DirectFields {
            info: GatewayInfoKind::Meta,
            fields: &[F::Gender],
        },
    ),
    gw(
        "IDEAL",
        "ideal",
        "multisafepay/ideal",
        "iDEAL",
        Gateway,
        CheckoutProfile::Issuers { info: GatewayInfoKind::Ideal },
    ),
    gw(
        "IDEALQR",
        "idealqr",
        "multisafepay/idealQr",
        "iDEAL QR",
        Gateway,
        CheckoutProfile::AlwaysInfo { info: GatewayInfoKind::QrCode },
    ),
    gw("KBC", "kbc", "multisafepay/kbc", "KBC", Gateway, AlwaysDirect),
    gw("KLARNA", "klarna", "multisafepay/klarna", "Klarna - Buy now, pay later", Gateway, Standard),
    gw("MAESTRO", "maestro", "multisafepay/maestro", "Maestro", Gateway, Standard),
    gw("MASTERCARD", "mastercard", "multisafepay/mastercard", "Mastercard", Gateway, Standard),
    gw(
        "MYBANK",
        "mybank",
        "multisafepay/mybank",
        "MyBank - Bonifico Immediato",
        Gateway,
        CheckoutProfile::Issuers { info: GatewayInfoKind::MyBank },
    ),
    gw("NATNLETUIN", "nationaletuinbon", "multisafepay/nationaleTuinbon", "Nationale Tuinbon", Giftcard, Standard),
    gw("PARFUMCADE", "parfumcadeaukaart", "multisafepay/parfumCadeaukaart", "Parfum Cadeaukaart", Giftcard, Standard),
    gw(
        "PAYAFTER",
        "payafter",
        "multisafepay/payAfterDelivery",
        "Pay After Delivery",
        Gateway,
        CheckoutProfile::DirectFields {
            info: GatewayInfoKind::Meta,
            fields: &[F::Birthday, F::Bankaccount],
        },
    ),
    gw(
        "BNPL_INSTM",
        "bnpl_instm",
        "multisafepay/payAfterDeliveryInstallments",
        "Pay After Delivery Installments",
        Gateway,
        Standard,
    ),
    gw("PAYPAL", "paypal", "multisafepay/payPal", "PayPal", Gateway, AlwaysDirect),
    gw("PODIUM", "podium", "multisafepay/podium", "Podium", Giftcard, Standard),
    gw("PSAFECARD", "paysafecard", "multisafepay/paysafecard", "Paysafecard", Gateway, Standard),
    gw(
        "SANTANDER",
        "santander",
        "multisafepay/betaalplan",
        "Santander Consumer Finance | Pay per month",
        Gateway,
        CheckoutProfile::DirectFields {
            info: GatewayInfoKind::Meta,
            fields: &[F::Gender, F::Birthday, F::Bankaccount],
        },
    ),
    gw(
        "DIRDEB",
        "dirdeb",
        "multisafepay/dirDeb",
        "SEPA Direct Debit",
        Gateway,
        CheckoutProfile::DirectFields {
            info: GatewayInfoKind::Account,
            fields: &[F::AccountHolderName, F::AccountHolderIban, F::Emandate],
        },
    ),
    gw("SPORTENFIT", "sportfit", "multisafepay/sportFit", "Sport & Fit", Giftcard, Standard),
    gw("TRUSTLY", "trustly", "multisafepay/trustly", "Trustly", Gateway, Standard),
    gw("VISA", "visa", "multisafepay/visa", "Visa", Gateway, Standard),
    gw("VVVGIFTCRD", "vvv", "multisafepay/vvvGiftCard", "VVV Cadeaukaart", Giftcard, Standard),
    gw("WEBSHOPGIFTCARD", "webshopgiftcard", "multisafepay/webshopGiftCard", "Webshop Giftcard", Giftcard, Standard),
    gw("WELLNESSGIFTCARD", "wellnessgiftcard", "multisafepay/wellnessGiftCard", "Wellness gift card", Giftcard, Standard),
    gw("WIJNCADEAU", "wijncadeau", "multisafepay/wijnCadeau", "Wijncadeau", Giftcard, Standard),
    gw("WINKELCHEQUE", "winkelcheque", "multisafepay/winkelCheque", "Winkelcheque", Giftcard, Standard),
    gw("YOURGIFT", "yourgift", "multisafepay/yourGift", "YourGift", Giftcard, Standard),
    gw("GENERIC", "generic", "multisafepay/generic", "Generic Gateway", GatewayKind::Generic, CheckoutProfile::Generic),
];

pub fn all() -> &'static [GatewayDescriptor] {
    GATEWAYS
}

pub fn by_id(id: &str) -> Option<&'static GatewayDescriptor> {
    GATEWAYS.iter().find(|g| g.id == id)
}

pub fn by_code(code: &str) -> Option<&'static GatewayDescriptor> {
    GATEWAYS.iter().find(|g| g.code == code)
}

pub fn by_route(route: &str) -> Option<&'static GatewayDescriptor> {
    GATEWAYS.iter().find(|g| g.route == route)
}

pub fn by_kind(kind: GatewayKind) -> Vec<&'static GatewayDescriptor> {
    GATEWAYS.iter().filter(|g| g.kind == kind).collect()
}

pub fn with_redirect_switch() -> Vec<&'static GatewayDescriptor> {
    GATEWAYS.iter().filter(|g| g.has_redirect_switch()).collect()
}

/// Catalog sorted by the merchant's per gateway sort order; ties keep
/// catalog order.
pub fn ordered(settings: &StoreSettings) -> Vec<&'static GatewayDescriptor> {
    let mut gateways: Vec<_> = GATEWAYS.iter().collect();
    gateways.sort_by_key(|g| settings.sort_order(&gateway_key(g.code, "sort_order")));
    gateways
}

/// Shopping cart requirement, including the merchant switch for the generic
/// gateway.
pub fn requires_shopping_cart(descriptor: &GatewayDescriptor, settings: &StoreSettings) -> bool {
    if descriptor.is_generic() {
        return settings.gateway_flag(descriptor.code, "require_shopping_cart");
    }
    descriptor.requires_shopping_cart()
}

/// Vendor gateway code to send for a descriptor. The generic gateway uses the
/// code configured by the merchant.
pub fn vendor_gateway_code(descriptor: &GatewayDescriptor, settings: &StoreSettings) -> String {
    if descriptor.is_generic() {
        return settings
            .get_non_empty(&gateway_key(descriptor.code, "code"))
            .unwrap_or_default();
    }
    descriptor.id.to_string()
}

/// Descriptor for a vendor gateway code, resolving the generic gateway's
/// configured code.
pub fn resolve_vendor_code(
    gateway_id: &str,
    settings: &StoreSettings,
) -> Option<&'static GatewayDescriptor> {
    by_id(gateway_id).or_else(|| {
        let generic = by_kind(GatewayKind::Generic).into_iter().next()?;
        (!gateway_id.is_empty() && vendor_gateway_code(generic, settings) == gateway_id)
            .then_some(generic)
    })
}

/// Facts about the checkout needed to pick payment methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodQuery {
    pub country_id: i64,
    pub zone_id: i64,
    pub total: Decimal,
    pub currency_id: i64,
    pub currency_code: String,
    /// Group of the logged in customer, if any
    pub customer_group_id: Option<i64>,
}

/// Entry of the storefront's payment method list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodOption {
    pub code: String,
    pub title: String,
    pub terms: String,
    pub sort_order: i64,
}

/// Filters the catalog down to the methods a checkout may use.
#[derive(Clone)]
pub struct GatewaySelector {
    geo_zones: Arc<dyn GeoZoneRepository>,
}

impl GatewaySelector {
    pub fn new(geo_zones: Arc<dyn GeoZoneRepository>) -> Self {
        Self { geo_zones }
    }

    #[instrument(skip(self, settings), fields(total = %query.total, currency = %query.currency_code))]
    pub async fn list_eligible_methods(
        &self,
        query: &MethodQuery,
        settings: &StoreSettings,
    ) -> Result<Vec<PaymentMethodOption>, ServiceError> {
        if query.total <= Decimal::ZERO || !settings.payment_flag("status") {
            return Ok(Vec::new());
        }

        let customer_group_id = query
            .customer_group_id
            .filter(|group| *group != 0)
            .unwrap_or_else(|| settings.get_i64("config_customer_group_id").unwrap_or(0));

        let mut methods = Vec::new();
        for descriptor in ordered(settings) {
            if !self
                .is_eligible(descriptor, query, customer_group_id, settings)
                .await?
            {
                continue;
            }

            let title = if descriptor.is_generic() {
                settings
                    .get_non_empty(&gateway_key(descriptor.code, "name"))
                    .unwrap_or_default()
            } else {
                descriptor.description.to_string()
            };

            methods.push(PaymentMethodOption {
                code: descriptor.route.to_string(),
                title,
                terms: String::new(),
                sort_order: settings.sort_order(&gateway_key(descriptor.code, "sort_order")),
            });
        }

        methods.sort_by_key(|method| method.sort_order);
        debug!(count = methods.len(), "Eligible payment methods");
        Ok(methods)
    }

    async fn is_eligible(
        &self,
        descriptor: &GatewayDescriptor,
        query: &MethodQuery,
        customer_group_id: i64,
        settings: &StoreSettings,
    ) -> Result<bool, ServiceError> {
        let code = descriptor.code;
        if !settings.gateway_flag(code, "status") {
            return Ok(false);
        }

        let min = settings.get_decimal(&gateway_key(code, "min_amount")).unwrap_or_default();
        if min > Decimal::ZERO && min > query.total {
            return Ok(false);
        }
        let max = settings.get_decimal(&gateway_key(code, "max_amount")).unwrap_or_default();
        if max > Decimal::ZERO && max < query.total {
            return Ok(false);
        }

        let currencies = settings.get_list(&gateway_key(code, "currency"));
        if !currencies.is_empty() {
            let currency_id = query.currency_id.to_string();
            let allowed = currencies
                .iter()
                .any(|entry| *entry == currency_id || entry.eq_ignore_ascii_case(&query.currency_code));
            if !allowed {
                return Ok(false);
            }
        }

        let groups = settings.get_list(&gateway_key(code, "customer_group_id"));
        if !groups.is_empty() && !groups.contains(&customer_group_id.to_string()) {
            return Ok(false);
        }

        let geo_zone_id = settings.get_i64(&gateway_key(code, "geo_zone_id")).unwrap_or(0);
        if geo_zone_id != 0
            && !self
                .geo_zones
                .zone_matches(geo_zone_id, query.country_id, query.zone_id)
                .await?
        {
            return Ok(false);
        }

        Ok(true)
    }
}
