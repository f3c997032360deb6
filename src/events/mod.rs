//! Storefront event hooks.
//!
//! The platform calls these around its own actions: listing payment methods,
//! resolving an extension by code, numbering invoices and rendering the order
//! page and checkout layout. Apart from invoice numbering they are pure.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::client::{ApiCredentials, OrderUpdate, PaymentClient};
use crate::errors::ServiceError;
use crate::logging::OperatorLog;
use crate::models::Order;
use crate::repositories::OrderRepository;
use crate::services::gateway_registry::PaymentMethodOption;
use crate::services::texts::{self, log};
use crate::settings::{SettingsRepository, StoreSettings};

pub const COMPONENTS_CSS: &str = "https://pay.multisafepay.com/sdk/components/v2/components.css";
pub const COMPONENTS_JS: &str = "https://pay.multisafepay.com/sdk/components/v2/components.js";
pub const GOOGLE_PAY_JS: &str = "https://pay.google.com/gp/p/js/pay.js";
const EXTENSION_ASSETS: &str = "../extension/multisafepay/catalog/view";

/// Orders payment methods the way the storefront lists them. MultiSafepay
/// methods sort under the extension's own position (`"{msp}.{method}"`),
/// other methods by their own sort order. Keys compare naturally, ties keep
/// their input order.
pub fn sort_payment_methods(
    mut methods: Vec<PaymentMethodOption>,
    msp_sort_order: &str,
) -> Vec<PaymentMethodOption> {
    let key = |method: &PaymentMethodOption| {
        if !method.code.contains("multisafepay") {
            method.sort_order.to_string()
        } else if method.sort_order != 0 {
            format!("{}.{}", msp_sort_order, method.sort_order)
        } else {
            msp_sort_order.to_string()
        }
    };
    methods.sort_by(|a, b| natural_cmp(&key(a), &key(b)));
    methods
}

/// Compares runs of digits by value and everything else byte by byte.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a.as_bytes(), b.as_bytes());
    loop {
        match (a.first(), b.first()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let (left, rest_a) = split_digits(a);
                let (right, rest_b) = split_digits(b);
                let left = trim_zeros(left);
                let right = trim_zeros(right);
                let ordering = left.len().cmp(&right.len()).then_with(|| left.cmp(right));
                if ordering != Ordering::Equal {
                    return ordering;
                }
                a = rest_a;
                b = rest_b;
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(y);
                }
                a = &a[1..];
                b = &b[1..];
            }
        }
    }
}

fn split_digits(s: &[u8]) -> (&[u8], &[u8]) {
    let end = s.iter().position(|c| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn trim_zeros(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|c| *c != b'0').unwrap_or(s.len());
    &s[start..]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionRef {
    pub extension: String,
    pub code: String,
}

/// Maps `multisafepay/<gateway>` lookups onto the single installed extension.
pub fn extension_by_code<S: AsRef<str>>(args: &[S]) -> Option<ExtensionRef> {
    let mut found = None;
    for arg in args.iter().map(AsRef::as_ref) {
        if !arg.contains("multisafepay") {
            continue;
        }
        let mut code = "multisafepay".to_string();
        if let Some(gateway) = arg.split('/').nth(1).filter(|g| !g.is_empty()) {
            code.push('.');
            code.push_str(&gateway.to_lowercase());
        }
        found = Some(ExtensionRef {
            extension: "multisafepay".to_string(),
            code,
        });
    }
    found
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderTab {
    pub code: String,
    pub title: String,
}

/// Tabs contributed to the admin order page.
pub fn order_info_tabs(order: &Order, has_transaction: bool) -> Vec<OrderTab> {
    if !order.is_multisafepay() || !has_transaction {
        return Vec::new();
    }
    vec![OrderTab {
        code: "multisafepay-order".to_string(),
        title: texts::ORDER_TAB_TITLE.to_string(),
    }]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutPosition {
    Header,
    Footer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayoutAssets {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<String>,
}

/// Stylesheets and scripts the checkout page needs.
pub fn header_footer_assets(
    route: &str,
    position: LayoutPosition,
    settings: &StoreSettings,
) -> LayoutAssets {
    if !route.contains("checkout/checkout") {
        return LayoutAssets::default();
    }
    match position {
        LayoutPosition::Header => LayoutAssets {
            styles: vec![
                COMPONENTS_CSS.to_string(),
                format!("{}/stylesheet/multisafepay.css", EXTENSION_ASSETS),
                format!("{}/stylesheet/select2.min.css", EXTENSION_ASSETS),
            ],
            scripts: Vec::new(),
        },
        LayoutPosition::Footer => {
            let mut scripts = vec![
                COMPONENTS_JS.to_string(),
                format!("{}/javascript/multisafepay.js", EXTENSION_ASSETS),
                format!("{}/javascript/select2.min.js", EXTENSION_ASSETS),
            ];
            if settings.payment_flag("googlepay_status") {
                scripts.push(GOOGLE_PAY_JS.to_string());
            }
            LayoutAssets {
                styles: Vec::new(),
                scripts,
            }
        }
    }
}

/// Hooks that reach out to the vendor.
pub struct EventHooks {
    orders: Arc<dyn OrderRepository>,
    settings: Arc<dyn SettingsRepository>,
    client: Arc<dyn PaymentClient>,
    operator_log: Arc<dyn OperatorLog>,
}

impl EventHooks {
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

    /// Runs before the platform numbers an invoice: MultiSafepay orders get
    /// the upcoming invoice id attached to their transaction. Returns the id
    /// that was sent.
    #[instrument(skip(self))]
    pub async fn create_invoice_no_before(&self, order_id: i64) -> Result<Option<String>, ServiceError> {
        let Some(order) = self.orders.find_order(order_id).await? else {
            return Ok(None);
        };
        if !order.is_multisafepay() {
            return Ok(None);
        }
        let settings = self.settings.store_settings(order.store_id).await?;

        let invoice_no = self.orders.next_invoice_no(order_id).await?;
        let invoice_id = format!("{}{}", order.invoice_prefix, invoice_no);
        let update = OrderUpdate {
            invoice_id: Some(invoice_id.clone()),
            ..Default::default()
        };
        self.client
            .update_order(&ApiCredentials::from_settings(&settings), &order_id.to_string(), &update)
            .await?;

        if settings.debug_mode() {
            self.operator_log.write(&log::invoice_sent(&invoice_id, order_id));
        }
        info!(order_id, invoice_id = %invoice_id, "Invoice id sent to MultiSafepay");
        Ok(Some(invoice_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn method(code: &str, sort_order: i64) -> PaymentMethodOption {
        PaymentMethodOption {
            code: code.to_string(),
            title: code.to_string(),
            terms: String::new(),
            sort_order,
        }
    }

    fn codes(methods: &[PaymentMethodOption]) -> Vec<&str> {
        methods.iter().map(|m| m.code.as_str()).collect()
    }

    #[test]
    fn multisafepay_methods_sort_under_extension_position() {
        let methods = vec![
            method("multisafepay/ideal", 10),
            method("cod", 3),
            method("multisafepay/visa", 9),
            method("bank_transfer", 1),
            method("multisafepay", 0),
        ];

        let sorted = sort_payment_methods(methods, "2");

        assert_eq!(
            codes(&sorted),
            vec!["bank_transfer", "multisafepay", "multisafepay/visa", "multisafepay/ideal", "cod"]
        );
    }

    #[test]
    fn natural_ordering() {
        assert_eq!(natural_cmp("2.10", "2.9"), Ordering::Greater);
        assert_eq!(natural_cmp("10", "9"), Ordering::Greater);
        assert_eq!(natural_cmp("2", "2.1"), Ordering::Less);
        assert_eq!(natural_cmp("007", "7"), Ordering::Equal);
        assert_eq!(natural_cmp("a2", "a10"), Ordering::Less);
    }

    #[test]
    fn extension_lookup_by_gateway_route() {
        assert_eq!(
            extension_by_code(&["payment", "multisafepay/IDEAL"]),
            Some(ExtensionRef {
                extension: "multisafepay".into(),
                code: "multisafepay.ideal".into()
            })
        );
        assert_eq!(
            extension_by_code(&["multisafepay"]).map(|e| e.code),
            Some("multisafepay".to_string())
        );
        assert!(extension_by_code(&["payment", "cod"]).is_none());
    }

    #[test]
    fn order_tab_only_for_vendor_transactions() {
        let order = Order {
            payment_code: "multisafepay/ideal.ideal".into(),
            ..Default::default()
        };
        assert_eq!(order_info_tabs(&order, true).len(), 1);
        assert!(order_info_tabs(&order, false).is_empty());
        assert!(order_info_tabs(&Order::default(), true).is_empty());
    }

    #[test]
    fn checkout_assets() {
        let settings = StoreSettings::default().with("payment_multisafepay_googlepay_status", json!("1"));

        let header = header_footer_assets("checkout/checkout", LayoutPosition::Header, &settings);
        assert_eq!(header.styles[0], COMPONENTS_CSS);
        assert!(header.scripts.is_empty());

        let footer = header_footer_assets("checkout/checkout", LayoutPosition::Footer, &settings);
        assert_eq!(footer.scripts.last().map(String::as_str), Some(GOOGLE_PAY_JS));

        let footer = header_footer_assets("checkout/checkout", LayoutPosition::Footer, &StoreSettings::default());
        assert_eq!(footer.scripts.len(), 3);

        assert_eq!(
            header_footer_assets("common/home", LayoutPosition::Footer, &settings),
            LayoutAssets::default()
        );
    }

    proptest! {
        #[test]
        fn sorting_keeps_every_method(orders in proptest::collection::vec(0i64..20, 0..12)) {
            let methods: Vec<_> = orders
                .iter()
                .enumerate()
                .map(|(i, order)| {
                    let code = if i % 2 == 0 { format!("multisafepay/m{}", i) } else { format!("other{}", i) };
                    method(&code, *order)
                })
                .collect();

            let sorted = sort_payment_methods(methods.clone(), "5");

            prop_assert_eq!(sorted.len(), methods.len());
            for pair in sorted.windows(2) {
                let key = |m: &PaymentMethodOption| {
                    if !m.code.contains("multisafepay") {
                        m.sort_order.to_string()
                    } else if m.sort_order != 0 {
                        format!("5.{}", m.sort_order)
                    } else {
                        "5".to_string()
                    }
                };
                prop_assert_ne!(natural_cmp(&key(&pair[0]), &key(&pair[1])), Ordering::Greater);
            }
        }
    }
}
