use serde::Serialize;

pub const PAYMENT_COMPONENT_GATEWAYS: &[&str] =
    &["AMEX", "CREDITCARD", "MAESTRO", "MASTERCARD", "VISA", "BNPL_INSTM"];
pub const TOKENIZATION_GATEWAYS: &[&str] = &["AMEX", "CREDITCARD", "MAESTRO", "MASTERCARD", "VISA"];
pub const RECURRING_GATEWAYS: &[&str] = &["AMEX", "MAESTRO", "MASTERCARD", "VISA", "CREDITCARD"];
pub const REDIRECT_SWITCH_GATEWAYS: &[&str] = &[
    "AFTERPAY", "DIRDEB", "EINVOICE", "IN3", "IDEAL", "MYBANK", "PAYAFTER", "SANTANDER",
];
pub const ISSUER_GATEWAYS: &[&str] = &["IDEAL", "MYBANK"];
/// Gateways whose transactions carry a mandatory shopping cart; refunds on
/// them have to name the refunded items.
pub const SHOPPING_CART_GATEWAYS: &[&str] = &[
    "AFTERPAY",
    "EINVOICE",
    "IN3",
    "KLARNA",
    "PAYAFTER",
    "BNPL_INSTM",
    "SANTANDER",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    Gateway,
    Giftcard,
    Generic,
}

/// Shape of the `gateway_info` block of a direct transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
pub enum GatewayInfoKind {
    Ideal,
    MyBank,
    QrCode,
    Account,
    Meta,
}

/// Extra input the storefront asks the customer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutField {
    Gender,
    Birthday,
    Bankaccount,
    AfterpayTerms,
    AccountHolderName,
    AccountHolderIban,
    Emandate,
}

/// How the checkout view of a gateway is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum CheckoutProfile {
    Standard,
    AlwaysDirect,
    /// Gateway info and fields are attached only for direct transactions
    DirectFields {
        info: GatewayInfoKind,
        fields: &'static [CheckoutField],
    },
    /// Gateway info is attached whatever the transaction type
    AlwaysInfo { info: GatewayInfoKind },
    Issuers { info: GatewayInfoKind },
    GooglePay,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GatewayDescriptor {
    /// Vendor gateway code, e.g. `IDEAL`
    pub id: &'static str,
    /// Settings code, e.g. `ideal`
    pub code: &'static str,
    /// Storefront route, stored as the order's payment code
    pub route: &'static str,
    pub description: &'static str,
    #[serde(rename = "type")]
    pub kind: GatewayKind,
    #[serde(skip)]
    pub profile: CheckoutProfile,
}

impl GatewayDescriptor {
    pub fn supports_payment_component(&self) -> bool {
        PAYMENT_COMPONENT_GATEWAYS.contains(&self.id)
    }

    pub fn supports_tokenization(&self) -> bool {
        TOKENIZATION_GATEWAYS.contains(&self.id)
    }

    pub fn supports_recurring(&self) -> bool {
        RECURRING_GATEWAYS.contains(&self.id)
    }

    pub fn has_redirect_switch(&self) -> bool {
        REDIRECT_SWITCH_GATEWAYS.contains(&self.id)
    }

    pub fn has_issuers(&self) -> bool {
        ISSUER_GATEWAYS.contains(&self.id)
    }

    pub fn requires_shopping_cart(&self) -> bool {
        SHOPPING_CART_GATEWAYS.contains(&self.id)
    }

    pub fn is_generic(&self) -> bool {
        self.kind == GatewayKind::Generic
    }
}

pub fn requires_shopping_cart(gateway_id: &str) -> bool {
    SHOPPING_CART_GATEWAYS.contains(&gateway_id)
}

pub fn has_issuers(gateway_id: &str) -> bool {
    ISSUER_GATEWAYS.contains(&gateway_id)
}
