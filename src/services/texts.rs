//! Merchant and customer facing texts (English storefront language pack).

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// Date format used in log lines and history comments.
pub const DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

pub const CUSTOMER_BALANCE: &str = "Customer balance - Credit";
pub const FIXED_TAX: &str = "Fixed tax";
pub const COUPON_APPLIED: &str = "Coupon applied";

pub const ERROR_GENDER: &str = "Gender is a required field";
pub const ERROR_BIRTHDAY: &str = "Date of birth is a required field";
pub const ERROR_BANK_ACCOUNT: &str = "Bank account is a required field";
pub const ERROR_ACCOUNT_HOLDER_NAME: &str = "Account holder is a required field";
pub const ERROR_ACCOUNT_HOLDER_IBAN: &str = "IBAN is a required field";
pub const ERROR_INVALID_IBAN: &str = "IBAN does not seem valid";
pub const ERROR_AFTERPAY_TERMS: &str = "Riverty payment terms must be accepted";
pub const ERROR_PAYMENT: &str =
    "There was a problem processing your payment. Please try again or contact us";

pub const AFTERPAY_TERMS_URL: &str =
    "https://documents.riverty.com/terms_conditions/payment_methods/invoice/nl_en/default";

pub const REFUND_SUCCESS: &str = "Refund processed successfully";
pub const REFUND_ERROR: &str = "Refund could not be processed";
pub const CANCELLED_SUCCESS: &str = "Transaction has been cancelled in MultiSafepay";
pub const SHIPPED_SUCCESS: &str = "Transaction has been set as shipped in MultiSafepay";

pub const ERROR_CHECK_FORM: &str = "Warning: Please check the form carefully for errors!";
pub const ERROR_EMPTY_API_KEY: &str = "API key is required";
pub const SETTINGS_SAVED: &str = "Success: You have modified MultiSafepay settings!";
pub const ERROR_DAYS_ACTIVE: &str = "Days active must be at least 1";

pub const ORDER_TAB_TITLE: &str = "MultiSafepay";

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format(DATETIME_FORMAT).to_string()
}

/// Amount in the order currency as the storefront prints it.
pub fn format_price(amount: Decimal, currency: &str, currency_value: Decimal) -> String {
    let converted = if currency_value.is_zero() {
        amount
    } else {
        amount * currency_value
    };
    let value = converted.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let formatted = format!("{:.2}", value);
    match currency {
        "EUR" => format!("{}€", formatted),
        "USD" => format!("${}", formatted),
        "GBP" => format!("£{}", formatted),
        _ => format!("{} {}", formatted, currency),
    }
}

/// Decodes the HTML entities the storefront stores in names and titles.
/// Single quotes written as `&apos;` are left alone.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

pub fn fixed_tax(name: &str) -> String {
    format!("{}: {}", FIXED_TAX, name)
}

pub fn coupon_suffix(coupon: &str) -> String {
    format!(" - {}: {}", COUPON_APPLIED, coupon)
}

pub fn coupon_shipping(title: &str, coupon: &str) -> String {
    format!("{}{}", title, coupon_suffix(coupon))
}

pub fn reward_suffix(amount: &str, source: &str) -> String {
    format!(" - Discount applied: {} using {}", amount, source)
}

pub fn price_before_coupon(price: &str, coupon: &str) -> String {
    format!("Price before coupon: {}, coupon: {}", price, coupon)
}

pub fn order_description(order_id: i64, shop_name: &str) -> String {
    format!("Order ID #{} from {}", order_id, shop_name)
}

pub fn callback_comment(order_id: i64, at: &str, status: &str, psp_id: &str) -> String {
    format!(
        "MultiSafepay callback for order {} on {} with status: {} (PSP ID: {}).",
        order_id, at, status, psp_id
    )
}

pub fn refund_description(order_id: i64, at: &str) -> String {
    format!("Refund for order {} on {}", order_id, at)
}

pub fn status_change_description(kind: &str) -> String {
    format!("Transaction status changed to {}", kind)
}

/// Operator log lines.
pub mod log {
    pub const MISSING_ARGUMENTS: &str = "It seems the notification URL has been triggered but does not contain the required query arguments.";
    pub const NOT_MULTISAFEPAY: &str = "Callback received for an order which currently does not have a MultiSafepay payment method assigned.";
    pub const EMPTY_BODY: &str = "It seems the notification URL has been triggered but does not contain a body in the POST request.";

    pub fn invalid_signature(order_id: i64) -> String {
        format!(
            "Notification for transaction ID {} has been received but is not valid.",
            order_id
        )
    }

    pub fn no_transaction(order_id: i64) -> String {
        format!("No transaction found for Order ID {}.", order_id)
    }

    pub fn method_changed(
        order_id: i64,
        at: &str,
        status: &str,
        psp_id: &str,
        from: &str,
        to: &str,
    ) -> String {
        format!(
            "Callback received with a different payment method for Order ID {} on {} with Status: {}, and PSP ID: {}. and payment method pass from {} to {}.",
            order_id, at, status, psp_id, from, to
        )
    }

    pub fn unregistered_method(order_id: i64, at: &str, status: &str, psp_id: &str) -> String {
        format!(
            "Callback received with an unregistered payment method for Order ID {} on {} with Status: {}, and PSP ID: {}.",
            order_id, at, status, psp_id
        )
    }

    pub fn callback_received(order_id: i64, at: &str, status: &str, psp_id: &str) -> String {
        format!(
            "Callback received for Order ID {} on {} with Status: {}, and PSP ID: {}.",
            order_id, at, status, psp_id
        )
    }

    pub fn not_processed(order_id: i64) -> String {
        format!("Callback received for Order ID {}, has not been processed.", order_id)
    }

    pub fn transaction_started(order_id: i64, at: &str) -> String {
        format!("Start transaction in MultiSafepay for Order ID {} on {}.", order_id, at)
    }

    pub fn payment_link(url: &str) -> String {
        format!("Payment Link: {}.", url)
    }

    pub fn status_pushed(kind: &str, order_id: i64, status_id: i64) -> String {
        format!(
            "OpenCart set the transaction to {} in MultiSafepay for Order ID {} and Status ID {}.",
            kind, order_id, status_id
        )
    }

    pub fn invoice_sent(invoice_id: &str, order_id: i64) -> String {
        format!(
            "OpenCart Event to send Invoice ID: {} to MultiSafepay, for Order ID {}.",
            invoice_id, order_id
        )
    }
}
