use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Number of decimals kept on intermediate money amounts.
pub const MONEY_SCALE: u32 = 10;

pub(crate) fn round10(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// An amount in minor units (cents) of `currency`, possibly fractional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    /// Unit price for the shopping cart: the price is expressed in minor units
    /// first and then converted with the order's currency rate.
    pub fn from_price(price: Decimal, currency: &str, currency_value: Decimal) -> Self {
        let minor = round10(price * dec!(100));
        Self {
            amount: convert(minor, currency_value),
            currency: currency.to_string(),
        }
    }

    /// Order amount: converted in major units first, then scaled to minor units.
    pub fn from_order_total(total: Decimal, currency: &str, currency_value: Decimal) -> Self {
        Self {
            amount: convert(total, currency_value) * dec!(100),
            currency: currency.to_string(),
        }
    }

    pub fn negative(&self) -> Self {
        Self {
            amount: -self.amount.abs(),
            currency: self.currency.clone(),
        }
    }

    /// Integer minor units as sent to the vendor; fractions are truncated.
    pub fn minor_units(&self) -> i64 {
        self.amount.trunc().to_i64().unwrap_or_default()
    }

    pub fn to_major(&self) -> Decimal {
        (self.amount / dec!(100)).normalize()
    }
}

fn convert(amount: Decimal, currency_value: Decimal) -> Decimal {
    if currency_value.is_zero() {
        round10(amount)
    } else {
        round10(amount * currency_value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    /// Upper-cased unit, e.g. `KG`
    pub unit: String,
    pub value: Decimal,
}

impl Weight {
    pub fn new(unit: &str, value: Decimal) -> Self {
        Self {
            unit: unit.to_uppercase(),
            value,
        }
    }
}

/// A line of the shopping cart sent to the vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub name: String,
    pub description: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub merchant_item_id: String,
    /// Percentage, e.g. `21` for 21%
    pub tax_rate: Decimal,
    pub weight: Option<Weight>,
}

impl CartItem {
    /// Minor units contributed by the line, before tax.
    pub fn line_amount(&self) -> Decimal {
        self.unit_price.amount * Decimal::from(self.quantity)
    }

    /// Minor units contributed by the line, including its percentage tax.
    pub fn line_amount_with_tax(&self) -> Decimal {
        self.line_amount() * (Decimal::ONE + self.tax_rate / dec!(100))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShoppingCart {
    pub items: Vec<CartItem>,
}

impl ShoppingCart {
    pub fn new(items: Vec<CartItem>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn find(&self, merchant_item_id: &str) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|item| item.merchant_item_id == merchant_item_id)
    }

    /// Grand total in minor units, taxes included.
    pub fn total_with_tax(&self) -> Decimal {
        self.items.iter().map(CartItem::line_amount_with_tax).sum()
    }

    /// Distinct tax rates in first-seen order.
    pub fn tax_rates(&self) -> Vec<Decimal> {
        let mut rates: Vec<Decimal> = Vec::new();
        for item in &self.items {
            let rate = item.tax_rate.normalize();
            if !rates.contains(&rate) {
                rates.push(rate);
            }
        }
        rates
    }
}
