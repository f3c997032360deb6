//! Turns a storefront order into the vendor shopping cart.
//!
//! Every financial line of the order (products, purchased vouchers, shipping,
//! coupons, fees, fixed taxes, store credit, voucher redemptions and third
//! party order totals) becomes one or more [`CartItem`]s. Lines are grouped in
//! buckets keyed by the sort order of the order total they belong to, so the
//! cart reads in the same order as the storefront's totals block.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, instrument};

use crate::errors::ServiceError;
use crate::models::{
    CartItem, CheckoutSession, Coupon, CouponKind, Money, OptionKind, Order, OrderProduct,
    OrderTotal, ProductInfo, ShoppingCart, TaxRate, TaxRateKind, Weight,
};
use crate::repositories::{CatalogRepository, OrderRepository, TaxRateLookup};
use crate::services::texts;
use crate::settings::{payment_key, total_key, StoreSettings};

pub const SHIPPING_ITEM_ID: &str = "msp-shipping";
pub const COUPON_ITEM_ID: &str = "COUPON";
pub const HANDLING_ITEM_ID: &str = "HANDLING";
pub const LOW_ORDER_FEE_ITEM_ID: &str = "LOWORDERFEE";
pub const CREDIT_ITEM_ID: &str = "CREDIT";
pub const VOUCHER_ITEM_ID: &str = "VOUCHER";

/// Order total codes handled explicitly; anything else installed is a
/// custom total.
pub const DEFAULT_TOTAL_CODES: &[&str] = &[
    "sub_total",
    "shipping",
    "total",
    "coupon",
    "tax",
    "handling",
    "voucher",
    "credit",
    "low_order_fee",
    "reward",
    "klarna_fee",
];

/// Everything the assembly reads about one order, loaded once.
struct OrderContext<'a> {
    order: &'a Order,
    session: &'a CheckoutSession,
    settings: &'a StoreSettings,
    products: Vec<OrderProduct>,
    catalog: HashMap<i64, ProductInfo>,
    totals: Vec<OrderTotal>,
}

impl OrderContext<'_> {
    fn total(&self, code: &str) -> Option<&OrderTotal> {
        self.totals.iter().find(|total| total.code == code)
    }

    fn sort_order(&self, code: &str) -> i64 {
        self.settings.sort_order(&total_key(code, "sort_order"))
    }

    /// Whether the order total is calculated before taxes.
    fn is_pre_tax(&self, code: &str) -> bool {
        is_pre_tax(self.settings, code)
    }

    fn tax_class(&self, key: &str) -> i64 {
        self.settings.get_i64(key).unwrap_or(0)
    }

    fn money(&self, price: Decimal) -> Money {
        Money::from_price(price, &self.order.currency_code, self.order.currency_value)
    }

    fn format(&self, amount: Decimal) -> String {
        texts::format_price(amount, &self.order.currency_code, self.order.currency_value)
    }

    fn product_info(&self, product_id: i64) -> Option<&ProductInfo> {
        self.catalog.get(&product_id)
    }

    fn line_item(&self, name: &str, price: Decimal, merchant_item_id: &str, tax_rate: Decimal) -> CartItem {
        CartItem {
            name: name.to_string(),
            description: name.to_string(),
            unit_price: self.money(price),
            quantity: 1,
            merchant_item_id: merchant_item_id.to_string(),
            tax_rate,
            weight: None,
        }
    }
}

/// Items grouped by total sort order, flattened in ascending key order.
#[derive(Default)]
struct Buckets(BTreeMap<i64, Vec<CartItem>>);

impl Buckets {
    fn push(&mut self, sort_order: i64, item: CartItem) {
        self.0.entry(sort_order).or_default().push(item);
    }

    fn extend(&mut self, sort_order: i64, items: impl IntoIterator<Item = CartItem>) {
        self.0.entry(sort_order).or_default().extend(items);
    }

    fn into_cart(self) -> ShoppingCart {
        ShoppingCart::new(self.0.into_values().flatten().collect())
    }
}

pub struct CartAssembler {
    orders: Arc<dyn OrderRepository>,
    catalog: Arc<dyn CatalogRepository>,
    taxes: Arc<dyn TaxRateLookup>,
}

impl CartAssembler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        catalog: Arc<dyn CatalogRepository>,
        taxes: Arc<dyn TaxRateLookup>,
    ) -> Self {
        Self {
            orders,
            catalog,
            taxes,
        }
    }

    /// Builds the shopping cart of `order`. Categories the order does not
    /// have are left out; only repository failures are errors.
    #[instrument(skip(self, order, session, settings), fields(order_id = order.order_id))]
    pub async fn assemble(
        &self,
        order: &Order,
        session: &CheckoutSession,
        settings: &StoreSettings,
    ) -> Result<ShoppingCart, ServiceError> {
        let products = self.orders.order_products(order.order_id).await?;
        let totals = self.orders.order_totals(order.order_id).await?;

        let mut catalog = HashMap::new();
        for product in &products {
            if catalog.contains_key(&product.product_id) {
                continue;
            }
            if let Some(info) = self.catalog.product(product.product_id).await? {
                catalog.insert(product.product_id, info);
            }
        }

        let ctx = OrderContext {
            order,
            session,
            settings,
            products,
            catalog,
            totals,
        };
        let mut buckets = Buckets::default();

        let sub_total_sort = ctx.sort_order("sub_total");
        let reward_discounts = self.reward_discounts(&ctx);
        for product in &ctx.products {
            let item = self.product_item(&ctx, product, &reward_discounts).await?;
            buckets.push(sub_total_sort, item);
        }
        for voucher in self.orders.order_vouchers(order.order_id).await? {
            let description = texts::decode_entities(&voucher.description);
            buckets.push(
                sub_total_sort,
                ctx.line_item(
                    &description,
                    voucher.amount,
                    &voucher.order_voucher_id.to_string(),
                    Decimal::ZERO,
                ),
            );
        }

        if let Some(item) = self.shipping_item(&ctx).await? {
            buckets.push(ctx.sort_order("shipping"), item);
        }

        if let Some(item) = post_tax_coupon_item(&ctx) {
            buckets.push(ctx.sort_order("coupon"), item);
        }

        for (code, item_id) in [("handling", HANDLING_ITEM_ID), ("low_order_fee", LOW_ORDER_FEE_ITEM_ID)] {
            if let Some(total) = ctx.total(code) {
                let class = ctx.tax_class(&total_key(code, "tax_class_id"));
                let tax_rate = self.percentage_rate(total.value, class).await?;
                let title = texts::decode_entities(&total.title);
                buckets.push(ctx.sort_order(code), ctx.line_item(&title, total.value, item_id, tax_rate));
            }
        }

        let custom_codes = self.custom_total_codes(&ctx).await?;

        let fixed_taxes = self.fixed_tax_items(&ctx, &custom_codes).await?;
        buckets.extend(ctx.sort_order("tax"), fixed_taxes);

        if ctx.session.customer_balance > Decimal::ZERO {
            if let Some(credit) = ctx.total("credit") {
                let mut item = ctx.line_item(texts::CUSTOMER_BALANCE, credit.value, CREDIT_ITEM_ID, Decimal::ZERO);
                item.unit_price = item.unit_price.negative();
                buckets.push(ctx.sort_order("credit"), item);
            }
        }

        if let Some(voucher) = ctx.total("voucher") {
            let title = texts::decode_entities(&voucher.title);
            buckets.push(
                ctx.sort_order("voucher"),
                ctx.line_item(&title, voucher.value, VOUCHER_ITEM_ID, Decimal::ZERO),
            );
        }

        for code in &custom_codes {
            let Some(total) = ctx.total(code) else {
                continue;
            };
            let tax_rate = if ctx.is_pre_tax(code) {
                let class = ctx.tax_class(&total_key(code, "tax_class_id"));
                self.percentage_rate(total.value, class).await?
            } else {
                Decimal::ZERO
            };
            let title = texts::decode_entities(&total.title);
            buckets.push(ctx.sort_order(code), ctx.line_item(&title, total.value, code, tax_rate));
        }

        let cart = buckets.into_cart();
        debug!(items = cart.len(), "Shopping cart assembled");
        Ok(cart)
    }

    async fn product_item(
        &self,
        ctx: &OrderContext<'_>,
        product: &OrderProduct,
        reward_discounts: &HashMap<i64, Decimal>,
    ) -> Result<CartItem, ServiceError> {
        let info = ctx.product_info(product.product_id);
        let tax_class_id = info.map(|info| info.tax_class_id).unwrap_or(0);

        let mut tax_rate = self.percentage_rate(product.price, tax_class_id).await?;
        if product.tax == Some(Decimal::ZERO) {
            tax_rate = Decimal::ZERO;
        }

        let mut name = format!("{} x {}", product.quantity, texts::decode_entities(&product.name));
        let mut merchant_item_id = product.product_id.to_string();
        let mut selected = Vec::new();
        for option in &product.options {
            let value = match option.kind {
                OptionKind::File => match self.catalog.upload_name(&option.value).await? {
                    Some(file_name) => file_name,
                    None => continue,
                },
                _ => option.value.clone(),
            };
            selected.push(format!("{}: {}", texts::decode_entities(&option.name), value));
            merchant_item_id.push_str(&format!("-{}", option.product_option_id));
        }
        if !selected.is_empty() {
            name.push_str(&format!(" ({})", selected.join(", ")));
        }

        let mut price = product.price;
        let mut description = String::new();

        if let (Some(discount), Some(reward)) = (reward_discounts.get(&product.product_id), ctx.total("reward")) {
            if product.quantity != 0 {
                price -= *discount / Decimal::from(product.quantity);
            }
            let suffix = texts::reward_suffix(&ctx.format(*discount), &reward.title.to_lowercase());
            name.push_str(&suffix);
            description.push_str(&suffix);
        }

        if let Some(coupon) = ctx.session.coupon.as_ref() {
            if ctx.total("coupon").is_some() && ctx.is_pre_tax("coupon") {
                if let Some(discount) = coupon_discount(ctx, coupon, product) {
                    price -= discount;
                    name.push_str(&texts::coupon_suffix(&coupon.name));
                    description.push_str(&texts::price_before_coupon(
                        &ctx.format(product.price),
                        &coupon.name,
                    ));
                }
            }
        }

        let weight = info
            .filter(|info| !info.weight_unit.is_empty() && !info.weight.is_zero())
            .map(|info| Weight::new(&info.weight_unit, info.weight));

        Ok(CartItem {
            name,
            description,
            unit_price: ctx.money(price),
            quantity: product.quantity,
            merchant_item_id,
            tax_rate,
            weight,
        })
    }

    /// Reward point discount of each product line, in the default currency.
    fn reward_discounts(&self, ctx: &OrderContext<'_>) -> HashMap<i64, Decimal> {
        let mut discounts = HashMap::new();
        if ctx.total("reward").is_none() || ctx.session.reward_points <= Decimal::ZERO {
            return discounts;
        }

        let points = |product: &OrderProduct| {
            ctx.product_info(product.product_id)
                .map(|info| info.points)
                .unwrap_or(0)
        };
        let points_total: i64 = ctx
            .products
            .iter()
            .filter(|product| points(product) > 0)
            .map(|product| points(product) * product.quantity)
            .sum();
        if points_total == 0 {
            return discounts;
        }

        for product in ctx.products.iter().filter(|product| points(product) > 0) {
            let discount = product.total * ctx.session.reward_points / Decimal::from(points_total);
            discounts.insert(product.product_id, discount);
        }
        discounts
    }

    async fn shipping_item(&self, ctx: &OrderContext<'_>) -> Result<Option<CartItem>, ServiceError> {
        let Some(shipping) = ctx.total("shipping") else {
            return Ok(None);
        };
        let title = texts::decode_entities(&shipping.title);

        if let Some(coupon) = ctx.session.coupon.as_ref().filter(|coupon| coupon.shipping) {
            let name = texts::coupon_shipping(&title, &coupon.name);
            return Ok(Some(ctx.line_item(&name, Decimal::ZERO, SHIPPING_ITEM_ID, Decimal::ZERO)));
        }

        let class = ctx.tax_class(&shipping_tax_class_key(ctx.order));
        let tax_rate = self.percentage_rate(shipping.value, class).await?;
        Ok(Some(ctx.line_item(&title, shipping.value, SHIPPING_ITEM_ID, tax_rate)))
    }

    /// Fixed amount taxes collapsed by tax rate, in first seen order.
    async fn fixed_tax_items(
        &self,
        ctx: &OrderContext<'_>,
        custom_codes: &[String],
    ) -> Result<Vec<CartItem>, ServiceError> {
        let mut collected: Vec<TaxRate> = Vec::new();

        for product in &ctx.products {
            let class = ctx
                .product_info(product.product_id)
                .map(|info| info.tax_class_id)
                .unwrap_or(0);
            let fixed = self.fixed_rates(product.price, class).await?;
            for _ in 0..product.quantity.max(0) {
                collected.extend(fixed.iter().cloned());
            }
        }

        if let Some(shipping) = ctx.total("shipping") {
            let class = ctx.tax_class(&shipping_tax_class_key(ctx.order));
            collected.extend(self.fixed_rates(shipping.value, class).await?);
        }

        let fee_codes = ["handling", "low_order_fee"]
            .into_iter()
            .map(str::to_string)
            .chain(custom_codes.iter().cloned());
        for code in fee_codes {
            let Some(total) = ctx.total(&code) else {
                continue;
            };
            let class = ctx.tax_class(&total_key(&code, "tax_class_id"));
            if class != 0 && ctx.is_pre_tax(&code) {
                collected.extend(self.fixed_rates(total.value, class).await?);
            }
        }

        let mut groups: Vec<(TaxRate, i64)> = Vec::new();
        for rate in collected {
            match groups.iter_mut().find(|(seen, _)| seen.tax_rate_id == rate.tax_rate_id) {
                Some((_, count)) => *count += 1,
                None => groups.push((rate, 1)),
            }
        }

        Ok(groups
            .into_iter()
            .map(|(rate, count)| {
                let name = texts::fixed_tax(&texts::decode_entities(&rate.name));
                let mut item = ctx.line_item(
                    &name,
                    rate.amount,
                    &format!("TAX-{}", rate.tax_rate_id),
                    Decimal::ZERO,
                );
                item.quantity = count;
                item
            })
            .collect())
    }

    /// Installed order totals without dedicated handling, minus the ones the
    /// merchant excluded.
    async fn custom_total_codes(&self, ctx: &OrderContext<'_>) -> Result<Vec<String>, ServiceError> {
        let excluded = excluded_total_codes(ctx.settings);

        Ok(self
            .catalog
            .installed_total_codes()
            .await?
            .into_iter()
            .map(|code| code.trim().to_string())
            .filter(|code| !DEFAULT_TOTAL_CODES.contains(&code.as_str()))
            .filter(|code| !excluded.contains(code))
            .collect())
    }

    async fn percentage_rate(&self, amount: Decimal, tax_class_id: i64) -> Result<Decimal, ServiceError> {
        if tax_class_id == 0 {
            return Ok(Decimal::ZERO);
        }
        Ok(self
            .taxes
            .rates(amount, tax_class_id)
            .await?
            .iter()
            .filter(|rate| rate.kind == TaxRateKind::Percentage)
            .map(|rate| rate.rate)
            .sum())
    }

    async fn fixed_rates(&self, amount: Decimal, tax_class_id: i64) -> Result<Vec<TaxRate>, ServiceError> {
        if tax_class_id == 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .taxes
            .rates(amount, tax_class_id)
            .await?
            .into_iter()
            .filter(|rate| rate.kind == TaxRateKind::Fixed)
            .collect())
    }
}

fn shipping_tax_class_key(order: &Order) -> String {
    let method = order
        .shipping_code
        .split('.')
        .next()
        .unwrap_or_default();
    format!("shipping_{}_tax_class_id", method)
}

/// Unit price reduction of a pre-tax coupon on one product line. The first
/// matching policy wins.
fn coupon_discount(ctx: &OrderContext<'_>, coupon: &Coupon, product: &OrderProduct) -> Option<Decimal> {
    let quantity = Decimal::from(product.quantity);
    match coupon.kind {
        CouponKind::Fixed if coupon.discount > Decimal::ZERO && !quantity.is_zero() => {
            let lines = if coupon.is_restricted() {
                if !coupon.applies_to(product.product_id) {
                    return None;
                }
                ctx.products
                    .iter()
                    .filter(|line| coupon.applies_to(line.product_id))
                    .count()
            } else {
                ctx.products.len()
            };
            Some(coupon.discount / Decimal::from(lines) / quantity)
        }
        CouponKind::Percentage => {
            if coupon.is_restricted() && !coupon.applies_to(product.product_id) {
                return None;
            }
            // shipping only coupons carry no discount
            if coupon.discount.is_zero() {
                return None;
            }
            Some(product.price * coupon.discount / dec!(100))
        }
        _ => None,
    }
}

/// Coupon calculated after taxes, sent as a single negative line.
fn post_tax_coupon_item(ctx: &OrderContext<'_>) -> Option<CartItem> {
    let coupon = ctx.session.coupon.as_ref()?;
    let total = ctx.total("coupon")?;
    if ctx.is_pre_tax("coupon") {
        return None;
    }

    let amount = match coupon.kind {
        CouponKind::Fixed => coupon.discount,
        CouponKind::Percentage => total.value.abs(),
    };
    if amount.is_zero() {
        return None;
    }

    let name = texts::decode_entities(&coupon.name);
    let mut item = ctx.line_item(&name, amount, COUPON_ITEM_ID, Decimal::ZERO);
    item.unit_price = item.unit_price.negative();
    Some(item)
}

/// Whether an order total is calculated before taxes. A pre-tax coupon is
/// spent on product prices rather than a separate cart line.
pub fn is_pre_tax(settings: &StoreSettings, code: &str) -> bool {
    settings.sort_order(&total_key("tax", "sort_order")) > settings.sort_order(&total_key(code, "sort_order"))
}

/// Custom order totals the merchant excluded from the cart.
pub fn excluded_total_codes(settings: &StoreSettings) -> Vec<String> {
    settings
        .get_str(&payment_key("custom_order_total_keys"))
        .unwrap_or_default()
        .split(',')
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect()
}
