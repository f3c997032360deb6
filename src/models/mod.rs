//! Domain records shared by the services, repositories and HTTP handlers.

pub mod cart;
pub mod catalog;
pub mod gateway;
pub mod order;
pub mod session;
pub mod transaction;

pub use cart::{CartItem, Money, ShoppingCart, Weight};
pub use catalog::{Coupon, CouponKind, ProductInfo, TaxRate, TaxRateKind};
pub use gateway::{CheckoutField, CheckoutProfile, GatewayDescriptor, GatewayInfoKind, GatewayKind};
pub use order::{
    Address, OptionKind, Order, OrderHistory, OrderOption, OrderProduct, OrderTotal, OrderVoucher,
};
pub use session::CheckoutSession;
pub use transaction::{Transaction, TransactionStatus};
