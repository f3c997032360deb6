// Storefront texts and formatting
pub mod texts;

// Payment method catalog and selection
pub mod gateway_registry;

// Checkout
pub mod cart_assembler;
pub mod checkout;
pub mod order_request;

// Vendor notifications
pub mod callback_reconciler;

// Merchant back office
pub mod admin;
