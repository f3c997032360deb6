/// Inbound vendor notifications
pub mod notification;

pub use notification::{NotificationVerifier, SignatureError, AUTH_HEADER};
