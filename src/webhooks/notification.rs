use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use tracing::debug;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the notification signature.
pub const AUTH_HEADER: &str = "Auth";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header is missing")]
    Missing,
    #[error("signature header is not valid base64 `timestamp:hash`")]
    Malformed,
    #[error("notification timestamp is outside the accepted window")]
    Expired,
    #[error("signature does not match")]
    Mismatch,
}

/// Verifies the `Auth` header of a vendor notification.
///
/// The header is `base64("{timestamp}:{hex(hmac_sha512(api_key, "{timestamp}:{body}"))}")`.
#[derive(Debug, Clone)]
pub struct NotificationVerifier {
    tolerance: Duration,
}

impl NotificationVerifier {
    pub fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    pub fn verify(&self, body: &str, auth_header: Option<&str>, api_key: &str) -> Result<(), SignatureError> {
        self.verify_at(body, auth_header, api_key, now_secs())
    }

    /// Same as [`verify`](Self::verify) with an explicit clock, in seconds.
    pub fn verify_at(
        &self,
        body: &str,
        auth_header: Option<&str>,
        api_key: &str,
        now: f64,
    ) -> Result<(), SignatureError> {
        let header = auth_header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(SignatureError::Missing)?;
        let decoded = STANDARD.decode(header).map_err(|_| SignatureError::Malformed)?;
        let decoded = String::from_utf8(decoded).map_err(|_| SignatureError::Malformed)?;
        let (timestamp, signature) = decoded.split_once(':').ok_or(SignatureError::Malformed)?;

        let sent_at: f64 = timestamp.trim().parse().map_err(|_| SignatureError::Malformed)?;
        if (now - sent_at).abs() > self.tolerance.as_secs_f64() {
            debug!(sent_at, now, "Notification timestamp outside window");
            return Err(SignatureError::Expired);
        }

        let expected = sign(timestamp, body, api_key);
        if constant_time_eq(expected.as_bytes(), signature.trim().as_bytes()) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

/// Hex HMAC-SHA512 of `"{timestamp}:{body}"`.
pub fn sign(timestamp: &str, body: &str, api_key: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha512::new_from_slice(api_key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Value of the `Auth` header a vendor would send for `body`.
pub fn auth_header(timestamp: &str, body: &str, api_key: &str) -> String {
    STANDARD.encode(format!("{}:{}", timestamp, sign(timestamp, body, api_key)))
}

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const BODY: &str = r#"{"order_id":"1045","status":"completed"}"#;
    const NOW: f64 = 1_700_000_000.0;

    fn verifier() -> NotificationVerifier {
        NotificationVerifier::new(Duration::from_secs(600))
    }

    #[test]
    fn accepts_signed_body() {
        let header = auth_header("1700000000", BODY, "secret");
        assert_matches!(verifier().verify_at(BODY, Some(&header), "secret", NOW), Ok(()));
    }

    #[test]
    fn accepts_fractional_timestamps() {
        let header = auth_header("1699999990.25", BODY, "secret");
        assert_matches!(verifier().verify_at(BODY, Some(&header), "secret", NOW), Ok(()));
    }

    #[test]
    fn rejects_tampered_body_and_wrong_key() {
        let header = auth_header("1700000000", BODY, "secret");
        assert_matches!(
            verifier().verify_at("{}", Some(&header), "secret", NOW),
            Err(SignatureError::Mismatch)
        );
        assert_matches!(
            verifier().verify_at(BODY, Some(&header), "other", NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_notifications() {
        let header = auth_header("1699999000", BODY, "secret");
        assert_matches!(
            verifier().verify_at(BODY, Some(&header), "secret", NOW),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn rejects_missing_and_garbage_headers() {
        assert_matches!(verifier().verify_at(BODY, None, "k", NOW), Err(SignatureError::Missing));
        assert_matches!(
            verifier().verify_at(BODY, Some("not base64!"), "k", NOW),
            Err(SignatureError::Malformed)
        );
        let no_colon = STANDARD.encode("1700000000");
        assert_matches!(
            verifier().verify_at(BODY, Some(&no_colon), "k", NOW),
            Err(SignatureError::Malformed)
        );
    }
}
