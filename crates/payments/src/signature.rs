//! Webhook signature verification.
//!
//! Implements the processor's timestamped HMAC scheme: the header carries
//! `t=<unix seconds>,v1=<hex digest>` and the digest is HMAC-SHA256 over
//! `"{t}.{raw body}"` keyed with the shared webhook secret. Verification is
//! constant time and bounded by a timestamp tolerance to blunt replays.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{GatewayError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Default tolerance between the signed timestamp and now.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verifies webhook signatures against a shared secret.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    /// Creates a verifier with the default timestamp tolerance.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Overrides the timestamp tolerance.
    pub fn with_tolerance_secs(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verifies `signature_header` against the exact `raw_body` bytes.
    pub fn verify(&self, raw_body: &[u8], signature_header: &str) -> Result<()> {
        self.verify_at(raw_body, signature_header, Utc::now().timestamp())
    }

    fn verify_at(&self, raw_body: &[u8], signature_header: &str, now: i64) -> Result<()> {
        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<Vec<u8>> = Vec::new();

        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = value.parse().ok();
                }
                Some(("v1", value)) => {
                    if let Ok(bytes) = hex::decode(value) {
                        candidates.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| GatewayError::Unauthenticated("missing timestamp".to_string()))?;
        if candidates.is_empty() {
            return Err(GatewayError::Unauthenticated(
                "missing v1 signature".to_string(),
            ));
        }

        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(GatewayError::Unauthenticated(format!(
                "timestamp outside tolerance: signed at {timestamp}, now {now}"
            )));
        }

        for candidate in &candidates {
            let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
                .map_err(|e| GatewayError::Unauthenticated(e.to_string()))?;
            mac.update(timestamp.to_string().as_bytes());
            mac.update(b".");
            mac.update(raw_body);
            if mac.verify_slice(candidate).is_ok() {
                return Ok(());
            }
        }

        Err(GatewayError::Unauthenticated(
            "no matching v1 signature".to_string(),
        ))
    }

    /// Produces a valid signature header for `raw_body` at `timestamp`.
    ///
    /// Counterpart to [`verify`](Self::verify); used by the in-memory gateway
    /// and tests to fabricate deliveries.
    pub fn sign(&self, raw_body: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(raw_body);
        let digest = hex::encode(mac.finalize().into_bytes());
        format!("t={timestamp},v1={digest}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new("whsec_test")
    }

    #[test]
    fn accepts_a_freshly_signed_body() {
        let v = verifier();
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let now = Utc::now().timestamp();
        let header = v.sign(body, now);
        assert!(v.verify_at(body, &header, now).is_ok());
    }

    #[test]
    fn rejects_a_tampered_body() {
        let v = verifier();
        let now = Utc::now().timestamp();
        let header = v.sign(b"original", now);
        let err = v.verify_at(b"tampered", &header, now).unwrap_err();
        assert!(matches!(err, GatewayError::Unauthenticated(_)));
    }

    #[test]
    fn rejects_a_wrong_secret() {
        let now = Utc::now().timestamp();
        let header = WebhookVerifier::new("whsec_other").sign(b"body", now);
        let err = verifier().verify_at(b"body", &header, now).unwrap_err();
        assert!(matches!(err, GatewayError::Unauthenticated(_)));
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let v = verifier();
        let signed_at = Utc::now().timestamp() - DEFAULT_TOLERANCE_SECS - 10;
        let header = v.sign(b"body", signed_at);
        let err = v
            .verify_at(b"body", &header, Utc::now().timestamp())
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unauthenticated(_)));
    }

    #[test]
    fn rejects_a_malformed_header() {
        let v = verifier();
        let now = Utc::now().timestamp();
        assert!(v.verify_at(b"body", "", now).is_err());
        assert!(v.verify_at(b"body", "v1=deadbeef", now).is_err());
        assert!(v.verify_at(b"body", &format!("t={now}"), now).is_err());
        assert!(v.verify_at(b"body", &format!("t={now},v1=nothex"), now).is_err());
    }

    #[test]
    fn accepts_any_matching_v1_among_several() {
        let v = verifier();
        let now = Utc::now().timestamp();
        let good = v.sign(b"body", now);
        let digest = good.split("v1=").nth(1).unwrap();
        let header = format!("t={now},v1={},v1={digest}", "0".repeat(64));
        assert!(v.verify_at(b"body", &header, now).is_ok());
    }
}
