//! Verification of HMAC-signed webhook notifications.
//!
//! The sender signs the raw request body with HMAC-SHA256 keyed by the
//! account's secret key and puts the base64 digest in the
//! `X-Neofin-Hmac-SHA256` header. Verification must run on the exact bytes
//! received, never on a re-serialized body.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64 signature.
pub const SIGNATURE_HEADER: &str = "X-Neofin-Hmac-SHA256";

/// Checks webhook signatures against one secret key.
#[derive(Clone)]
pub struct WebhookValidator {
    secret_key: Vec<u8>,
}

impl std::fmt::Debug for WebhookValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookValidator").finish_non_exhaustive()
    }
}

impl WebhookValidator {
    pub fn new(secret_key: impl AsRef<[u8]>) -> Result<Self, ApiError> {
        let secret_key = secret_key.as_ref();
        if secret_key.is_empty() {
            return Err(ApiError::Configuration("Secret key cannot be empty".to_string()));
        }
        Ok(Self {
            secret_key: secret_key.to_vec(),
        })
    }

    /// True iff `signature_header` is the base64 HMAC-SHA256 of `body`.
    ///
    /// Never fails: empty input and malformed base64 are reported as
    /// `false`. The digest comparison is constant-time; a decoded value of
    /// the wrong length is rejected before comparing, which reveals only
    /// that verification failed.
    pub fn is_valid(&self, body: &[u8], signature_header: &str) -> bool {
        if body.is_empty() || signature_header.is_empty() {
            return false;
        }
        let Ok(expected) = STANDARD.decode(signature_header) else {
            tracing::debug!("webhook signature is not valid base64");
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret_key) else {
            return false;
        };
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }

    /// Base64 signature the sender would attach to `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret_key) else {
            return String::new();
        };
        mac.update(body);
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

/// One-shot form of `WebhookValidator::is_valid`. An empty secret yields
/// `false`.
pub fn verify(body: &[u8], signature_header: &str, secret_key: &str) -> bool {
    match WebhookValidator::new(secret_key) {
        Ok(validator) => validator.is_valid(body, signature_header),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"event":"billing.paid","billing_number":"1"}"#;

    fn validator() -> WebhookValidator {
        WebhookValidator::new("test_secret_key").unwrap()
    }

    #[test]
    fn empty_secret_is_rejected() {
        let err = WebhookValidator::new("").unwrap_err();
        assert_eq!(err, ApiError::Configuration("Secret key cannot be empty".to_string()));
        assert!(!verify(BODY, "c2ln", ""));
    }

    #[test]
    fn known_digest() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let validator = WebhookValidator::new("key").unwrap();
        let body = b"The quick brown fox jumps over the lazy dog";
        assert_eq!(
            validator.sign(body),
            "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg="
        );
        assert!(validator.is_valid(body, "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg="));
    }

    #[test]
    fn signature_from_same_secret_verifies() {
        let signature = validator().sign(BODY);
        assert!(validator().is_valid(BODY, &signature));
        assert!(verify(BODY, &signature, "test_secret_key"));
    }

    #[test]
    fn wrong_secret_fails() {
        let signature = WebhookValidator::new("other").unwrap().sign(BODY);
        assert!(!validator().is_valid(BODY, &signature));
    }

    #[test]
    fn tampered_body_fails() {
        let signature = validator().sign(BODY);
        assert!(!validator().is_valid(br#"{"event":"billing.paid","billing_number":"2"}"#, &signature));
    }

    #[test]
    fn empty_inputs_fail() {
        let signature = validator().sign(BODY);
        assert!(!validator().is_valid(b"", &signature));
        assert!(!validator().is_valid(BODY, ""));
    }

    #[test]
    fn non_base64_header_fails() {
        assert!(!validator().is_valid(BODY, "not base64!"));
        // Strict decoding: no embedded newlines.
        let signature = validator().sign(BODY);
        let wrapped = format!("{}\n{}", &signature[..20], &signature[20..]);
        assert!(!validator().is_valid(BODY, &wrapped));
    }

    #[test]
    fn truncated_digest_fails() {
        let signature = validator().sign(BODY);
        let digest = STANDARD.decode(&signature).unwrap();
        let truncated = STANDARD.encode(&digest[..16]);
        assert!(!validator().is_valid(BODY, &truncated));
    }

    #[test]
    fn debug_hides_secret() {
        assert!(!format!("{:?}", validator()).contains("test_secret_key"));
    }
}
