//! Svix webhook envelope verification
//!
//! Secrets look like `whsec_<base64 key>`. Each delivery is signed as
//! `base64(HMAC-SHA256(key, "{svix-id}.{svix-timestamp}.{body}"))` and the
//! `svix-signature` header lists space-separated `v1,<signature>` entries.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::IdentityError;

type HmacSha256 = Hmac<Sha256>;

pub const SVIX_ID_HEADER: &str = "svix-id";
pub const SVIX_TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SVIX_SIGNATURE_HEADER: &str = "svix-signature";

/// Maximum age (and clock skew) accepted for a signed delivery
pub const SVIX_TOLERANCE_SECS: u64 = 300;

/// The three envelope headers of one delivery
#[derive(Debug, Clone, Copy)]
pub struct SvixHeaders<'a> {
    pub id: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

/// Verifies Svix-signed deliveries with one endpoint secret
#[derive(Clone)]
pub struct SvixVerifier {
    key: Vec<u8>,
}

impl SvixVerifier {
    pub fn new(secret: &str) -> Result<Self, IdentityError> {
        let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
        let key = BASE64
            .decode(encoded)
            .map_err(|_| IdentityError::NotConfigured("webhook secret is not valid base64"))?;
        Ok(Self { key })
    }

    pub fn verify(&self, headers: SvixHeaders<'_>, body: &str, now: i64) -> Result<(), IdentityError> {
        let timestamp: i64 = headers
            .timestamp
            .trim()
            .parse()
            .map_err(|_| IdentityError::InvalidSignature)?;

        if now.abs_diff(timestamp) > SVIX_TOLERANCE_SECS {
            tracing::warn!(
                svix_id = %headers.id,
                timestamp = timestamp,
                now = now,
                "Identity webhook timestamp outside tolerance"
            );
            return Err(IdentityError::InvalidSignature);
        }

        let expected = self.sign(headers.id, timestamp, body)?;

        let matched = headers
            .signature
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == "v1")
            .any(|(_, signature)| {
                signature.len() == expected.len()
                    && bool::from(signature.as_bytes().ct_eq(expected.as_bytes()))
            });

        if matched {
            Ok(())
        } else {
            tracing::warn!(svix_id = %headers.id, "Identity webhook signature mismatch");
            Err(IdentityError::InvalidSignature)
        }
    }

    /// Base64 signature for a delivery, as the sender computes it
    pub fn sign(&self, id: &str, timestamp: i64, body: &str) -> Result<String, IdentityError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| IdentityError::NotConfigured("webhook secret has an invalid length"))?;
        mac.update(format!("{}.{}.{}", id, timestamp, body).as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}
