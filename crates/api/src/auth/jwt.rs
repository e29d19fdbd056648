//! Identity-provider session token validation

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::SessionKey;

/// Claims carried by an identity-provider session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (external user ID)
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Expiration
    pub exp: i64,
}

impl SessionClaims {
    /// Full name claim, or the non-empty first/last names joined by a space
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return Some(name.to_string());
        }
        join_names(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

/// Join the non-empty parts of a first/last name pair
pub fn join_names(first: Option<&str>, last: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Validates session tokens with one explicitly configured algorithm
#[derive(Clone)]
pub struct SessionVerifier {
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl SessionVerifier {
    pub fn new(key: &SessionKey) -> Result<Self, JwtError> {
        let (decoding_key, algorithm) = match key {
            SessionKey::RsaPublicKey(pem) => (
                DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| JwtError::InvalidKey(e.to_string()))?,
                Algorithm::RS256,
            ),
            SessionKey::SharedSecret(secret) => {
                (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
            }
        };

        Ok(Self {
            decoding_key,
            algorithm,
        })
    }

    /// Validate and decode a token
    /// Explicit algorithm validation prevents algorithm confusion attacks
    pub fn verify(&self, token: &str) -> Result<SessionClaims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 60; // 60 second clock skew tolerance
        // Session tokens carry an authorized-party claim rather than an audience
        validation.validate_aud = false;

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidToken => JwtError::Invalid,
                jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => JwtError::Invalid,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::Invalid,
                _ => JwtError::Validation(e.to_string()),
            })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Invalid verification key: {0}")]
    InvalidKey(String),
    #[error("Token validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    const SECRET: &str = "test-session-secret-at-least-32-chars!";

    fn token(secret: &str, algorithm: Algorithm, exp_offset: i64) -> String {
        let claims = SessionClaims {
            sub: "user_123".to_string(),
            email: Some("a@example.com".to_string()),
            name: None,
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            exp: OffsetDateTime::now_utc().unix_timestamp() + exp_offset,
        };
        encode(
            &Header::new(algorithm),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn verifier() -> SessionVerifier {
        SessionVerifier::new(&SessionKey::SharedSecret(SECRET.to_string())).unwrap()
    }

    #[test]
    fn test_valid_token() {
        let claims = verifier().verify(&token(SECRET, Algorithm::HS256, 300)).unwrap();
        assert_eq!(claims.sub, "user_123");
        assert_eq!(claims.display_name().as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let result = verifier().verify(&token(SECRET, Algorithm::HS256, -3600));
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_wrong_secret_or_algorithm_rejected() {
        assert!(verifier()
            .verify(&token("another-secret-that-is-32-chars-long!!", Algorithm::HS256, 300))
            .is_err());
        assert!(verifier().verify(&token(SECRET, Algorithm::HS384, 300)).is_err());
        assert!(verifier().verify("not-a-jwt").is_err());
    }

    #[test]
    fn test_invalid_pem_rejected() {
        let result = SessionVerifier::new(&SessionKey::RsaPublicKey("nope".to_string()));
        assert!(matches!(result, Err(JwtError::InvalidKey(_))));
    }

    #[test]
    fn test_join_names() {
        assert_eq!(join_names(Some("Ada"), None).as_deref(), Some("Ada"));
        assert_eq!(join_names(Some(" "), Some("Byron")).as_deref(), Some("Byron"));
        assert!(join_names(None, Some("")).is_none());
    }
}
