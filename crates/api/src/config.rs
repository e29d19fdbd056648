//! Application configuration

use std::env;

/// Key material used to validate identity-provider session tokens
#[derive(Clone, PartialEq, Eq)]
pub enum SessionKey {
    /// PEM-encoded RSA public key (RS256)
    RsaPublicKey(String),
    /// Shared secret (HS256)
    SharedSecret(String),
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RsaPublicKey(_) => f.write_str("RsaPublicKey(..)"),
            Self::SharedSecret(_) => f.write_str("SharedSecret(..)"),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub app_url: String,
    pub allowed_origins: Vec<String>,
    pub log_json: bool,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub run_migrations: bool,

    // Stripe
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: Option<String>,

    // Clerk
    pub clerk_webhook_secret: Option<String>,
    pub session_key: SessionKey,
    pub sign_in_url: String,
    pub sign_up_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_url = env::var("APP_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            run_migrations: env::var("RUN_MIGRATIONS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),

            // Stripe
            stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                .map_err(|_| ConfigError::Missing("STRIPE_SECRET_KEY"))?,
            stripe_webhook_secret: non_empty_var("STRIPE_WEBHOOK_SECRET"),

            // Clerk
            clerk_webhook_secret: non_empty_var("CLERK_WEBHOOK_SECRET"),
            session_key: session_key_from_env()?,
            // Hosted pages live on the identity provider's domain
            sign_in_url: non_empty_var("CLERK_SIGN_IN_URL")
                .ok_or(ConfigError::Missing("CLERK_SIGN_IN_URL"))?,
            sign_up_url: non_empty_var("CLERK_SIGN_UP_URL")
                .ok_or(ConfigError::Missing("CLERK_SIGN_UP_URL"))?,

            app_url,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn session_key_from_env() -> Result<SessionKey, ConfigError> {
    if let Some(pem) = non_empty_var("CLERK_JWT_PUBLIC_KEY") {
        // Accept PEMs stored on one line with literal "\n"
        return Ok(SessionKey::RsaPublicKey(pem.replace("\\n", "\n")));
    }

    let secret = non_empty_var("CLERK_JWT_SECRET")
        .ok_or(ConfigError::Missing("CLERK_JWT_PUBLIC_KEY or CLERK_JWT_SECRET"))?;
    if secret.len() < 32 {
        return Err(ConfigError::WeakSecret(
            "CLERK_JWT_SECRET must be at least 32 characters",
        ));
    }
    Ok(SessionKey::SharedSecret(secret))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}
