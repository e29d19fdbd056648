//! Identity-provider webhook handling

pub mod events;
pub mod mirror;
pub mod svix;

use plansync_shared::StoreError;

use crate::error::ApiError;

pub use events::{IdentityEvent, UserPayload};
pub use mirror::ProfileMirror;
pub use svix::{SvixHeaders, SvixVerifier};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Missing svix headers")]
    MissingHeaders,
    #[error("Invalid webhook signature")]
    InvalidSignature,
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
    #[error("Identity webhook not configured: {0}")]
    NotConfigured(&'static str),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        IdentityError::InvalidPayload(err.to_string())
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MissingHeaders => ApiError::Validation(err.to_string()),
            IdentityError::InvalidSignature => ApiError::InvalidSignature(err.to_string()),
            IdentityError::InvalidPayload(_) => ApiError::Validation(err.to_string()),
            IdentityError::NotConfigured(msg) => ApiError::Config(msg.to_string()),
            IdentityError::Store(err) => err.into(),
        }
    }
}
