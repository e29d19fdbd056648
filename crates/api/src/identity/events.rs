//! Identity-provider user lifecycle events

use serde::Deserialize;

use super::IdentityError;
use crate::auth::join_names;

#[derive(Debug, Clone, Deserialize)]
pub struct EmailAddress {
    pub email_address: String,
}

/// `data` of a `user.created` / `user.updated` event
#[derive(Debug, Clone, Deserialize)]
pub struct UserPayload {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
}

impl UserPayload {
    /// First listed address
    pub fn primary_email(&self) -> Option<String> {
        self.email_addresses
            .first()
            .map(|e| e.email_address.clone())
            .filter(|e| !e.is_empty())
    }

    pub fn full_name(&self) -> Option<String> {
        join_names(self.first_name.as_deref(), self.last_name.as_deref())
    }

    pub fn avatar_url(&self) -> Option<String> {
        self.image_url.clone().filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletedUserPayload {
    pub id: String,
}

/// Classified identity event
#[derive(Debug, Clone)]
pub enum IdentityEvent {
    UserCreated(UserPayload),
    UserUpdated(UserPayload),
    UserDeleted(DeletedUserPayload),
    Unhandled(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    data: serde_json::Value,
}

impl IdentityEvent {
    pub fn parse(body: &str) -> Result<Self, IdentityError> {
        let envelope: Envelope = serde_json::from_str(body)?;

        Ok(match envelope.event_type.as_str() {
            "user.created" => Self::UserCreated(serde_json::from_value(envelope.data)?),
            "user.updated" => Self::UserUpdated(serde_json::from_value(envelope.data)?),
            "user.deleted" => Self::UserDeleted(serde_json::from_value(envelope.data)?),
            _ => Self::Unhandled(envelope.event_type),
        })
    }

    pub fn event_type(&self) -> &str {
        match self {
            Self::UserCreated(_) => "user.created",
            Self::UserUpdated(_) => "user.updated",
            Self::UserDeleted(_) => "user.deleted",
            Self::Unhandled(event_type) => event_type,
        }
    }
}
