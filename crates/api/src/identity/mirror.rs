//! Mirror identity-provider users into `profiles`

use std::sync::Arc;

use plansync_shared::{BillingStore, Profile, ProfileUpdate};
use time::OffsetDateTime;

use super::events::{IdentityEvent, UserPayload};
use super::svix::{SvixHeaders, SvixVerifier};
use super::IdentityError;

pub struct ProfileMirror {
    store: Arc<dyn BillingStore>,
    webhook_secret: Option<String>,
}

impl ProfileMirror {
    pub fn new(store: Arc<dyn BillingStore>, webhook_secret: Option<String>) -> Self {
        Self {
            store,
            webhook_secret,
        }
    }

    /// Verify the Svix envelope and parse the event.
    ///
    /// `headers` is `None` when any of the three envelope headers is absent.
    pub fn verify_event(
        &self,
        headers: Option<SvixHeaders<'_>>,
        body: &str,
        now: i64,
    ) -> Result<IdentityEvent, IdentityError> {
        let Some(secret) = self.webhook_secret.as_deref() else {
            tracing::error!("CLERK_WEBHOOK_SECRET not configured");
            return Err(IdentityError::NotConfigured("CLERK_WEBHOOK_SECRET is not set"));
        };
        let headers = headers.ok_or(IdentityError::MissingHeaders)?;

        SvixVerifier::new(secret)?.verify(headers, body, now)?;
        IdentityEvent::parse(body)
    }

    pub async fn apply(&self, event: IdentityEvent) -> Result<(), IdentityError> {
        match event {
            IdentityEvent::UserCreated(user) => self.create_profile(&user).await,
            IdentityEvent::UserUpdated(user) => self.update_profile(&user).await,
            IdentityEvent::UserDeleted(user) => {
                let deleted = self.store.delete_profile(&user.id).await?;
                tracing::info!(user_id = %user.id, deleted = deleted, "Profile deleted");
                Ok(())
            }
            IdentityEvent::Unhandled(event_type) => {
                tracing::info!(event_type = %event_type, "Unhandled identity event");
                Ok(())
            }
        }
    }

    async fn create_profile(&self, user: &UserPayload) -> Result<(), IdentityError> {
        let now = OffsetDateTime::now_utc();
        self.store
            .insert_profile(&Profile {
                user_id: user.id.clone(),
                email: user.primary_email(),
                full_name: user.full_name(),
                avatar_url: user.avatar_url(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(user_id = %user.id, "Profile created");
        Ok(())
    }

    async fn update_profile(&self, user: &UserPayload) -> Result<(), IdentityError> {
        let patched = self
            .store
            .update_profile(
                &user.id,
                &ProfileUpdate {
                    email: user.primary_email(),
                    full_name: user.full_name(),
                    avatar_url: user.avatar_url(),
                    updated_at: OffsetDateTime::now_utc(),
                },
            )
            .await?;

        if patched == 0 {
            tracing::debug!(user_id = %user.id, "Updated user has no profile row");
        } else {
            tracing::info!(user_id = %user.id, "Profile updated");
        }
        Ok(())
    }
}
