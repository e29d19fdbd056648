//! Shared application state

use std::sync::Arc;

use plansync_billing::{BillingService, PaymentProcessor};
use plansync_shared::BillingStore;

use crate::auth::SessionVerifier;
use crate::config::Config;
use crate::identity::ProfileMirror;

/// Application state cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn BillingStore>,
    pub billing: Arc<BillingService>,
    pub identity: Arc<ProfileMirror>,
    pub sessions: SessionVerifier,
}

impl AppState {
    /// Wire the services over an explicit store and payment processor
    pub fn new(
        config: Config,
        store: Arc<dyn BillingStore>,
        processor: Arc<dyn PaymentProcessor>,
        sessions: SessionVerifier,
    ) -> Self {
        let billing = BillingService::new(
            store.clone(),
            processor,
            config.app_url.clone(),
            config.stripe_webhook_secret.clone(),
        );
        let identity = ProfileMirror::new(store.clone(), config.clerk_webhook_secret.clone());

        Self {
            config: Arc::new(config),
            store,
            billing: Arc::new(billing),
            identity: Arc::new(identity),
            sessions,
        }
    }
}
