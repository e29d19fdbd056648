//! In-process payment processor for tests and local runs without Stripe

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{CheckoutRequest, CheckoutSessionInfo, NewCustomer, PaymentProcessor};
use crate::error::{BillingError, BillingResult};

/// Records every call and serves checkout sessions from memory
#[derive(Default)]
pub struct MockPaymentProcessor {
    next_id: AtomicU64,
    fail_requests: AtomicBool,
    customers: Mutex<Vec<NewCustomer>>,
    checkouts: Mutex<Vec<CheckoutRequest>>,
    sessions: Mutex<HashMap<String, CheckoutSessionInfo>>,
}

impl MockPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as an upstream error
    pub fn set_fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Register a session as if the processor had completed it
    pub fn insert_session(&self, session: CheckoutSessionInfo) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(session.id.clone(), session);
        }
    }

    pub fn created_customers(&self) -> Vec<NewCustomer> {
        self.customers.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn checkout_requests(&self) -> Vec<CheckoutRequest> {
        self.checkouts.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn check(&self) -> BillingResult<()> {
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(BillingError::StripeApi("mock processor unavailable".to_string()));
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}_mock_{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn create_customer(&self, customer: &NewCustomer) -> BillingResult<String> {
        self.check()?;
        let id = self.next_id("cus");
        if let Ok(mut customers) = self.customers.lock() {
            customers.push(customer.clone());
        }
        Ok(id)
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> BillingResult<CheckoutSessionInfo> {
        self.check()?;
        let id = self.next_id("cs");
        let session = CheckoutSessionInfo {
            url: Some(format!("https://checkout.stripe.test/pay/{}", id)),
            id,
            metadata: request.metadata.clone(),
            subscription_id: None,
        };
        if let Ok(mut checkouts) = self.checkouts.lock() {
            checkouts.push(request.clone());
        }
        self.insert_session(session.clone());
        Ok(session)
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> BillingResult<Option<CheckoutSessionInfo>> {
        self.check()?;
        Ok(self
            .sessions
            .lock()
            .ok()
            .and_then(|sessions| sessions.get(session_id).cloned()))
    }
}
