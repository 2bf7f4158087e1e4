//! Mock Checkout Provider
//!
//! For testing and local demos. Sessions live in memory and can be marked
//! paid by hand, standing in for a customer completing the hosted page.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{PaymentError, Result};
use crate::provider::{CheckoutProvider, CreatedSession, SessionRequest, SessionStatus};

/// In-memory checkout provider
#[derive(Debug, Default)]
pub struct MockCheckoutProvider {
    sessions: Mutex<HashMap<String, (SessionRequest, bool)>>,
    /// When set, every call fails with this provider error
    failure: Mutex<Option<String>>,
}

impl MockCheckoutProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(message.into());
        }
    }

    /// Mark a session as paid
    pub fn complete(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .ok()
            .and_then(|mut sessions| sessions.get_mut(session_id).map(|entry| entry.1 = true))
            .is_some()
    }

    /// Last request sent for `session_id`
    pub fn request(&self, session_id: &str) -> Option<SessionRequest> {
        let sessions = self.sessions.lock().ok()?;
        sessions.get(session_id).map(|(request, _)| request.clone())
    }

    fn check_failure(&self) -> Result<()> {
        let failure = self
            .failure
            .lock()
            .map_err(|_| PaymentError::Stripe("mock lock poisoned".into()))?;
        match failure.as_ref() {
            Some(message) => Err(PaymentError::Stripe(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CheckoutProvider for MockCheckoutProvider {
    async fn create_session(&self, request: &SessionRequest) -> Result<CreatedSession> {
        self.check_failure()?;
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| PaymentError::Stripe("mock lock poisoned".into()))?;

        let id = format!("cs_test_mock{}", sessions.len() + 1);
        sessions.insert(id.clone(), (request.clone(), false));

        Ok(CreatedSession {
            url: format!("https://checkout.mock/pay/{id}"),
            id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus> {
        self.check_failure()?;
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| PaymentError::Stripe("mock lock poisoned".into()))?;

        let (request, paid) = sessions
            .get(session_id)
            .ok_or_else(|| PaymentError::SessionNotFound(session_id.to_string()))?;

        let amount_total = request
            .line_items
            .iter()
            .map(|item| item.unit_amount * i64::try_from(item.quantity).unwrap_or(i64::MAX))
            .sum();

        Ok(SessionStatus {
            id: session_id.to_string(),
            paid: *paid,
            customer_email: Some(request.customer_email.clone()),
            amount_total: Some(amount_total),
            metadata: request.metadata.clone(),
            payment_intent: paid.then(|| format!("pi_mock_{session_id}")),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
