//! Checkout Provider
//!
//! The two calls this storefront makes to the hosted payment page provider.
//! [`crate::StripeClient`] talks to Stripe; [`crate::MockCheckoutProvider`]
//! stands in for it in tests and local demos.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// One line on the hosted payment page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLineItem {
    pub name: String,
    pub description: String,
    /// Unit price in cents
    pub unit_amount: i64,
    pub quantity: u64,
    pub image: Option<String>,
}

/// Everything needed to open a hosted checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub line_items: Vec<SessionLineItem>,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Opaque key/value pairs echoed back in webhook events
    pub metadata: HashMap<String, String>,
}

/// A newly created hosted session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSession {
    pub id: String,
    pub url: String,
}

/// Provider-side state of a session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub id: String,
    pub paid: bool,
    pub customer_email: Option<String>,
    /// Total charged, in cents
    pub amount_total: Option<i64>,
    pub metadata: HashMap<String, String>,
    pub payment_intent: Option<String>,
}

/// Hosted checkout provider
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Create a hosted checkout session
    async fn create_session(&self, request: &SessionRequest) -> Result<CreatedSession>;

    /// Look up a session; `SessionNotFound` when the provider has no such id
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus>;

    /// Provider name
    fn name(&self) -> &str;
}
