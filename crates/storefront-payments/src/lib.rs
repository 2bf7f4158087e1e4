//! # storefront-payments
//!
//! Stripe Checkout for storefront orders.
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  Storefront │────▶│  Stripe Hosted  │────▶│  /order-success  │
//! │  (checkout) │     │  Checkout Page  │     │  verify-payment  │
//! └─────────────┘     └────────┬────────┘     └──────────────────┘
//!                              │ webhook
//!                              ▼
//!                     ┌─────────────────┐
//!                     │ OrderStore: paid│
//!                     └─────────────────┘
//! ```
//!
//! The order id travels to Stripe as session metadata and comes back in the
//! webhook event; that is the only link between a payment and an order.
//! The webhook and the verification call may both mark an order paid, and
//! either may run first.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storefront_payments::{CheckoutRequest, CheckoutService, StripeClient};
//!
//! let service = CheckoutService::new(Arc::new(StripeClient::new(&secret_key)));
//! let session = service
//!     .create_checkout_session(&CheckoutRequest::from(&order), "https://shop.example")
//!     .await?;
//!
//! // Redirect user to: session.checkout_url
//! ```

mod checkout;
mod error;
mod mock;
mod provider;
mod stripe_client;
mod verify;
mod webhook;

pub use checkout::{
    CheckoutRequest, CheckoutService, CheckoutSession, ORDER_ID_KEY, SESSION_ID_PLACEHOLDER,
    build_session_request,
};
pub use error::{PaymentError, Result};
pub use mock::MockCheckoutProvider;
pub use provider::{CheckoutProvider, CreatedSession, SessionLineItem, SessionRequest, SessionStatus};
pub use stripe_client::StripeClient;
pub use verify::{PaymentVerification, SESSION_ID_PREFIX, record_payment, verify_payment};
pub use webhook::{
    DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER, WebhookEvent, WebhookHandler, WebhookOutcome,
    WebhookVerifier, parse_event, sign_payload,
};
