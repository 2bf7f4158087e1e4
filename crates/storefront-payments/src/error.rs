//! Payment Error Types

use thiserror::Error;

use storefront_core::StorefrontError;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Required request input missing or malformed
    #[error("{0}")]
    Validation(String),

    /// Stripe does not know the checkout session
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Completed checkout carried no order id in its metadata
    #[error("Checkout session {0} has no orderId in metadata")]
    MissingOrderId(String),

    /// Webhook refers to an order this store does not have
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Order store or order rule failure
    #[error(transparent)]
    Order(#[from] StorefrontError),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Stripe(_) => true,
            Self::Order(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::SessionNotFound(_) => "Session not found".into(),
            Self::Stripe(_) => "Payment processing error. Please try again.".into(),
            Self::WebhookSignature(_) => "Invalid signature".into(),
            Self::WebhookParse(_) | Self::MissingOrderId(_) => "Malformed webhook event".into(),
            Self::OrderNotFound(_) => "Order not found".into(),
            Self::Config(_) => "Service configuration error.".into(),
            Self::Order(e) => e.user_message(),
        }
    }
}
