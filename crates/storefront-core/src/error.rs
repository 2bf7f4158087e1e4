//! Error Types

use thiserror::Error;

use crate::status::OrderStatus;

/// Result type alias for storefront operations
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Storefront error taxonomy
#[derive(Error, Debug)]
pub enum StorefrontError {
    /// Missing or malformed required input
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Cart line index out of range
    #[error("Cart line {index} out of range (cart has {len} lines)")]
    Bounds { index: usize, len: usize },

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record with the same identity already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Status change would move an order backward
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Order store failed to initialize
    #[error("Order store unavailable: {0}")]
    StoreUnavailable(String),

    /// Order store read/write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorefrontError {
    /// Shorthand for a validation failure on `field`
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Check if the failed operation may succeed when retried
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_))
    }

    /// Message that is safe to show to a customer or admin.
    ///
    /// Input errors are surfaced verbatim; storage internals are not.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { .. }
            | Self::Bounds { .. }
            | Self::NotFound(_)
            | Self::Conflict(_)
            | Self::InvalidTransition { .. } => self.to_string(),
            Self::StoreUnavailable(_) => "Order storage is unavailable. Please try again later.".into(),
            _ => "An unexpected error occurred. Please try again.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_storage_detail() {
        let err = StorefrontError::Storage("disk /var/lib/orders.json is full".into());
        assert!(!err.user_message().contains("/var/lib"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = StorefrontError::validation("email", "is required");
        assert_eq!(err.user_message(), "Invalid email: is required");
    }
}
