//! Payment Verification
//!
//! Asks Stripe directly whether a checkout session was paid. The answer does
//! not depend on the webhook having arrived yet.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use storefront_core::money::from_minor_units;
use storefront_core::{Cart, OrderId, StatusDetails};
use storefront_store::OrderStore;

use crate::checkout::ORDER_ID_KEY;
use crate::error::{PaymentError, Result};
use crate::provider::CheckoutProvider;
use crate::webhook::{WebhookOutcome, mark_paid};

/// Prefix of every Stripe checkout session id
pub const SESSION_ID_PREFIX: &str = "cs_";

/// Provider-confirmed state of a checkout session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVerification {
    pub paid: bool,
    pub customer_email: Option<String>,
    /// Amount charged, in dollars
    #[serde(with = "rust_decimal::serde::float_option")]
    pub amount_total: Option<Decimal>,
    pub metadata: HashMap<String, String>,
    #[serde(skip)]
    pub session_id: String,
    #[serde(skip)]
    pub payment_intent: Option<String>,
}

impl PaymentVerification {
    /// Order id recorded on the session at checkout
    pub fn order_id(&self) -> Option<OrderId> {
        self.metadata
            .get(ORDER_ID_KEY)
            .filter(|id| !id.is_empty())
            .map(OrderId::from_string)
    }

    /// Clear the local cart once the payment is confirmed.
    ///
    /// Returns whether the session was paid; calling it again is harmless.
    pub fn settle(&self, cart: &mut Cart) -> bool {
        if self.paid && !cart.is_empty() {
            cart.clear();
        }
        self.paid
    }
}

/// Look up `session_id` at the provider
pub async fn verify_payment(
    provider: &dyn CheckoutProvider,
    session_id: Option<&str>,
) -> Result<PaymentVerification> {
    let session_id = session_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PaymentError::Validation("Session ID is required".into()))?;
    if !session_id.starts_with(SESSION_ID_PREFIX) {
        return Err(PaymentError::Validation("Invalid session ID format".into()));
    }

    let session = provider
        .retrieve_session(session_id)
        .await
        .inspect_err(|e| match e {
            PaymentError::SessionNotFound(_) => {
                tracing::warn!(session_id = %session_id, "Verification for unknown session");
            }
            other => {
                tracing::error!(session_id = %session_id, provider = provider.name(), error = %other, "Error verifying payment");
            }
        })?;

    tracing::info!(session_id = %session_id, paid = session.paid, "Verified checkout session");

    Ok(PaymentVerification {
        paid: session.paid,
        customer_email: session.customer_email,
        amount_total: session.amount_total.map(from_minor_units),
        metadata: session.metadata,
        session_id: session.id,
        payment_intent: session.payment_intent,
    })
}

/// Apply a confirmed payment to the store, converging with the webhook.
///
/// `None` when the session is unpaid or carries no order id.
pub async fn record_payment(
    store: &dyn OrderStore,
    verification: &PaymentVerification,
) -> Result<Option<WebhookOutcome>> {
    if !verification.paid {
        return Ok(None);
    }
    let Some(order_id) = verification.order_id() else {
        return Ok(None);
    };

    let details = StatusDetails::payment(
        verification.session_id.clone(),
        verification.payment_intent.clone(),
    );
    mark_paid(store, &order_id, &details).await.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::{CheckoutRequest, CheckoutService};
    use crate::mock::MockCheckoutProvider;
    use crate::test_support::order;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use storefront_core::{
        Accessory, DeviceModel, MemoryCartStorage, OrderStatus, ProductVariant, StaticCatalog,
    };
    use storefront_store::MemoryOrderStore;

    async fn paid_session(provider: &Arc<MockCheckoutProvider>, order_id: &str) -> String {
        let service = CheckoutService::new(provider.clone());
        let session = service
            .create_checkout_session(&CheckoutRequest::from(&order(order_id)), "https://shop.example")
            .await
            .unwrap();
        provider.complete(&session.id);
        session.id
    }

    #[tokio::test]
    async fn test_session_id_required() {
        let provider = MockCheckoutProvider::new();
        for missing in [None, Some(""), Some("  ")] {
            let err = verify_payment(&provider, missing).await.unwrap_err();
            assert_eq!(err.user_message(), "Session ID is required");
        }
    }

    #[tokio::test]
    async fn test_session_id_shape() {
        let provider = MockCheckoutProvider::new();
        let err = verify_payment(&provider, Some("pi_123")).await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid session ID format");
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let provider = MockCheckoutProvider::new();
        let err = verify_payment(&provider, Some("cs_test_missing")).await.unwrap_err();
        assert!(matches!(err, PaymentError::SessionNotFound(_)));
        assert_eq!(err.user_message(), "Session not found");
    }

    #[tokio::test]
    async fn test_provider_error_is_generic() {
        let provider = MockCheckoutProvider::new();
        provider.fail_with("rate_limit: req_abc123");
        let err = verify_payment(&provider, Some("cs_test_1")).await.unwrap_err();
        assert_eq!(err.user_message(), "Payment processing error. Please try again.");
    }

    #[tokio::test]
    async fn test_paid_session_reports_major_units() {
        let provider = Arc::new(MockCheckoutProvider::new());
        let session_id = paid_session(&provider, "ORD-1").await;

        let verification = verify_payment(provider.as_ref(), Some(&session_id)).await.unwrap();
        assert!(verification.paid);
        assert_eq!(verification.customer_email.as_deref(), Some("ada@example.com"));
        // 40.40 plus 4.99 shipping
        assert_eq!(verification.amount_total, Some(dec!(45.39)));
        assert_eq!(verification.order_id(), Some(OrderId::from_string("ORD-1")));

        let json = serde_json::to_value(&verification).unwrap();
        assert_eq!(json["amountTotal"], serde_json::json!(45.39));
        assert!(json.get("sessionId").is_none());
    }

    #[tokio::test]
    async fn test_record_payment_converges_with_webhook() {
        let provider = Arc::new(MockCheckoutProvider::new());
        let store = MemoryOrderStore::new();
        store.create(&order("ORD-1")).await.unwrap();
        let session_id = paid_session(&provider, "ORD-1").await;

        let verification = verify_payment(provider.as_ref(), Some(&session_id)).await.unwrap();
        let first = record_payment(&store, &verification).await.unwrap();
        assert_eq!(first, Some(WebhookOutcome::MarkedPaid(OrderId::from_string("ORD-1"))));

        let second = record_payment(&store, &verification).await.unwrap();
        assert_eq!(second, Some(WebhookOutcome::AlreadyPaid(OrderId::from_string("ORD-1"))));

        let stored = store.get_by_id(&OrderId::from_string("ORD-1")).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
        assert_eq!(stored.payment_session_id.as_deref(), Some(session_id.as_str()));
    }

    #[tokio::test]
    async fn test_unpaid_session_records_nothing() {
        let provider = Arc::new(MockCheckoutProvider::new());
        let service = CheckoutService::new(provider.clone());
        let session = service
            .create_checkout_session(&CheckoutRequest::from(&order("ORD-1")), "https://shop.example")
            .await
            .unwrap();

        let verification = verify_payment(provider.as_ref(), Some(&session.id)).await.unwrap();
        assert!(!verification.paid);
        let store = MemoryOrderStore::new();
        assert_eq!(record_payment(&store, &verification).await.unwrap(), None);
    }

    #[test]
    fn test_settle_clears_cart_only_when_paid() {
        let product = ProductVariant {
            id: "apertura-black".into(),
            name: "Apertura - Black".into(),
            price: dec!(40.40),
            image: None,
            upstream_url: None,
        };
        let model = DeviceModel {
            id: "iphone-15".into(),
            name: "iPhone 15".into(),
        };
        let catalog = StaticCatalog::new()
            .with_product(product.clone())
            .with_model(model.clone())
            .with_accessory(Accessory::included());
        let mut cart = Cart::new(Arc::new(catalog), Arc::new(MemoryCartStorage::new()));
        cart.add(&product, &model, None);

        let mut verification = PaymentVerification {
            paid: false,
            customer_email: None,
            amount_total: None,
            metadata: HashMap::new(),
            session_id: "cs_test_1".into(),
            payment_intent: None,
        };
        assert!(!verification.settle(&mut cart));
        assert_eq!(cart.item_count(), 1);

        verification.paid = true;
        assert!(verification.settle(&mut cart));
        assert!(cart.is_empty());
        assert!(verification.settle(&mut cart));
    }
}
