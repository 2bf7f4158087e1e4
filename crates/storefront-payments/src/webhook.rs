//! Stripe Webhook Handling
//!
//! Confirms payments from Stripe events. The signature over the raw body is
//! the only authenticity check, so nothing is parsed before it passes.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;

use storefront_core::{OrderId, OrderStatus, StatusDetails, StorefrontError};
use storefront_store::OrderStore;

use crate::checkout::ORDER_ID_KEY;
use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the event signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Default max age of a signed timestamp, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`, as Stripe computes it
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Config(format!("webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `Stripe-Signature` headers against a shared secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    #[must_use]
    pub const fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verify `header` over the exact `payload` bytes at unix time `now`.
    pub fn verify(&self, payload: &[u8], header: &str, now: i64) -> Result<()> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| PaymentError::WebhookSignature("missing timestamp".into()))?;
        if signatures.is_empty() {
            return Err(PaymentError::WebhookSignature("no v1 signature".into()));
        }
        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(PaymentError::WebhookSignature(
                "timestamp outside tolerance".into(),
            ));
        }

        let matched = signatures.iter().any(|candidate| {
            let Ok(expected) = hex::decode(candidate) else {
                return false;
            };
            HmacSha256::new_from_slice(self.secret.as_bytes()).is_ok_and(|mut mac| {
                mac.update(timestamp.to_string().as_bytes());
                mac.update(b".");
                mac.update(payload);
                mac.verify_slice(&expected).is_ok()
            })
        });

        if matched {
            Ok(())
        } else {
            Err(PaymentError::WebhookSignature("no matching signature".into()))
        }
    }
}

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Checkout paid - mark the order paid
    CheckoutCompleted {
        event_id: String,
        session_id: String,
        payment_intent: Option<String>,
        order_id: Option<String>,
    },

    /// Payment attempt failed
    PaymentFailed {
        event_id: String,
        payment_intent: String,
        order_id: Option<String>,
    },

    /// Unhandled event type
    Other { event_type: String },
}

/// What handling an event did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    MarkedPaid(OrderId),
    /// Redelivery, or the order has already moved past paid
    AlreadyPaid(OrderId),
    MarkedFailed(OrderId),
    /// Payment failure that changed nothing
    Logged,
    Ignored,
}

fn string_at<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn metadata_order_id(object: &Value) -> Option<String> {
    object
        .get("metadata")
        .and_then(|m| string_at(m, ORDER_ID_KEY))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Parse a verified event body
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent> {
    let event: Value =
        serde_json::from_slice(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

    let event_type = string_at(&event, "type")
        .ok_or_else(|| PaymentError::WebhookParse("missing event type".into()))?;
    let event_id = string_at(&event, "id").unwrap_or_default().to_string();
    let object = event
        .get("data")
        .and_then(|d| d.get("object"))
        .ok_or_else(|| PaymentError::WebhookParse("missing data.object".into()))?;

    match event_type {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            let session_id = string_at(object, "id")
                .ok_or_else(|| PaymentError::WebhookParse("checkout session without id".into()))?;

            // Expanded payment intents arrive as objects
            let payment_intent = object.get("payment_intent").and_then(|p| {
                p.as_str()
                    .or_else(|| string_at(p, "id"))
                    .map(str::to_string)
            });

            Ok(WebhookEvent::CheckoutCompleted {
                event_id,
                session_id: session_id.to_string(),
                payment_intent,
                order_id: metadata_order_id(object),
            })
        }

        "payment_intent.payment_failed" => Ok(WebhookEvent::PaymentFailed {
            event_id,
            payment_intent: string_at(object, "id").unwrap_or_default().to_string(),
            order_id: metadata_order_id(object),
        }),

        other => Ok(WebhookEvent::Other {
            event_type: other.to_string(),
        }),
    }
}

/// Webhook handler
pub struct WebhookHandler {
    store: Arc<dyn OrderStore>,
    verifier: WebhookVerifier,
}

impl WebhookHandler {
    pub fn new(store: Arc<dyn OrderStore>, verifier: WebhookVerifier) -> Self {
        Self { store, verifier }
    }

    /// Verify the signature, then parse the event
    pub fn parse_event(&self, payload: &[u8], signature: &str, now: i64) -> Result<WebhookEvent> {
        self.verifier
            .verify(payload, signature, now)
            .inspect_err(|e| {
                tracing::warn!(target: "security", error = %e, "Rejected webhook with bad signature");
            })?;
        parse_event(payload)
    }

    /// Verify and apply a raw delivery
    pub async fn process(&self, payload: &[u8], signature: &str, now: i64) -> Result<WebhookOutcome> {
        let event = self.parse_event(payload, signature, now)?;
        self.handle(event).await
    }

    /// Apply a verified event to the order store.
    ///
    /// Safe under redelivery: a second completed event for the same order is
    /// reported as `AlreadyPaid` and changes nothing.
    pub async fn handle(&self, event: WebhookEvent) -> Result<WebhookOutcome> {
        match event {
            WebhookEvent::CheckoutCompleted {
                event_id,
                session_id,
                payment_intent,
                order_id,
            } => {
                tracing::info!(event_id = %event_id, session_id = %session_id, "Payment completed for session");

                let Some(order_id) = order_id else {
                    tracing::error!(session_id = %session_id, "No orderId in session metadata");
                    return Err(PaymentError::MissingOrderId(session_id));
                };
                let order_id = OrderId::from_string(order_id);
                let details = StatusDetails::payment(session_id, payment_intent);

                mark_paid(self.store.as_ref(), &order_id, &details).await
            }

            WebhookEvent::PaymentFailed {
                event_id,
                payment_intent,
                order_id,
            } => {
                tracing::warn!(event_id = %event_id, payment_intent = %payment_intent, order_id = ?order_id, "Payment failed");

                let Some(order_id) = order_id else {
                    return Ok(WebhookOutcome::Logged);
                };
                let order_id = OrderId::from_string(order_id);

                // The store decides atomically; a concurrent payment wins.
                match self
                    .store
                    .update_status(&order_id, OrderStatus::Failed, &StatusDetails::default())
                    .await
                {
                    Ok(change) if change.changed() => {
                        tracing::info!(order_id = %order_id, "Order marked failed");
                        Ok(WebhookOutcome::MarkedFailed(order_id))
                    }
                    Ok(change) => {
                        tracing::info!(order_id = %order_id, status = %change.order.status, "Payment failure left order unchanged");
                        Ok(WebhookOutcome::Logged)
                    }
                    Err(StorefrontError::InvalidTransition { from, .. }) => {
                        tracing::info!(order_id = %order_id, status = %from, "Payment failure left order unchanged");
                        Ok(WebhookOutcome::Logged)
                    }
                    Err(StorefrontError::NotFound(_)) => {
                        tracing::warn!(order_id = %order_id, "Payment failure for unknown order");
                        Ok(WebhookOutcome::Logged)
                    }
                    Err(e) => Err(e.into()),
                }
            }

            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }
}

/// Idempotent `paid` transition shared by the webhook and payment verification
pub(crate) async fn mark_paid(
    store: &dyn OrderStore,
    order_id: &OrderId,
    details: &StatusDetails,
) -> Result<WebhookOutcome> {
    match store.update_status(order_id, OrderStatus::Paid, details).await {
        Ok(change) if change.changed() => {
            tracing::info!(order_id = %order_id, "Order updated to paid");
            Ok(WebhookOutcome::MarkedPaid(order_id.clone()))
        }
        Ok(_) => {
            tracing::debug!(order_id = %order_id, "Order already paid");
            Ok(WebhookOutcome::AlreadyPaid(order_id.clone()))
        }
        Err(StorefrontError::InvalidTransition { from, .. }) => {
            tracing::info!(order_id = %order_id, status = %from, "Order already past paid");
            Ok(WebhookOutcome::AlreadyPaid(order_id.clone()))
        }
        Err(StorefrontError::NotFound(_)) => {
            tracing::error!(order_id = %order_id, "Order not found");
            Err(PaymentError::OrderNotFound(order_id.to_string()))
        }
        Err(e) => {
            tracing::error!(order_id = %order_id, error = %e, "Error updating order");
            Err(e.into())
        }
    }
}
