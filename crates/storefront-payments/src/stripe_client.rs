//! Stripe Checkout Integration
//!
//! Hosted Checkout in one-time `payment` mode. Order metadata is attached to
//! both the session and its payment intent so that webhook events of either
//! kind can be traced back to an order.

use async_trait::async_trait;
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionId, CheckoutSessionMode,
    CheckoutSessionPaymentStatus, Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionPaymentIntentData, CreateCheckoutSessionPaymentMethodTypes,
    CreateCheckoutSessionShippingAddressCollection,
    CreateCheckoutSessionShippingAddressCollectionAllowedCountries, Currency, Metadata, StripeError,
};

use crate::error::{PaymentError, Result};
use crate::provider::{CheckoutProvider, CreatedSession, SessionRequest, SessionStatus};

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }
}

fn line_items(request: &SessionRequest) -> Vec<CreateCheckoutSessionLineItems> {
    request
        .line_items
        .iter()
        .map(|item| CreateCheckoutSessionLineItems {
            quantity: Some(item.quantity),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::USD,
                unit_amount: Some(item.unit_amount),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: item.name.clone(),
                    description: Some(item.description.clone()),
                    images: item.image.clone().map(|image| vec![image]),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect()
}

fn stripe_error(e: &StripeError) -> PaymentError {
    PaymentError::Stripe(e.to_string())
}

#[async_trait]
impl CheckoutProvider for StripeClient {
    async fn create_session(&self, request: &SessionRequest) -> Result<CreatedSession> {
        let metadata: Metadata = request.metadata.clone();

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.payment_method_types = Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]);
        params.customer_email = Some(&request.customer_email);
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.line_items = Some(line_items(request));
        params.metadata = Some(metadata.clone());
        params.payment_intent_data = Some(CreateCheckoutSessionPaymentIntentData {
            metadata: Some(metadata),
            ..Default::default()
        });
        params.shipping_address_collection = Some(CreateCheckoutSessionShippingAddressCollection {
            allowed_countries: vec![CreateCheckoutSessionShippingAddressCollectionAllowedCountries::Us],
        });

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| stripe_error(&e))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        Ok(CreatedSession {
            id: session.id.to_string(),
            url,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus> {
        let id: CheckoutSessionId = session_id
            .parse()
            .map_err(|_| PaymentError::Validation("Invalid session ID format".into()))?;

        let session = match StripeCheckoutSession::retrieve(&self.client, &id, &[]).await {
            Ok(session) => session,
            Err(StripeError::Stripe(request_error)) if request_error.http_status == 404 => {
                return Err(PaymentError::SessionNotFound(session_id.to_string()));
            }
            Err(e) => return Err(stripe_error(&e)),
        };

        let customer_email = session
            .customer_email
            .clone()
            .or_else(|| session.customer_details.as_ref().and_then(|d| d.email.clone()));

        Ok(SessionStatus {
            id: session.id.to_string(),
            paid: session.payment_status == CheckoutSessionPaymentStatus::Paid,
            customer_email,
            amount_total: session.amount_total,
            metadata: session.metadata.unwrap_or_default(),
            payment_intent: session.payment_intent.as_ref().map(|p| p.id().to_string()),
        })
    }

    fn name(&self) -> &str {
        "stripe"
    }
}
