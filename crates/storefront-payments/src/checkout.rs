//! Checkout Session Initiator
//!
//! Turns an order's frozen lines into a hosted checkout session. The session
//! metadata is the only link between a later webhook event and the order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use storefront_core::money::{MAX_QUANTITY, MAX_UNIT_PRICE, STANDARD_SHIPPING_COST, shipping_for, to_minor_units};
use storefront_core::{CustomerInfo, Order, OrderId, OrderLine};

use crate::error::{PaymentError, Result};
use crate::provider::{CheckoutProvider, SessionLineItem, SessionRequest};

/// Placeholder Stripe replaces with the real session id on redirect
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Metadata key carrying the order id
pub const ORDER_ID_KEY: &str = "orderId";

/// Request body for creating a checkout session
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default)]
    pub customer_info: Option<CustomerInfo>,
    #[serde(default)]
    pub order_id: Option<OrderId>,
}

impl From<&Order> for CheckoutRequest {
    fn from(order: &Order) -> Self {
        Self {
            items: order.lines.clone(),
            customer_info: Some(order.customer.clone()),
            order_id: Some(order.id.clone()),
        }
    }
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stripe session ID
    pub id: String,

    /// URL to redirect user to
    pub checkout_url: String,

    pub order_id: OrderId,
}

fn is_price_in_range(price: Decimal) -> bool {
    !price.is_sign_negative() && price <= MAX_UNIT_PRICE
}

fn is_safe_order_id(id: &OrderId) -> bool {
    id.as_str()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Build the provider request for `request`, redirecting back to `origin`.
///
/// All input checks happen here, before any provider call.
pub fn build_session_request(request: &CheckoutRequest, origin: &str) -> Result<SessionRequest> {
    if request.items.is_empty() {
        return Err(PaymentError::Validation("Items are required".into()));
    }
    let customer = request
        .customer_info
        .as_ref()
        .filter(|c| !c.email.trim().is_empty())
        .ok_or_else(|| PaymentError::Validation("Customer email is required".into()))?;
    let order_id = request
        .order_id
        .as_ref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PaymentError::Validation("Order ID is required".into()))?;
    if !is_safe_order_id(order_id) {
        return Err(PaymentError::Validation("Invalid order ID".into()));
    }

    let mut line_items = Vec::with_capacity(request.items.len() + 1);
    let mut subtotal = Decimal::ZERO;
    for line in &request.items {
        if line.quantity == 0 {
            return Err(PaymentError::Validation("Item quantity must be at least 1".into()));
        }
        if line.quantity > MAX_QUANTITY {
            return Err(PaymentError::Validation("Item quantity is too large".into()));
        }
        if !is_price_in_range(line.unit_price) || !is_price_in_range(line.accessory_price) {
            return Err(PaymentError::Validation("Item price is invalid".into()));
        }
        let unit_amount = to_minor_units(line.unit_total())
            .map_err(|_| PaymentError::Validation("Item price is invalid".into()))?;

        subtotal += line.line_total();
        line_items.push(SessionLineItem {
            name: format!("{} - {}", line.product_name, line.device_model_name),
            description: format!("Accessory: {}", line.accessory_name),
            unit_amount,
            quantity: u64::from(line.quantity),
            image: line.image_ref.clone(),
        });
    }

    if shipping_for(subtotal) > Decimal::ZERO {
        line_items.push(SessionLineItem {
            name: "Shipping".into(),
            description: "Standard shipping".into(),
            unit_amount: to_minor_units(STANDARD_SHIPPING_COST)?,
            quantity: 1,
            image: None,
        });
    }

    let origin = origin.trim_end_matches('/');
    let mut metadata = HashMap::new();
    metadata.insert(ORDER_ID_KEY.to_string(), order_id.to_string());
    metadata.insert("customerName".to_string(), customer.full_name());
    metadata.insert("customerPhone".to_string(), customer.phone.clone());
    metadata.insert(
        "shippingAddress".to_string(),
        serde_json::to_string(&customer.address).map_err(storefront_core::StorefrontError::from)?,
    );

    Ok(SessionRequest {
        line_items,
        customer_email: customer.email.trim().to_string(),
        success_url: format!(
            "{origin}/order-success?session_id={SESSION_ID_PLACEHOLDER}&order_id={order_id}"
        ),
        cancel_url: format!("{origin}/checkout"),
        metadata,
    })
}

/// Creates hosted checkout sessions
pub struct CheckoutService {
    provider: Arc<dyn CheckoutProvider>,
}

impl CheckoutService {
    pub fn new(provider: Arc<dyn CheckoutProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn CheckoutProvider> {
        &self.provider
    }

    /// Create a Stripe Checkout session (Hosted approach)
    ///
    /// Returns a URL to redirect the user to Stripe's hosted checkout page.
    pub async fn create_checkout_session(&self, request: &CheckoutRequest, origin: &str) -> Result<CheckoutSession> {
        let session_request = build_session_request(request, origin)?;
        let order_id = request.order_id.clone().unwrap_or_else(|| OrderId::from_string(""));

        let created = self
            .provider
            .create_session(&session_request)
            .await
            .inspect_err(|e| {
                tracing::error!(order_id = %order_id, provider = self.provider.name(), error = %e, "Checkout session creation failed");
            })
            .map_err(|e| match e {
                PaymentError::Stripe(_) => e,
                other => PaymentError::Stripe(other.to_string()),
            })?;

        tracing::info!(order_id = %order_id, session_id = %created.id, "Created checkout session");

        Ok(CheckoutSession {
            id: created.id,
            checkout_url: created.url,
            order_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCheckoutProvider;
    use rust_decimal_macros::dec;
    use storefront_core::ShippingAddress;

    fn line(price: Decimal, quantity: u32) -> OrderLine {
        OrderLine {
            product_name: "Apertura - Black".into(),
            unit_price: price,
            accessory_name: "None".into(),
            accessory_price: Decimal::ZERO,
            device_model_name: "iPhone 15".into(),
            quantity,
            image_ref: None,
            external_product_ref: None,
            accessory_external_ref: None,
        }
    }

    fn request(items: Vec<OrderLine>) -> CheckoutRequest {
        CheckoutRequest {
            items,
            customer_info: Some(CustomerInfo {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: "ada@example.com".into(),
                phone: "555-123-4567".into(),
                address: ShippingAddress {
                    street: "12 Analytical Way".into(),
                    apartment: None,
                    city: "Springfield".into(),
                    state: "IL".into(),
                    zip_code: "62701".into(),
                },
            }),
            order_id: Some(OrderId::from_string("ORD-1700000000000-ab12cd34")),
        }
    }

    #[test]
    fn test_unit_amount_rounds_to_nearest_cent() {
        let built = build_session_request(&request(vec![line(dec!(41.995), 1)]), "https://shop.example").unwrap();
        assert_eq!(built.line_items[0].unit_amount, 4200);
    }

    #[test]
    fn test_shipping_line_below_threshold() {
        let built = build_session_request(&request(vec![line(dec!(40.40), 1)]), "https://shop.example").unwrap();
        let shipping: Vec<_> = built.line_items.iter().filter(|i| i.name == "Shipping").collect();
        assert_eq!(shipping.len(), 1);
        assert_eq!(shipping[0].unit_amount, 499);
    }

    #[test]
    fn test_no_shipping_line_at_threshold() {
        let built = build_session_request(&request(vec![line(dec!(25.00), 2)]), "https://shop.example").unwrap();
        assert_eq!(built.line_items.len(), 1);
        assert!(built.line_items.iter().all(|i| i.name != "Shipping"));
    }

    #[test]
    fn test_redirects_and_metadata() {
        let built = build_session_request(&request(vec![line(dec!(40.40), 1)]), "https://shop.example/").unwrap();
        assert_eq!(
            built.success_url,
            "https://shop.example/order-success?session_id={CHECKOUT_SESSION_ID}&order_id=ORD-1700000000000-ab12cd34"
        );
        assert_eq!(built.cancel_url, "https://shop.example/checkout");
        assert_eq!(built.metadata[ORDER_ID_KEY], "ORD-1700000000000-ab12cd34");
        assert_eq!(built.metadata["customerName"], "Ada Lovelace");
        let address: ShippingAddress = serde_json::from_str(&built.metadata["shippingAddress"]).unwrap();
        assert_eq!(address.zip_code, "62701");
    }

    #[test]
    fn test_required_fields() {
        let mut missing_items = request(vec![]);
        assert!(matches!(
            build_session_request(&missing_items, "https://shop.example"),
            Err(PaymentError::Validation(ref m)) if m == "Items are required"
        ));

        missing_items.items.push(line(dec!(40.40), 1));
        let mut missing_email = missing_items.clone();
        if let Some(info) = missing_email.customer_info.as_mut() {
            info.email.clear();
        }
        assert!(matches!(
            build_session_request(&missing_email, "https://shop.example"),
            Err(PaymentError::Validation(ref m)) if m == "Customer email is required"
        ));

        let mut missing_id = missing_items;
        missing_id.order_id = None;
        assert!(matches!(
            build_session_request(&missing_id, "https://shop.example"),
            Err(PaymentError::Validation(ref m)) if m == "Order ID is required"
        ));
    }

    #[test]
    fn test_out_of_range_lines_are_rejected() {
        let huge = build_session_request(&request(vec![line(Decimal::MAX, 1)]), "https://shop.example");
        assert!(matches!(huge, Err(PaymentError::Validation(ref m)) if m == "Item price is invalid"));

        let mut with_accessory = line(dec!(40.40), 1);
        with_accessory.accessory_price = Decimal::MAX;
        let result = build_session_request(&request(vec![with_accessory]), "https://shop.example");
        assert!(matches!(result, Err(PaymentError::Validation(ref m)) if m == "Item price is invalid"));

        let many = build_session_request(&request(vec![line(dec!(40.40), u32::MAX)]), "https://shop.example");
        assert!(matches!(many, Err(PaymentError::Validation(ref m)) if m == "Item quantity is too large"));
    }

    #[tokio::test]
    async fn test_validation_happens_before_provider_call() {
        let provider = Arc::new(MockCheckoutProvider::new());
        provider.fail_with("should not be called");
        let service = CheckoutService::new(provider);

        let err = service
            .create_checkout_session(&request(vec![]), "https://shop.example")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_provider_failure_is_generic() {
        let provider = Arc::new(MockCheckoutProvider::new());
        provider.fail_with("api_key_expired: sk_live_123");
        let service = CheckoutService::new(provider);

        let err = service
            .create_checkout_session(&request(vec![line(dec!(40.40), 1)]), "https://shop.example")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Stripe(_)));
        assert!(!err.user_message().contains("sk_live"));
    }

    #[tokio::test]
    async fn test_create_session() {
        let provider = Arc::new(MockCheckoutProvider::new());
        let service = CheckoutService::new(provider.clone());

        let session = service
            .create_checkout_session(&request(vec![line(dec!(40.40), 1)]), "https://shop.example")
            .await
            .unwrap();
        assert!(session.id.starts_with("cs_"));
        assert_eq!(session.order_id.as_str(), "ORD-1700000000000-ab12cd34");
        assert_eq!(provider.request(&session.id).unwrap().line_items.len(), 2);
    }
}
