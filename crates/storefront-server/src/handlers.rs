//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequestParts, Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::convert::Infallible;

use storefront_core::{Order, OrderId, OrderStatus, StatusDetails, StorefrontError};
use storefront_payments::{
    CheckoutRequest, PaymentError, PaymentVerification, SIGNATURE_HEADER, build_session_request,
    record_payment, verify_payment as verify_session,
};
use storefront_store::OrderStore;

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub payments_configured: bool,
    pub webhook_configured: bool,
    pub store_available: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "sessionId", alias = "session_id")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub order: Option<Order>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: OrderId,
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<Order>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    #[serde(flatten)]
    pub details: StatusDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusResponse {
    pub success: bool,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub changed: bool,
}

// ============================================================================
// Errors
// ============================================================================

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn bad_body(rejection: &JsonRejection) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, rejection.body_text(), "INVALID_BODY")
}

fn store_error(e: StorefrontError) -> ApiError {
    let (status, code) = match &e {
        StorefrontError::Validation { .. } | StorefrontError::Bounds { .. } => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
        }
        StorefrontError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        StorefrontError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        StorefrontError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
        StorefrontError::StoreUnavailable(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_UNAVAILABLE"),
        StorefrontError::Storage(_) | StorefrontError::Json(_) | StorefrontError::Io(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")
        }
    };
    if status.is_server_error() {
        tracing::error!(error = %e, "Order store error");
    }
    api_error(status, e.user_message(), code)
}

fn payment_error(e: PaymentError) -> ApiError {
    let (status, code) = match e {
        PaymentError::Order(inner) => return store_error(inner),
        PaymentError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        PaymentError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
        PaymentError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
        PaymentError::WebhookSignature(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
        PaymentError::WebhookParse(_) | PaymentError::MissingOrderId(_) => {
            (StatusCode::BAD_REQUEST, "MALFORMED_EVENT")
        }
        PaymentError::Stripe(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PAYMENT_PROVIDER_ERROR"),
        PaymentError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
    };
    if status.is_server_error() {
        tracing::error!(error = %e, "Payment error");
    }
    api_error(status, e.user_message(), code)
}

fn payments_disabled() -> ApiError {
    api_error(StatusCode::SERVICE_UNAVAILABLE, "Payments not configured", "PAYMENTS_DISABLED")
}

// ============================================================================
// Admin authentication
// ============================================================================

/// Proof that the request carried the admin bearer token
pub struct AdminAuth;

type HmacSha256 = Hmac<Sha256>;

fn token_mac(key: &str, token: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).ok()?;
    mac.update(token.as_bytes());
    Some(mac)
}

/// Constant-time token comparison
fn tokens_match(presented: &str, expected: &str) -> bool {
    let (Some(presented), Some(expected)) = (token_mac(expected, presented), token_mac(expected, expected)) else {
        return false;
    };
    presented.verify_slice(&expected.finalize().into_bytes()).is_ok()
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_token.as_deref() else {
            return Err(api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "Admin API not configured",
                "ADMIN_DISABLED",
            ));
        };

        let presented = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        match presented {
            Some(token) if tokens_match(token, expected) => Ok(Self),
            _ => {
                tracing::warn!(target: "security", path = %parts.uri.path(), "Rejected admin request");
                Err(api_error(StatusCode::UNAUTHORIZED, "Unauthorized", "UNAUTHORIZED"))
            }
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        payments_configured: state.checkout.is_some(),
        webhook_configured: state.webhook.is_some(),
        store_available: state.store.is_available() == Some(true),
    })
}

/// Empty success for CORS pre-flight
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Create Stripe checkout session
pub async fn create_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let checkout = state.checkout.as_ref().ok_or_else(payments_disabled)?;
    let Json(request) = payload.map_err(|e| bad_body(&e))?;

    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    let redirect_origin = state.config.redirect_origin(origin);

    // Reject bad input before touching the store or Stripe
    build_session_request(&request, redirect_origin).map_err(payment_error)?;

    if let Some(ref order_id) = request.order_id {
        let existing = state.store.get_by_id(order_id).await.map_err(store_error)?;
        if let Some(order) = existing.filter(|o| o.status.is_paid()) {
            tracing::warn!(order_id = %order_id, status = %order.status, "Checkout for an order that is already paid");
            return Err(store_error(StorefrontError::Conflict(format!(
                "order {order_id} is already paid"
            ))));
        }
    }

    let session = checkout
        .create_checkout_session(&request, redirect_origin)
        .await
        .map_err(payment_error)?;

    Ok(Json(CheckoutResponse {
        url: session.checkout_url,
        session_id: session.id,
    }))
}

/// Confirm a checkout session with Stripe
pub async fn verify_payment(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<PaymentVerification>, ApiError> {
    let checkout = state.checkout.as_ref().ok_or_else(payments_disabled)?;

    let verification = verify_session(checkout.provider().as_ref(), query.session_id.as_deref())
        .await
        .map_err(payment_error)?;

    if let Err(e) = record_payment(state.store.as_ref(), &verification).await {
        tracing::warn!(session_id = %verification.session_id, error = %e, "Could not record verified payment");
    }

    Ok(Json(verification))
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let Some(handler) = state.webhook.as_ref() else {
        tracing::error!("Missing STRIPE_WEBHOOK_SECRET");
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook secret not configured",
            "WEBHOOK_DISABLED",
        ));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!(target: "security", "Webhook without signature header");
            api_error(StatusCode::BAD_REQUEST, "Missing Stripe signature", "MISSING_SIGNATURE")
        })?;

    let outcome = handler
        .process(&body, signature, chrono::Utc::now().timestamp())
        .await
        .map_err(payment_error)?;

    tracing::debug!(outcome = ?outcome, "Webhook handled");
    Ok(Json(WebhookAck { received: true }))
}

/// Store a new pending order
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), ApiError> {
    let Json(request) = payload.map_err(|e| bad_body(&e))?;
    let mut order = request
        .order
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Order data is required", "VALIDATION_ERROR"))?;

    if order.id.is_empty() {
        order.id = OrderId::generate(&state.config.order_id_prefix);
    }
    if !order
        .id
        .as_str()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(store_error(StorefrontError::validation(
            "id",
            "may only contain letters, digits, '-' and '_'",
        )));
    }

    let now = chrono::Utc::now();
    order.created_at = now;
    order.updated_at = now;
    order.payment_session_id = None;
    order.payment_charge_id = None;
    order.paid_at = None;
    order.upstream_order_id = None;

    order.validate().map_err(store_error)?;
    state.store.create(&order).await.map_err(store_error)?;

    tracing::info!(order_id = %order.id, total = %order.total, "Order saved");

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            success: true,
            order_id: order.id,
        }),
    ))
}

/// All orders, newest first
pub async fn list_orders(_admin: AdminAuth, State(state): State<AppState>) -> Result<Json<OrdersResponse>, ApiError> {
    let orders = state.store.list_all().await.map_err(store_error)?;
    Ok(Json(OrdersResponse { orders }))
}

pub async fn get_order(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let id = OrderId::from_string(id);
    state
        .store
        .get_by_id(&id)
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Order not found", "NOT_FOUND"))
}

/// Statuses an operator may set; payment states belong to the payment flow
fn is_fulfillment_status(status: OrderStatus) -> bool {
    matches!(
        status,
        OrderStatus::OrderedFromUpstream | OrderStatus::Shipped | OrderStatus::Delivered
    )
}

/// Admin status change on a paid order; only forward fulfillment moves are accepted
pub async fn update_status(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<UpdateStatusResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| bad_body(&e))?;
    let id = OrderId::from_string(id);

    if !is_fulfillment_status(request.status) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "status must be ordered_from_upstream, shipped or delivered",
            "VALIDATION_ERROR",
        ));
    }

    let current = state
        .store
        .get_by_id(&id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Order not found", "NOT_FOUND"))?;
    if !current.status.is_paid() {
        tracing::warn!(order_id = %id, status = %current.status, requested = %request.status, "Rejected fulfillment of unpaid order");
        return Err(api_error(
            StatusCode::CONFLICT,
            format!("order {id} has not been paid"),
            "CONFLICT",
        ));
    }

    let change = state
        .store
        .update_status(&id, request.status, &request.details)
        .await
        .map_err(store_error)?;

    tracing::info!(order_id = %id, status = %request.status, changed = change.changed(), "Order status updated");

    Ok(Json(UpdateStatusResponse {
        success: true,
        order_id: id,
        status: change.order.status,
        changed: change.changed(),
    }))
}

/// Live order list for the admin dashboard
pub async fn orders_stream(
    _admin: AdminAuth,
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let feed = state.store.subscribe().await.map_err(store_error)?;

    let events = feed.map(|orders| {
        let event = Event::default().event("orders").json_data(&orders).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Could not encode order feed");
            Event::default().event("error").data("encoding failed")
        });
        Ok(event)
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("admin-token", "admin-token"));
        assert!(!tokens_match("admin-tokem", "admin-token"));
        assert!(!tokens_match("admin-token-extra", "admin-token"));
        assert!(!tokens_match("", "admin-token"));
    }

    #[test]
    fn test_only_fulfillment_statuses_are_settable() {
        assert!(is_fulfillment_status(OrderStatus::OrderedFromUpstream));
        assert!(is_fulfillment_status(OrderStatus::Shipped));
        assert!(is_fulfillment_status(OrderStatus::Delivered));
        assert!(!is_fulfillment_status(OrderStatus::Pending));
        assert!(!is_fulfillment_status(OrderStatus::Failed));
        assert!(!is_fulfillment_status(OrderStatus::Paid));
    }
}
