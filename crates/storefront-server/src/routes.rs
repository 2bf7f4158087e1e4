//! Router

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::handlers::{
    create_checkout, create_order, get_order, health_check, list_orders, orders_stream, preflight,
    stripe_webhook, update_status, verify_payment,
};
use crate::state::AppState;

/// CORS limited to the configured origins
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Health
        .route("/health", get(health_check))

        // Checkout
        .route("/checkout-session", post(create_checkout).options(preflight))
        .route("/verify-payment", get(verify_payment).options(preflight))
        .route("/webhook", post(stripe_webhook))

        // Orders
        .route("/orders", post(create_order).get(list_orders).options(preflight))
        .route("/orders/stream", get(orders_stream))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/status", post(update_status).options(preflight))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
