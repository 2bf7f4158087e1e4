//! Storefront HTTP Server
//!
//! Axum server for checkout sessions, Stripe webhooks, payment verification
//! and the admin order API.

mod config;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_core::StorefrontError;
use storefront_payments::{CheckoutProvider, StripeClient};
use storefront_store::{FileOrderStore, MemoryOrderStore, OrderStore, StoreHandle};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    tracing::debug!(config = ?config, "Loaded configuration");

    // Order store: built once, forced here so a bad backend shows up at startup
    let store_path = config.order_store_path.clone();
    let store = Arc::new(StoreHandle::lazy(move || {
        let path = store_path.clone();
        async move {
            let store: Arc<dyn OrderStore> = match path {
                Some(path) => Arc::new(FileOrderStore::open(path).await?),
                None => Arc::new(MemoryOrderStore::new()),
            };
            Ok::<_, StorefrontError>(store)
        }
    }));
    match store.init().await {
        Ok(backend) => tracing::info!("✓ Order store ready ({})", backend.name()),
        Err(e) => tracing::error!(error = %e, "⚠ Order store unavailable - order endpoints will fail"),
    }

    // Initialize payments
    let provider: Option<Arc<dyn CheckoutProvider>> = config
        .stripe_secret_key
        .as_deref()
        .map(|key| Arc::new(StripeClient::new(key)) as Arc<dyn CheckoutProvider>);

    if provider.is_some() {
        tracing::info!("✓ Stripe configured");
    } else {
        tracing::warn!("⚠ Stripe not configured - checkout disabled");
        tracing::warn!("  Set STRIPE_SECRET_KEY in .env");
    }
    if config.webhook_secret.is_none() {
        tracing::warn!("⚠ STRIPE_WEBHOOK_SECRET not set - webhook will answer 500");
    }
    if config.admin_token.is_none() {
        tracing::warn!("⚠ ADMIN_API_TOKEN not set - admin endpoints disabled");
    }

    let addr = config.bind_addr.clone();
    let state = AppState::new(config, store, provider);
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 storefront server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health              - Health check");
    tracing::info!("  POST /checkout-session    - Create Stripe checkout");
    tracing::info!("  GET  /verify-payment      - Confirm a checkout session");
    tracing::info!("  POST /webhook             - Stripe events");
    tracing::info!("  POST /orders              - Save a pending order");
    tracing::info!("  GET  /orders              - List orders (admin)");
    tracing::info!("  GET  /orders/stream       - Live order feed (admin)");
    tracing::info!("  POST /orders/{{id}}/status  - Advance an order (admin)");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
