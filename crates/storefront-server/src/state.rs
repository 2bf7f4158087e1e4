//! Application State

use std::sync::Arc;

use storefront_payments::{CheckoutProvider, CheckoutService, WebhookHandler, WebhookVerifier};
use storefront_store::StoreHandle;

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,

    /// Order store, initialized once at startup
    pub store: Arc<StoreHandle>,

    /// Checkout sessions (optional - None if Stripe is not configured)
    pub checkout: Option<Arc<CheckoutService>>,

    /// Webhook handler (optional - None without a webhook secret)
    pub webhook: Option<Arc<WebhookHandler>>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        store: Arc<StoreHandle>,
        provider: Option<Arc<dyn CheckoutProvider>>,
    ) -> Self {
        let webhook = config.webhook_secret.as_ref().map(|secret| {
            let verifier = WebhookVerifier::new(secret.clone()).with_tolerance(config.webhook_tolerance_secs);
            Arc::new(WebhookHandler::new(store.clone(), verifier))
        });

        Self {
            config: Arc::new(config),
            store,
            checkout: provider.map(|p| Arc::new(CheckoutService::new(p))),
            webhook,
        }
    }
}
