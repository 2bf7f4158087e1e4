//! Callback Subscriptions
//!
//! Adapts [`OrderStore::subscribe`] to a callback, for consumers that want
//! "call me with the full list now and on every change".

use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;

use storefront_core::{Order, Result};

use crate::OrderStore;

/// Active callback subscription; dropping it unsubscribes
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop receiving updates
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Invoke `callback` with the ordered order list immediately and after
/// every change. Must be called inside a tokio runtime.
pub async fn subscribe_with<F>(store: Arc<dyn OrderStore>, mut callback: F) -> Result<Subscription>
where
    F: FnMut(Vec<Order>) + Send + 'static,
{
    let mut feed = store.subscribe().await?;
    let task = tokio::spawn(async move {
        while let Some(orders) = feed.next().await {
            callback(orders);
        }
    });
    Ok(Subscription { task })
}
