//! Store Handle
//!
//! Process-wide entry point to the order store. The backend is initialized
//! at most once, even when the first requests arrive concurrently. A failed
//! initialization is remembered and every later call fails fast with
//! [`StorefrontError::StoreUnavailable`].

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

use storefront_core::{Order, OrderId, OrderStatus, Result, StatusDetails, StorefrontError};

use crate::{OrderFeed, OrderStore, StatusChange};

type Initializer = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn OrderStore>>> + Send + Sync>;

/// Lazily-initialized shared order store
pub struct StoreHandle {
    cell: OnceCell<std::result::Result<Arc<dyn OrderStore>, String>>,
    init: Initializer,
}

impl StoreHandle {
    /// Handle whose backend is built by `init` on first use
    pub fn lazy<F, Fut>(init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn OrderStore>>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            init: Box::new(move || Box::pin(init())),
        }
    }

    /// Handle around an already-built backend
    pub fn ready(store: Arc<dyn OrderStore>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(Ok(store))),
            init: Box::new(|| {
                Box::pin(async { Err(StorefrontError::StoreUnavailable("store already initialized".into())) })
            }),
        }
    }

    /// Initialize the backend if needed and return it
    pub async fn init(&self) -> Result<Arc<dyn OrderStore>> {
        let outcome = self
            .cell
            .get_or_init(|| async {
                match (self.init)().await {
                    Ok(store) => {
                        tracing::info!(backend = store.name(), "Order store initialized");
                        Ok(store)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Order store initialization failed");
                        Err(e.to_string())
                    }
                }
            })
            .await;

        outcome.clone().map_err(StorefrontError::StoreUnavailable)
    }

    /// `None` until initialization has been attempted
    pub fn is_available(&self) -> Option<bool> {
        self.cell.get().map(std::result::Result::is_ok)
    }
}

#[async_trait]
impl OrderStore for StoreHandle {
    async fn create(&self, order: &Order) -> Result<()> {
        self.init().await?.create(order).await
    }

    async fn get_by_id(&self, id: &OrderId) -> Result<Option<Order>> {
        self.init().await?.get_by_id(id).await
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        self.init().await?.list_all().await
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        details: &StatusDetails,
    ) -> Result<StatusChange> {
        self.init().await?.update_status(id, status, details).await
    }

    async fn subscribe(&self) -> Result<OrderFeed> {
        self.init().await?.subscribe().await
    }

    fn name(&self) -> &'static str {
        "handle"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryOrderStore;
    use crate::tests::sample_order;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_first_use_initializes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = Arc::new(StoreHandle::lazy(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Arc::new(MemoryOrderStore::new()) as Arc<dyn OrderStore>)
            }
        }));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.create(&sample_order(&format!("ORD-{i}-x"))).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.list_all().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_failed_init_fails_fast_every_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = StoreHandle::lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(StorefrontError::Storage("bad credentials".into())) }
        });

        assert_eq!(handle.is_available(), None);
        for _ in 0..3 {
            let err = handle.list_all().await.unwrap_err();
            assert!(matches!(err, StorefrontError::StoreUnavailable(ref msg) if msg.contains("bad credentials")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.is_available(), Some(false));
    }

    #[tokio::test]
    async fn test_ready_handle() {
        let handle = StoreHandle::ready(Arc::new(MemoryOrderStore::new()));
        assert_eq!(handle.is_available(), Some(true));
        assert!(handle.list_all().await.unwrap().is_empty());
    }
}
