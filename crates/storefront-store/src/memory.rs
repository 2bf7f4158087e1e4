//! In-Memory Order Store
//!
//! Holds order documents in a map and publishes the full ordered list to
//! subscribers after every write.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use storefront_core::{Order, OrderId, OrderStatus, Result, StatusDetails, StorefrontError};

use crate::document::OrderDocument;
use crate::{OrderFeed, OrderStore, StatusChange};

/// In-memory order store
pub struct MemoryOrderStore {
    documents: RwLock<BTreeMap<String, OrderDocument>>,
    feed: watch::Sender<Vec<Order>>,
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::from_documents(BTreeMap::new())
    }

    /// Start from previously persisted documents
    pub(crate) fn from_documents(documents: BTreeMap<String, OrderDocument>) -> Self {
        let (feed, _) = watch::channel(Vec::new());
        let store = Self {
            documents: RwLock::new(documents),
            feed,
        };
        if let Ok(orders) = store.sorted_orders() {
            store.feed.send_replace(orders);
        }
        store
    }

    /// Copy of every stored document
    pub(crate) fn export(&self) -> Result<BTreeMap<String, OrderDocument>> {
        Ok(self.read()?.clone())
    }

    /// Insert or overwrite one document, then notify subscribers
    pub(crate) fn commit(&self, document: OrderDocument) -> Result<()> {
        self.write()?.insert(document.id.clone(), document);
        self.publish();
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, OrderDocument>>> {
        self.documents
            .read()
            .map_err(|_| StorefrontError::Storage("order store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, OrderDocument>>> {
        self.documents
            .write()
            .map_err(|_| StorefrontError::Storage("order store lock poisoned".into()))
    }

    /// All orders, newest first
    fn sorted_orders(&self) -> Result<Vec<Order>> {
        let documents = self.read()?;
        let mut orders = documents
            .values()
            .cloned()
            .map(Order::try_from)
            .collect::<Result<Vec<_>>>()?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(orders)
    }

    fn publish(&self) {
        match self.sorted_orders() {
            Ok(orders) => {
                self.feed.send_replace(orders);
            }
            Err(e) => tracing::error!(error = %e, "Failed to publish order list"),
        }
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create(&self, order: &Order) -> Result<()> {
        {
            let mut documents = self.write()?;
            if documents.contains_key(order.id.as_str()) {
                return Err(StorefrontError::Conflict(format!("order {} already exists", order.id)));
            }
            documents.insert(order.id.as_str().to_string(), OrderDocument::from(order));
        }
        self.publish();
        Ok(())
    }

    async fn get_by_id(&self, id: &OrderId) -> Result<Option<Order>> {
        let document = self.read()?.get(id.as_str()).cloned();
        document.map(Order::try_from).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        self.sorted_orders()
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        details: &StatusDetails,
    ) -> Result<StatusChange> {
        let change = {
            let mut documents = self.write()?;
            let document = documents
                .get_mut(id.as_str())
                .ok_or_else(|| StorefrontError::NotFound(format!("order {id}")))?;

            let mut order = Order::try_from(document.clone())?;
            let transition = order.apply_status(status, details)?;
            *document = OrderDocument::from(&order);
            StatusChange { order, transition }
        };

        if change.changed() {
            self.publish();
        }
        Ok(change)
    }

    async fn subscribe(&self) -> Result<OrderFeed> {
        // WatchStream yields the current list first, then every change.
        Ok(Box::pin(WatchStream::new(self.feed.subscribe())))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
