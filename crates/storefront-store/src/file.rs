//! JSON File Order Store
//!
//! Keeps the working set in a [`MemoryOrderStore`] and rewrites the whole
//! collection file on every write (temp file + rename). Memory is only
//! updated once the file write has succeeded.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use storefront_core::{Order, OrderId, OrderStatus, Result, StatusDetails, StorefrontError};

use crate::document::OrderDocument;
use crate::memory::MemoryOrderStore;
use crate::{OrderFeed, OrderStore, StatusChange};

/// On-disk collection layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct Collection {
    orders: BTreeMap<String, OrderDocument>,
}

/// File-backed order store
pub struct FileOrderStore {
    path: PathBuf,
    inner: MemoryOrderStore,
    /// Serializes flush + commit so memory never runs ahead of the file
    write_lock: Mutex<()>,
}

impl FileOrderStore {
    /// Open the collection at `path`, creating it on first write.
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let collection = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Collection>(&bytes).map_err(|e| {
                StorefrontError::Storage(format!("corrupt order file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Collection::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            path = %path.display(),
            orders = collection.orders.len(),
            "Opened order file"
        );

        Ok(Self {
            path,
            inner: MemoryOrderStore::from_documents(collection.orders),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, orders: BTreeMap<String, OrderDocument>) -> Result<()> {
        let json = serde_json::to_vec_pretty(&Collection { orders })?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for FileOrderStore {
    async fn create(&self, order: &Order) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut orders = self.inner.export()?;
        if orders.contains_key(order.id.as_str()) {
            return Err(StorefrontError::Conflict(format!("order {} already exists", order.id)));
        }

        let document = OrderDocument::from(order);
        orders.insert(document.id.clone(), document.clone());
        self.flush(orders).await?;
        self.inner.commit(document)
    }

    async fn get_by_id(&self, id: &OrderId) -> Result<Option<Order>> {
        self.inner.get_by_id(id).await
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        self.inner.list_all().await
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        details: &StatusDetails,
    ) -> Result<StatusChange> {
        let _guard = self.write_lock.lock().await;
        let mut orders = self.inner.export()?;
        let document = orders
            .get_mut(id.as_str())
            .ok_or_else(|| StorefrontError::NotFound(format!("order {id}")))?;

        let mut order = Order::try_from(document.clone())?;
        let transition = order.apply_status(status, details)?;
        let change = StatusChange { order, transition };
        if change.changed() {
            let updated = OrderDocument::from(&change.order);
            *document = updated.clone();
            self.flush(orders).await?;
            self.inner.commit(updated)?;
        }
        Ok(change)
    }

    async fn subscribe(&self) -> Result<OrderFeed> {
        self.inner.subscribe().await
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
