//! # storefront-store
//!
//! Persistence for orders.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │ StoreHandle  │────▶│ dyn OrderStore   │────▶│ Memory / File   │
//! │ (init once)  │     │                  │     │ (documents)     │
//! └──────────────┘     └──────────────────┘     └─────────────────┘
//! ```
//!
//! Orders are never deleted. Status changes are merges that only move
//! forward, so at-least-once event delivery is safe.

mod document;
mod feed;
mod file;
mod handle;
mod memory;

pub use document::{DocumentTimestamp, OrderDocument};
pub use feed::{Subscription, subscribe_with};
pub use file::FileOrderStore;
pub use handle::StoreHandle;
pub use memory::MemoryOrderStore;

use async_trait::async_trait;
use futures::stream::BoxStream;

use storefront_core::{Order, OrderId, OrderStatus, Result, StatusDetails, Transition};

/// Live feed of the full order list, newest first
pub type OrderFeed = BoxStream<'static, Vec<Order>>;

/// Result of a status update
#[derive(Clone, Debug)]
pub struct StatusChange {
    /// Order as stored after the update
    pub order: Order,
    pub transition: Transition,
}

impl StatusChange {
    pub fn changed(&self) -> bool {
        matches!(self.transition, Transition::Advanced { .. })
    }
}

/// Order persistence
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Store a new order; an existing id is a conflict, never overwritten
    async fn create(&self, order: &Order) -> Result<()>;

    async fn get_by_id(&self, id: &OrderId) -> Result<Option<Order>>;

    /// All orders, newest first
    async fn list_all(&self) -> Result<Vec<Order>>;

    /// Move an order forward, merging present `details` fields.
    ///
    /// Re-applying the current status is a no-op; moving backward fails with
    /// `InvalidTransition`.
    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        details: &StatusDetails,
    ) -> Result<StatusChange>;

    /// Current order list followed by a new list on every change
    async fn subscribe(&self) -> Result<OrderFeed>;

    /// Backend name
    fn name(&self) -> &'static str;
}
