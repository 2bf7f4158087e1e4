//! # storefront-core
//!
//! Cart, order model and order lifecycle rules for a small direct-to-consumer
//! storefront.
//!
//! ## Order lifecycle
//!
//! ```text
//! ┌────────┐   ┌──────────────┐   ┌──────────────────┐   ┌───────────────┐
//! │  Cart  │──▶│ OrderBuilder │──▶│ Checkout session │──▶│ Webhook: paid │
//! └────────┘   └──────────────┘   └──────────────────┘   └───────────────┘
//!                (pending)            (hosted page)          (store update)
//! ```
//!
//! Prices are `Decimal` throughout and are frozen into [`OrderLine`]s when the
//! order is built, so the amount charged always matches what the customer saw.

pub mod builder;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod money;
pub mod order;
pub mod status;

pub use builder::OrderBuilder;
pub use cart::{Cart, CartLine, CartStorage, JsonFileCartStorage, MemoryCartStorage};
pub use catalog::{Accessory, Catalog, DeviceModel, ProductVariant, StaticCatalog};
pub use error::{Result, StorefrontError};
pub use order::{CustomerInfo, Order, OrderId, OrderLine, ShippingAddress, StatusDetails, Totals};
pub use status::{OrderStatus, Transition};
