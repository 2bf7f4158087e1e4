//! Cart Aggregate
//!
//! Lines hold catalog ids only; prices are looked up whenever totals are
//! computed and frozen by [`Cart::snapshot`] when an order is built.
//! Every mutation writes the whole cart to [`CartStorage`].

mod storage;

pub use storage::{CartStorage, JsonFileCartStorage, MemoryCartStorage};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::{Accessory, Catalog, DeviceModel, ProductVariant};
use crate::error::{Result, StorefrontError};
use crate::money::shipping_for;
use crate::order::OrderLine;

/// Product names containing this marker are leftover test fixtures
pub const TEST_PRODUCT_MARKER: &str = "TEST";

/// One product/model/accessory combination in the cart
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_variant_id: String,
    pub accessory_id: String,
    pub device_model_id: String,
    pub quantity: u32,
}

impl CartLine {
    fn same_combination(&self, product_id: &str, model_id: &str, accessory_id: &str) -> bool {
        self.product_variant_id == product_id
            && self.device_model_id == model_id
            && self.accessory_id == accessory_id
    }
}

/// Shopping cart
pub struct Cart {
    lines: Vec<CartLine>,
    catalog: Arc<dyn Catalog>,
    storage: Arc<dyn CartStorage>,
}

impl std::fmt::Debug for Cart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cart").field("lines", &self.lines).finish_non_exhaustive()
    }
}

impl Cart {
    /// Create an empty cart
    pub fn new(catalog: Arc<dyn Catalog>, storage: Arc<dyn CartStorage>) -> Self {
        Self {
            lines: Vec::new(),
            catalog,
            storage,
        }
    }

    /// Restore the cart saved in `storage`.
    ///
    /// Lines for products that no longer exist, or whose name carries
    /// [`TEST_PRODUCT_MARKER`], are dropped. Unreadable storage yields an
    /// empty cart.
    pub fn restore(catalog: Arc<dyn Catalog>, storage: Arc<dyn CartStorage>) -> Self {
        let saved = storage.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not load saved cart, starting empty");
            Vec::new()
        });

        let before = saved.len();
        let lines: Vec<CartLine> = saved
            .into_iter()
            .filter(|line| line.quantity > 0)
            .filter(|line| {
                catalog
                    .product(&line.product_variant_id)
                    .is_some_and(|p| !p.name.contains(TEST_PRODUCT_MARKER))
            })
            .collect();

        let cart = Self {
            lines,
            catalog,
            storage,
        };
        if cart.lines.len() != before {
            tracing::info!(dropped = before - cart.lines.len(), "Removed stale cart lines");
            cart.persist();
        }
        cart
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add one unit; an existing identical combination is incremented.
    pub fn add(&mut self, product: &ProductVariant, model: &DeviceModel, accessory: Option<&Accessory>) {
        let accessory_id = accessory.map_or_else(|| self.catalog.default_accessory().id, |a| a.id.clone());

        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.same_combination(&product.id, &model.id, &accessory_id))
        {
            line.quantity += 1;
        } else {
            self.lines.push(CartLine {
                product_variant_id: product.id.clone(),
                accessory_id,
                device_model_id: model.id.clone(),
                quantity: 1,
            });
        }
        self.persist();
    }

    /// Remove the line at `index`
    pub fn remove(&mut self, index: usize) -> Result<CartLine> {
        self.check_index(index)?;
        let removed = self.lines.remove(index);
        self.persist();
        Ok(removed)
    }

    /// Set the quantity of a line; below 1 removes it
    pub fn set_quantity(&mut self, index: usize, quantity: u32) -> Result<()> {
        if quantity < 1 {
            return self.remove(index).map(|_| ());
        }
        self.check_index(index)?;
        self.lines[index].quantity = quantity;
        self.persist();
        Ok(())
    }

    /// Swap the accessory on a line, keeping its quantity.
    ///
    /// If the new combination already exists the two lines are merged.
    pub fn set_accessory(&mut self, index: usize, accessory: &Accessory) -> Result<()> {
        self.check_index(index)?;

        let line = &self.lines[index];
        let duplicate = self.lines.iter().enumerate().position(|(i, other)| {
            i != index && other.same_combination(&line.product_variant_id, &line.device_model_id, &accessory.id)
        });

        match duplicate {
            Some(target) => {
                let moved = self.lines[index].quantity;
                self.lines[target].quantity += moved;
                self.lines.remove(index);
            }
            None => self.lines[index].accessory_id.clone_from(&accessory.id),
        }
        self.persist();
        Ok(())
    }

    /// Empty the cart (after a confirmed payment)
    pub fn clear(&mut self) {
        self.lines.clear();
        self.persist();
    }

    /// Sum of (product + accessory) price times quantity at current prices
    pub fn subtotal(&self) -> Decimal {
        self.lines
            .iter()
            .map(|line| {
                let product = self
                    .catalog
                    .product(&line.product_variant_id)
                    .map_or(Decimal::ZERO, |p| p.price);
                let accessory = self
                    .catalog
                    .accessory(&line.accessory_id)
                    .map_or(Decimal::ZERO, |a| a.price);
                (product + accessory) * Decimal::from(line.quantity)
            })
            .sum()
    }

    pub fn shipping_cost(&self) -> Decimal {
        shipping_for(self.subtotal())
    }

    pub fn total(&self) -> Decimal {
        self.subtotal() + self.shipping_cost()
    }

    /// Number of units, for the cart badge
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Freeze every line at current catalog prices
    pub fn snapshot(&self) -> Result<Vec<OrderLine>> {
        self.lines
            .iter()
            .map(|line| {
                let product = self.catalog.product(&line.product_variant_id).ok_or_else(|| {
                    StorefrontError::NotFound(format!("product {}", line.product_variant_id))
                })?;
                let model = self.catalog.device_model(&line.device_model_id).ok_or_else(|| {
                    StorefrontError::NotFound(format!("device model {}", line.device_model_id))
                })?;
                let accessory = self
                    .catalog
                    .accessory(&line.accessory_id)
                    .ok_or_else(|| StorefrontError::NotFound(format!("accessory {}", line.accessory_id)))?;

                Ok(OrderLine {
                    product_name: product.name,
                    unit_price: product.price,
                    accessory_name: accessory.name,
                    accessory_price: accessory.price,
                    device_model_name: model.name,
                    quantity: line.quantity,
                    image_ref: product.image,
                    external_product_ref: product.upstream_url,
                    accessory_external_ref: accessory.upstream_url,
                })
            })
            .collect()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.lines.len() {
            return Err(StorefrontError::Bounds {
                index,
                len: self.lines.len(),
            });
        }
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.storage.save(&self.lines) {
            tracing::warn!(error = %e, "Failed to persist cart");
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::catalog::StaticCatalog;
    use rust_decimal_macros::dec;

    pub fn apertura() -> ProductVariant {
        ProductVariant {
            id: "apertura-black".into(),
            name: "Apertura - Black".into(),
            price: dec!(40.40),
            image: Some("Apertura_Black.png".into()),
            upstream_url: Some("https://supplier.example/apertura".into()),
        }
    }

    pub fn atlas() -> ProductVariant {
        ProductVariant {
            id: "atlas-brown".into(),
            name: "Atlas - Light Brown".into(),
            price: dec!(41.30),
            image: None,
            upstream_url: None,
        }
    }

    pub fn test_case() -> ProductVariant {
        ProductVariant {
            id: "test-black".into(),
            name: "TEST CASE ($1)".into(),
            price: dec!(1.00),
            image: None,
            upstream_url: None,
        }
    }

    pub fn iphone() -> DeviceModel {
        DeviceModel {
            id: "iphone-15".into(),
            name: "iPhone 15".into(),
        }
    }

    pub fn glass() -> Accessory {
        Accessory {
            id: "tempered-glass".into(),
            name: "Tempered Glass".into(),
            price: dec!(4.99),
            upstream_url: None,
        }
    }

    pub fn catalog() -> StaticCatalog {
        StaticCatalog::new()
            .with_product(apertura())
            .with_product(atlas())
            .with_product(test_case())
            .with_model(iphone())
            .with_accessory(glass())
    }

    pub fn cart() -> Cart {
        Cart::new(Arc::new(catalog()), Arc::new(MemoryCartStorage::new()))
    }
}
