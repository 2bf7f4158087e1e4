//! Catalog Lookup
//!
//! The product catalog itself lives outside this crate. Carts only hold ids
//! and resolve names and prices through a [`Catalog`] at the moment they are
//! needed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Id of the zero-cost accessory used when none is chosen
pub const NO_ACCESSORY_ID: &str = "none";

/// A purchasable product variant (design + color)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    /// Listing of the product at the upstream supplier
    #[serde(default)]
    pub upstream_url: Option<String>,
}

/// Device the product is made for
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceModel {
    pub id: String,
    pub name: String,
}

/// Add-on bundled with a product (e.g. a screen protector)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessory {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub upstream_url: Option<String>,
}

impl Accessory {
    /// The fixed "included, zero-cost" option
    pub fn included() -> Self {
        Self {
            id: NO_ACCESSORY_ID.into(),
            name: "None".into(),
            price: Decimal::ZERO,
            upstream_url: None,
        }
    }
}

/// Price and name lookup for cart lines
pub trait Catalog: Send + Sync {
    fn product(&self, id: &str) -> Option<ProductVariant>;

    fn device_model(&self, id: &str) -> Option<DeviceModel>;

    /// Accessory by id; [`NO_ACCESSORY_ID`] always resolves
    fn accessory(&self, id: &str) -> Option<Accessory>;

    /// Accessory used when the shopper does not pick one
    fn default_accessory(&self) -> Accessory {
        Accessory::included()
    }
}

/// In-memory catalog
#[derive(Debug, Default)]
pub struct StaticCatalog {
    products: HashMap<String, ProductVariant>,
    models: HashMap<String, DeviceModel>,
    accessories: HashMap<String, Accessory>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_product(mut self, product: ProductVariant) -> Self {
        self.products.insert(product.id.clone(), product);
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: DeviceModel) -> Self {
        self.models.insert(model.id.clone(), model);
        self
    }

    #[must_use]
    pub fn with_accessory(mut self, accessory: Accessory) -> Self {
        self.accessories.insert(accessory.id.clone(), accessory);
        self
    }

    /// Update a product price (prices change between cart and checkout)
    pub fn set_price(&mut self, product_id: &str, price: Decimal) {
        if let Some(product) = self.products.get_mut(product_id) {
            product.price = price;
        }
    }
}

impl Catalog for StaticCatalog {
    fn product(&self, id: &str) -> Option<ProductVariant> {
        self.products.get(id).cloned()
    }

    fn device_model(&self, id: &str) -> Option<DeviceModel> {
        self.models.get(id).cloned()
    }

    fn accessory(&self, id: &str) -> Option<Accessory> {
        if id == NO_ACCESSORY_ID {
            return Some(
                self.accessories
                    .get(id)
                    .cloned()
                    .unwrap_or_else(Accessory::included),
            );
        }
        self.accessories.get(id).cloned()
    }
}
