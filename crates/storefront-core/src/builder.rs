//! Order Builder
//!
//! Turns a cart plus checkout form input into a pending [`Order`].

use crate::cart::Cart;
use crate::error::{Result, StorefrontError};
use crate::order::{CustomerInfo, DEFAULT_ORDER_PREFIX, Order, OrderId};

/// Builds orders with ids under a fixed prefix
#[derive(Clone, Debug)]
pub struct OrderBuilder {
    prefix: String,
}

impl Default for OrderBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ORDER_PREFIX)
    }
}

impl OrderBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Build a pending order from the cart at current catalog prices.
    pub fn build(&self, cart: &Cart, customer: CustomerInfo) -> Result<Order> {
        if cart.is_empty() {
            return Err(StorefrontError::validation("items", "cart is empty"));
        }
        customer.validate()?;

        let lines = cart.snapshot()?;
        let order = Order::new(OrderId::generate(&self.prefix), customer, lines);

        tracing::info!(
            order_id = %order.id,
            total = %order.total,
            lines = order.lines.len(),
            "Built order"
        );
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::fixtures::{apertura, atlas, cart, glass, iphone};
    use crate::order::fixtures::customer;
    use crate::status::OrderStatus;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_build_pending_order() {
        let mut cart = cart();
        cart.add(&apertura(), &iphone(), None);
        cart.add(&atlas(), &iphone(), Some(&glass()));

        let order = OrderBuilder::new("GG").build(&cart, customer()).unwrap();
        assert!(order.id.as_str().starts_with("GG-"));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.subtotal, dec!(86.69));
        assert_eq!(order.shipping, Decimal::ZERO);
        assert_eq!(order.total, order.subtotal + order.shipping);
        assert_eq!(order.subtotal, cart.subtotal());
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_build_rejects_empty_cart() {
        let err = OrderBuilder::default().build(&cart(), customer()).unwrap_err();
        assert!(matches!(err, StorefrontError::Validation { ref field, .. } if field == "items"));
    }

    #[test]
    fn test_build_rejects_missing_field() {
        let mut cart = cart();
        cart.add(&apertura(), &iphone(), None);

        let mut info = customer();
        info.phone.clear();
        let err = OrderBuilder::default().build(&cart, info).unwrap_err();
        assert!(matches!(err, StorefrontError::Validation { ref field, .. } if field == "phone"));

        let mut info = customer();
        info.address.zip_code.clear();
        let err = OrderBuilder::default().build(&cart, info).unwrap_err();
        assert!(matches!(err, StorefrontError::Validation { ref field, .. } if field == "address.zipCode"));
    }
}
