//! Order Model
//!
//! An [`Order`] is created in the browser session from a cart snapshot and
//! becomes authoritative once stored. Line prices are frozen at creation.

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{Result, StorefrontError};
use crate::money::{shipping_for, MAX_QUANTITY, MAX_UNIT_PRICE};
use crate::status::{OrderStatus, Transition};

/// Prefix used when no other is configured
pub const DEFAULT_ORDER_PREFIX: &str = "ORD";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?1?\s*\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}$").expect("valid phone pattern")
});

static ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("valid zip pattern"));

/// Order identifier (formatted: PREFIX-MILLIS-RANDOM)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Generate a fresh id. The random suffix keeps ids unique when two
    /// checkouts start in the same millisecond.
    pub fn generate(prefix: &str) -> Self {
        let millis = Utc::now().timestamp_millis();
        let random = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{prefix}-{millis}-{}", &random[..8]))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shipping address (US only)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[serde(default)]
    pub street: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apartment: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
}

/// Contact and shipping details entered at checkout
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: ShippingAddress,
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StorefrontError::validation(field, "is required"));
    }
    Ok(())
}

impl CustomerInfo {
    /// Check every required field; the error names the first bad one.
    pub fn validate(&self) -> Result<()> {
        require("firstName", &self.first_name)?;
        require("lastName", &self.last_name)?;

        require("email", &self.email)?;
        if !EMAIL_RE.is_match(self.email.trim()) {
            return Err(StorefrontError::validation("email", "is not a valid email address"));
        }

        require("phone", &self.phone)?;
        if !PHONE_RE.is_match(self.phone.trim()) {
            return Err(StorefrontError::validation("phone", "is not a valid phone number"));
        }

        require("address.street", &self.address.street)?;
        require("address.city", &self.address.city)?;
        require("address.state", &self.address.state)?;
        require("address.zipCode", &self.address.zip_code)?;
        if !ZIP_RE.is_match(self.address.zip_code.trim()) {
            return Err(StorefrontError::validation("address.zipCode", "is not a valid ZIP code"));
        }

        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// Frozen copy of one purchased cart line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_name: String,
    pub unit_price: Decimal,
    pub accessory_name: String,
    pub accessory_price: Decimal,
    pub device_model_name: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_product_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessory_external_ref: Option<String>,
}

impl OrderLine {
    /// Product plus accessory, per unit
    pub fn unit_total(&self) -> Decimal {
        self.unit_price + self.accessory_price
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_total() * Decimal::from(self.quantity)
    }

    /// Check the line before any price arithmetic runs on it.
    ///
    /// Prices and quantity are bounded so totals cannot overflow.
    pub fn validate(&self, index: usize) -> Result<()> {
        let field = |name: &str| format!("items[{index}].{name}");

        if self.product_name.trim().is_empty() {
            return Err(StorefrontError::validation(field("productName"), "is required"));
        }
        if self.quantity == 0 {
            return Err(StorefrontError::validation(field("quantity"), "must be at least 1"));
        }
        if self.quantity > MAX_QUANTITY {
            return Err(StorefrontError::validation(
                field("quantity"),
                format!("must be at most {MAX_QUANTITY}"),
            ));
        }
        if self.unit_price.is_sign_negative() {
            return Err(StorefrontError::validation(field("unitPrice"), "must not be negative"));
        }
        if self.accessory_price.is_sign_negative() {
            return Err(StorefrontError::validation(field("accessoryPrice"), "must not be negative"));
        }
        if self.unit_price > MAX_UNIT_PRICE {
            return Err(StorefrontError::validation(field("unitPrice"), "is out of range"));
        }
        if self.accessory_price > MAX_UNIT_PRICE {
            return Err(StorefrontError::validation(field("accessoryPrice"), "is out of range"));
        }
        Ok(())
    }
}

/// Subtotal, shipping and total for a set of lines
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl Totals {
    pub fn from_lines(lines: &[OrderLine]) -> Self {
        let subtotal: Decimal = lines.iter().map(OrderLine::line_total).sum();
        Self::from_subtotal(subtotal)
    }

    pub fn from_subtotal(subtotal: Decimal) -> Self {
        let shipping = shipping_for(subtotal);
        Self {
            subtotal,
            shipping,
            total: subtotal + shipping,
        }
    }
}

/// Optional fields merged alongside a status change
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_charge_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    /// Id of the order placed with the upstream supplier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_order_id: Option<String>,
}

impl StatusDetails {
    /// Details recorded when a payment is confirmed
    pub fn payment(session_id: impl Into<String>, charge_id: Option<String>) -> Self {
        let session_id = session_id.into();
        Self {
            payment_charge_id: Some(charge_id.unwrap_or_else(|| session_id.clone())),
            payment_session_id: Some(session_id),
            paid_at: Some(Utc::now()),
            upstream_order_id: None,
        }
    }
}

/// A customer purchase
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub status: OrderStatus,
    pub customer: CustomerInfo,
    #[serde(rename = "items")]
    pub lines: Vec<OrderLine>,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_charge_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_order_id: Option<String>,
}

impl Order {
    /// Create a pending order; totals are computed from `lines`.
    pub fn new(id: OrderId, customer: CustomerInfo, lines: Vec<OrderLine>) -> Self {
        let totals = Totals::from_lines(&lines);
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            status: OrderStatus::Pending,
            customer,
            lines,
            subtotal: totals.subtotal,
            shipping: totals.shipping,
            total: totals.total,
            payment_session_id: None,
            payment_charge_id: None,
            paid_at: None,
            upstream_order_id: None,
        }
    }

    /// Validate an order received from a client before it is stored.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(StorefrontError::validation("id", "is required"));
        }
        if self.status != OrderStatus::Pending {
            return Err(StorefrontError::validation("status", "new orders must be pending"));
        }
        self.customer.validate()?;

        if self.lines.is_empty() {
            return Err(StorefrontError::validation("items", "order has no items"));
        }
        for (index, line) in self.lines.iter().enumerate() {
            line.validate(index)?;
        }

        let expected = Totals::from_lines(&self.lines);
        if self.subtotal != expected.subtotal {
            return Err(StorefrontError::validation(
                "subtotal",
                format!("expected {}, got {}", expected.subtotal, self.subtotal),
            ));
        }
        if self.shipping != expected.shipping {
            return Err(StorefrontError::validation(
                "shipping",
                format!("expected {}, got {}", expected.shipping, self.shipping),
            ));
        }
        if self.total != expected.total {
            return Err(StorefrontError::validation(
                "total",
                format!("expected {}, got {}", expected.total, self.total),
            ));
        }
        Ok(())
    }

    /// Move to `status`, merging any present `details`.
    ///
    /// Re-applying the current status changes nothing, so a redelivered
    /// payment event keeps the original `paidAt`.
    pub fn apply_status(&mut self, status: OrderStatus, details: &StatusDetails) -> Result<Transition> {
        let transition = self.status.transition(status)?;
        if transition == Transition::Unchanged {
            return Ok(transition);
        }

        self.status = status;
        if let Some(ref session_id) = details.payment_session_id {
            self.payment_session_id = Some(session_id.clone());
        }
        if let Some(ref charge_id) = details.payment_charge_id {
            self.payment_charge_id = Some(charge_id.clone());
        }
        if let Some(paid_at) = details.paid_at {
            self.paid_at = Some(paid_at);
        }
        if let Some(ref upstream_id) = details.upstream_order_id {
            self.upstream_order_id = Some(upstream_id.clone());
        }
        self.updated_at = Utc::now();

        Ok(transition)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use rust_decimal_macros::dec;

    pub fn customer() -> CustomerInfo {
        CustomerInfo {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "(555) 123-4567".into(),
            address: ShippingAddress {
                street: "12 Analytical Way".into(),
                apartment: None,
                city: "Springfield".into(),
                state: "IL".into(),
                zip_code: "62701".into(),
            },
        }
    }

    pub fn line(price: Decimal, accessory_price: Decimal, quantity: u32) -> OrderLine {
        OrderLine {
            product_name: "Apertura - Black".into(),
            unit_price: price,
            accessory_name: if accessory_price.is_zero() { "None".into() } else { "Tempered Glass".into() },
            accessory_price,
            device_model_name: "iPhone 15".into(),
            quantity,
            image_ref: None,
            external_product_ref: None,
            accessory_external_ref: None,
        }
    }

    pub fn order() -> Order {
        Order::new(
            OrderId::from_string("ORD-1-abc"),
            customer(),
            vec![line(dec!(40.40), Decimal::ZERO, 1)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_id_format() {
        let id = OrderId::generate("ORD");
        let parts: Vec<&str> = id.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
        assert_ne!(id, OrderId::generate("ORD"));
    }

    #[test]
    fn test_customer_validation_names_missing_field() {
        let mut info = customer();
        info.address.city = "  ".into();
        match info.validate() {
            Err(StorefrontError::Validation { field, .. }) => assert_eq!(field, "address.city"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_customer_validation_email_shape() {
        let mut info = customer();
        info.email = "ada@example".into();
        match info.validate() {
            Err(StorefrontError::Validation { field, .. }) => assert_eq!(field, "email"),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(customer().validate().is_ok());
    }

    #[test]
    fn test_totals_with_free_shipping() {
        let lines = vec![
            line(dec!(40.40), Decimal::ZERO, 1),
            line(dec!(41.30), dec!(4.99), 1),
        ];
        let totals = Totals::from_lines(&lines);
        assert_eq!(totals.subtotal, dec!(86.69));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.total, dec!(86.69));
    }

    #[test]
    fn test_order_validate_rejects_tampered_total() {
        let mut order = order();
        assert!(order.validate().is_ok());
        order.total = dec!(1.00);
        match order.validate() {
            Err(StorefrontError::Validation { field, .. }) => assert_eq!(field, "total"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_order_validate_rejects_oversized_lines() {
        // Totals on the posted lines must never be computed unchecked.
        let mut order = order();
        order.lines[0].unit_price = Decimal::MAX;
        order.lines[0].accessory_price = Decimal::MAX;
        match order.validate() {
            Err(StorefrontError::Validation { field, .. }) => assert_eq!(field, "items[0].unitPrice"),
            other => panic!("expected validation error, got {other:?}"),
        }

        let mut order = super::fixtures::order();
        order.lines[0].quantity = u32::MAX;
        match order.validate() {
            Err(StorefrontError::Validation { field, .. }) => assert_eq!(field, "items[0].quantity"),
            other => panic!("expected validation error, got {other:?}"),
        }

        let at_limit = line(MAX_UNIT_PRICE, MAX_UNIT_PRICE, MAX_QUANTITY);
        assert!(at_limit.validate(0).is_ok());
        assert_eq!(at_limit.line_total(), dec!(20000000000));
    }

    #[test]
    fn test_apply_paid_twice_keeps_first_details() {
        let mut order = order();
        let first = StatusDetails::payment("cs_test_1", Some("pi_1".into()));
        let paid_at = first.paid_at;

        let t1 = order.apply_status(OrderStatus::Paid, &first).unwrap();
        assert!(matches!(t1, Transition::Advanced { .. }));

        let second = StatusDetails::payment("cs_test_1", Some("pi_1".into()));
        let t2 = order.apply_status(OrderStatus::Paid, &second).unwrap();
        assert_eq!(t2, Transition::Unchanged);
        assert_eq!(order.paid_at, paid_at);
        assert_eq!(order.payment_charge_id.as_deref(), Some("pi_1"));
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let json = serde_json::to_value(order()).unwrap();
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["items"][0]["productName"], "Apertura - Black");
        assert_eq!(json["status"], "pending");
    }
}
