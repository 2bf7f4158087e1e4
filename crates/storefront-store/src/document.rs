//! Persisted Document Layout
//!
//! Orders are stored as documents whose timestamps use the document
//! database's native `{ _seconds, _nanoseconds }` shape. The API speaks
//! ISO-8601; conversion happens here and nowhere else.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storefront_core::{CustomerInfo, Order, OrderId, OrderLine, OrderStatus, Result, StorefrontError};

/// Document database timestamp
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentTimestamp {
    #[serde(rename = "_seconds")]
    pub seconds: i64,
    #[serde(rename = "_nanoseconds")]
    pub nanos: u32,
}

impl From<DateTime<Utc>> for DocumentTimestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self {
            seconds: at.timestamp(),
            nanos: at.timestamp_subsec_nanos(),
        }
    }
}

impl TryFrom<DocumentTimestamp> for DateTime<Utc> {
    type Error = StorefrontError;

    fn try_from(ts: DocumentTimestamp) -> Result<Self> {
        Self::from_timestamp(ts.seconds, ts.nanos)
            .ok_or_else(|| StorefrontError::Storage(format!("timestamp out of range: {}s", ts.seconds)))
    }
}

/// Stored form of an [`Order`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDocument {
    pub id: String,
    pub created_at: DocumentTimestamp,
    pub updated_at: DocumentTimestamp,
    pub status: OrderStatus,
    pub customer: CustomerInfo,
    pub items: Vec<OrderLine>,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_charge_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DocumentTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_order_id: Option<String>,
}

impl From<&Order> for OrderDocument {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.as_str().to_string(),
            created_at: order.created_at.into(),
            updated_at: order.updated_at.into(),
            status: order.status,
            customer: order.customer.clone(),
            items: order.lines.clone(),
            subtotal: order.subtotal,
            shipping: order.shipping,
            total: order.total,
            payment_session_id: order.payment_session_id.clone(),
            payment_charge_id: order.payment_charge_id.clone(),
            paid_at: order.paid_at.map(Into::into),
            upstream_order_id: order.upstream_order_id.clone(),
        }
    }
}

impl TryFrom<OrderDocument> for Order {
    type Error = StorefrontError;

    fn try_from(doc: OrderDocument) -> Result<Self> {
        Ok(Self {
            id: OrderId::from_string(doc.id),
            created_at: doc.created_at.try_into()?,
            updated_at: doc.updated_at.try_into()?,
            status: doc.status,
            customer: doc.customer,
            lines: doc.items,
            subtotal: doc.subtotal,
            shipping: doc.shipping,
            total: doc.total,
            payment_session_id: doc.payment_session_id,
            payment_charge_id: doc.payment_charge_id,
            paid_at: doc.paid_at.map(TryInto::try_into).transpose()?,
            upstream_order_id: doc.upstream_order_id,
        })
    }
}
