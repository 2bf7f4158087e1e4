//! Order Status State Machine
//!
//! ```text
//! pending ──▶ paid ──▶ ordered_from_upstream ──▶ shipped ──▶ delivered
//!    │         ▲
//!    └─▶ failed┘
//! ```
//!
//! Orders only ever move forward. Re-applying the current status is a no-op,
//! which makes webhook redelivery harmless.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StorefrontError};

/// Lifecycle status of an order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, customer has not paid yet
    #[default]
    Pending,
    /// Provider reported a failed payment attempt
    Failed,
    /// Payment confirmed by the provider
    Paid,
    /// Order placed with the upstream supplier
    OrderedFromUpstream,
    /// Handed to the carrier
    Shipped,
    /// Received by the customer
    Delivered,
}

/// Outcome of applying a status to an order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Status changed
    Advanced { from: OrderStatus, to: OrderStatus },
    /// Order already had this status
    Unchanged,
}

impl OrderStatus {
    /// All statuses in lifecycle order
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Failed,
        Self::Paid,
        Self::OrderedFromUpstream,
        Self::Shipped,
        Self::Delivered,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Failed => "failed",
            Self::Paid => "paid",
            Self::OrderedFromUpstream => "ordered_from_upstream",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
        }
    }

    /// Position in the lifecycle; transitions must strictly increase it
    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Failed => 1,
            Self::Paid => 2,
            Self::OrderedFromUpstream => 3,
            Self::Shipped => 4,
            Self::Delivered => 5,
        }
    }

    /// Whether `next` is strictly ahead of `self`
    pub const fn can_advance_to(self, next: Self) -> bool {
        next.rank() > self.rank()
    }

    /// Whether the customer has paid for an order in this status
    pub const fn is_paid(self) -> bool {
        self.rank() >= Self::Paid.rank()
    }

    /// Check a move from `self` to `next`.
    pub fn transition(self, next: Self) -> Result<Transition> {
        if next == self {
            Ok(Transition::Unchanged)
        } else if self.can_advance_to(next) {
            Ok(Transition::Advanced { from: self, to: next })
        } else {
            Err(StorefrontError::InvalidTransition { from: self, to: next })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StorefrontError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StorefrontError::validation("status", format!("unknown status '{s}'")))
    }
}
