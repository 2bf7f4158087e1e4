//! Money and Shipping Rules
//!
//! All prices are `Decimal` in US dollars. The same shipping rule is used by
//! the cart, the order builder and the checkout session initiator.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::error::{Result, StorefrontError};

/// Subtotal at or above which shipping is free
pub const FREE_SHIPPING_THRESHOLD: Decimal = dec!(50.00);

/// Flat shipping cost below the free-shipping threshold
pub const STANDARD_SHIPPING_COST: Decimal = dec!(4.99);

/// Highest accepted product or accessory price
pub const MAX_UNIT_PRICE: Decimal = dec!(1000000);

/// Highest accepted quantity on one order line
pub const MAX_QUANTITY: u32 = 10_000;

/// ISO currency code sent to the payment provider
pub const CURRENCY: &str = "usd";

/// Shipping cost for a given subtotal
pub fn shipping_for(subtotal: Decimal) -> Decimal {
    if subtotal >= FREE_SHIPPING_THRESHOLD {
        Decimal::ZERO
    } else {
        STANDARD_SHIPPING_COST
    }
}

/// Convert a dollar amount to whole cents, rounding half away from zero.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(StorefrontError::validation(
            "amount",
            format!("{amount} is negative"),
        ));
    }

    let out_of_range = || StorefrontError::validation("amount", format!("{amount} is out of range"));
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(out_of_range)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(out_of_range)
}

/// Convert whole cents back to dollars
pub fn from_minor_units(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
