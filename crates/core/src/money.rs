//! Monetary amounts.
//!
//! Amounts are exact decimals so that `total == Σ subtotal` holds without
//! floating-point drift.

use rust_decimal::Decimal;

/// Monetary amount in the store currency.
pub type Money = Decimal;

/// `unit_price × quantity`, or `None` if the product is out of range.
pub fn line_subtotal(unit_price: Money, quantity: i32) -> Option<Money> {
    unit_price.checked_mul(Decimal::from(quantity))
}

/// Sum of amounts, or `None` on overflow.
pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
}

/// Recover a unit price from a stored subtotal.
///
/// Returns `None` when `quantity` is not positive.
pub fn unit_price_from_subtotal(subtotal: Money, quantity: i32) -> Option<Money> {
    if quantity <= 0 {
        return None;
    }
    subtotal.checked_div(Decimal::from(quantity))
}
