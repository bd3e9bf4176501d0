//! Currency arithmetic
//!
//! Amounts are `Decimal` end to end. Rounding happens only where Euro values
//! are converted to Cedi, to two places, half away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{LedgerError, LedgerResult};

fn out_of_range(field: &str) -> LedgerError {
    LedgerError::validation(field, "Amount out of range")
}

/// Round a currency amount to two decimal places
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a Euro amount to Cedi at the given rate. `field` names the Euro
/// input when the product does not fit in a `Decimal`.
pub fn euro_to_cedi(
    field: &str,
    value_in_euro: Decimal,
    cedi_conversion_rate: Decimal,
) -> LedgerResult<Decimal> {
    value_in_euro
        .checked_mul(cedi_conversion_rate)
        .map(round_currency)
        .ok_or_else(|| out_of_range(field))
}

/// Cost of an order line: quantity times the quoted unit price
pub fn line_cost(quantity: i64, unit_price: Decimal) -> LedgerResult<Decimal> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .ok_or_else(|| out_of_range("quantity"))
}

/// Sum of currency amounts
pub fn checked_total<I>(amounts: I) -> LedgerResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
        .ok_or_else(|| out_of_range("totalCost"))
}
