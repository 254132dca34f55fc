//! Decimal arithmetic utilities for financial calculations.
//!
//! All rounding uses `rust_decimal`'s default strategy, which is
//! round-half-to-even (banker's rounding).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Round a value to whole cents.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp(2)
}

/// Midpoint of the best bid and ask.
pub fn mid_price(bid: Decimal, ask: Decimal) -> Decimal {
    (bid + ask) / dec!(2)
}

/// Safe division that returns zero if the divisor is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_currency_half_to_even() {
        assert_eq!(round_currency(dec!(600.005)), dec!(600.00));
        assert_eq!(round_currency(dec!(600.015)), dec!(600.02));
        assert_eq!(round_currency(dec!(599.999)), dec!(600.00));
    }

    #[test]
    fn test_mid_price() {
        assert_eq!(mid_price(dec!(44.90), dec!(45.10)), dec!(45.00));
        assert_eq!(mid_price(dec!(100), dec!(101)), dec!(100.5));
    }

    #[test]
    fn test_safe_div_zero_denominator() {
        assert_eq!(safe_div(dec!(10), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(safe_div(dec!(10), dec!(4)), dec!(2.5));
    }
}
