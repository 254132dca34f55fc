//! Order sizing under brokerage constraints.
//!
//! Converts a signed dollar diff into at most one order intent, honoring
//! the minimum notional, the available-cash clamp, and whole-share
//! quantities for assets that do not trade fractionally. Rounding is
//! round-half-to-even throughout (`rust_decimal`'s default).

use crate::broker::{NewOrder, OrderSide};
use crate::utils::decimal::round_currency;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// How an order is sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSizing {
    /// Currency amount (fractionable assets)
    Notional(Decimal),
    /// Whole-share count (non-fractionable assets)
    Quantity(Decimal),
}

/// A single order to be submitted, derived from one symbol's diff.
#[derive(Debug, Clone)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: OrderSide,
    pub sizing: OrderSizing,
    /// Dollar value of the order, for the audit log
    pub value: Decimal,
}

impl OrderIntent {
    /// Express the intent as a market DAY order.
    pub fn to_market_order(&self) -> NewOrder {
        match self.sizing {
            OrderSizing::Notional(amount) => {
                NewOrder::market_notional(self.symbol.clone(), self.side, amount)
            }
            OrderSizing::Quantity(shares) => {
                NewOrder::market_qty(self.symbol.clone(), self.side, shares)
            }
        }
    }
}

/// Sizes orders from dollar diffs.
pub struct OrderSizer {
    min_notional: Decimal,
}

impl OrderSizer {
    pub fn new(min_notional: Decimal) -> Self {
        Self { min_notional }
    }

    /// Order amount after rounding and the available-cash clamp, or None
    /// when the adjustment is below the minimum notional.
    ///
    /// The clamp covers rounding drift and price movement between the
    /// account read and the order write; it applies to both sides, so a
    /// drawn-down cash balance can defer sell adjustments to a later run.
    fn clamped_amount(&self, symbol: &str, diff: Decimal, available_cash: Decimal) -> Option<Decimal> {
        let amount = round_currency(diff.abs()).min(round_currency(available_cash));
        if amount < self.min_notional {
            debug!(%symbol, %amount, "adjustment below minimum notional, skipping");
            return None;
        }
        Some(amount)
    }

    fn side_for(diff: Decimal) -> OrderSide {
        if diff > Decimal::ZERO {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }

    /// Size a fractionable asset by notional amount.
    pub fn size_notional(
        &self,
        symbol: &str,
        diff: Decimal,
        available_cash: Decimal,
    ) -> Option<OrderIntent> {
        let amount = self.clamped_amount(symbol, diff, available_cash)?;
        Some(OrderIntent {
            symbol: symbol.to_string(),
            side: Self::side_for(diff),
            sizing: OrderSizing::Notional(amount),
            value: amount,
        })
    }

    /// Size a non-fractionable asset by whole shares at the quote midpoint.
    pub fn size_whole_shares(
        &self,
        symbol: &str,
        diff: Decimal,
        available_cash: Decimal,
        mid_price: Decimal,
    ) -> Option<OrderIntent> {
        if mid_price <= Decimal::ZERO {
            warn!(%symbol, %mid_price, "non-positive mid price, skipping");
            return None;
        }
        let amount = self.clamped_amount(symbol, diff, available_cash)?;
        let shares = (amount / mid_price).round();
        if shares == Decimal::ZERO {
            info!(
                %symbol, %mid_price,
                "adjustment rounds to zero whole shares, skipping"
            );
            return None;
        }
        Some(OrderIntent {
            symbol: symbol.to_string(),
            side: Self::side_for(diff),
            sizing: OrderSizing::Quantity(shares),
            value: round_currency(shares * mid_price),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sizer() -> OrderSizer {
        OrderSizer::new(dec!(1.00))
    }

    #[test]
    fn test_sub_minimum_diff_emits_nothing() {
        assert!(sizer().size_notional("VOO", dec!(0.42), dec!(1000)).is_none());
        assert!(sizer().size_notional("VOO", dec!(-0.99), dec!(1000)).is_none());
    }

    #[test]
    fn test_minimum_boundary_is_inclusive() {
        let intent = sizer().size_notional("VOO", dec!(1.00), dec!(1000)).unwrap();
        assert_eq!(intent.sizing, OrderSizing::Notional(dec!(1.00)));
    }

    #[test]
    fn test_notional_clamped_to_available_cash() {
        let intent = sizer().size_notional("VOO", dec!(600), dec!(250)).unwrap();
        assert_eq!(intent.sizing, OrderSizing::Notional(dec!(250)));
        assert_eq!(intent.side, OrderSide::Buy);
    }

    #[test]
    fn test_sell_side_from_negative_diff() {
        let intent = sizer().size_notional("VOO", dec!(-300), dec!(1000)).unwrap();
        assert_eq!(intent.side, OrderSide::Sell);
        assert_eq!(intent.sizing, OrderSizing::Notional(dec!(300)));
    }

    #[test]
    fn test_negative_cash_suppresses_orders() {
        assert!(sizer().size_notional("VOO", dec!(600), dec!(-5)).is_none());
    }

    #[test]
    fn test_whole_share_sizing_rounds_to_nearest() {
        // 300 / 45 = 6.67 → 7 shares
        let intent = sizer()
            .size_whole_shares("DGS", dec!(300), dec!(1000), dec!(45))
            .unwrap();
        assert_eq!(intent.sizing, OrderSizing::Quantity(dec!(7)));
        assert_eq!(intent.value, dec!(315.00));
    }

    #[test]
    fn test_whole_share_rounding_is_half_to_even() {
        // 112.50 / 45 = 2.5 → 2 shares under banker's rounding
        let intent = sizer()
            .size_whole_shares("DGS", dec!(112.50), dec!(1000), dec!(45))
            .unwrap();
        assert_eq!(intent.sizing, OrderSizing::Quantity(dec!(2)));
    }

    #[test]
    fn test_zero_share_round_skips() {
        // 10 / 45 = 0.22 → 0 shares
        assert!(sizer()
            .size_whole_shares("DGS", dec!(10), dec!(1000), dec!(45))
            .is_none());
    }

    #[test]
    fn test_whole_share_amount_clamped_before_conversion() {
        // diff 600 clamped to 90 cash → 90 / 45 = 2 shares
        let intent = sizer()
            .size_whole_shares("DGS", dec!(600), dec!(90), dec!(45))
            .unwrap();
        assert_eq!(intent.sizing, OrderSizing::Quantity(dec!(2)));
    }

    #[test]
    fn test_intent_to_market_order() {
        let intent = sizer().size_notional("VOO", dec!(600), dec!(1000)).unwrap();
        let order = intent.to_market_order();
        assert_eq!(order.notional, Some(dec!(600.00)));
        assert_eq!(order.qty, None);

        let intent = sizer()
            .size_whole_shares("DGS", dec!(300), dec!(1000), dec!(45))
            .unwrap();
        let order = intent.to_market_order();
        assert_eq!(order.qty, Some(dec!(7)));
        assert_eq!(order.notional, None);
    }
}
