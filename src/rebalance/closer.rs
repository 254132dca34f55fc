//! Liquidation of positions outside the target allocation.

use crate::broker::Brokerage;
use crate::config::TargetAllocation;
use crate::error::BrokerError;
use rust_decimal::Decimal;
use tracing::info;

/// A position liquidated because its symbol is not in the target set.
#[derive(Debug, Clone)]
pub struct ClosedPosition {
    pub symbol: String,
    /// Market value at the time of the close
    pub market_value: Decimal,
    pub qty: Decimal,
}

/// Closes every held position whose symbol is absent from the targets.
///
/// Runs before sizing so freed cash is available to the new orders.
pub struct UnlistedPositionCloser<'a> {
    targets: &'a TargetAllocation,
}

impl<'a> UnlistedPositionCloser<'a> {
    pub fn new(targets: &'a TargetAllocation) -> Self {
        Self { targets }
    }

    pub async fn close_unlisted(
        &self,
        broker: &dyn Brokerage,
    ) -> Result<Vec<ClosedPosition>, BrokerError> {
        let mut closed = Vec::new();
        for position in broker.list_positions().await? {
            if self.targets.contains(&position.symbol) {
                continue;
            }
            info!(
                symbol = %position.symbol,
                qty = %position.qty,
                market_value = %position.market_value,
                "closing position not in target allocation"
            );
            broker.close_position(&position.symbol).await?;
            closed.push(ClosedPosition {
                symbol: position.symbol,
                market_value: position.market_value,
                qty: position.qty,
            });
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MockBrokerage;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_only_unlisted_positions_closed() {
        let broker = MockBrokerage::with_cash(dec!(0));
        broker.seed_position("VOO", dec!(5), dec!(100)).await;
        broker.seed_position("GME", dec!(10), dec!(5)).await;

        let targets = TargetAllocation::from_pairs([("VOO", dec!(0.6)), ("BND", dec!(0.4))]);
        let closer = UnlistedPositionCloser::new(&targets);

        let closed = closer.close_unlisted(&broker).await.unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].symbol, "GME");
        assert_eq!(closed[0].market_value, dec!(50));

        // GME gone, VOO untouched, proceeds back in cash
        assert!(broker.get_open_position("GME").await.unwrap().is_none());
        assert!(broker.get_open_position("VOO").await.unwrap().is_some());
        assert_eq!(broker.cash().await, dec!(50));
    }

    #[tokio::test]
    async fn test_no_positions_closes_nothing() {
        let broker = MockBrokerage::with_cash(dec!(1000));
        let targets = TargetAllocation::from_pairs([("VOO", dec!(1))]);
        let closer = UnlistedPositionCloser::new(&targets);

        let closed = closer.close_unlisted(&broker).await.unwrap();
        assert!(closed.is_empty());
    }
}
