//! Order submission and bounded settlement polling.

use crate::broker::{Brokerage, Order};
use crate::config::RebalanceConfig;
use crate::error::RunError;
use crate::rebalance::sizer::OrderIntent;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Submits sized orders sequentially and waits for them to settle.
pub struct OrderSubmitter {
    poll_interval: Duration,
    poll_timeout: Duration,
}

/// What happened to a batch of intents.
#[derive(Debug, Default)]
pub struct SubmissionOutcome {
    pub submitted: Vec<Order>,
    /// (symbol, error) per intent the brokerage rejected
    pub failures: Vec<(String, String)>,
}

impl OrderSubmitter {
    pub fn new(config: &RebalanceConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
        }
    }

    /// Cancel every open order so repeated runs never stack duplicates.
    pub async fn cancel_open_orders(&self, broker: &dyn Brokerage) -> Result<(), RunError> {
        broker.cancel_all_orders().await?;
        debug!("open orders cancelled");
        Ok(())
    }

    /// Submit intents one at a time, in the order given. A rejected order
    /// is recorded and does not stop the rest of the batch.
    pub async fn submit_all(
        &self,
        broker: &dyn Brokerage,
        intents: &[OrderIntent],
    ) -> SubmissionOutcome {
        let mut outcome = SubmissionOutcome::default();
        for intent in intents {
            let order = intent.to_market_order();
            match broker.submit_order(&order).await {
                Ok(placed) => {
                    info!(
                        symbol = %intent.symbol,
                        side = %intent.side,
                        value = %intent.value,
                        order_id = %placed.id,
                        "order submitted"
                    );
                    outcome.submitted.push(placed);
                }
                Err(e) => {
                    warn!(symbol = %intent.symbol, error = %e, "order submission failed");
                    outcome.failures.push((intent.symbol.clone(), e.to_string()));
                }
            }
        }
        outcome
    }

    /// Poll open orders for the affected symbols until none remain, or
    /// fail with a timeout once the configured bound is exceeded.
    pub async fn await_settlement(
        &self,
        broker: &dyn Brokerage,
        symbols: &[String],
    ) -> Result<(), RunError> {
        let deadline = Instant::now() + self.poll_timeout;
        loop {
            let open = broker.list_open_orders(symbols).await?;
            if open.is_empty() {
                debug!("all orders settled");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(RunError::SettlementTimeout {
                    timeout_secs: self.poll_timeout.as_secs(),
                });
            }
            debug!(open = open.len(), "waiting for orders to settle");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{MockBrokerage, OrderSide, OrderStatus};
    use crate::rebalance::sizer::OrderSizer;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn fast_submitter() -> OrderSubmitter {
        OrderSubmitter {
            poll_interval: Duration::from_millis(10),
            poll_timeout: Duration::from_millis(50),
        }
    }

    fn parked_order(symbol: &str) -> Order {
        Order {
            id: "parked-1".to_string(),
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            status: OrderStatus::New,
            qty: Some(dec!(1)),
            notional: None,
            filled_qty: Some(dec!(0)),
            submitted_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_submit_all_preserves_order_and_reports_fills() {
        let broker = MockBrokerage::with_cash(dec!(1000));
        broker.set_quote("VOO", dec!(99), dec!(101)).await;
        broker.set_quote("BND", dec!(49), dec!(51)).await;

        let sizer = OrderSizer::new(dec!(1));
        let intents = vec![
            sizer.size_notional("VOO", dec!(600), dec!(1000)).unwrap(),
            sizer.size_notional("BND", dec!(400), dec!(1000)).unwrap(),
        ];

        let outcome = fast_submitter().submit_all(&broker, &intents).await;
        assert_eq!(outcome.submitted.len(), 2);
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.submitted[0].symbol, "VOO");
        assert_eq!(outcome.submitted[1].symbol, "BND");
    }

    #[tokio::test]
    async fn test_settlement_returns_once_no_orders_open() {
        let broker = MockBrokerage::with_cash(dec!(1000));
        let result = fast_submitter()
            .await_settlement(&broker, &["VOO".to_string()])
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_settlement_times_out_on_stuck_order() {
        let broker = MockBrokerage::with_cash(dec!(1000));
        broker.push_open_order(parked_order("VOO")).await;

        let err = fast_submitter()
            .await_settlement(&broker, &["VOO".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::SettlementTimeout { .. }));
    }

    #[tokio::test]
    async fn test_settlement_ignores_unrelated_symbols() {
        let broker = MockBrokerage::with_cash(dec!(1000));
        broker.push_open_order(parked_order("GME")).await;

        // Stuck order is for a symbol outside this run's set
        let result = fast_submitter()
            .await_settlement(&broker, &["VOO".to_string()])
            .await;
        assert!(result.is_ok());
    }
}
