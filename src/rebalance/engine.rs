//! One rebalancing run, start to finish.

use crate::broker::{AccountConfigurations, Brokerage, OrderSide};
use crate::config::{RebalanceConfig, TargetAllocation};
use crate::error::{BrokerError, RunError};
use crate::rebalance::closer::{ClosedPosition, UnlistedPositionCloser};
use crate::rebalance::differ::AllocationDiffer;
use crate::rebalance::sizer::{OrderIntent, OrderSizer};
use crate::rebalance::submitter::OrderSubmitter;
use crate::runlog::RunLogger;
use crate::utils::decimal::{mid_price, round_currency};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// One sized adjustment, recorded in the run log.
#[derive(Debug, Clone)]
pub struct Adjustment {
    pub symbol: String,
    pub raw_allocation: Decimal,
    pub current_value: Decimal,
    /// Dollar value actually ordered
    pub amount: Decimal,
    pub side: OrderSide,
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub closed: Vec<ClosedPosition>,
    pub adjustments: Vec<Adjustment>,
    pub orders_submitted: usize,
    pub log_path: PathBuf,
}

/// Drives one linear rebalancing pass against a brokerage.
pub struct Rebalancer {
    rebalance: RebalanceConfig,
    targets: TargetAllocation,
}

impl Rebalancer {
    pub fn new(rebalance: RebalanceConfig, targets: TargetAllocation) -> Self {
        Self { rebalance, targets }
    }

    /// Execute one run: cancel stale orders, configure the account, close
    /// unlisted positions, diff, size, submit, audit, and wait for
    /// settlement.
    pub async fn run(
        &self,
        broker: &dyn Brokerage,
        logger: &RunLogger,
    ) -> Result<RunReport, RunError> {
        let submitter = OrderSubmitter::new(&self.rebalance);

        // Stale orders from an earlier run would stack on top of this one.
        submitter.cancel_open_orders(broker).await?;

        self.prepare_account(broker).await?;

        let closer = UnlistedPositionCloser::new(&self.targets);
        let closed = closer.close_unlisted(broker).await?;

        // Snapshot AFTER the closes so freed cash is visible to sizing.
        let account = broker.get_account().await?;
        info!(
            equity = %account.equity,
            cash = %account.cash,
            portfolio_value = %account.portfolio_value,
            "account snapshot"
        );

        let mut current_values = HashMap::new();
        for target in self.targets.iter() {
            let held = broker
                .get_open_position(&target.symbol)
                .await?
                .map(|p| p.market_value)
                .unwrap_or(Decimal::ZERO);
            current_values.insert(target.symbol.clone(), held);
        }

        let differ = AllocationDiffer::new(&self.targets);
        let mut adjustments = Vec::new();
        let mut intents: Vec<OrderIntent> = Vec::new();

        if differ.drift_exceeds(&account, &current_values, self.rebalance.drift_trigger) {
            let sizer = OrderSizer::new(self.rebalance.min_notional);
            for diff in differ.diff_against(&account, &current_values) {
                debug!(
                    symbol = %diff.symbol,
                    raw = %round_currency(diff.raw_allocation),
                    current = %diff.current_value,
                    diff = %round_currency(diff.diff),
                    "allocation diff"
                );

                let asset = broker.get_asset(&diff.symbol).await?;
                let intent = if asset.fractionable {
                    sizer.size_notional(&diff.symbol, diff.diff, account.cash)
                } else {
                    let quote = broker.get_latest_quote(&diff.symbol).await?;
                    let mid = mid_price(quote.bid_price, quote.ask_price);
                    sizer.size_whole_shares(&diff.symbol, diff.diff, account.cash, mid)
                };

                if let Some(intent) = intent {
                    adjustments.push(Adjustment {
                        symbol: diff.symbol.clone(),
                        raw_allocation: diff.raw_allocation,
                        current_value: diff.current_value,
                        amount: intent.value,
                        side: intent.side,
                    });
                    intents.push(intent);
                }
            }
        } else {
            info!(
                trigger = %self.rebalance.drift_trigger,
                "allocation within drift tolerance, nothing to adjust"
            );
        }

        let outcome = submitter.submit_all(broker, &intents).await;

        // The audit record is written even when some submissions failed.
        let log_path = logger.write(&closed, &adjustments)?;

        if !outcome.failures.is_empty() {
            for (symbol, reason) in &outcome.failures {
                error!(%symbol, %reason, "order was rejected");
            }
            return Err(RunError::PartialSubmission {
                attempted: intents.len(),
                failed: outcome.failures.len(),
            });
        }

        if !outcome.submitted.is_empty() {
            let symbols: Vec<String> = outcome
                .submitted
                .iter()
                .map(|o| o.symbol.clone())
                .collect();
            submitter.await_settlement(broker, &symbols).await?;
        }

        let positions = broker.list_positions().await?;
        info!("current positions:");
        for position in &positions {
            info!("   {}: ${:.2}", position.symbol, position.market_value);
        }

        Ok(RunReport {
            closed,
            adjustments,
            orders_submitted: outcome.submitted.len(),
            log_path,
        })
    }

    /// Enable fractional trading and pin the margin multiplier to 1 so
    /// buys never draw margin.
    async fn prepare_account(&self, broker: &dyn Brokerage) -> Result<(), BrokerError> {
        let current = broker.get_account_configurations().await?;
        if current.fractional_trading && current.max_margin_multiplier == "1" {
            return Ok(());
        }
        broker
            .set_account_configurations(&AccountConfigurations {
                fractional_trading: true,
                max_margin_multiplier: "1".to_string(),
            })
            .await?;
        debug!("account configured: fractional trading on, margin multiplier 1");
        Ok(())
    }
}
