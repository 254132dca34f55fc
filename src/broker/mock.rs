//! In-memory brokerage for tests and `--mock` runs.
//!
//! Market orders fill immediately at the quote midpoint (or the
//! position's last price when no quote is seeded), so a mock run settles
//! without polling.

use crate::broker::types::*;
use crate::broker::Brokerage;
use crate::error::BrokerError;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Fill price used when neither a quote nor a position exists for a
/// symbol; keeps credential-less `--mock` runs self-contained.
const DEFAULT_FILL_PRICE: Decimal = dec!(100);

/// Simulated position state.
#[derive(Debug, Clone)]
pub struct MockPosition {
    pub qty: Decimal,
    pub last_price: Decimal,
}

/// Mutable account state behind the mock.
#[derive(Debug)]
pub struct MockAccountState {
    pub cash: Decimal,
    pub positions: HashMap<String, MockPosition>,
    pub quotes: HashMap<String, Quote>,
    pub non_fractionable: HashSet<String>,
    pub open_orders: Vec<Order>,
    pub account_config: AccountConfigurations,
    pub fills: Vec<Order>,
}

/// Brokerage double backed by in-memory state.
pub struct MockBrokerage {
    state: Arc<RwLock<MockAccountState>>,
    order_seq: AtomicU64,
}

impl MockBrokerage {
    /// Create a mock account holding only cash.
    pub fn with_cash(cash: Decimal) -> Self {
        Self {
            state: Arc::new(RwLock::new(MockAccountState {
                cash,
                positions: HashMap::new(),
                quotes: HashMap::new(),
                non_fractionable: HashSet::new(),
                open_orders: Vec::new(),
                account_config: AccountConfigurations {
                    fractional_trading: false,
                    max_margin_multiplier: "4".to_string(),
                },
                fills: Vec::new(),
            })),
            order_seq: AtomicU64::new(1),
        }
    }

    pub async fn set_quote(&self, symbol: &str, bid: Decimal, ask: Decimal) {
        self.state.write().await.quotes.insert(
            symbol.to_string(),
            Quote {
                bid_price: bid,
                ask_price: ask,
            },
        );
    }

    /// Mark a symbol as whole-shares-only.
    pub async fn set_non_fractionable(&self, symbol: &str) {
        self.state
            .write()
            .await
            .non_fractionable
            .insert(symbol.to_string());
    }

    /// Seed an existing position without touching cash.
    pub async fn seed_position(&self, symbol: &str, qty: Decimal, price: Decimal) {
        self.state.write().await.positions.insert(
            symbol.to_string(),
            MockPosition {
                qty,
                last_price: price,
            },
        );
    }

    /// Park an order in the open-order book (it will never fill); used to
    /// exercise settlement polling.
    pub async fn push_open_order(&self, order: Order) {
        self.state.write().await.open_orders.push(order);
    }

    /// Orders filled so far, oldest first.
    pub async fn fills(&self) -> Vec<Order> {
        self.state.read().await.fills.clone()
    }

    pub async fn cash(&self) -> Decimal {
        self.state.read().await.cash
    }

    fn next_order_id(&self) -> String {
        format!("mock-{}", self.order_seq.fetch_add(1, Ordering::SeqCst))
    }

    fn price_of(state: &MockAccountState, symbol: &str) -> Option<Decimal> {
        if let Some(quote) = state.quotes.get(symbol) {
            return Some(crate::utils::decimal::mid_price(
                quote.bid_price,
                quote.ask_price,
            ));
        }
        state.positions.get(symbol).map(|p| p.last_price)
    }

    fn market_value(state: &MockAccountState, symbol: &str, position: &MockPosition) -> Decimal {
        let price = Self::price_of(state, symbol).unwrap_or(position.last_price);
        position.qty * price
    }
}

#[async_trait]
impl Brokerage for MockBrokerage {
    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        let state = self.state.read().await;
        let positions_value: Decimal = state
            .positions
            .iter()
            .map(|(symbol, p)| Self::market_value(&state, symbol, p))
            .sum();
        let portfolio_value = state.cash + positions_value;
        Ok(AccountSnapshot {
            equity: portfolio_value,
            cash: state.cash,
            portfolio_value,
        })
    }

    async fn list_positions(&self) -> Result<Vec<Position>, BrokerError> {
        let state = self.state.read().await;
        Ok(state
            .positions
            .iter()
            .map(|(symbol, p)| Position {
                symbol: symbol.clone(),
                qty: p.qty,
                market_value: Self::market_value(&state, symbol, p),
            })
            .collect())
    }

    async fn get_open_position(&self, symbol: &str) -> Result<Option<Position>, BrokerError> {
        let state = self.state.read().await;
        Ok(state.positions.get(symbol).map(|p| Position {
            symbol: symbol.to_string(),
            qty: p.qty,
            market_value: Self::market_value(&state, symbol, p),
        }))
    }

    async fn get_asset(&self, symbol: &str) -> Result<Asset, BrokerError> {
        let state = self.state.read().await;
        Ok(Asset {
            symbol: symbol.to_string(),
            fractionable: !state.non_fractionable.contains(symbol),
            tradable: true,
        })
    }

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, BrokerError> {
        let state = self.state.read().await;
        state
            .quotes
            .get(symbol)
            .cloned()
            .ok_or_else(|| BrokerError::Api {
                status: 404,
                message: format!("no quote seeded for {symbol}"),
            })
    }

    async fn cancel_all_orders(&self) -> Result<(), BrokerError> {
        self.state.write().await.open_orders.clear();
        Ok(())
    }

    async fn close_position(&self, symbol: &str) -> Result<Order, BrokerError> {
        let mut state = self.state.write().await;
        let position = state
            .positions
            .remove(symbol)
            .ok_or_else(|| BrokerError::Api {
                status: 404,
                message: format!("position does not exist: {symbol}"),
            })?;
        let price = Self::price_of(&state, symbol).unwrap_or(position.last_price);
        let proceeds = position.qty * price;
        state.cash += proceeds;

        let order = Order {
            id: self.next_order_id(),
            symbol: symbol.to_string(),
            side: OrderSide::Sell,
            status: OrderStatus::Filled,
            qty: Some(position.qty),
            notional: None,
            filled_qty: Some(position.qty),
            submitted_at: Some(Utc::now()),
        };
        debug!(%symbol, qty = %position.qty, "mock position closed");
        state.fills.push(order.clone());
        Ok(order)
    }

    async fn submit_order(&self, order: &NewOrder) -> Result<Order, BrokerError> {
        let mut state = self.state.write().await;
        let price = Self::price_of(&state, &order.symbol).unwrap_or(DEFAULT_FILL_PRICE);

        let (fill_qty, notional) = match (order.notional, order.qty) {
            (Some(n), None) => (n / price, n),
            (None, Some(q)) => (q, q * price),
            _ => {
                return Err(BrokerError::Api {
                    status: 422,
                    message: "exactly one of qty or notional required".to_string(),
                })
            }
        };

        let signed_qty = match order.side {
            OrderSide::Buy => {
                state.cash -= notional;
                fill_qty
            }
            OrderSide::Sell => {
                state.cash += notional;
                -fill_qty
            }
        };

        let remaining = {
            let entry = state
                .positions
                .entry(order.symbol.clone())
                .or_insert(MockPosition {
                    qty: Decimal::ZERO,
                    last_price: price,
                });
            entry.qty += signed_qty;
            entry.last_price = price;
            entry.qty
        };
        if remaining == Decimal::ZERO {
            state.positions.remove(&order.symbol);
        }

        let filled = Order {
            id: self.next_order_id(),
            symbol: order.symbol.clone(),
            side: order.side,
            status: OrderStatus::Filled,
            qty: order.qty,
            notional: order.notional,
            filled_qty: Some(fill_qty),
            submitted_at: Some(Utc::now()),
        };
        debug!(symbol = %order.symbol, side = %order.side, %notional, "mock order filled");
        state.fills.push(filled.clone());
        Ok(filled)
    }

    async fn list_open_orders(&self, symbols: &[String]) -> Result<Vec<Order>, BrokerError> {
        let state = self.state.read().await;
        Ok(state
            .open_orders
            .iter()
            .filter(|o| symbols.contains(&o.symbol))
            .cloned()
            .collect())
    }

    async fn get_account_configurations(&self) -> Result<AccountConfigurations, BrokerError> {
        Ok(self.state.read().await.account_config.clone())
    }

    async fn set_account_configurations(
        &self,
        config: &AccountConfigurations,
    ) -> Result<AccountConfigurations, BrokerError> {
        self.state.write().await.account_config = config.clone();
        Ok(config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_notional_buy_moves_cash_into_position() {
        tokio_test::block_on(async {
            let broker = MockBrokerage::with_cash(dec!(1000));
            broker.set_quote("VOO", dec!(99), dec!(101)).await;

            let order = NewOrder::market_notional("VOO", OrderSide::Buy, dec!(600));
            let filled = broker.submit_order(&order).await.unwrap();
            assert_eq!(filled.status, OrderStatus::Filled);
            assert_eq!(filled.filled_qty, Some(dec!(6))); // 600 / mid 100

            assert_eq!(broker.cash().await, dec!(400));
            let position = broker.get_open_position("VOO").await.unwrap().unwrap();
            assert_eq!(position.market_value, dec!(600));
        });
    }

    #[test]
    fn test_close_position_frees_cash() {
        tokio_test::block_on(async {
            let broker = MockBrokerage::with_cash(dec!(0));
            broker.seed_position("BST", dec!(10), dec!(5)).await;

            broker.close_position("BST").await.unwrap();
            assert_eq!(broker.cash().await, dec!(50));
            assert!(broker.get_open_position("BST").await.unwrap().is_none());
        });
    }

    #[test]
    fn test_account_snapshot_sums_positions() {
        tokio_test::block_on(async {
            let broker = MockBrokerage::with_cash(dec!(250));
            broker.seed_position("VOO", dec!(3), dec!(100)).await;

            let account = broker.get_account().await.unwrap();
            assert_eq!(account.cash, dec!(250));
            assert_eq!(account.portfolio_value, dec!(550));
            assert_eq!(account.equity, dec!(550));
        });
    }

    #[test]
    fn test_close_unknown_position_is_api_error() {
        tokio_test::block_on(async {
            let broker = MockBrokerage::with_cash(dec!(0));
            let err = broker.close_position("GME").await.unwrap_err();
            assert!(matches!(err, BrokerError::Api { status: 404, .. }));
        });
    }
}
