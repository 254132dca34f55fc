//! The brokerage seam the rebalancing engine is written against.

use crate::broker::types::*;
use crate::error::BrokerError;
use async_trait::async_trait;

/// Brokerage surface consumed by one rebalancing run.
///
/// `AlpacaClient` implements this against the real API; `MockBrokerage`
/// implements it in memory. A missing open position is `Ok(None)`, never
/// an error: it is the expected state for a target symbol not yet held.
#[async_trait]
pub trait Brokerage: Send + Sync {
    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError>;

    async fn list_positions(&self) -> Result<Vec<Position>, BrokerError>;

    async fn get_open_position(&self, symbol: &str) -> Result<Option<Position>, BrokerError>;

    async fn get_asset(&self, symbol: &str) -> Result<Asset, BrokerError>;

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, BrokerError>;

    async fn cancel_all_orders(&self) -> Result<(), BrokerError>;

    /// Liquidate the full position, DAY time-in-force.
    async fn close_position(&self, symbol: &str) -> Result<Order, BrokerError>;

    async fn submit_order(&self, order: &NewOrder) -> Result<Order, BrokerError>;

    /// Open orders restricted to the given symbols.
    async fn list_open_orders(&self, symbols: &[String]) -> Result<Vec<Order>, BrokerError>;

    async fn get_account_configurations(&self) -> Result<AccountConfigurations, BrokerError>;

    async fn set_account_configurations(
        &self,
        config: &AccountConfigurations,
    ) -> Result<AccountConfigurations, BrokerError>;
}
