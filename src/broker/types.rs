//! Type definitions for Alpaca API requests and responses.
//!
//! Alpaca encodes decimal values as JSON strings; fields use
//! `rust_decimal::serde::str` accordingly.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account state read at the start of a run.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSnapshot {
    #[serde(with = "rust_decimal::serde::str")]
    pub equity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub cash: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub portfolio_value: Decimal,
}

/// An open position.
#[derive(Debug, Clone, Deserialize)]
pub struct Position {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub qty: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub market_value: Decimal,
}

/// Asset metadata; only fractionability matters for sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub fractionable: bool,
    #[serde(default)]
    pub tradable: bool,
}

/// Latest best bid/ask for a symbol.
///
/// The Data API nests the quote under a `quote` key; prices arrive as
/// JSON numbers there, unlike the Trading API's strings.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestQuote {
    pub symbol: String,
    pub quote: Quote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Quote {
    #[serde(rename = "bp")]
    pub bid_price: Decimal,
    #[serde(rename = "ap")]
    pub ask_price: Decimal,
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
}

/// Time in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    /// Valid for the current trading session only
    Day,
    Gtc,
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    DoneForDay,
    Canceled,
    Expired,
    Accepted,
    PendingNew,
    PendingCancel,
    Rejected,
    #[serde(other)]
    Other,
}

/// New order request. Exactly one of `notional` or `qty` is set.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub symbol: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notional: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qty: Option<Decimal>,
}

impl NewOrder {
    /// Market DAY order sized by currency amount.
    pub fn market_notional(symbol: impl Into<String>, side: OrderSide, notional: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Day,
            notional: Some(notional),
            qty: None,
        }
    }

    /// Market DAY order sized by share quantity.
    pub fn market_qty(symbol: impl Into<String>, side: OrderSide, qty: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Day,
            notional: None,
            qty: Some(qty),
        }
    }
}

/// Order as reported by the brokerage.
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub status: OrderStatus,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub qty: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub notional: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub filled_qty: Option<Decimal>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Account-level trading configuration.
///
/// PATCHed before a run to enable fractional trading and pin the margin
/// multiplier to 1 so buys never draw margin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfigurations {
    pub fractional_trading: bool,
    pub max_margin_multiplier: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_account_snapshot_parses_string_decimals() {
        let json = r#"{"equity":"10250.75","cash":"-12.50","portfolio_value":"10263.25"}"#;
        let account: AccountSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(account.equity, dec!(10250.75));
        assert_eq!(account.cash, dec!(-12.50));
        assert_eq!(account.portfolio_value, dec!(10263.25));
    }

    #[test]
    fn test_latest_quote_parses_numeric_prices() {
        let json = r#"{"symbol":"DGS","quote":{"ap":45.10,"bp":44.90,"t":"2024-01-02T15:04:05Z"}}"#;
        let latest: LatestQuote = serde_json::from_str(json).unwrap();
        assert_eq!(latest.quote.bid_price, dec!(44.90));
        assert_eq!(latest.quote.ask_price, dec!(45.10));
    }

    #[test]
    fn test_new_order_serializes_one_sizing_field() {
        let order = NewOrder::market_notional("VOO", OrderSide::Buy, dec!(600));
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["notional"], "600");
        assert_eq!(json["side"], "buy");
        assert_eq!(json["type"], "market");
        assert_eq!(json["time_in_force"], "day");
        assert!(json.get("qty").is_none());

        let order = NewOrder::market_qty("DGS", OrderSide::Sell, dec!(3));
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["qty"], "3");
        assert!(json.get("notional").is_none());
    }

    #[test]
    fn test_order_tolerates_null_sizing_and_unknown_status() {
        let json = r#"{
            "id": "b1",
            "symbol": "VOO",
            "side": "buy",
            "status": "held",
            "qty": null,
            "notional": "600",
            "filled_qty": "0"
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.status, OrderStatus::Other);
        assert_eq!(order.qty, None);
        assert_eq!(order.notional, Some(dec!(600)));
    }
}
