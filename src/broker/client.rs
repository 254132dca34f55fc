//! Alpaca REST API client.

use crate::broker::types::*;
use crate::broker::Brokerage;
use crate::config::AlpacaConfig;
use crate::error::BrokerError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const LIVE_TRADING_URL: &str = "https://api.alpaca.markets";
const PAPER_TRADING_URL: &str = "https://paper-api.alpaca.markets";
const DATA_URL: &str = "https://data.alpaca.markets";

const API_KEY_HEADER: &str = "APCA-API-KEY-ID";
const API_SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Alpaca client for the Trading and Data APIs.
pub struct AlpacaClient {
    http: Client,
    api_key: String,
    secret_key: String,
    trading_base_url: String,
    data_base_url: String,
}

impl AlpacaClient {
    /// Create a new client from configuration, selecting the paper or
    /// live trading environment.
    pub fn new(config: &AlpacaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let trading_base_url = if config.paper {
            PAPER_TRADING_URL.to_string()
        } else {
            LIVE_TRADING_URL.to_string()
        };

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            trading_base_url,
            data_base_url: DATA_URL.to_string(),
        })
    }

    fn trading_url(&self, path: &str) -> String {
        format!("{}{}", self.trading_base_url, path)
    }

    /// Send a request once, mapping HTTP status to the error taxonomy.
    async fn dispatch(&self, req: RequestBuilder) -> Result<reqwest::Response, BrokerError> {
        let response = req
            .header(API_KEY_HEADER, &self.api_key)
            .header(API_SECRET_HEADER, &self.secret_key)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status.as_u16() {
            401 | 403 => Err(BrokerError::Auth),
            429 => Err(BrokerError::RateLimited),
            code => {
                let message = response.text().await.unwrap_or_default();
                Err(BrokerError::Api {
                    status: code,
                    message,
                })
            }
        }
    }

    /// Send a request, re-sending retryable failures with doubling delay.
    ///
    /// Only used for idempotent calls; order submission goes through
    /// `dispatch` directly, since re-sending a market order that may have
    /// reached the exchange risks a duplicate fill.
    async fn execute(&self, req: RequestBuilder) -> Result<reqwest::Response, BrokerError> {
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 1;
        loop {
            let cloned = req
                .try_clone()
                .ok_or_else(|| BrokerError::Decode("request body not clonable".to_string()))?;
            match self.dispatch(cloned).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(error = %e, attempt, "retrying brokerage request");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BrokerError> {
        response
            .json()
            .await
            .map_err(|e| BrokerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Brokerage for AlpacaClient {
    #[instrument(skip(self))]
    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        let req = self.http.get(self.trading_url("/v2/account"));
        Self::parse(self.execute(req).await?).await
    }

    #[instrument(skip(self))]
    async fn list_positions(&self) -> Result<Vec<Position>, BrokerError> {
        let req = self.http.get(self.trading_url("/v2/positions"));
        Self::parse(self.execute(req).await?).await
    }

    #[instrument(skip(self))]
    async fn get_open_position(&self, symbol: &str) -> Result<Option<Position>, BrokerError> {
        let req = self
            .http
            .get(self.trading_url(&format!("/v2/positions/{symbol}")));
        match self.execute(req).await {
            Ok(response) => Ok(Some(Self::parse(response).await?)),
            // No open position for the symbol: expected, not an error.
            Err(BrokerError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn get_asset(&self, symbol: &str) -> Result<Asset, BrokerError> {
        let req = self
            .http
            .get(self.trading_url(&format!("/v2/assets/{symbol}")));
        Self::parse(self.execute(req).await?).await
    }

    #[instrument(skip(self))]
    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, BrokerError> {
        let url = format!(
            "{}/v2/stocks/{}/quotes/latest",
            self.data_base_url, symbol
        );
        let req = self.http.get(url);
        let latest: LatestQuote = Self::parse(self.execute(req).await?).await?;
        Ok(latest.quote)
    }

    #[instrument(skip(self))]
    async fn cancel_all_orders(&self) -> Result<(), BrokerError> {
        let req = self.http.delete(self.trading_url("/v2/orders"));
        self.execute(req).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn close_position(&self, symbol: &str) -> Result<Order, BrokerError> {
        let req = self
            .http
            .delete(self.trading_url(&format!("/v2/positions/{symbol}")));
        Self::parse(self.execute(req).await?).await
    }

    #[instrument(skip(self, order))]
    async fn submit_order(&self, order: &NewOrder) -> Result<Order, BrokerError> {
        debug!(symbol = %order.symbol, side = %order.side, "submitting order");
        let req = self.http.post(self.trading_url("/v2/orders")).json(order);
        // Single attempt; see `execute`.
        Self::parse(self.dispatch(req).await?).await
    }

    #[instrument(skip(self))]
    async fn list_open_orders(&self, symbols: &[String]) -> Result<Vec<Order>, BrokerError> {
        let symbols_param = symbols.join(",");
        let req = self.http.get(self.trading_url("/v2/orders")).query(&[
            ("status", "open"),
            ("symbols", symbols_param.as_str()),
            ("limit", "500"),
        ]);
        Self::parse(self.execute(req).await?).await
    }

    #[instrument(skip(self))]
    async fn get_account_configurations(&self) -> Result<AccountConfigurations, BrokerError> {
        let req = self.http.get(self.trading_url("/v2/account/configurations"));
        Self::parse(self.execute(req).await?).await
    }

    #[instrument(skip(self, config))]
    async fn set_account_configurations(
        &self,
        config: &AccountConfigurations,
    ) -> Result<AccountConfigurations, BrokerError> {
        let req = self
            .http
            .patch(self.trading_url("/v2/account/configurations"))
            .json(config);
        Self::parse(self.execute(req).await?).await
    }
}
