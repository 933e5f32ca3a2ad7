//! Binance spot REST API client.

use crate::config::BinanceConfig;
use crate::exchange::traits::ExchangeGateway;
use crate::exchange::types::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use sha2::Sha256;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, warn};

const SPOT_BASE_URL: &str = "https://api.binance.com";
const SPOT_TESTNET_URL: &str = "https://testnet.binance.vision";

/// Binance API client for the spot market.
pub struct BinanceSpotClient {
    http: Client,
    api_key: String,
    secret_key: String,
    base_url: String,
}

impl BinanceSpotClient {
    /// Create a new Binance spot client from configuration.
    pub fn new(config: &BinanceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = if config.testnet {
            SPOT_TESTNET_URL.to_string()
        } else {
            SPOT_BASE_URL.to_string()
        };

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            base_url,
        })
    }

    /// Create a client pointed at an arbitrary base URL (wiremock tests).
    #[cfg(test)]
    fn with_base_url(config: &BinanceConfig, base_url: &str) -> Result<Self> {
        let mut client = Self::new(config)?;
        client.base_url = base_url.to_string();
        Ok(client)
    }

    /// Generate HMAC-SHA256 signature for authenticated requests.
    fn sign(&self, query_string: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(query_string.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Get current timestamp in milliseconds.
    fn timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_millis() as u64
    }

    // ==================== Market Data (Public) ====================

    /// Get last-trade prices for a batch of symbols.
    ///
    /// Tries the batch endpoint first; if the venue rejects the batch (one
    /// unknown symbol fails the whole request) it falls back to per-symbol
    /// fetches so one dead listing cannot blind the rest of the cycle.
    #[instrument(skip(self, symbols))]
    pub async fn get_ticker_prices(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        match self.get_ticker_prices_batch(symbols).await {
            Ok(prices) => Ok(prices),
            Err(e) => {
                warn!(error = %e, "Batch price fetch failed, falling back to per-symbol");
                self.get_ticker_prices_individually(symbols).await
            }
        }
    }

    async fn get_ticker_prices_batch(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>> {
        let quoted: Vec<String> = symbols.iter().map(|s| format!("\"{}\"", s)).collect();
        let symbols_param = format!("[{}]", quoted.join(","));
        let url = format!(
            "{}/api/v3/ticker/price?symbols={}",
            self.base_url,
            urlencoding::encode(&symbols_param)
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to fetch ticker prices")?;

        anyhow::ensure!(
            response.status().is_success(),
            "Ticker batch request returned {}",
            response.status()
        );

        let tickers: Vec<TickerPrice> = response
            .json()
            .await
            .context("Failed to parse ticker price response")?;

        Ok(tickers.into_iter().map(|t| (t.symbol, t.price)).collect())
    }

    /// Per-symbol fallback: collect whatever quotes succeed, log the rest.
    async fn get_ticker_prices_individually(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Decimal>> {
        let mut prices = HashMap::new();

        for symbol in symbols {
            let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, symbol);
            let result = async {
                let response = self.http.get(&url).send().await?;
                anyhow::ensure!(
                    response.status().is_success(),
                    "status {}",
                    response.status()
                );
                let ticker: TickerPrice = response.json().await?;
                anyhow::Ok(ticker)
            }
            .await;

            match result {
                Ok(ticker) => {
                    prices.insert(ticker.symbol, ticker.price);
                }
                Err(e) => {
                    warn!(%symbol, error = %e, "Ticker fetch failed, symbol unquoted this cycle");
                }
            }
        }

        Ok(prices)
    }

    // ==================== Account (Authenticated) ====================

    /// Get account information including per-asset balances.
    #[instrument(skip(self))]
    pub async fn get_account(&self) -> Result<AccountInfo> {
        let timestamp = Self::timestamp();
        let query = format!("timestamp={}", timestamp);
        let signature = self.sign(&query);

        let url = format!(
            "{}/api/v3/account?{}&signature={}",
            self.base_url, query, signature
        );

        let response = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .context("Failed to fetch account information")?;

        anyhow::ensure!(
            response.status().is_success(),
            "Account request returned {}",
            response.status()
        );

        response
            .json()
            .await
            .context("Failed to parse account response")
    }

    // ==================== Orders (Authenticated) ====================

    /// Place a market order on the spot market.
    #[instrument(skip(self))]
    pub async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<OrderResponse> {
        let timestamp = Self::timestamp();
        let params = vec![
            ("symbol".to_string(), symbol.to_string()),
            ("side".to_string(), format!("{:?}", side).to_uppercase()),
            ("type".to_string(), "MARKET".to_string()),
            ("quantity".to_string(), quantity.to_string()),
            ("newOrderRespType".to_string(), "FULL".to_string()),
            ("timestamp".to_string(), timestamp.to_string()),
        ];

        let query: String = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let signature = self.sign(&query);

        let url = format!(
            "{}/api/v3/order?{}&signature={}",
            self.base_url, query, signature
        );

        let response = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .context("Failed to submit market order")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Order rejected ({}): {}", status, body);
        }

        let order: OrderResponse = response
            .json()
            .await
            .context("Failed to parse order response")?;

        debug!(
            symbol = %order.symbol,
            order_id = order.order_id,
            status = ?order.status,
            executed_qty = %order.executed_qty,
            "Market order placed"
        );

        Ok(order)
    }
}

#[async_trait]
impl ExchangeGateway for BinanceSpotClient {
    async fn fetch_prices(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>> {
        self.get_ticker_prices(symbols).await
    }

    async fn fetch_balances(&self) -> Result<HashMap<String, Decimal>> {
        let account = self.get_account().await?;
        Ok(account
            .balances
            .into_iter()
            .filter(|b| b.free > Decimal::ZERO || b.locked > Decimal::ZERO)
            .map(|b| (b.asset, b.free))
            .collect())
    }

    async fn market_sell(&self, symbol: &str, quantity: Decimal) -> Result<OrderFill> {
        let resp = self
            .place_market_order(symbol, OrderSide::Sell, quantity)
            .await?;
        Ok(OrderFill::from((resp, OrderSide::Sell)))
    }

    async fn market_buy(&self, symbol: &str, quantity: Decimal) -> Result<OrderFill> {
        let resp = self
            .place_market_order(symbol, OrderSide::Buy, quantity)
            .await?;
        Ok(OrderFill::from((resp, OrderSide::Buy)))
    }
}
