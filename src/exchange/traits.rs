//! The gateway trait the rotation engine trades through.
//!
//! One live implementation exists ([`BinanceSpotClient`]); the in-memory
//! [`MockExchange`] covers tests. Everything the engine needs from a venue
//! is four calls: batch prices, free balances, market sell, market buy.
//!
//! [`BinanceSpotClient`]: crate::exchange::BinanceSpotClient
//! [`MockExchange`]: crate::exchange::MockExchange

use crate::exchange::types::OrderFill;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Venue operations consumed by the engine.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Fetch last-trade prices for the given symbols.
    ///
    /// Partial results are expected: symbols the venue cannot quote this
    /// tick are simply absent from the map. Callers never assume
    /// completeness. An `Err` means the price feed itself is down.
    async fn fetch_prices(&self, symbols: &[String]) -> anyhow::Result<HashMap<String, Decimal>>;

    /// Fetch free balances per asset.
    ///
    /// Only assets with a positive free or locked amount need appear; the
    /// mapped value is the free (available) quantity.
    async fn fetch_balances(&self) -> anyhow::Result<HashMap<String, Decimal>>;

    /// Submit a market sell of `quantity` base units of `symbol`.
    async fn market_sell(&self, symbol: &str, quantity: Decimal) -> anyhow::Result<OrderFill>;

    /// Submit a market buy of `quantity` base units of `symbol`.
    async fn market_buy(&self, symbol: &str, quantity: Decimal) -> anyhow::Result<OrderFill>;
}
