//! Type definitions for Binance spot API responses.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Last-trade price for one symbol (`/api/v3/ticker/price`).
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
}

/// Account information (`/api/v3/account`), reduced to what the rotator reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub balances: Vec<AssetBalance>,
}

/// Free and locked quantity of one asset.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub free: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub locked: Decimal,
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Order status reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

/// Market order response (`POST /api/v3/order`), reduced to what the engine reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub symbol: String,
    pub order_id: u64,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::str")]
    pub executed_qty: Decimal,
    #[serde(rename = "cummulativeQuoteQty", with = "rust_decimal::serde::str")]
    pub cumulative_quote_qty: Decimal,
}

/// Normalized fill handed back through the gateway trait.
#[derive(Debug, Clone)]
pub struct OrderFill {
    pub symbol: String,
    pub side: OrderSide,
    pub order_id: u64,
    /// Base-asset quantity that actually filled
    pub executed_qty: Decimal,
    /// Stable-asset value of the fill
    pub quote_qty: Decimal,
}

impl From<(OrderResponse, OrderSide)> for OrderFill {
    fn from((resp, side): (OrderResponse, OrderSide)) -> Self {
        Self {
            symbol: resp.symbol,
            side,
            order_id: resp.order_id,
            executed_qty: resp.executed_qty,
            quote_qty: resp.cumulative_quote_qty,
        }
    }
}

/// Build the venue symbol for a coin quoted against the stable asset.
pub fn pair_symbol(coin: &str, stable: &str) -> String {
    format!("{}{}", coin, stable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pair_symbol() {
        assert_eq!(pair_symbol("HBAR", "USDT"), "HBARUSDT");
    }

    #[test]
    fn test_ticker_price_parses_string_price() {
        let ticker: TickerPrice =
            serde_json::from_str(r#"{"symbol":"BTCUSDT","price":"50123.45"}"#).unwrap();
        assert_eq!(ticker.price, dec!(50123.45));
    }

    #[test]
    fn test_order_response_parses_full_fill() {
        let raw = r#"{
            "symbol": "HBARUSDT",
            "orderId": 42,
            "status": "FILLED",
            "executedQty": "100.0",
            "cummulativeQuoteQty": "110.0"
        }"#;
        let resp: OrderResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.status, OrderStatus::Filled);
        assert_eq!(resp.executed_qty, dec!(100.0));
        assert_eq!(resp.cumulative_quote_qty, dec!(110.0));
    }
}
