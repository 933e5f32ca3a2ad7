//! In-memory exchange for exercising the engine without a venue.
//!
//! Fills market orders at the posted price minus a taker fee, tracks
//! balances, and lets tests script per-symbol order rejections and
//! whole-feed outages.

use crate::exchange::traits::ExchangeGateway;
use crate::exchange::types::{OrderFill, OrderSide};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Simulated spot exchange keyed to one stable asset.
pub struct MockExchange {
    stable_asset: String,
    prices: Arc<RwLock<HashMap<String, Decimal>>>,
    balances: Arc<RwLock<HashMap<String, Decimal>>>,
    /// Symbols whose next sell order the venue rejects
    fail_sells: Arc<RwLock<HashSet<String>>>,
    /// Symbols whose next buy order the venue rejects
    fail_buys: Arc<RwLock<HashSet<String>>>,
    price_feed_down: AtomicBool,
    account_feed_down: AtomicBool,
    sells: Arc<RwLock<Vec<(String, Decimal)>>>,
    buys: Arc<RwLock<Vec<(String, Decimal)>>>,
    order_seq: AtomicU64,
    /// Taker fee applied to every fill (0.1% spot default)
    fee_rate: Decimal,
}

impl MockExchange {
    /// Create a new mock exchange quoting against `stable_asset`.
    pub fn new(stable_asset: &str) -> Self {
        Self {
            stable_asset: stable_asset.to_string(),
            prices: Arc::new(RwLock::new(HashMap::new())),
            balances: Arc::new(RwLock::new(HashMap::new())),
            fail_sells: Arc::new(RwLock::new(HashSet::new())),
            fail_buys: Arc::new(RwLock::new(HashSet::new())),
            price_feed_down: AtomicBool::new(false),
            account_feed_down: AtomicBool::new(false),
            sells: Arc::new(RwLock::new(Vec::new())),
            buys: Arc::new(RwLock::new(Vec::new())),
            order_seq: AtomicU64::new(1),
            fee_rate: dec!(0.001),
        }
    }

    /// Set the posted price for a symbol.
    pub async fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.write().await.insert(symbol.to_string(), price);
    }

    /// Set the free balance for an asset.
    pub async fn set_balance(&self, asset: &str, amount: Decimal) {
        self.balances.write().await.insert(asset.to_string(), amount);
    }

    /// Reject the next sell order for `symbol`.
    pub async fn fail_next_sell(&self, symbol: &str) {
        self.fail_sells.write().await.insert(symbol.to_string());
    }

    /// Reject the next buy order for `symbol`.
    pub async fn fail_next_buy(&self, symbol: &str) {
        self.fail_buys.write().await.insert(symbol.to_string());
    }

    /// Make every price fetch fail until cleared.
    pub fn set_price_feed_down(&self, down: bool) {
        self.price_feed_down.store(down, Ordering::SeqCst);
    }

    /// Make every balance fetch fail until cleared.
    pub fn set_account_feed_down(&self, down: bool) {
        self.account_feed_down.store(down, Ordering::SeqCst);
    }

    /// All sells submitted so far, as (symbol, quantity).
    pub async fn sell_orders(&self) -> Vec<(String, Decimal)> {
        self.sells.read().await.clone()
    }

    /// All buys submitted so far, as (symbol, quantity).
    pub async fn buy_orders(&self) -> Vec<(String, Decimal)> {
        self.buys.read().await.clone()
    }

    /// Current free balance of one asset.
    pub async fn balance_of(&self, asset: &str) -> Decimal {
        self.balances
            .read()
            .await
            .get(asset)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn base_asset(&self, symbol: &str) -> Result<String> {
        symbol
            .strip_suffix(&self.stable_asset)
            .filter(|base| !base.is_empty())
            .map(|base| base.to_string())
            .ok_or_else(|| anyhow!("symbol {} is not quoted in {}", symbol, self.stable_asset))
    }

    fn next_order_id(&self) -> u64 {
        self.order_seq.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeGateway for MockExchange {
    async fn fetch_prices(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>> {
        if self.price_feed_down.load(Ordering::SeqCst) {
            anyhow::bail!("price feed unavailable");
        }
        let prices = self.prices.read().await;
        Ok(symbols
            .iter()
            .filter_map(|s| prices.get(s).map(|p| (s.clone(), *p)))
            .collect())
    }

    async fn fetch_balances(&self) -> Result<HashMap<String, Decimal>> {
        if self.account_feed_down.load(Ordering::SeqCst) {
            anyhow::bail!("account feed unavailable");
        }
        Ok(self.balances.read().await.clone())
    }

    async fn market_sell(&self, symbol: &str, quantity: Decimal) -> Result<OrderFill> {
        if self.fail_sells.write().await.remove(symbol) {
            anyhow::bail!("venue rejected sell of {}", symbol);
        }

        let price = self
            .prices
            .read()
            .await
            .get(symbol)
            .copied()
            .ok_or_else(|| anyhow!("no price for {}", symbol))?;
        let base = self.base_asset(symbol)?;

        let proceeds = quantity * price * (Decimal::ONE - self.fee_rate);
        {
            let mut balances = self.balances.write().await;
            let held = balances.entry(base.clone()).or_insert(Decimal::ZERO);
            anyhow::ensure!(*held >= quantity, "insufficient {} balance", base);
            *held -= quantity;
            *balances
                .entry(self.stable_asset.clone())
                .or_insert(Decimal::ZERO) += proceeds;
        }

        self.sells
            .write()
            .await
            .push((symbol.to_string(), quantity));
        debug!(%symbol, %quantity, %proceeds, "Mock sell filled");

        Ok(OrderFill {
            symbol: symbol.to_string(),
            side: OrderSide::Sell,
            order_id: self.next_order_id(),
            executed_qty: quantity,
            quote_qty: proceeds,
        })
    }

    async fn market_buy(&self, symbol: &str, quantity: Decimal) -> Result<OrderFill> {
        if self.fail_buys.write().await.remove(symbol) {
            anyhow::bail!("venue rejected buy of {}", symbol);
        }

        let price = self
            .prices
            .read()
            .await
            .get(symbol)
            .copied()
            .ok_or_else(|| anyhow!("no price for {}", symbol))?;
        let base = self.base_asset(symbol)?;

        let cost = quantity * price;
        let received = quantity * (Decimal::ONE - self.fee_rate);
        {
            let mut balances = self.balances.write().await;
            let stable = balances
                .entry(self.stable_asset.clone())
                .or_insert(Decimal::ZERO);
            anyhow::ensure!(*stable >= cost, "insufficient {} balance", self.stable_asset);
            *stable -= cost;
            *balances.entry(base).or_insert(Decimal::ZERO) += received;
        }

        self.buys.write().await.push((symbol.to_string(), quantity));
        debug!(%symbol, %quantity, %cost, "Mock buy filled");

        Ok(OrderFill {
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            order_id: self.next_order_id(),
            executed_qty: received,
            quote_qty: cost,
        })
    }
}
