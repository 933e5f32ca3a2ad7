//! The per-tick rebalance cycle.
//!
//! One cycle: build the symbol union, fetch prices and balances once,
//! value the portfolio once, then drive every configured pair in order.
//! Pairs are independent; an oracle-wide failure aborts the whole cycle
//! and the interval scheduler is the only retry.

use crate::config::Config;
use crate::engine::pair::{PairEngine, PairSnapshot, TickContext};
use crate::engine::valuator::portfolio_value;
use crate::exchange::{pair_symbol, ExchangeGateway};
use crate::persistence::StateStore;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Oracle-wide failures that abort a whole cycle.
///
/// These leave every pair state untouched and are never process-terminating.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("price feed unavailable: {0}")]
    PriceFeed(anyhow::Error),
    #[error("account feed unavailable: {0}")]
    AccountFeed(anyhow::Error),
}

/// The externally observable artifact of one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSnapshot {
    pub timestamp: DateTime<Utc>,
    pub stable_asset: String,
    pub simulate: bool,
    pub total_value: Decimal,
    /// Reference coin price (display only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_price: Option<Decimal>,
    /// One record per evaluable pair; pairs skipped on a data gap are absent
    pub pairs: Vec<PairSnapshot>,
}

/// Run one full rebalance cycle over the configured pairs.
pub async fn run_cycle(
    gateway: &dyn ExchangeGateway,
    store: &StateStore,
    config: &Config,
) -> Result<CycleSnapshot, CycleError> {
    // Union of symbols this cycle needs, the reference symbol first.
    let mut symbols = vec![pair_symbol(&config.reference_coin, &config.stable_asset)];
    for pair in &config.pairs {
        for coin in [&pair.coin_a, &pair.coin_b] {
            let sym = pair_symbol(coin, &config.stable_asset);
            if !symbols.contains(&sym) {
                symbols.push(sym);
            }
        }
    }

    // Shared per-tick market data: one price fetch, one balance fetch. The
    // two reads are independent and may run concurrently; order execution
    // below never does.
    let (prices, balances) =
        tokio::join!(gateway.fetch_prices(&symbols), gateway.fetch_balances());
    let prices = prices.map_err(CycleError::PriceFeed)?;
    let balances = balances.map_err(CycleError::AccountFeed)?;

    if prices.is_empty() {
        return Err(CycleError::PriceFeed(anyhow::anyhow!(
            "none of {} symbols quoted",
            symbols.len()
        )));
    }

    let total_value = portfolio_value(&balances, &prices, &config.stable_asset);
    let reference_price = prices.get(&symbols[0]).copied();

    info!(
        %total_value,
        reference = %symbols[0],
        reference_price = ?reference_price,
        pairs = config.pairs.len(),
        "Cycle market data loaded"
    );

    let ctx = TickContext {
        prices: &prices,
        balances: &balances,
        total_value,
    };
    let engine = PairEngine::new(&config.stable_asset, config.simulate);

    let mut pair_snapshots = Vec::new();
    for pair in &config.pairs {
        // Evaluation failures surface as typed outcomes inside the
        // snapshot; a troubled pair never blocks the ones after it.
        if let Some(snapshot) = engine.evaluate(gateway, store, pair, &ctx).await {
            pair_snapshots.push(snapshot);
        }
    }

    Ok(CycleSnapshot {
        timestamp: Utc::now(),
        stable_asset: config.stable_asset.clone(),
        simulate: config.simulate,
        total_value,
        reference_price,
        pairs: pair_snapshots,
    })
}
