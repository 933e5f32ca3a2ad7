//! Per-pair trigger evaluation and two-leg rotation execution.

use crate::config::PairConfig;
use crate::exchange::{pair_symbol, ExchangeGateway};
use crate::persistence::StateStore;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, info, warn};

/// Market context shared by every pair in one cycle.
///
/// Built once per tick by the cycle controller; pairs never refetch it
/// except for the mid-rotation stable-balance refresh.
pub struct TickContext<'a> {
    pub prices: &'a HashMap<String, Decimal>,
    pub balances: &'a HashMap<String, Decimal>,
    /// Portfolio value in stable-asset terms, computed once for the tick
    pub total_value: Decimal,
}

/// What the ratio trigger decided for this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannedAction {
    Hold,
    RotateToB,
    RotateToA,
}

/// Phases a rotation moves through.
///
/// Partial failures are named by the phase they stop at rather than
/// inferred from control flow: a rejected sell never leaves `PendingSell`,
/// proceeds that never reached the buy leg stop at `SellConfirmed`, and a
/// rejected buy stops at `BuyAttempted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RotationPhase {
    PendingSell,
    SellConfirmed,
    BuyAttempted,
    RotationComplete,
}

/// Typed terminal outcome of one rotation attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RotationOutcome {
    /// Trigger fired but sizing produced nothing tradable.
    NotTradable { reason: String },
    /// Venue rejected the sell leg; prior state preserved.
    SellRejected { error: String },
    /// Sell committed but no stable proceeds were visible, buy never submitted.
    BuySkipped { sold_qty: Decimal, reason: String },
    /// Sell committed, buy rejected by the venue; capital parked in stable.
    BuyRejected { sold_qty: Decimal, error: String },
    /// Both legs filled.
    Completed { sold_qty: Decimal, bought_qty: Decimal },
    /// Simulate mode: legs computed and reported, nothing submitted.
    Simulated {
        sell_qty: Decimal,
        estimated_buy_qty: Decimal,
    },
}

impl RotationOutcome {
    /// The phase this rotation reached.
    pub fn phase(&self) -> RotationPhase {
        match self {
            Self::NotTradable { .. } | Self::SellRejected { .. } | Self::Simulated { .. } => {
                RotationPhase::PendingSell
            }
            Self::BuySkipped { .. } => RotationPhase::SellConfirmed,
            Self::BuyRejected { .. } => RotationPhase::BuyAttempted,
            Self::Completed { .. } => RotationPhase::RotationComplete,
        }
    }

    /// Whether the held-asset state flips to the target coin.
    ///
    /// True exactly when the sell leg committed: from that point the pair
    /// no longer predominantly holds the source coin, whatever happened to
    /// the buy.
    pub fn flips_state(&self) -> bool {
        matches!(
            self,
            Self::BuySkipped { .. } | Self::BuyRejected { .. } | Self::Completed { .. }
        )
    }
}

/// Per-pair record of one tick, also the snapshot row for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct PairSnapshot {
    pub name: String,
    pub coin_a: String,
    pub coin_b: String,
    pub price_a: Decimal,
    pub price_b: Decimal,
    pub ratio: Decimal,
    pub upper_ratio: Decimal,
    pub lower_ratio: Decimal,
    pub allocation_pct: Decimal,
    pub bal_a: Decimal,
    pub bal_b: Decimal,
    pub bal_stable: Decimal,
    pub pair_value: Decimal,
    pub max_capital: Decimal,
    pub current_asset: String,
    pub action: PlannedAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RotationOutcome>,
}

/// Result of evaluating one pair for one tick.
pub type PairReport = Option<PairSnapshot>;

/// Evaluates the ratio trigger and drives rotations for configured pairs.
pub struct PairEngine {
    stable_asset: String,
    simulate: bool,
}

impl PairEngine {
    /// Create a new pair engine.
    pub fn new(stable_asset: &str, simulate: bool) -> Self {
        Self {
            stable_asset: stable_asset.to_string(),
            simulate,
        }
    }

    /// Decide the action for this tick from the held asset and the ratio.
    ///
    /// Both comparisons are strict: a ratio exactly on a threshold stays in
    /// the dead zone. The width of the band is the only anti-thrash
    /// mechanism the system has.
    pub fn plan(cfg: &PairConfig, current_asset: &str, ratio: Decimal) -> PlannedAction {
        if current_asset == cfg.coin_a && ratio > cfg.upper_ratio {
            PlannedAction::RotateToB
        } else if current_asset == cfg.coin_b && ratio < cfg.lower_ratio {
            PlannedAction::RotateToA
        } else {
            PlannedAction::Hold
        }
    }

    /// Size the sell leg of a rotation.
    ///
    /// Capital moved is capped by the pair's allocation of the current
    /// total value, and the quantity by what is actually held: a stale
    /// valuation must never sell more than the balance.
    pub fn size_sell(
        held_balance: Decimal,
        held_price: Decimal,
        pair_value: Decimal,
        max_capital: Decimal,
    ) -> Option<Decimal> {
        if pair_value <= Decimal::ZERO || held_price <= Decimal::ZERO {
            return None;
        }

        let trade_value = pair_value.min(max_capital);
        let sell_qty = held_balance.min(trade_value / held_price);

        (sell_qty > Decimal::ZERO).then_some(sell_qty)
    }

    /// Evaluate one pair for this tick, executing a rotation if triggered.
    ///
    /// Returns `None` when a data-availability gap made the pair
    /// unevaluable; those ticks change no state and submit no orders.
    pub async fn evaluate(
        &self,
        gateway: &dyn ExchangeGateway,
        store: &StateStore,
        cfg: &PairConfig,
        ctx: &TickContext<'_>,
    ) -> PairReport {
        let sym_a = pair_symbol(&cfg.coin_a, &self.stable_asset);
        let sym_b = pair_symbol(&cfg.coin_b, &self.stable_asset);

        let (Some(&price_a), Some(&price_b)) = (ctx.prices.get(&sym_a), ctx.prices.get(&sym_b))
        else {
            warn!(pair = %cfg.name, %sym_a, %sym_b, "Missing ticker, skipping pair this tick");
            return None;
        };

        if price_a <= Decimal::ZERO || price_b <= Decimal::ZERO {
            warn!(pair = %cfg.name, %price_a, %price_b, "Non-positive price, skipping pair this tick");
            return None;
        }

        let ratio = price_a / price_b;

        let bal_a = ctx
            .balances
            .get(&cfg.coin_a)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let bal_b = ctx
            .balances
            .get(&cfg.coin_b)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let bal_stable = ctx
            .balances
            .get(&self.stable_asset)
            .copied()
            .unwrap_or(Decimal::ZERO);

        let max_capital = ctx.total_value * cfg.allocation_pct;
        let pair_value = bal_a * price_a + bal_b * price_b;

        let current_asset = match store.load_or_init(&cfg.name, &cfg.coin_a) {
            Ok(asset) => asset,
            Err(e) => {
                error!(pair = %cfg.name, error = %e, "State store read failed, skipping pair");
                return None;
            }
        };

        // A config edit can orphan the stored asset; reset to the default.
        let current_asset = if current_asset == cfg.coin_a || current_asset == cfg.coin_b {
            current_asset
        } else {
            warn!(
                pair = %cfg.name,
                stored = %current_asset,
                "Stored asset is not part of the pair, resetting to coin_a"
            );
            if let Err(e) = store.save(&cfg.name, &cfg.coin_a) {
                error!(pair = %cfg.name, error = %e, "Failed to reset pair state");
            }
            cfg.coin_a.clone()
        };

        let action = Self::plan(cfg, &current_asset, ratio);

        info!(
            pair = %cfg.name,
            %price_a,
            %price_b,
            %ratio,
            %current_asset,
            action = ?action,
            "Pair evaluated"
        );
        info!(
            pair = %cfg.name,
            %bal_a,
            %bal_b,
            %bal_stable,
            %pair_value,
            %max_capital,
            "Pair balances"
        );

        let outcome = match action {
            PlannedAction::Hold => None,
            PlannedAction::RotateToB => Some(
                self.rotate(
                    gateway, store, cfg, &cfg.coin_a, price_a, bal_a, &cfg.coin_b, price_b,
                    pair_value, max_capital,
                )
                .await,
            ),
            PlannedAction::RotateToA => Some(
                self.rotate(
                    gateway, store, cfg, &cfg.coin_b, price_b, bal_b, &cfg.coin_a, price_a,
                    pair_value, max_capital,
                )
                .await,
            ),
        };

        Some(PairSnapshot {
            name: cfg.name.clone(),
            coin_a: cfg.coin_a.clone(),
            coin_b: cfg.coin_b.clone(),
            price_a,
            price_b,
            ratio,
            upper_ratio: cfg.upper_ratio,
            lower_ratio: cfg.lower_ratio,
            allocation_pct: cfg.allocation_pct,
            bal_a,
            bal_b,
            bal_stable,
            pair_value,
            max_capital,
            current_asset,
            action,
            outcome,
        })
    }

    /// Drive one rotation through its phases: sell, refresh, buy, persist.
    #[allow(clippy::too_many_arguments)]
    async fn rotate(
        &self,
        gateway: &dyn ExchangeGateway,
        store: &StateStore,
        cfg: &PairConfig,
        sell_coin: &str,
        sell_price: Decimal,
        held_balance: Decimal,
        buy_coin: &str,
        buy_price: Decimal,
        pair_value: Decimal,
        max_capital: Decimal,
    ) -> RotationOutcome {
        let Some(sell_qty) = Self::size_sell(held_balance, sell_price, pair_value, max_capital)
        else {
            let reason = format!(
                "no {} value to trade (pair value {}, balance {})",
                sell_coin, pair_value, held_balance
            );
            info!(pair = %cfg.name, %reason, "Rotation not tradable");
            return RotationOutcome::NotTradable { reason };
        };

        let sell_symbol = pair_symbol(sell_coin, &self.stable_asset);
        let buy_symbol = pair_symbol(buy_coin, &self.stable_asset);

        info!(
            pair = %cfg.name,
            %sell_symbol,
            %sell_qty,
            %buy_symbol,
            "Trigger fired, rotating {} -> {}",
            sell_coin,
            buy_coin
        );

        if self.simulate {
            let estimated_stable = (sell_qty * sell_price).min(max_capital);
            let estimated_buy_qty = estimated_stable / buy_price;
            info!(
                pair = %cfg.name,
                %sell_qty,
                %estimated_buy_qty,
                "[SIMULATE] Would sell {} then buy {}",
                sell_symbol,
                buy_symbol
            );
            return RotationOutcome::Simulated {
                sell_qty,
                estimated_buy_qty,
            };
        }

        // Leg 1: sell the held coin into stable. A rejected sell aborts the
        // whole rotation; pairing it with a buy would spend stable balance
        // that was never received.
        let sell_fill = match gateway.market_sell(&sell_symbol, sell_qty).await {
            Ok(fill) => fill,
            Err(e) => {
                warn!(
                    pair = %cfg.name,
                    %sell_symbol,
                    error = %e,
                    "Sell leg rejected, rotation aborted"
                );
                return RotationOutcome::SellRejected {
                    error: e.to_string(),
                };
            }
        };
        let sold_qty = sell_fill.executed_qty;

        // Realized proceeds of a market order are not knowable from the
        // last price; read the freshly settled stable balance instead.
        let outcome = 'buy: {
            let refreshed_stable = match gateway.fetch_balances().await {
                Ok(balances) => balances
                    .get(&self.stable_asset)
                    .copied()
                    .unwrap_or(Decimal::ZERO),
                Err(e) => {
                    warn!(
                        pair = %cfg.name,
                        error = %e,
                        "Balance refresh failed after sell, skipping buy leg"
                    );
                    break 'buy RotationOutcome::BuySkipped {
                        sold_qty,
                        reason: format!("balance refresh failed: {}", e),
                    };
                }
            };

            let stable_for_pair = refreshed_stable.min(max_capital);
            if stable_for_pair <= Decimal::ZERO {
                warn!(
                    pair = %cfg.name,
                    %refreshed_stable,
                    "No stable proceeds visible after sell, skipping buy leg"
                );
                break 'buy RotationOutcome::BuySkipped {
                    sold_qty,
                    reason: "no stable proceeds after sell".to_string(),
                };
            }

            // Leg 2: deploy the capped proceeds into the target coin.
            let buy_qty = stable_for_pair / buy_price;
            match gateway.market_buy(&buy_symbol, buy_qty).await {
                Ok(buy_fill) => {
                    info!(
                        pair = %cfg.name,
                        %sold_qty,
                        bought_qty = %buy_fill.executed_qty,
                        "Rotation complete"
                    );
                    RotationOutcome::Completed {
                        sold_qty,
                        bought_qty: buy_fill.executed_qty,
                    }
                }
                Err(e) => {
                    warn!(
                        pair = %cfg.name,
                        %buy_symbol,
                        error = %e,
                        "Buy leg rejected, capital parked in stable"
                    );
                    RotationOutcome::BuyRejected {
                        sold_qty,
                        error: e.to_string(),
                    }
                }
            }
        };

        // The sell leg is committed: flip and persist before the next pair
        // runs, whatever happened to the buy.
        if let Err(e) = store.save(&cfg.name, buy_coin) {
            error!(pair = %cfg.name, error = %e, "Failed to persist pair state after rotation");
        }
        let bought_qty = match &outcome {
            RotationOutcome::Completed { bought_qty, .. } => Some(*bought_qty),
            _ => None,
        };
        if let Err(e) = store.record_rotation(
            &cfg.name,
            sell_coin,
            buy_coin,
            sold_qty,
            bought_qty,
            &format!("{:?}", outcome.phase()),
        ) {
            error!(pair = %cfg.name, error = %e, "Failed to record rotation history");
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockExchange;
    use rust_decimal_macros::dec;

    fn sample_pair() -> PairConfig {
        PairConfig {
            name: "HBAR_DOGE".to_string(),
            coin_a: "HBAR".to_string(),
            coin_b: "DOGE".to_string(),
            upper_ratio: dec!(1.05),
            lower_ratio: dec!(0.95),
            allocation_pct: dec!(0.30),
        }
    }

    /// Exchange preloaded with the worked scenario: HBAR at 1.10, DOGE at
    /// 1.00, 100 HBAR held, 890 USDT → total value 1000.
    async fn triggered_exchange() -> MockExchange {
        let exchange = MockExchange::new("USDT");
        exchange.set_price("HBARUSDT", dec!(1.10)).await;
        exchange.set_price("DOGEUSDT", dec!(1.00)).await;
        exchange.set_balance("HBAR", dec!(100)).await;
        exchange.set_balance("USDT", dec!(890)).await;
        exchange
    }

    async fn tick<'a>(
        exchange: &MockExchange,
        prices: &'a mut HashMap<String, Decimal>,
        balances: &'a mut HashMap<String, Decimal>,
    ) -> TickContext<'a> {
        let symbols = vec!["HBARUSDT".to_string(), "DOGEUSDT".to_string()];
        *prices = exchange.fetch_prices(&symbols).await.unwrap();
        *balances = exchange.fetch_balances().await.unwrap();
        let total_value = crate::engine::portfolio_value(balances, prices, "USDT");
        TickContext {
            prices,
            balances,
            total_value,
        }
    }

    #[test]
    fn test_plan_strict_threshold_comparisons() {
        let cfg = sample_pair();

        // Exactly on the threshold stays in the dead zone.
        assert_eq!(PairEngine::plan(&cfg, "HBAR", dec!(1.05)), PlannedAction::Hold);
        assert_eq!(PairEngine::plan(&cfg, "DOGE", dec!(0.95)), PlannedAction::Hold);

        assert_eq!(
            PairEngine::plan(&cfg, "HBAR", dec!(1.0501)),
            PlannedAction::RotateToB
        );
        assert_eq!(
            PairEngine::plan(&cfg, "DOGE", dec!(0.9499)),
            PlannedAction::RotateToA
        );

        // Holding the other coin means the same ratio does nothing.
        assert_eq!(PairEngine::plan(&cfg, "DOGE", dec!(1.10)), PlannedAction::Hold);
        assert_eq!(PairEngine::plan(&cfg, "HBAR", dec!(0.90)), PlannedAction::Hold);
    }

    #[test]
    fn test_size_sell_worked_scenario() {
        // pair_value 110, max_capital 300 → trade 110 → qty min(100, 100).
        let qty = PairEngine::size_sell(dec!(100), dec!(1.10), dec!(110), dec!(300));
        assert_eq!(qty, Some(dec!(100)));
    }

    #[test]
    fn test_size_sell_respects_allocation_cap() {
        // pair_value 1100 > max_capital 600 → trade 600 → qty 600/1.1.
        let qty = PairEngine::size_sell(dec!(1000), dec!(1.10), dec!(1100), dec!(600)).unwrap();
        assert_eq!(qty, dec!(600) / dec!(1.10));
        assert!(qty <= dec!(1000));
        assert!(qty * dec!(1.10) <= dec!(600));
    }

    #[test]
    fn test_size_sell_never_exceeds_balance() {
        let qty = PairEngine::size_sell(dec!(50), dec!(1.00), dec!(500), dec!(500));
        assert_eq!(qty, Some(dec!(50)));
    }

    #[test]
    fn test_size_sell_nothing_to_trade() {
        assert_eq!(
            PairEngine::size_sell(dec!(0), dec!(1.00), dec!(0), dec!(300)),
            None
        );
        assert_eq!(
            PairEngine::size_sell(dec!(0), dec!(1.00), dec!(100), dec!(300)),
            None
        );
    }

    #[tokio::test]
    async fn test_missing_price_skips_pair() {
        let exchange = MockExchange::new("USDT");
        exchange.set_price("HBARUSDT", dec!(1.10)).await;
        exchange.set_balance("HBAR", dec!(100)).await;
        let store = StateStore::new(":memory:").unwrap();
        let engine = PairEngine::new("USDT", false);

        let (mut prices, mut balances) = (HashMap::new(), HashMap::new());
        let ctx = tick(&exchange, &mut prices, &mut balances).await;
        let report = engine.evaluate(&exchange, &store, &sample_pair(), &ctx).await;

        assert!(report.is_none());
        assert!(exchange.sell_orders().await.is_empty());
        assert!(exchange.buy_orders().await.is_empty());
        // Skip happens before state init; nothing was created either.
        assert_eq!(store.load("HBAR_DOGE").unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_price_skips_pair() {
        let exchange = triggered_exchange().await;
        exchange.set_price("DOGEUSDT", Decimal::ZERO).await;
        let store = StateStore::new(":memory:").unwrap();
        let engine = PairEngine::new("USDT", false);

        let (mut prices, mut balances) = (HashMap::new(), HashMap::new());
        let ctx = tick(&exchange, &mut prices, &mut balances).await;
        let report = engine.evaluate(&exchange, &store, &sample_pair(), &ctx).await;

        assert!(report.is_none());
        assert!(exchange.sell_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_rotation_completes_and_flips_state() {
        let exchange = triggered_exchange().await;
        let store = StateStore::new(":memory:").unwrap();
        let engine = PairEngine::new("USDT", false);

        let (mut prices, mut balances) = (HashMap::new(), HashMap::new());
        let ctx = tick(&exchange, &mut prices, &mut balances).await;
        assert_eq!(ctx.total_value, dec!(1000));

        let snapshot = engine
            .evaluate(&exchange, &store, &sample_pair(), &ctx)
            .await
            .unwrap();

        assert_eq!(snapshot.action, PlannedAction::RotateToB);
        assert_eq!(snapshot.max_capital, dec!(300));
        assert_eq!(snapshot.pair_value, dec!(110));

        let outcome = snapshot.outcome.unwrap();
        assert!(matches!(outcome, RotationOutcome::Completed { .. }));
        assert_eq!(outcome.phase(), RotationPhase::RotationComplete);

        // Exactly one sell of the full 100 HBAR, one capped buy.
        let sells = exchange.sell_orders().await;
        let buys = exchange.buy_orders().await;
        assert_eq!(sells, vec![("HBARUSDT".to_string(), dec!(100))]);
        assert_eq!(buys.len(), 1);
        assert_eq!(buys[0].0, "DOGEUSDT");
        // Proceeds exceeded the cap, so the buy deploys exactly max_capital.
        assert_eq!(buys[0].1, dec!(300));

        assert_eq!(store.load("HBAR_DOGE").unwrap(), Some("DOGE".to_string()));
        let history = store.recent_rotations(1).unwrap();
        assert_eq!(history[0].phase, "RotationComplete");
    }

    #[tokio::test]
    async fn test_failed_sell_preserves_state_and_skips_buy() {
        let exchange = triggered_exchange().await;
        exchange.fail_next_sell("HBARUSDT").await;
        let store = StateStore::new(":memory:").unwrap();
        let engine = PairEngine::new("USDT", false);

        let (mut prices, mut balances) = (HashMap::new(), HashMap::new());
        let ctx = tick(&exchange, &mut prices, &mut balances).await;
        let snapshot = engine
            .evaluate(&exchange, &store, &sample_pair(), &ctx)
            .await
            .unwrap();

        let outcome = snapshot.outcome.unwrap();
        assert!(matches!(outcome, RotationOutcome::SellRejected { .. }));
        assert_eq!(outcome.phase(), RotationPhase::PendingSell);
        assert!(!outcome.flips_state());

        assert!(exchange.buy_orders().await.is_empty());
        assert_eq!(store.load("HBAR_DOGE").unwrap(), Some("HBAR".to_string()));
        assert!(store.recent_rotations(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_buy_still_flips_state() {
        let exchange = triggered_exchange().await;
        exchange.fail_next_buy("DOGEUSDT").await;
        let store = StateStore::new(":memory:").unwrap();
        let engine = PairEngine::new("USDT", false);

        let (mut prices, mut balances) = (HashMap::new(), HashMap::new());
        let ctx = tick(&exchange, &mut prices, &mut balances).await;
        let snapshot = engine
            .evaluate(&exchange, &store, &sample_pair(), &ctx)
            .await
            .unwrap();

        let outcome = snapshot.outcome.unwrap();
        assert!(matches!(outcome, RotationOutcome::BuyRejected { .. }));
        assert_eq!(outcome.phase(), RotationPhase::BuyAttempted);
        assert!(outcome.flips_state());

        // The sell happened, the buy did not, yet the state reflects the
        // committed sell leg.
        assert_eq!(exchange.sell_orders().await.len(), 1);
        assert!(exchange.buy_orders().await.is_empty());
        assert_eq!(store.load("HBAR_DOGE").unwrap(), Some("DOGE".to_string()));
        assert_eq!(store.recent_rotations(1).unwrap()[0].phase, "BuyAttempted");
    }

    #[tokio::test]
    async fn test_balance_refresh_failure_skips_buy_but_flips_state() {
        let exchange = triggered_exchange().await;
        let store = StateStore::new(":memory:").unwrap();
        let engine = PairEngine::new("USDT", false);

        let (mut prices, mut balances) = (HashMap::new(), HashMap::new());
        let ctx = tick(&exchange, &mut prices, &mut balances).await;

        // The cycle-level fetch already happened; only the mid-rotation
        // refresh sees the outage.
        exchange.set_account_feed_down(true);

        let snapshot = engine
            .evaluate(&exchange, &store, &sample_pair(), &ctx)
            .await
            .unwrap();

        let outcome = snapshot.outcome.unwrap();
        assert!(matches!(outcome, RotationOutcome::BuySkipped { .. }));
        assert_eq!(outcome.phase(), RotationPhase::SellConfirmed);

        assert_eq!(exchange.sell_orders().await.len(), 1);
        assert!(exchange.buy_orders().await.is_empty());
        assert_eq!(store.load("HBAR_DOGE").unwrap(), Some("DOGE".to_string()));
    }

    #[tokio::test]
    async fn test_simulate_mode_changes_nothing() {
        let exchange = triggered_exchange().await;
        let store = StateStore::new(":memory:").unwrap();
        let engine = PairEngine::new("USDT", true);

        // Several ticks that would all trigger a rotation.
        for _ in 0..3 {
            let (mut prices, mut balances) = (HashMap::new(), HashMap::new());
            let ctx = tick(&exchange, &mut prices, &mut balances).await;
            let snapshot = engine
                .evaluate(&exchange, &store, &sample_pair(), &ctx)
                .await
                .unwrap();

            let outcome = snapshot.outcome.unwrap();
            let RotationOutcome::Simulated {
                sell_qty,
                estimated_buy_qty,
            } = outcome
            else {
                panic!("expected simulated outcome");
            };
            assert_eq!(sell_qty, dec!(100));
            assert_eq!(estimated_buy_qty, dec!(110));
        }

        // No orders, and the state never advanced past its default.
        assert!(exchange.sell_orders().await.is_empty());
        assert!(exchange.buy_orders().await.is_empty());
        assert_eq!(store.load("HBAR_DOGE").unwrap(), Some("HBAR".to_string()));
    }

    #[tokio::test]
    async fn test_hold_in_dead_zone() {
        let exchange = triggered_exchange().await;
        exchange.set_price("HBARUSDT", dec!(1.05)).await;
        let store = StateStore::new(":memory:").unwrap();
        let engine = PairEngine::new("USDT", false);

        let (mut prices, mut balances) = (HashMap::new(), HashMap::new());
        let ctx = tick(&exchange, &mut prices, &mut balances).await;
        let snapshot = engine
            .evaluate(&exchange, &store, &sample_pair(), &ctx)
            .await
            .unwrap();

        assert_eq!(snapshot.action, PlannedAction::Hold);
        assert!(snapshot.outcome.is_none());
        assert!(exchange.sell_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_orphaned_state_resets_to_coin_a() {
        let exchange = triggered_exchange().await;
        let store = StateStore::new(":memory:").unwrap();
        store.save("HBAR_DOGE", "XLM").unwrap();
        let engine = PairEngine::new("USDT", true);

        let (mut prices, mut balances) = (HashMap::new(), HashMap::new());
        let ctx = tick(&exchange, &mut prices, &mut balances).await;
        let snapshot = engine
            .evaluate(&exchange, &store, &sample_pair(), &ctx)
            .await
            .unwrap();

        assert_eq!(snapshot.current_asset, "HBAR");
        assert_eq!(store.load("HBAR_DOGE").unwrap(), Some("HBAR".to_string()));
    }
}
