//! Portfolio valuation in stable-asset terms.

use crate::exchange::pair_symbol;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Value all balances against the stable asset.
///
/// The stable asset counts at face value; every other asset converts
/// through its `{asset}{stable}` price. Assets without a known price this
/// tick are excluded rather than counted as zero; missing quotes degrade
/// precision, they never fail the valuation.
pub fn portfolio_value(
    balances: &HashMap<String, Decimal>,
    prices: &HashMap<String, Decimal>,
    stable_asset: &str,
) -> Decimal {
    balances
        .iter()
        .filter(|(_, amount)| **amount > Decimal::ZERO)
        .map(|(asset, amount)| {
            if asset == stable_asset {
                *amount
            } else {
                prices
                    .get(&pair_symbol(asset, stable_asset))
                    .map(|price| *amount * *price)
                    .unwrap_or(Decimal::ZERO)
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balances(entries: &[(&str, Decimal)]) -> HashMap<String, Decimal> {
        entries
            .iter()
            .map(|(asset, amount)| (asset.to_string(), *amount))
            .collect()
    }

    #[test]
    fn test_empty_balances_value_zero() {
        let total = portfolio_value(&HashMap::new(), &HashMap::new(), "USDT");
        assert_eq!(total, Decimal::ZERO);
    }

    #[test]
    fn test_stable_counts_at_face_value() {
        let bal = balances(&[("USDT", dec!(250))]);
        assert_eq!(portfolio_value(&bal, &HashMap::new(), "USDT"), dec!(250));
    }

    #[test]
    fn test_assets_convert_through_prices() {
        let bal = balances(&[("HBAR", dec!(100)), ("USDT", dec!(50))]);
        let prices = [("HBARUSDT".to_string(), dec!(0.11))].into_iter().collect();
        assert_eq!(portfolio_value(&bal, &prices, "USDT"), dec!(61));
    }

    #[test]
    fn test_unpriced_assets_are_excluded() {
        let bal = balances(&[("HBAR", dec!(100)), ("XLM", dec!(500))]);
        let prices = [("HBARUSDT".to_string(), dec!(0.10))].into_iter().collect();
        // XLM has no quote this tick and contributes nothing.
        assert_eq!(portfolio_value(&bal, &prices, "USDT"), dec!(10));
    }

    #[test]
    fn test_non_positive_amounts_ignored() {
        let bal = balances(&[("HBAR", Decimal::ZERO), ("USDT", dec!(5))]);
        let prices = [("HBARUSDT".to_string(), dec!(0.10))].into_iter().collect();
        assert_eq!(portfolio_value(&bal, &prices, "USDT"), dec!(5));
    }
}
