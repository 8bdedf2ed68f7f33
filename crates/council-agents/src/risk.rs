use std::collections::BTreeMap;

use council_models::config::RiskConfig;
use council_models::{Portfolio, RiskLimits};
use rust_decimal::Decimal;

/// Supplies per-ticker sizing bounds to the aggregator.
pub trait RiskModel: Send + Sync {
    /// Limits for `ticker` given the portfolio and the latest known price of
    /// every ticker in the run.
    fn limits(
        &self,
        ticker: &str,
        portfolio: &Portfolio,
        latest_prices: &BTreeMap<String, Decimal>,
    ) -> RiskLimits;
}

/// Caps each ticker at a fixed fraction of total portfolio value.
///
/// Portfolio value is cash plus the market value of long positions. The
/// remaining allowance for a ticker is the cap minus its current gross
/// exposure, floored at zero.
#[derive(Debug, Clone)]
pub struct FixedFractionRisk {
    fraction: Decimal,
}

impl FixedFractionRisk {
    pub fn new(fraction: Decimal) -> Self {
        Self {
            fraction: fraction.clamp(Decimal::ZERO, Decimal::ONE),
        }
    }

    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(config.max_position_fraction)
    }

    pub fn portfolio_value(portfolio: &Portfolio, latest_prices: &BTreeMap<String, Decimal>) -> Decimal {
        portfolio
            .positions
            .iter()
            .filter_map(|(ticker, position)| {
                latest_prices
                    .get(ticker)
                    .map(|price| Decimal::from(position.long) * *price)
            })
            .fold(portfolio.cash, |total, value| total + value)
    }
}

impl Default for FixedFractionRisk {
    fn default() -> Self {
        Self::from_config(&RiskConfig::default())
    }
}

impl RiskModel for FixedFractionRisk {
    fn limits(
        &self,
        ticker: &str,
        portfolio: &Portfolio,
        latest_prices: &BTreeMap<String, Decimal>,
    ) -> RiskLimits {
        let price = latest_prices.get(ticker).copied().unwrap_or(Decimal::ZERO);
        let cap = Self::portfolio_value(portfolio, latest_prices) * self.fraction;
        let position = portfolio.position(ticker);
        let exposure = Decimal::from(position.long + position.short) * price;
        RiskLimits::new(price, (cap - exposure).max(Decimal::ZERO))
    }
}
