use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
    #[error("cash must be non-negative, got {0}")]
    NegativeCash(Decimal),

    #[error("margin requirement must be within [0, 1], got {0}")]
    MarginOutOfRange(Decimal),
}

/// Open position state for one ticker.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub long: u64,
    pub short: u64,
    pub long_cost_basis: Decimal,
    pub short_cost_basis: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RealizedGains {
    pub long: Decimal,
    pub short: Decimal,
}

/// Cash, margin and per-ticker positions.
///
/// The decision engine only reads this; order execution is the sole writer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Portfolio {
    pub cash: Decimal,
    /// Fraction of a short position's value that must be held as cash.
    pub margin_requirement: Decimal,
    #[serde(default)]
    pub positions: BTreeMap<String, Position>,
    #[serde(default)]
    pub realized_gains: BTreeMap<String, RealizedGains>,
}

impl Portfolio {
    pub fn new(cash: Decimal, margin_requirement: Decimal) -> Result<Self, PortfolioError> {
        let portfolio = Self {
            cash,
            margin_requirement,
            positions: BTreeMap::new(),
            realized_gains: BTreeMap::new(),
        };
        portfolio.validate()?;
        Ok(portfolio)
    }

    pub fn validate(&self) -> Result<(), PortfolioError> {
        if self.cash < Decimal::ZERO {
            return Err(PortfolioError::NegativeCash(self.cash));
        }
        if self.margin_requirement < Decimal::ZERO || self.margin_requirement > Decimal::ONE {
            return Err(PortfolioError::MarginOutOfRange(self.margin_requirement));
        }
        Ok(())
    }

    /// Make sure every ticker has an (empty) position and gains entry.
    pub fn ensure_tickers<'a>(&mut self, tickers: impl IntoIterator<Item = &'a str>) {
        for ticker in tickers {
            self.positions.entry(ticker.to_string()).or_default();
            self.realized_gains.entry(ticker.to_string()).or_default();
        }
    }

    /// Position for a ticker; an unknown ticker has no shares either way.
    pub fn position(&self, ticker: &str) -> Position {
        self.positions.get(ticker).cloned().unwrap_or_default()
    }
}

/// Per-ticker sizing bounds handed to the decision engine by the risk step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskLimits {
    /// Unit price used to convert dollar limits into shares.
    pub current_price: Decimal,
    /// Maximum additional dollar exposure allowed for the ticker.
    pub max_position_value: Decimal,
    /// Shares asked for by the sizing step. `None` asks for the full allowance.
    pub requested_quantity: Option<u64>,
}

impl RiskLimits {
    pub fn new(current_price: Decimal, max_position_value: Decimal) -> Self {
        Self {
            current_price,
            max_position_value,
            requested_quantity: None,
        }
    }

    pub fn with_requested_quantity(mut self, quantity: u64) -> Self {
        self.requested_quantity = Some(quantity);
        self
    }
}
