use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Buy,
    Sell,
    Short,
    Cover,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::Short => "short",
            Action::Cover => "cover",
            Action::Hold => "hold",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The final trading decision for one ticker.
///
/// Recomputed from scratch on every run from the current signals and
/// portfolio; never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub ticker: String,
    pub action: Action,
    /// Shares.
    pub quantity: u64,
    /// 0 to 100.
    pub confidence: Decimal,
    pub reasoning: String,
    /// Signals that were excluded from the vote, and why.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl Decision {
    /// An explicit zero-confidence hold, used whenever no real decision can be made.
    pub fn hold(ticker: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            action: Action::Hold,
            quantity: 0,
            confidence: Decimal::ZERO,
            reasoning: reasoning.into(),
            diagnostics: Vec::new(),
        }
    }
}
