//! Analysts for exercising the orchestrator without a language model.
//!
//! `StaticAnalyst` returns a canned signal. `MomentumAnalyst` and
//! `ValueAnalyst` read the fetched data and apply simple rules, so tests can
//! drive decisions through the data they seed.

use std::time::Duration;

use async_trait::async_trait;
use council_models::{AnalystSignal, Direction};
use rust_decimal::Decimal;

use crate::analyst::{AnalysisRequest, AnalystAgent};
use crate::error::AgentError;

/// Returns the same direction and confidence for every ticker.
pub struct StaticAnalyst {
    id: String,
    direction: Option<String>,
    confidence: Decimal,
    delay: Option<Duration>,
    fail: bool,
}

impl StaticAnalyst {
    pub fn new(id: &str, direction: Direction, confidence: Decimal) -> Self {
        Self::raw(id, Some(direction.as_str()), confidence)
    }

    /// Emits `direction` verbatim, so tests can send malformed signals.
    pub fn raw(id: &str, direction: Option<&str>, confidence: Decimal) -> Self {
        Self {
            id: id.to_string(),
            direction: direction.map(str::to_string),
            confidence,
            delay: None,
            fail: false,
        }
    }

    pub fn failing(id: &str) -> Self {
        let mut analyst = Self::new(id, Direction::Neutral, Decimal::ZERO);
        analyst.fail = true;
        analyst
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl AnalystAgent for StaticAnalyst {
    fn id(&self) -> &str {
        &self.id
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalystSignal, AgentError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AgentError::Model("static analyst failure".to_string()));
        }
        Ok(AnalystSignal {
            agent_id: self.id.clone(),
            ticker: request.ticker.clone(),
            direction: self.direction.clone(),
            confidence: self.confidence,
            reasoning: serde_json::Value::String(format!("{} static view", self.id)),
        })
    }
}

fn signal(id: &str, ticker: &str, direction: Direction, confidence: Decimal, reasoning: String) -> AnalystSignal {
    AnalystSignal {
        agent_id: id.to_string(),
        ticker: ticker.to_string(),
        direction: Some(direction.as_str().to_string()),
        confidence,
        reasoning: serde_json::Value::String(reasoning),
    }
}

/// Price momentum over the window: more than +5% is bullish, less than -5%
/// bearish. Confidence is five times the absolute move in percent, capped at 100.
pub struct MomentumAnalyst {
    id: String,
}

impl MomentumAnalyst {
    pub fn new() -> Self {
        Self {
            id: "technical_analyst".to_string(),
        }
    }
}

impl Default for MomentumAnalyst {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalystAgent for MomentumAnalyst {
    fn id(&self) -> &str {
        &self.id
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalystSignal, AgentError> {
        let (Some(first), Some(last)) = (request.earliest_bar(), request.latest_bar()) else {
            return Ok(signal(
                &self.id,
                &request.ticker,
                Direction::Neutral,
                Decimal::ZERO,
                "No price history".to_string(),
            ));
        };
        if first.close <= Decimal::ZERO {
            return Ok(signal(
                &self.id,
                &request.ticker,
                Direction::Neutral,
                Decimal::ZERO,
                "Invalid opening close".to_string(),
            ));
        }

        let change = (last.close - first.close) / first.close * Decimal::ONE_HUNDRED;
        let threshold = Decimal::new(5, 0);
        let direction = if change > threshold {
            Direction::Bullish
        } else if change < -threshold {
            Direction::Bearish
        } else {
            Direction::Neutral
        };
        let confidence = (change.abs() * Decimal::new(5, 0))
            .min(Decimal::ONE_HUNDRED)
            .round_dp(0);
        Ok(signal(
            &self.id,
            &request.ticker,
            direction,
            confidence,
            format!("Price moved {}% over the window", change.round_dp(1)),
        ))
    }
}

/// Valuation from the latest P/E: below 15 bullish, above 30 bearish.
pub struct ValueAnalyst {
    id: String,
}

impl ValueAnalyst {
    pub fn new() -> Self {
        Self {
            id: "ben_graham".to_string(),
        }
    }
}

impl Default for ValueAnalyst {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalystAgent for ValueAnalyst {
    fn id(&self) -> &str {
        &self.id
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalystSignal, AgentError> {
        let pe = request
            .financial_metrics
            .first()
            .and_then(|m| m.price_to_earnings_ratio);
        let (direction, confidence, reasoning) = match pe {
            None => (Direction::Neutral, Decimal::ZERO, "No P/E available".to_string()),
            Some(pe) if pe > Decimal::ZERO && pe < Decimal::new(15, 0) => {
                (Direction::Bullish, Decimal::new(75, 0), format!("P/E {pe} below 15"))
            }
            Some(pe) if pe > Decimal::new(30, 0) => {
                (Direction::Bearish, Decimal::new(70, 0), format!("P/E {pe} above 30"))
            }
            Some(pe) => (Direction::Neutral, Decimal::new(30, 0), format!("P/E {pe} fairly valued")),
        };
        Ok(signal(&self.id, &request.ticker, direction, confidence, reasoning))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use council_cache::test_support::{metrics, price};
    use rust_decimal_macros::dec;

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(
            "AAPL",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[tokio::test]
    async fn momentum_reads_price_change() {
        let mut req = request();
        req.prices = vec![price("2024-01-02", dec!(100)), price("2024-01-31", dec!(110))];
        let signal = MomentumAnalyst::new().analyze(&req).await.unwrap();
        assert_eq!(signal.direction.as_deref(), Some("bullish"));
        assert_eq!(signal.confidence, dec!(50));
    }

    #[tokio::test]
    async fn momentum_without_prices_is_neutral() {
        let signal = MomentumAnalyst::new().analyze(&request()).await.unwrap();
        assert_eq!(signal.direction.as_deref(), Some("neutral"));
        assert_eq!(signal.confidence, Decimal::ZERO);
    }

    #[tokio::test]
    async fn value_reads_pe() {
        let mut req = request();
        let mut m = metrics("AAPL", "2023-12-31", dec!(1_000_000));
        m.price_to_earnings_ratio = Some(dec!(42));
        req.financial_metrics = vec![m];
        let signal = ValueAnalyst::new().analyze(&req).await.unwrap();
        assert_eq!(signal.direction.as_deref(), Some("bearish"));
    }

    #[tokio::test]
    async fn raw_static_analyst_passes_direction_through() {
        let analyst = StaticAnalyst::raw("bill_ackman", Some("sideways"), dec!(50));
        let signal = analyst.analyze(&request()).await.unwrap();
        assert_eq!(signal.direction.as_deref(), Some("sideways"));
    }
}
