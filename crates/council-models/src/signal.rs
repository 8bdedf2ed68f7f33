use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Qualitative direction of an analyst's view on a ticker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Bullish => "bullish",
            Direction::Bearish => "bearish",
            Direction::Neutral => "neutral",
        }
    }
}

impl FromStr for Direction {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bullish" => Ok(Direction::Bullish),
            "bearish" => Ok(Direction::Bearish),
            "neutral" => Ok(Direction::Neutral),
            other => Err(SignalError::UnknownDirection(other.to_string())),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("missing direction")]
    MissingDirection,

    #[error("unknown direction: {0:?}")]
    UnknownDirection(String),

    #[error("confidence {0} outside [0, 100]")]
    ConfidenceOutOfRange(Decimal),

    #[error("empty {0}")]
    Empty(&'static str),
}

/// A signal as emitted by an analyst, before validation.
///
/// This is the wire form: the direction is whatever string the analyst (or
/// the model behind it) produced. `Signal::try_from` turns it into a
/// validated signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalystSignal {
    pub agent_id: String,
    pub ticker: String,
    #[serde(rename = "signal")]
    pub direction: Option<String>,
    pub confidence: Decimal,
    /// Free text, or any structured JSON the analyst chose to return.
    pub reasoning: serde_json::Value,
}

impl AnalystSignal {
    /// The sentinel produced when an analyst's model call fails outright.
    pub fn default_for(agent_id: &str, ticker: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            ticker: ticker.to_string(),
            direction: Some(Direction::Neutral.as_str().to_string()),
            confidence: Decimal::ZERO,
            reasoning: serde_json::Value::String("Error in analysis, using default".to_string()),
        }
    }
}

/// A validated analyst signal. Fields are checked once at construction.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Signal {
    agent_id: String,
    ticker: String,
    direction: Direction,
    confidence: Decimal,
    reasoning: String,
}

impl Signal {
    pub fn new(
        agent_id: impl Into<String>,
        ticker: impl Into<String>,
        direction: Direction,
        confidence: Decimal,
        reasoning: impl Into<String>,
    ) -> Result<Self, SignalError> {
        let agent_id = agent_id.into();
        let ticker = ticker.into();
        if agent_id.trim().is_empty() {
            return Err(SignalError::Empty("agent_id"));
        }
        if ticker.trim().is_empty() {
            return Err(SignalError::Empty("ticker"));
        }
        if confidence < Decimal::ZERO || confidence > Decimal::ONE_HUNDRED {
            return Err(SignalError::ConfidenceOutOfRange(confidence));
        }
        Ok(Self {
            agent_id,
            ticker,
            direction,
            confidence,
            reasoning: reasoning.into(),
        })
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn confidence(&self) -> Decimal {
        self.confidence
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }
}

impl TryFrom<&AnalystSignal> for Signal {
    type Error = SignalError;

    fn try_from(raw: &AnalystSignal) -> Result<Self, Self::Error> {
        let direction: Direction = raw
            .direction
            .as_deref()
            .ok_or(SignalError::MissingDirection)?
            .parse()?;
        let reasoning = match &raw.reasoning {
            serde_json::Value::String(text) => text.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        Signal::new(&raw.agent_id, &raw.ticker, direction, raw.confidence, reasoning)
    }
}
