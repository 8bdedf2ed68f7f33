use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use council_models::{
    analysts, AnalystSignal, CachedRecord, CompanyNews, FinancialMetrics, InsiderTrade,
    LineItem, Price,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::model::{invoke_structured, ModelInvoker};
use crate::personas::persona_prompt;

/// Everything an analyst sees for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRequest {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub prices: Vec<Price>,
    #[serde(default)]
    pub financial_metrics: Vec<FinancialMetrics>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub insider_trades: Vec<InsiderTrade>,
    #[serde(default)]
    pub company_news: Vec<CompanyNews>,
}

impl AnalysisRequest {
    pub fn new(ticker: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            start_date,
            end_date,
            prices: Vec::new(),
            financial_metrics: Vec::new(),
            line_items: Vec::new(),
            insider_trades: Vec::new(),
            company_news: Vec::new(),
        }
    }

    /// The bar with the earliest date. Undated bars are only picked when
    /// nothing is dated.
    pub fn earliest_bar(&self) -> Option<&Price> {
        self.prices
            .iter()
            .min_by_key(|p| (p.record_date().is_none(), p.record_date()))
    }

    /// The bar with the latest date, wherever it sits in `prices`.
    pub fn latest_bar(&self) -> Option<&Price> {
        self.prices.iter().max_by_key(|p| p.record_date())
    }

    /// Close of the most recent bar.
    pub fn latest_close(&self) -> Option<Decimal> {
        self.latest_bar().map(|p| p.close)
    }
}

/// One member of the analyst panel. Mockable for testing.
#[async_trait]
pub trait AnalystAgent: Send + Sync {
    /// Stable identifier, e.g. `warren_buffett`.
    fn id(&self) -> &str;

    fn display_name(&self) -> String {
        analysts::display_name(self.id())
    }

    /// Produce this analyst's signal for `request.ticker`. The result is not
    /// validated here; the aggregator drops malformed signals.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalystSignal, AgentError>;
}

/// What a persona model is asked to return.
#[derive(Debug, Deserialize)]
struct PersonaReply {
    signal: Option<String>,
    confidence: Decimal,
    #[serde(default)]
    reasoning: serde_json::Value,
}

/// An analyst backed by a persona prompt and a language model.
pub struct LlmAnalyst {
    id: String,
    system_prompt: String,
    invoker: Arc<dyn ModelInvoker>,
    max_retries: u32,
}

impl LlmAnalyst {
    /// Analyst for a known persona id.
    pub fn new(id: &str, invoker: Arc<dyn ModelInvoker>, max_retries: u32) -> Result<Self, AgentError> {
        let system_prompt = persona_prompt(id)
            .ok_or_else(|| AgentError::Disabled(format!("no persona for analyst {id}")))?;
        Ok(Self::with_prompt(id, system_prompt, invoker, max_retries))
    }

    pub fn with_prompt(
        id: impl Into<String>,
        system_prompt: impl Into<String>,
        invoker: Arc<dyn ModelInvoker>,
        max_retries: u32,
    ) -> Self {
        Self {
            id: id.into(),
            system_prompt: system_prompt.into(),
            invoker,
            max_retries,
        }
    }
}

#[async_trait]
impl AnalystAgent for LlmAnalyst {
    fn id(&self) -> &str {
        &self.id
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalystSignal, AgentError> {
        let user_prompt = serde_json::to_string(request)?;
        let reply: Option<PersonaReply> = invoke_structured(
            self.invoker.as_ref(),
            &self.system_prompt,
            &user_prompt,
            self.max_retries,
            || None,
        )
        .await;

        Ok(match reply {
            Some(reply) => AnalystSignal {
                agent_id: self.id.clone(),
                ticker: request.ticker.clone(),
                direction: reply.signal,
                confidence: reply.confidence,
                reasoning: reply.reasoning,
            },
            None => AnalystSignal::default_for(&self.id, &request.ticker),
        })
    }
}
