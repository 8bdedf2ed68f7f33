use async_trait::async_trait;
use chrono::NaiveDate;
use council_models::{CompanyNews, FinancialMetrics, InsiderTrade, LineItem, Price};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("No data for {ticker}")]
    NotFound { ticker: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Provider configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Cache(#[from] crate::error::CacheError),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Http(err.to_string())
        }
    }
}

/// Inclusive date window for a fetch. Point-in-time records (metrics, line
/// items) only use the upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end,
        }
    }

    pub fn until(end: NaiveDate) -> Self {
        Self { start: None, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && date <= self.end
    }

    /// Whether every date of `other` falls inside this range.
    pub fn covers(&self, other: &DateRange) -> bool {
        let starts_before = match (self.start, other.start) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(mine), Some(theirs)) => mine <= theirs,
        };
        starts_before && other.end <= self.end
    }

    /// The single range spanning both, when they overlap or are adjacent.
    /// Disjoint ranges have no union.
    pub fn union(&self, other: &DateRange) -> Option<DateRange> {
        let reaches = |range: &DateRange, start: Option<NaiveDate>| match start {
            None => true,
            Some(start) => range.end.succ_opt().map_or(true, |next| next >= start),
        };
        if !reaches(self, other.start) || !reaches(other, self.start) {
            return None;
        }
        let start = match (self.start, other.start) {
            (Some(a), Some(b)) => Some(a.min(b)),
            _ => None,
        };
        Some(DateRange {
            start,
            end: self.end.max(other.end),
        })
    }
}

/// Source of raw financial records. Implementations own their retry policy;
/// callers above the provider never retry.
#[async_trait]
pub trait DataProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_prices(&self, ticker: &str, range: DateRange) -> Result<Vec<Price>, ProviderError>;

    async fn fetch_financial_metrics(
        &self,
        ticker: &str,
        range: DateRange,
        limit: u32,
    ) -> Result<Vec<FinancialMetrics>, ProviderError>;

    async fn fetch_line_items(
        &self,
        ticker: &str,
        line_items: &[String],
        range: DateRange,
        limit: u32,
    ) -> Result<Vec<LineItem>, ProviderError>;

    async fn fetch_insider_trades(
        &self,
        ticker: &str,
        range: DateRange,
        limit: u32,
    ) -> Result<Vec<InsiderTrade>, ProviderError>;

    async fn fetch_company_news(
        &self,
        ticker: &str,
        range: DateRange,
        limit: u32,
    ) -> Result<Vec<CompanyNews>, ProviderError>;
}
