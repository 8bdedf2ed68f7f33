//! In-memory provider for tests in this crate and downstream crates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use council_models::{CompanyNews, FinancialMetrics, InsiderTrade, LineItem, Price};
use rust_decimal::Decimal;

use crate::data_cache::Partitioned;
use crate::fetcher::in_range;
use crate::provider::{DataProvider, DateRange, ProviderError};

#[derive(Debug, Clone, Copy)]
enum Failure {
    RateLimited,
    NotFound,
}

/// A `DataProvider` that serves canned records, or fails every call the
/// same way. Counts calls so tests can observe cache hits.
#[derive(Default)]
pub struct StubProvider {
    prices: HashMap<String, Vec<Price>>,
    financial_metrics: HashMap<String, Vec<FinancialMetrics>>,
    line_items: HashMap<String, Vec<LineItem>>,
    insider_trades: HashMap<String, Vec<InsiderTrade>>,
    company_news: HashMap<String, Vec<CompanyNews>>,
    failure: Option<Failure>,
    failing_tickers: Vec<String>,
    calls: AtomicUsize,
}

/// A daily bar with every field set to `close`.
pub fn price(time: &str, close: Decimal) -> Price {
    Price {
        open: close,
        close,
        high: close,
        low: close,
        volume: 1_000,
        time: time.to_string(),
    }
}

pub fn metrics(ticker: &str, report_period: &str, market_cap: Decimal) -> FinancialMetrics {
    FinancialMetrics {
        ticker: ticker.to_string(),
        report_period: report_period.to_string(),
        period: "ttm".to_string(),
        currency: "USD".to_string(),
        market_cap: Some(market_cap),
        ..Default::default()
    }
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(ticker: &str, bars: &[(&str, Decimal)]) -> Self {
        Self::new().add_prices(
            ticker,
            bars.iter().map(|(time, close)| price(time, *close)).collect(),
        )
    }

    pub fn with_market_cap(ticker: &str, report_period: &str, market_cap: Decimal) -> Self {
        Self::new().add_financial_metrics(ticker, vec![metrics(ticker, report_period, market_cap)])
    }

    pub fn rate_limited() -> Self {
        Self {
            failure: Some(Failure::RateLimited),
            ..Self::default()
        }
    }

    pub fn not_found() -> Self {
        Self {
            failure: Some(Failure::NotFound),
            ..Self::default()
        }
    }

    /// Fail every call for `ticker` with an HTTP error; other tickers are served.
    pub fn failing_for(mut self, ticker: &str) -> Self {
        self.failing_tickers.push(ticker.to_string());
        self
    }

    pub fn add_prices(mut self, ticker: &str, records: Vec<Price>) -> Self {
        self.prices.entry(ticker.to_string()).or_default().extend(records);
        self
    }

    pub fn add_financial_metrics(mut self, ticker: &str, records: Vec<FinancialMetrics>) -> Self {
        self.financial_metrics
            .entry(ticker.to_string())
            .or_default()
            .extend(records);
        self
    }

    pub fn add_line_items(mut self, ticker: &str, records: Vec<LineItem>) -> Self {
        self.line_items.entry(ticker.to_string()).or_default().extend(records);
        self
    }

    pub fn add_insider_trades(mut self, ticker: &str, records: Vec<InsiderTrade>) -> Self {
        self.insider_trades
            .entry(ticker.to_string())
            .or_default()
            .extend(records);
        self
    }

    pub fn add_company_news(mut self, ticker: &str, records: Vec<CompanyNews>) -> Self {
        self.company_news.entry(ticker.to_string()).or_default().extend(records);
        self
    }

    /// Number of fetch calls served or failed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Records in range, newest first when limited, as the live API returns them.
    fn serve<R: Partitioned>(
        &self,
        table: &HashMap<String, Vec<R>>,
        ticker: &str,
        range: DateRange,
        limit: Option<u32>,
    ) -> Result<Vec<R>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_tickers.iter().any(|t| t == ticker) {
            return Err(ProviderError::Http(format!("stub failure for {ticker}")));
        }
        match self.failure {
            Some(Failure::RateLimited) => {
                return Err(ProviderError::RateLimited {
                    provider: "stub".to_string(),
                })
            }
            Some(Failure::NotFound) => {
                return Err(ProviderError::NotFound {
                    ticker: ticker.to_string(),
                })
            }
            None => {}
        }
        Ok(table
            .get(ticker)
            .map(|records| in_range(records, range, limit))
            .unwrap_or_default())
    }
}

#[async_trait]
impl DataProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn fetch_prices(&self, ticker: &str, range: DateRange) -> Result<Vec<Price>, ProviderError> {
        self.serve(&self.prices, ticker, range, None)
    }

    async fn fetch_financial_metrics(
        &self,
        ticker: &str,
        range: DateRange,
        limit: u32,
    ) -> Result<Vec<FinancialMetrics>, ProviderError> {
        self.serve(&self.financial_metrics, ticker, range, Some(limit))
    }

    async fn fetch_line_items(
        &self,
        ticker: &str,
        _line_items: &[String],
        range: DateRange,
        limit: u32,
    ) -> Result<Vec<LineItem>, ProviderError> {
        self.serve(&self.line_items, ticker, range, Some(limit))
    }

    async fn fetch_insider_trades(
        &self,
        ticker: &str,
        range: DateRange,
        limit: u32,
    ) -> Result<Vec<InsiderTrade>, ProviderError> {
        self.serve(&self.insider_trades, ticker, range, Some(limit))
    }

    async fn fetch_company_news(
        &self,
        ticker: &str,
        range: DateRange,
        limit: u32,
    ) -> Result<Vec<CompanyNews>, ProviderError> {
        self.serve(&self.company_news, ticker, range, Some(limit))
    }
}
