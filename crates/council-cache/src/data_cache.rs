use std::time::Duration;

use council_models::config::CacheConfig;
use council_models::{CachedRecord, CompanyNews, FinancialMetrics, InsiderTrade, LineItem, Price};
use tracing::{debug, info};

use crate::error::CacheError;
use crate::memory::Partition;

/// Process-wide memo of provider responses, one partition per record type.
///
/// Construct one per process and share it behind an `Arc`. The cache never
/// clears itself: callers invoke `reset()` at run boundaries so a new run does
/// not see records fetched for a different date range.
pub struct DataCache {
    prices: Partition<Price>,
    financial_metrics: Partition<FinancialMetrics>,
    line_items: Partition<LineItem>,
    insider_trades: Partition<InsiderTrade>,
    company_news: Partition<CompanyNews>,
}

/// Maps a record type to its partition inside a `DataCache`.
pub trait Partitioned: CachedRecord {
    fn partition(cache: &DataCache) -> &Partition<Self>;
}

impl Partitioned for Price {
    fn partition(cache: &DataCache) -> &Partition<Self> {
        &cache.prices
    }
}

impl Partitioned for FinancialMetrics {
    fn partition(cache: &DataCache) -> &Partition<Self> {
        &cache.financial_metrics
    }
}

impl Partitioned for LineItem {
    fn partition(cache: &DataCache) -> &Partition<Self> {
        &cache.line_items
    }
}

impl Partitioned for InsiderTrade {
    fn partition(cache: &DataCache) -> &Partition<Self> {
        &cache.insider_trades
    }
}

impl Partitioned for CompanyNews {
    fn partition(cache: &DataCache) -> &Partition<Self> {
        &cache.company_news
    }
}

impl DataCache {
    /// `max_tickers` bounds how many tickers each partition holds. A bounded
    /// cache may evict a ticker's whole partition mid-run, after which its
    /// records are fetched again. `None` never evicts.
    pub fn new(max_tickers: Option<u64>, ttl: Option<Duration>) -> Self {
        Self {
            prices: Partition::new(max_tickers, ttl),
            financial_metrics: Partition::new(max_tickers, ttl),
            line_items: Partition::new(max_tickers, ttl),
            insider_trades: Partition::new(max_tickers, ttl),
            company_news: Partition::new(max_tickers, ttl),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_tickers, config.ttl_seconds.map(Duration::from_secs))
    }

    /// Currently cached records for a ticker, or `None` if nothing was cached.
    pub async fn get<R: Partitioned>(&self, ticker: &str) -> Option<Vec<R>> {
        R::partition(self)
            .get(ticker)
            .await
            .map(|records| records.as_ref().clone())
    }

    /// Merge `records` into the ticker's cached sequence.
    ///
    /// The whole batch is validated first; a record without a natural key
    /// rejects the batch and leaves the cache untouched.
    pub async fn set<R: Partitioned>(&self, ticker: &str, records: &[R]) -> Result<(), CacheError> {
        if records.iter().any(|r| r.natural_key().is_empty()) {
            return Err(CacheError::MissingKey {
                record_type: R::RECORD_TYPE,
                ticker: ticker.to_string(),
            });
        }
        if records.is_empty() {
            return Ok(());
        }

        let merged = R::partition(self).merge(ticker, records).await;
        debug!(
            record_type = %R::RECORD_TYPE,
            ticker,
            incoming = records.len(),
            cached = merged.len(),
            "Merged records into cache"
        );
        Ok(())
    }

    /// Drop every cached record of every type for every ticker.
    pub fn reset(&self) {
        self.prices.invalidate_all();
        self.financial_metrics.invalidate_all();
        self.line_items.invalidate_all();
        self.insider_trades.invalidate_all();
        self.company_news.invalidate_all();
        info!("Data cache reset");
    }

    pub async fn get_prices(&self, ticker: &str) -> Option<Vec<Price>> {
        self.get(ticker).await
    }

    pub async fn set_prices(&self, ticker: &str, records: &[Price]) -> Result<(), CacheError> {
        self.set(ticker, records).await
    }

    pub async fn get_financial_metrics(&self, ticker: &str) -> Option<Vec<FinancialMetrics>> {
        self.get(ticker).await
    }

    pub async fn set_financial_metrics(
        &self,
        ticker: &str,
        records: &[FinancialMetrics],
    ) -> Result<(), CacheError> {
        self.set(ticker, records).await
    }

    pub async fn get_line_items(&self, ticker: &str) -> Option<Vec<LineItem>> {
        self.get(ticker).await
    }

    pub async fn set_line_items(&self, ticker: &str, records: &[LineItem]) -> Result<(), CacheError> {
        self.set(ticker, records).await
    }

    pub async fn get_insider_trades(&self, ticker: &str) -> Option<Vec<InsiderTrade>> {
        self.get(ticker).await
    }

    pub async fn set_insider_trades(
        &self,
        ticker: &str,
        records: &[InsiderTrade],
    ) -> Result<(), CacheError> {
        self.set(ticker, records).await
    }

    pub async fn get_company_news(&self, ticker: &str) -> Option<Vec<CompanyNews>> {
        self.get(ticker).await
    }

    pub async fn set_company_news(
        &self,
        ticker: &str,
        records: &[CompanyNews],
    ) -> Result<(), CacheError> {
        self.set(ticker, records).await
    }
}
