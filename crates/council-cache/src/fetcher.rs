use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use council_models::{
    CompanyNews, FinancialMetrics, InsiderTrade, LineItem, Price, RecordType,
};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::data_cache::{DataCache, Partitioned};
use crate::error::CacheError;
use crate::provider::{DataProvider, DateRange, ProviderError};
use crate::store::SqliteStore;

/// Read-through access to financial data: cache first, provider on a miss.
///
/// Only successful, non-empty fetches are cached. `NotFound` is reported as
/// an empty result and leaves the cache alone; every other provider error is
/// returned as-is, never retried here and never recorded as "no data".
///
/// With a store attached, each cached partition is saved together with the
/// date range that was fetched for it. A stored partition is only served
/// when that range covers the request; anything else goes to the provider.
pub struct CachedFetcher {
    cache: Arc<DataCache>,
    provider: Arc<dyn DataProvider>,
    store: Option<Arc<SqliteStore>>,
    coverage: Mutex<HashMap<(RecordType, String), DateRange>>,
}

impl CachedFetcher {
    pub fn new(cache: Arc<DataCache>, provider: Arc<dyn DataProvider>) -> Self {
        Self {
            cache,
            provider,
            store: None,
            coverage: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_store(mut self, store: Arc<SqliteStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache(&self) -> &Arc<DataCache> {
        &self.cache
    }

    pub fn store(&self) -> Option<&Arc<SqliteStore>> {
        self.store.as_ref()
    }

    /// Forget everything fetched so far. The store is left as it is.
    pub fn reset(&self) {
        self.cache.reset();
        self.coverage_map().clear();
    }

    /// Save every cached partition, with its fetched range, to the attached
    /// store. Returns the number of partitions written; zero without a store.
    pub fn persist(&self) -> Result<usize, CacheError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let written = self.persist_partition::<Price>(store)?
            + self.persist_partition::<FinancialMetrics>(store)?
            + self.persist_partition::<LineItem>(store)?
            + self.persist_partition::<InsiderTrade>(store)?
            + self.persist_partition::<CompanyNews>(store)?;
        info!(partitions = written, "Persisted data cache");
        Ok(written)
    }

    pub async fn prices(&self, ticker: &str, range: DateRange) -> Result<Vec<Price>, ProviderError> {
        self.read_through(ticker, range, None, || self.provider.fetch_prices(ticker, range))
            .await
    }

    pub async fn financial_metrics(
        &self,
        ticker: &str,
        end: NaiveDate,
        limit: u32,
    ) -> Result<Vec<FinancialMetrics>, ProviderError> {
        let range = DateRange::until(end);
        self.read_through(ticker, range, Some(limit), || {
            self.provider.fetch_financial_metrics(ticker, range, limit)
        })
        .await
    }

    pub async fn line_items(
        &self,
        ticker: &str,
        line_items: &[String],
        end: NaiveDate,
        limit: u32,
    ) -> Result<Vec<LineItem>, ProviderError> {
        let range = DateRange::until(end);
        self.read_through(ticker, range, Some(limit), || {
            self.provider.fetch_line_items(ticker, line_items, range, limit)
        })
        .await
    }

    pub async fn insider_trades(
        &self,
        ticker: &str,
        range: DateRange,
        limit: u32,
    ) -> Result<Vec<InsiderTrade>, ProviderError> {
        self.read_through(ticker, range, Some(limit), || {
            self.provider.fetch_insider_trades(ticker, range, limit)
        })
        .await
    }

    pub async fn company_news(
        &self,
        ticker: &str,
        range: DateRange,
        limit: u32,
    ) -> Result<Vec<CompanyNews>, ProviderError> {
        self.read_through(ticker, range, Some(limit), || {
            self.provider.fetch_company_news(ticker, range, limit)
        })
        .await
    }

    /// Market capitalization from the most recent metrics on or before `end`.
    pub async fn market_cap(&self, ticker: &str, end: NaiveDate) -> Result<Option<Decimal>, ProviderError> {
        let metrics = self.financial_metrics(ticker, end, 1).await?;
        Ok(metrics.first().and_then(|m| m.market_cap))
    }

    async fn read_through<R, F, Fut>(
        &self,
        ticker: &str,
        range: DateRange,
        limit: Option<u32>,
        fetch: F,
    ) -> Result<Vec<R>, ProviderError>
    where
        R: Partitioned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<R>, ProviderError>>,
    {
        if let Some(cached) = self.cache.get::<R>(ticker).await {
            let hits = in_range(&cached, range, limit);
            if !hits.is_empty() {
                debug!(record_type = %R::RECORD_TYPE, ticker, hits = hits.len(), "Cache hit");
                return Ok(hits);
            }
        }

        if let Some((stored, covered)) = self.load_covering::<R>(ticker, range)? {
            let hits = in_range(&stored, range, limit);
            if !hits.is_empty() {
                debug!(record_type = %R::RECORD_TYPE, ticker, hits = hits.len(), "Store hit");
                self.cache.set(ticker, &stored).await?;
                self.record_coverage(R::RECORD_TYPE, ticker, covered);
                return Ok(hits);
            }
        }

        debug!(record_type = %R::RECORD_TYPE, ticker, provider = self.provider.name(), "Cache miss");
        let fetched = match fetch().await {
            Ok(records) => records,
            Err(ProviderError::NotFound { .. }) => {
                debug!(record_type = %R::RECORD_TYPE, ticker, "Provider has no data in range");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        if fetched.is_empty() {
            return Ok(fetched);
        }
        self.cache.set(ticker, &fetched).await?;
        self.record_coverage(R::RECORD_TYPE, ticker, range);
        Ok(in_range(&fetched, range, limit))
    }

    /// The stored partition for `ticker`, if one was saved with a fetched
    /// range that covers `range`.
    fn load_covering<R: Partitioned>(
        &self,
        ticker: &str,
        range: DateRange,
    ) -> Result<Option<(Vec<R>, DateRange)>, CacheError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let Some(stored) = store.load(R::RECORD_TYPE, ticker)? else {
            return Ok(None);
        };
        match stored.coverage {
            Some(covered) if covered.covers(&range) => {
                let records: Vec<R> = serde_json::from_str(&stored.records_json)?;
                Ok(Some((records, covered)))
            }
            _ => {
                debug!(record_type = %R::RECORD_TYPE, ticker, "Stored partition does not cover request");
                Ok(None)
            }
        }
    }

    /// Extend the ticker's fetched range, or replace it when the new range
    /// does not touch the old one.
    fn record_coverage(&self, record_type: RecordType, ticker: &str, range: DateRange) {
        let mut coverage = self.coverage_map();
        let key = (record_type, ticker.to_string());
        let merged = coverage
            .get(&key)
            .and_then(|known| known.union(&range))
            .unwrap_or(range);
        coverage.insert(key, merged);
    }

    fn persist_partition<R: Partitioned>(&self, store: &SqliteStore) -> Result<usize, CacheError> {
        let entries = R::partition(&self.cache).entries();
        for (ticker, records) in &entries {
            let covered = self
                .coverage_map()
                .get(&(R::RECORD_TYPE, ticker.clone()))
                .copied();
            let json = serde_json::to_string(records.as_ref())?;
            store.save(R::RECORD_TYPE, ticker, &json, covered)?;
        }
        Ok(entries.len())
    }

    fn coverage_map(&self) -> MutexGuard<'_, HashMap<(RecordType, String), DateRange>> {
        self.coverage.lock().unwrap_or_else(|poisoned| {
            warn!("Coverage map lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Records dated inside `range`. Without a limit they come back oldest
/// first; with one, the newest `limit` records come back newest first.
/// Records without a parseable date are kept and sort last.
pub(crate) fn in_range<R: Partitioned>(records: &[R], range: DateRange, limit: Option<u32>) -> Vec<R> {
    let mut hits: Vec<R> = records
        .iter()
        .filter(|r| r.record_date().map_or(true, |date| range.contains(date)))
        .cloned()
        .collect();
    match limit {
        None => hits.sort_by_key(|r| (r.record_date().is_none(), r.record_date())),
        Some(limit) => {
            hits.sort_by_key(|r| (r.record_date().is_none(), std::cmp::Reverse(r.record_date())));
            hits.truncate(limit as usize);
        }
    }
    hits
}
