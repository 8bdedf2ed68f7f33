use std::sync::Arc;
use std::time::Duration;

use council_models::CachedRecord;
use moka::future::Cache;

use crate::merge::merge_records;

/// One record type's slice of the data cache: ticker -> ordered records.
///
/// Backed by moka. Each ticker's sequence is replaced wholesale on merge, so
/// readers only ever see a complete pre- or post-merge sequence.
pub struct Partition<R: CachedRecord> {
    inner: Cache<String, Arc<Vec<R>>>,
}

impl<R: CachedRecord> Partition<R> {
    pub fn new(max_tickers: Option<u64>, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder();
        if let Some(max_tickers) = max_tickers {
            builder = builder.max_capacity(max_tickers);
        }
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            inner: builder.build(),
        }
    }

    pub async fn get(&self, ticker: &str) -> Option<Arc<Vec<R>>> {
        self.inner.get(ticker).await
    }

    /// Merge `records` into the ticker's sequence.
    ///
    /// moka runs upserts for the same key one at a time, which makes the
    /// read-modify-write atomic per ticker without blocking other tickers.
    pub async fn merge(&self, ticker: &str, records: &[R]) -> Arc<Vec<R>> {
        self.inner
            .entry_by_ref(ticker)
            .and_upsert_with(|existing| {
                let current = existing.as_ref().map(|entry| entry.value().as_slice());
                std::future::ready(Arc::new(merge_records(current, records)))
            })
            .await
            .into_value()
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Snapshot of every (ticker, records) pair currently held.
    pub fn entries(&self) -> Vec<(String, Arc<Vec<R>>)> {
        self.inner
            .iter()
            .map(|(ticker, records)| (ticker.as_ref().clone(), records))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_models::Price;
    use rust_decimal_macros::dec;

    fn price(time: &str, close: rust_decimal::Decimal) -> Price {
        Price {
            open: close,
            close,
            high: close,
            low: close,
            volume: 100,
            time: time.to_string(),
        }
    }

    #[tokio::test]
    async fn merge_and_get() {
        let partition = Partition::new(Some(100), None);
        partition
            .merge("AAPL", &[price("2024-01-02", dec!(185.64))])
            .await;

        let records = partition.get("AAPL").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].close, dec!(185.64));
    }

    #[tokio::test]
    async fn get_missing() {
        let partition: Partition<Price> = Partition::new(Some(100), None);
        assert!(partition.get("AAPL").await.is_none());
    }

    #[tokio::test]
    async fn merge_returns_merged_sequence() {
        let partition = Partition::new(Some(100), None);
        partition.merge("AAPL", &[price("2024-01-02", dec!(1))]).await;
        let merged = partition
            .merge(
                "AAPL",
                &[price("2024-01-02", dec!(2)), price("2024-01-03", dec!(3))],
            )
            .await;
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].close, dec!(1));
    }

    #[tokio::test]
    async fn invalidate_all_clears_every_ticker() {
        let partition = Partition::new(Some(100), None);
        partition.merge("AAPL", &[price("2024-01-02", dec!(1))]).await;
        partition.merge("MSFT", &[price("2024-01-02", dec!(1))]).await;
        partition.invalidate_all();
        assert!(partition.get("AAPL").await.is_none());
        assert!(partition.get("MSFT").await.is_none());
    }

    #[tokio::test]
    async fn ttl_expiration() {
        let partition = Partition::new(Some(100), Some(Duration::from_millis(50)));
        partition.merge("AAPL", &[price("2024-01-02", dec!(1))]).await;
        assert!(partition.get("AAPL").await.is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(partition.get("AAPL").await.is_none());
    }
}
