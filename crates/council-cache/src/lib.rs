pub mod data_cache;
pub mod error;
pub mod fetcher;
pub mod financial_datasets;
pub mod memory;
pub mod merge;
pub mod provider;
pub mod store;
pub mod test_support;

pub use data_cache::{DataCache, Partitioned};
pub use error::CacheError;
pub use fetcher::CachedFetcher;
pub use financial_datasets::FinancialDatasetsClient;
pub use merge::merge_records;
pub use provider::{DataProvider, DateRange, ProviderError};
pub use store::SqliteStore;
