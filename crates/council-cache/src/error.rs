use council_models::RecordType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{record_type} record for {ticker} has an empty `{}` key", .record_type.key_field())]
    MissingKey {
        record_type: RecordType,
        ticker: String,
    },

    #[error("Cache store not available: {0}")]
    Unavailable(String),
}
