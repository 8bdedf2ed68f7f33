use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use council_models::RecordType;
use rusqlite::Connection;

use crate::error::CacheError;
use crate::provider::DateRange;

/// Table holding one row per (record type, ticker) with the ordered record
/// sequence stored as a JSON array, plus the date range that was fetched to
/// produce it. A row without `covered_end` was never fetched as a whole and
/// is not served.
pub const STORE_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS cache_partitions (
    record_type    TEXT NOT NULL,
    ticker         TEXT NOT NULL,
    records_json   TEXT NOT NULL,
    covered_start  TEXT,
    covered_end    TEXT,
    updated_at     TEXT NOT NULL,
    PRIMARY KEY (record_type, ticker)
);
";

/// One persisted partition.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPartition {
    pub records_json: String,
    pub coverage: Option<DateRange>,
}

/// SQLite-backed store used to carry cache contents across runs.
///
/// `rusqlite::Connection` is not `Sync`, so access goes through a `Mutex`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &str) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(STORE_TABLE_DDL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(STORE_TABLE_DDL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|e| CacheError::Unavailable(format!("SQLite mutex poisoned: {e}")))
    }

    /// Replace the stored sequence for one partition.
    pub fn save(
        &self,
        record_type: RecordType,
        ticker: &str,
        records_json: &str,
        coverage: Option<DateRange>,
    ) -> Result<(), CacheError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO cache_partitions \
             (record_type, ticker, records_json, covered_start, covered_end, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                record_type.as_str(),
                ticker,
                records_json,
                coverage.and_then(|c| c.start),
                coverage.map(|c| c.end),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn load(&self, record_type: RecordType, ticker: &str) -> Result<Option<StoredPartition>, CacheError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT records_json, covered_start, covered_end FROM cache_partitions \
             WHERE record_type = ?1 AND ticker = ?2",
        )?;
        let result = stmt.query_row(rusqlite::params![record_type.as_str(), ticker], |row| {
            let start: Option<NaiveDate> = row.get(1)?;
            let end: Option<NaiveDate> = row.get(2)?;
            Ok(StoredPartition {
                records_json: row.get(0)?,
                coverage: end.map(|end| DateRange { start, end }),
            })
        });

        match result {
            Ok(partition) => Ok(Some(partition)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(CacheError::Sqlite(e)),
        }
    }

    /// Tickers with a stored partition of `record_type`, in order.
    pub fn tickers(&self, record_type: RecordType) -> Result<Vec<String>, CacheError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT ticker FROM cache_partitions WHERE record_type = ?1 ORDER BY ticker",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![record_type.as_str()], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Remove every stored partition.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM cache_partitions", [])?)
    }
}
