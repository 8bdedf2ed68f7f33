use std::collections::HashSet;

use council_models::CachedRecord;

/// Merge `new_records` into `existing`, deduplicating on the natural key.
///
/// Existing records keep their positions and contents. New records are
/// appended in arrival order, skipping any key already seen, including keys
/// repeated within `new_records` itself. The first record seen for a key
/// always wins.
pub fn merge_records<R: CachedRecord>(existing: Option<&[R]>, new_records: &[R]) -> Vec<R> {
    let existing = match existing {
        Some(records) if !records.is_empty() => records,
        _ => return new_records.to_vec(),
    };

    let mut seen: HashSet<&str> = existing.iter().map(|r| r.natural_key()).collect();
    let mut merged = existing.to_vec();
    for record in new_records {
        if seen.insert(record.natural_key()) {
            merged.push(record.clone());
        }
    }
    merged
}
