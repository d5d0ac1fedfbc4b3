use ogx_types::{ObjectId, Record};

use crate::error::StoreResult;

/// Content-addressed record store.
///
/// All implementations must satisfy these invariants:
/// - Records are immutable once written. Content-addressing guarantees this:
///   the same payload always produces the same id.
/// - `put` is idempotent: an id already present is a no-op. Callers rely on
///   this for dedup-aware skip-on-write.
/// - Concurrent reads are always safe (records are immutable).
/// - The store never interprets record payloads — it is a pure key-value
///   store keyed by content id.
/// - All I/O errors are propagated, never silently ignored.
///
/// Retry contract: every operation is idempotent, so callers may retry on
/// I/O failure. Callers batching or parallelizing writes must ensure a
/// record's children are durably written before the record that references
/// them is considered committed.
pub trait RecordStore: Send + Sync {
    /// Check whether a record exists in the store.
    fn has(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Read a record by its content id.
    ///
    /// Returns `Ok(None)` if the record does not exist.
    /// Returns `Err` on I/O failure or data corruption.
    fn get(&self, id: &ObjectId) -> StoreResult<Option<Record>>;

    /// Write a record keyed by its id.
    ///
    /// If the id is already present, this is a no-op (idempotent).
    fn put(&self, record: &Record) -> StoreResult<()>;

    /// Read multiple records in a batch.
    ///
    /// Default implementation calls `get()` for each id; semantics must
    /// match repeated single calls. Backends may override for fewer I/O
    /// round-trips.
    fn get_batch(&self, ids: &[ObjectId]) -> StoreResult<Vec<Option<Record>>> {
        ids.iter().map(|id| self.get(id)).collect()
    }

    /// Write multiple records in a batch.
    ///
    /// Default implementation calls `put()` for each record; semantics must
    /// match repeated single calls. Batching callers still own the
    /// children-before-parents ordering guarantee.
    fn put_batch(&self, records: &[Record]) -> StoreResult<()> {
        records.iter().try_for_each(|record| self.put(record))
    }
}
