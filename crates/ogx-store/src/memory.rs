use std::collections::HashMap;
use std::sync::RwLock;

use ogx_types::{ObjectId, Record};

use crate::error::StoreResult;
use crate::traits::RecordStore;

/// In-memory, HashMap-based record store.
///
/// Intended for tests and embedding. All records are held in memory behind a
/// `RwLock` for safe concurrent access. Records are cloned on read/write.
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<ObjectId, Record>>,
}

impl InMemoryRecordStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().expect("lock poisoned").is_empty()
    }

    /// Remove all records from the store.
    pub fn clear(&self) {
        self.records.write().expect("lock poisoned").clear();
    }

    /// Remove a single record. Returns `true` if it existed.
    ///
    /// Intended for tests simulating partially populated stores; deleting a
    /// record that other records reference breaks their closures.
    pub fn remove(&self, id: &ObjectId) -> bool {
        self.records
            .write()
            .expect("lock poisoned")
            .remove(id)
            .is_some()
    }

    /// Return a sorted list of all record ids in the store.
    pub fn all_ids(&self) -> Vec<ObjectId> {
        let map = self.records.read().expect("lock poisoned");
        let mut ids: Vec<ObjectId> = map.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn has(&self, id: &ObjectId) -> StoreResult<bool> {
        let map = self.records.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn get(&self, id: &ObjectId) -> StoreResult<Option<Record>> {
        let map = self.records.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn put(&self, record: &Record) -> StoreResult<()> {
        let mut map = self.records.write().expect("lock poisoned");
        // Idempotent: if already present, skip (content-addressing
        // guarantees the same id always maps to the same payload).
        map.entry(record.id).or_insert_with(|| record.clone());
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use ogx_hash::canonical;
    use ogx_types::WireValue;

    fn make_record(tag: &str, name: &str, value: i64) -> Record {
        let mut attributes = BTreeMap::new();
        attributes.insert(name.to_string(), WireValue::Int(value));
        let id = canonical::record_id(tag, &attributes).unwrap();
        Record {
            id,
            type_tag: tag.to_string(),
            total_child_count: 0,
            attributes,
        }
    }

    // -----------------------------------------------------------------------
    // Core operations
    // -----------------------------------------------------------------------

    #[test]
    fn put_and_get() {
        let store = InMemoryRecordStore::new();
        let record = make_record("Base", "v", 1);
        store.put(&record).unwrap();

        let read_back = store.get(&record.id).unwrap().expect("should exist");
        assert_eq!(read_back, record);
    }

    #[test]
    fn get_missing_returns_none() {
        let store = InMemoryRecordStore::new();
        assert!(store.get(&ObjectId::from_bytes(b"missing")).unwrap().is_none());
    }

    #[test]
    fn has_reflects_contents() {
        let store = InMemoryRecordStore::new();
        let record = make_record("Base", "v", 1);
        assert!(!store.has(&record.id).unwrap());
        store.put(&record).unwrap();
        assert!(store.has(&record.id).unwrap());
    }

    #[test]
    fn put_is_idempotent() {
        let store = InMemoryRecordStore::new();
        let record = make_record("Base", "v", 1);
        store.put(&record).unwrap();
        store.put(&record).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn identical_content_dedupes() {
        let store = InMemoryRecordStore::new();
        store.put(&make_record("Base", "v", 1)).unwrap();
        store.put(&make_record("Base", "v", 1)).unwrap();
        store.put(&make_record("Base", "v", 2)).unwrap();
        assert_eq!(store.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Batch operations
    // -----------------------------------------------------------------------

    #[test]
    fn batch_semantics_match_single_calls() {
        let store = InMemoryRecordStore::new();
        let records = vec![
            make_record("Base", "v", 1),
            make_record("Base", "v", 2),
            make_record("Base", "v", 3),
        ];
        store.put_batch(&records).unwrap();
        assert_eq!(store.len(), 3);

        let ids: Vec<ObjectId> = records.iter().map(|r| r.id).collect();
        let read_back = store.get_batch(&ids).unwrap();
        for (i, maybe) in read_back.into_iter().enumerate() {
            assert_eq!(maybe.expect("batch record should exist"), records[i]);
        }
    }

    #[test]
    fn get_batch_with_missing() {
        let store = InMemoryRecordStore::new();
        let present = make_record("Base", "v", 1);
        store.put(&present).unwrap();
        let absent = ObjectId::from_bytes(b"absent");

        let results = store.get_batch(&[present.id, absent]).unwrap();
        assert!(results[0].is_some());
        assert!(results[1].is_none());
    }

    // -----------------------------------------------------------------------
    // Utilities
    // -----------------------------------------------------------------------

    #[test]
    fn len_clear_and_remove() {
        let store = InMemoryRecordStore::new();
        assert!(store.is_empty());
        let record = make_record("Base", "v", 1);
        store.put(&record).unwrap();
        assert_eq!(store.len(), 1);

        assert!(store.remove(&record.id));
        assert!(!store.remove(&record.id));
        assert!(store.is_empty());

        store.put(&record).unwrap();
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn all_ids_is_sorted() {
        let store = InMemoryRecordStore::new();
        for v in 0..5 {
            store.put(&make_record("Base", "v", v)).unwrap();
        }
        let ids = store.all_ids();
        assert_eq!(ids.len(), 5);
        for w in ids.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_reads_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryRecordStore::new());
        let record = make_record("Base", "v", 42);
        store.put(&record).unwrap();
        let id = record.id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let read = store.get(&id).unwrap();
                    assert!(read.is_some());
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
    }

    #[test]
    fn debug_format() {
        let store = InMemoryRecordStore::new();
        store.put(&make_record("Base", "v", 1)).unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryRecordStore"));
        assert!(debug.contains("record_count"));
    }
}
