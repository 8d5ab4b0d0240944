//! Nullable store — thread-safe in-memory block storage for testing.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use ibcscan_store::{validate_record, BlockRecordStore, StoreError};
use ibcscan_types::{BlockHash, BlockRecord};

#[derive(Default)]
struct Tables {
    by_hash: HashMap<BlockHash, BlockRecord>,
    /// Mirrors the LMDB height index: height descending, then hash.
    by_height: BTreeSet<(Reverse<u64>, BlockHash)>,
}

/// An in-memory block store for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
#[derive(Default)]
pub struct NullBlockStore {
    tables: Mutex<Tables>,
    fail_with: Mutex<Option<String>>,
}

impl NullBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `records`. Panics on duplicate hashes.
    pub fn with_records(records: impl IntoIterator<Item = BlockRecord>) -> Self {
        let store = Self::new();
        for record in records {
            if let Err(e) = store.insert(&record) {
                panic!("seeding null store: {e}");
            }
        }
        store
    }

    /// Make every subsequent call fail with a backend error, simulating a
    /// lost connection to the storage engine.
    pub fn fail_all(&self, reason: impl Into<String>) {
        *self.fail_with.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason.into());
    }

    /// Undo [`NullBlockStore::fail_all`].
    pub fn recover(&self) {
        *self.fail_with.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if let Some(reason) = self
            .fail_with
            .lock()
            .map_err(|_| StoreError::Backend("null store lock poisoned".into()))?
            .as_ref()
        {
            return Err(StoreError::Backend(reason.clone()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("null store lock poisoned".into()))
    }
}

impl BlockRecordStore for NullBlockStore {
    fn insert(&self, record: &BlockRecord) -> Result<(), StoreError> {
        validate_record(record)?;
        let mut tables = self.tables()?;
        if tables.by_hash.contains_key(&record.hash) {
            return Err(StoreError::Duplicate(record.hash.to_string()));
        }
        tables
            .by_height
            .insert((Reverse(record.height), record.hash.clone()));
        tables.by_hash.insert(record.hash.clone(), record.clone());
        Ok(())
    }

    fn find_latest_block(&self) -> Result<Option<BlockRecord>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .by_height
            .first()
            .and_then(|(_, hash)| tables.by_hash.get(hash))
            .cloned())
    }

    fn find_by_hash(&self, hash: &BlockHash) -> Result<Option<BlockRecord>, StoreError> {
        Ok(self.tables()?.by_hash.get(hash).cloned())
    }

    fn contains_hash(&self, hash: &BlockHash) -> Result<bool, StoreError> {
        Ok(self.tables()?.by_hash.contains_key(hash))
    }

    fn find_by_height(&self, height: u64) -> Result<Vec<BlockRecord>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .by_height
            .iter()
            .skip_while(|(Reverse(h), _)| *h > height)
            .take_while(|(Reverse(h), _)| *h == height)
            .filter_map(|(_, hash)| tables.by_hash.get(hash).cloned())
            .collect())
    }

    fn recent_blocks(&self, limit: usize) -> Result<Vec<BlockRecord>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .by_height
            .iter()
            .take(limit)
            .filter_map(|(_, hash)| tables.by_hash.get(hash).cloned())
            .collect())
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables()?.by_hash.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibcscan_types::Timestamp;

    fn record(height: u64, hash: &str) -> BlockRecord {
        BlockRecord::new(height, hash, 2, Timestamp::new(1_000 + height), "p")
    }

    #[test]
    fn behaves_like_the_real_store() {
        let store = NullBlockStore::new();
        assert_eq!(store.find_latest_block().unwrap(), None);

        store.insert(&record(100, "A")).unwrap();
        store.insert(&record(101, "B")).unwrap();
        assert!(store.insert(&record(102, "A")).unwrap_err().is_duplicate());

        assert_eq!(store.find_latest_block().unwrap(), Some(record(101, "B")));
        assert_eq!(store.find_by_hash(&BlockHash::new("A")).unwrap(), Some(record(100, "A")));
        assert_eq!(store.block_count().unwrap(), 2);
    }

    #[test]
    fn height_queries_follow_index_order() {
        let store = NullBlockStore::with_records([
            record(5, "Q"),
            record(7, "B"),
            record(7, "A"),
            record(6, "Z"),
        ]);

        let at_7: Vec<_> = store
            .find_by_height(7)
            .unwrap()
            .into_iter()
            .map(|r| r.hash.to_string())
            .collect();
        assert_eq!(at_7, vec!["A", "B"]);
        assert!(store.find_by_height(8).unwrap().is_empty());

        let recent: Vec<_> = store
            .recent_blocks(3)
            .unwrap()
            .into_iter()
            .map(|r| (r.height, r.hash.to_string()))
            .collect();
        assert_eq!(
            recent,
            vec![(7, "A".to_string()), (7, "B".to_string()), (6, "Z".to_string())]
        );
    }

    #[test]
    fn injected_failure_is_backend_error() {
        let store = NullBlockStore::with_records([record(1, "A")]);
        store.fail_all("connection reset");

        let err = store.find_latest_block().unwrap_err();
        assert!(matches!(err, StoreError::Backend(ref m) if m == "connection reset"));
        assert!(store.insert(&record(2, "B")).is_err());

        store.recover();
        assert_eq!(store.block_count().unwrap(), 1);
    }

    #[test]
    fn empty_hash_is_invalid() {
        let store = NullBlockStore::new();
        let err = store.insert(&record(1, "")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
    }

    #[test]
    fn hash_length_limit_matches_lmdb() {
        let store = NullBlockStore::new();
        let too_long = "H".repeat(ibcscan_store::MAX_HASH_LEN + 1);
        let err = store.insert(&record(1, &too_long)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
        assert_eq!(store.block_count().unwrap(), 0);
    }
}
