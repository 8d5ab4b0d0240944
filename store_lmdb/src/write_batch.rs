//! Write batching — groups many record inserts into a single LMDB write
//! transaction, amortising the cost of the fsync that each commit performs.
//!
//! # Usage
//!
//! ```ignore
//! let mut batch = env.write_batch()?;
//! for record in &records {
//!     match batch.insert(record) {
//!         Err(e) if e.is_duplicate() => continue,
//!         other => other?,
//!     }
//! }
//! batch.commit()?;
//! ```
//!
//! If the batch is dropped without calling [`WriteBatch::commit`], all
//! inserts are rolled back (the underlying LMDB transaction is aborted).
//! A rejected insert writes nothing, so the batch stays usable after a
//! `Duplicate` error.

use heed::RwTxn;

use ibcscan_store::StoreError;
use ibcscan_types::BlockRecord;

use crate::block::put_record;
use crate::environment::LmdbEnvironment;
use crate::LmdbError;

/// A write batch holding one LMDB write transaction.
pub struct WriteBatch<'a> {
    txn: RwTxn<'a>,
    env: &'a LmdbEnvironment,
    inserted: u64,
}

impl<'a> WriteBatch<'a> {
    /// Begin a new write batch.
    pub(crate) fn new(env: &'a LmdbEnvironment) -> Result<Self, StoreError> {
        let txn = env.env().write_txn().map_err(LmdbError::from)?;
        Ok(Self {
            txn,
            env,
            inserted: 0,
        })
    }

    /// Insert a record and its height row.
    ///
    /// Hash uniqueness is checked against committed records and against
    /// earlier inserts in this batch.
    pub fn insert(&mut self, record: &BlockRecord) -> Result<(), StoreError> {
        put_record(&self.env.blocks_db, &self.env.heights_db, &mut self.txn, record)?;
        self.inserted += 1;
        Ok(())
    }

    /// Records inserted so far.
    pub fn len(&self) -> u64 {
        self.inserted
    }

    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }

    /// Commit all batched inserts in a single write transaction.
    ///
    /// Returns the number of records written.
    pub fn commit(self) -> Result<u64, StoreError> {
        self.txn.commit().map_err(LmdbError::from)?;
        Ok(self.inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreConfig;
    use ibcscan_store::BlockRecordStore;
    use ibcscan_types::{BlockHash, Timestamp};

    /// Helper: open a temporary LMDB environment.
    fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let env = LmdbEnvironment::open(dir.path(), &StoreConfig::for_tests())
            .expect("failed to open env");
        (dir, env)
    }

    fn record(height: u64, hash: &str) -> BlockRecord {
        BlockRecord::new(height, hash, 1, Timestamp::new(height * 6), "val")
    }

    #[test]
    fn batch_inserts_visible_after_commit() {
        let (_dir, env) = temp_env();

        let mut batch = env.write_batch().expect("write_batch");
        for height in 1..=10 {
            batch.insert(&record(height, &format!("B{height}"))).expect("insert");
        }
        assert_eq!(batch.len(), 10);
        assert_eq!(batch.commit().expect("commit"), 10);

        let store = env.block_store();
        assert_eq!(store.block_count().unwrap(), 10);
        assert_eq!(store.find_latest_block().unwrap().unwrap().height, 10);
    }

    #[test]
    fn dropped_batch_does_not_persist() {
        let (_dir, env) = temp_env();

        {
            let mut batch = env.write_batch().expect("write_batch");
            batch.insert(&record(1, "GONE")).expect("insert");
            // batch is dropped here — implicit rollback
        }

        let store = env.block_store();
        assert_eq!(store.find_by_hash(&BlockHash::new("GONE")).unwrap(), None);
        assert_eq!(store.find_latest_block().unwrap(), None);
    }

    #[test]
    fn duplicate_within_batch_is_rejected_and_batch_continues() {
        let (_dir, env) = temp_env();
        env.block_store().insert(&record(1, "OLD")).unwrap();

        let mut batch = env.write_batch().expect("write_batch");
        batch.insert(&record(2, "NEW")).unwrap();
        assert!(batch.insert(&record(3, "NEW")).unwrap_err().is_duplicate());
        assert!(batch.insert(&record(4, "OLD")).unwrap_err().is_duplicate());
        batch.insert(&record(5, "NEWER")).unwrap();
        assert_eq!(batch.commit().unwrap(), 2);

        let store = env.block_store();
        assert_eq!(store.block_count().unwrap(), 3);
        assert!(store.find_by_height(3).unwrap().is_empty());
        assert!(store.find_by_height(4).unwrap().is_empty());
        assert_eq!(store.find_latest_block().unwrap().unwrap().hash.as_str(), "NEWER");
    }

    #[test]
    fn hash_too_long_for_height_key_is_rejected_before_any_write() {
        let (_dir, env) = temp_env();
        env.block_store().insert(&record(100, "A")).unwrap();
        // Fits an LMDB key on its own, but not behind the 8-byte height prefix.
        let long_hash = "B".repeat(505);

        let mut batch = env.write_batch().expect("write_batch");
        let err = batch.insert(&record(1_000, &long_hash)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)), "{err:?}");
        batch.insert(&record(101, "C")).unwrap();
        assert_eq!(batch.commit().unwrap(), 1);

        let store = env.block_store();
        assert_eq!(store.find_by_hash(&BlockHash::new(long_hash)).unwrap(), None);
        assert_eq!(store.block_count().unwrap(), 2);
        assert_eq!(store.find_latest_block().unwrap().unwrap().hash.as_str(), "C");
        assert!(crate::check_integrity(&env).unwrap().is_healthy());
    }
}
