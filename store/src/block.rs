//! Block record storage trait.

use crate::StoreError;
use ibcscan_types::{BlockHash, BlockRecord};

/// Longest hash any backend accepts, in bytes. LMDB caps keys at 511 bytes
/// and the height index puts an 8-byte prefix in front of the hash.
pub const MAX_HASH_LEN: usize = 503;

/// Reject records that cannot be keyed. Backends call this before writing
/// anything, so a rejected record leaves no partial rows behind.
pub fn validate_record(record: &BlockRecord) -> Result<(), StoreError> {
    if record.hash.is_empty() {
        return Err(StoreError::InvalidRecord(format!(
            "block at height {} has an empty hash",
            record.height
        )));
    }
    let len = record.hash.as_bytes().len();
    if len > MAX_HASH_LEN {
        return Err(StoreError::InvalidRecord(format!(
            "block at height {} has a {len}-byte hash, the limit is {MAX_HASH_LEN}",
            record.height
        )));
    }
    Ok(())
}

/// Trait for block record storage.
///
/// Records are keyed by their unique `hash` and indexed by `height`
/// (descending, not unique). Implementations are shared between threads
/// and enforce uniqueness themselves, so callers need no external locking.
pub trait BlockRecordStore {
    /// Persist a record.
    ///
    /// Fails with [`StoreError::Duplicate`] if a record with the same hash
    /// exists, and with [`StoreError::InvalidRecord`] if the hash is empty
    /// or longer than [`MAX_HASH_LEN`]. The record and its index entries are
    /// written atomically.
    fn insert(&self, record: &BlockRecord) -> Result<(), StoreError>;

    /// The record with the greatest height, or `None` on an empty store.
    ///
    /// If several records share the greatest height, which one is returned
    /// is unspecified.
    fn find_latest_block(&self) -> Result<Option<BlockRecord>, StoreError>;

    /// Look up a record by hash.
    fn find_by_hash(&self, hash: &BlockHash) -> Result<Option<BlockRecord>, StoreError>;

    /// Check if a record with this hash exists.
    fn contains_hash(&self, hash: &BlockHash) -> Result<bool, StoreError>;

    /// All records at `height`, ordered by hash.
    fn find_by_height(&self, height: u64) -> Result<Vec<BlockRecord>, StoreError>;

    /// Up to `limit` records, highest first. Records sharing a height are
    /// ordered by hash.
    fn recent_blocks(&self, limit: usize) -> Result<Vec<BlockRecord>, StoreError>;

    /// Total number of records in the store.
    fn block_count(&self) -> Result<u64, StoreError>;
}
