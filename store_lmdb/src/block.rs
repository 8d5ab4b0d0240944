//! LMDB implementation of BlockRecordStore.

use std::cmp::Reverse;
use std::ops::Bound;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn, RwTxn};

use ibcscan_store::{validate_record, BlockRecordStore, StoreError};
use ibcscan_types::{BlockHash, BlockRecord};

use crate::height_index::{self, HeightIndexState};
use crate::LmdbError;

#[derive(Clone)]
pub struct LmdbBlockStore {
    pub(crate) env: Arc<Env>,
    pub(crate) blocks_db: Database<Bytes, Bytes>,
    pub(crate) heights_db: Database<Bytes, Bytes>,
    pub(crate) height_index: Arc<HeightIndexState>,
}

/// Write a record and its height row inside `wtxn`.
///
/// Validation and the duplicate check run before anything is written, so a
/// rejected record leaves the transaction untouched.
pub(crate) fn put_record(
    blocks_db: &Database<Bytes, Bytes>,
    heights_db: &Database<Bytes, Bytes>,
    wtxn: &mut RwTxn<'_>,
    record: &BlockRecord,
) -> Result<(), StoreError> {
    validate_record(record)?;
    let key = record.hash.as_bytes();
    if blocks_db.get(wtxn, key).map_err(LmdbError::from)?.is_some() {
        tracing::debug!(hash = %record.hash, height = record.height, "rejected duplicate block");
        return Err(StoreError::Duplicate(record.hash.to_string()));
    }

    let value = bincode::serialize(record).map_err(LmdbError::from)?;
    blocks_db
        .put(wtxn, key, &value)
        .map_err(LmdbError::from)?;
    heights_db
        .put(wtxn, &height_index::height_key(record.height, &record.hash), &[])
        .map_err(LmdbError::from)?;
    Ok(())
}

fn decode_record(bytes: &[u8]) -> Result<BlockRecord, LmdbError> {
    Ok(bincode::deserialize(bytes)?)
}

impl LmdbBlockStore {
    /// Load the record an index row points at. A dangling row is corruption.
    fn load_indexed(&self, rtxn: &RoTxn<'_>, hash: &[u8]) -> Result<BlockRecord, LmdbError> {
        let bytes = self.blocks_db.get(rtxn, hash)?.ok_or_else(|| {
            LmdbError::Corruption(format!(
                "height index references missing block {}",
                String::from_utf8_lossy(hash)
            ))
        })?;
        decode_record(bytes)
    }

    /// Every record in index order: height descending, then hash ascending.
    /// Used while the height index is being rebuilt.
    fn scan_sorted(&self, rtxn: &RoTxn<'_>) -> Result<Vec<BlockRecord>, LmdbError> {
        let mut records = Vec::new();
        for entry in self.blocks_db.iter(rtxn)? {
            let (_, value) = entry?;
            records.push(decode_record(value)?);
        }
        records.sort_by(|a, b| {
            (Reverse(a.height), a.hash.as_bytes()).cmp(&(Reverse(b.height), b.hash.as_bytes()))
        });
        Ok(records)
    }

    fn scan_latest(&self, rtxn: &RoTxn<'_>) -> Result<Option<BlockRecord>, LmdbError> {
        let mut latest: Option<BlockRecord> = None;
        for entry in self.blocks_db.iter(rtxn)? {
            let (_, value) = entry?;
            let record = decode_record(value)?;
            let replaces = match &latest {
                None => true,
                Some(current) => {
                    record.height > current.height
                        || (record.height == current.height
                            && record.hash.as_bytes() < current.hash.as_bytes())
                }
            };
            if replaces {
                latest = Some(record);
            }
        }
        Ok(latest)
    }
}

impl BlockRecordStore for LmdbBlockStore {
    fn insert(&self, record: &BlockRecord) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        put_record(&self.blocks_db, &self.heights_db, &mut wtxn, record)?;
        wtxn.commit().map_err(LmdbError::from)?;
        tracing::trace!(hash = %record.hash, height = record.height, "block stored");
        Ok(())
    }

    fn find_latest_block(&self) -> Result<Option<BlockRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        if !self.height_index.is_ready() {
            return Ok(self.scan_latest(&rtxn)?);
        }
        let first = self.heights_db.first(&rtxn).map_err(LmdbError::from)?;
        match first {
            Some((key, _)) => {
                let (_, hash) = height_index::decode_height_key(key)?;
                Ok(Some(self.load_indexed(&rtxn, hash)?))
            }
            None => Ok(None),
        }
    }

    fn find_by_hash(&self, hash: &BlockHash) -> Result<Option<BlockRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .blocks_db
            .get(&rtxn, hash.as_bytes())
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => Ok(Some(decode_record(bytes)?)),
            None => Ok(None),
        }
    }

    fn contains_hash(&self, hash: &BlockHash) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .blocks_db
            .get(&rtxn, hash.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(val.is_some())
    }

    fn find_by_height(&self, height: u64) -> Result<Vec<BlockRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        if !self.height_index.is_ready() {
            let mut records = self.scan_sorted(&rtxn)?;
            records.retain(|r| r.height == height);
            return Ok(records);
        }

        let (lower, upper) = height_index::height_range(height);
        let bounds = (
            Bound::Included(&lower[..]),
            upper.as_ref().map_or(Bound::Unbounded, |u| Bound::Excluded(&u[..])),
        );
        let iter = self
            .heights_db
            .range(&rtxn, &bounds)
            .map_err(LmdbError::from)?;
        let mut records = Vec::new();
        for result in iter {
            let (key, _) = result.map_err(LmdbError::from)?;
            let (_, hash) = height_index::decode_height_key(key)?;
            records.push(self.load_indexed(&rtxn, hash)?);
        }
        Ok(records)
    }

    fn recent_blocks(&self, limit: usize) -> Result<Vec<BlockRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        if !self.height_index.is_ready() {
            let mut records = self.scan_sorted(&rtxn)?;
            records.truncate(limit);
            return Ok(records);
        }

        let iter = self.heights_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut records = Vec::with_capacity(limit.min(1024));
        for result in iter.take(limit) {
            let (key, _) = result.map_err(LmdbError::from)?;
            let (_, hash) = height_index::decode_height_key(key)?;
            records.push(self.load_indexed(&rtxn, hash)?);
        }
        Ok(records)
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let count = self.blocks_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}
