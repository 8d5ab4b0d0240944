//! Descending height index.
//!
//! Key layout: `(u64::MAX - height)_be(8) ++ hash` → empty. Inverting the
//! height turns LMDB's ascending key order into descending height order:
//! the latest block is the first key and `recent_blocks` is a forward scan.
//! Rows sharing a height sort by hash bytes.
//!
//! The index can be rebuilt from `blocks` on a background thread. Until the
//! rebuild commits, height queries fall back to scanning `blocks`, so they
//! are slow but never stale.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use heed::types::Bytes;
use heed::{Database, Env};

use ibcscan_types::{BlockHash, BlockRecord};

use crate::LmdbError;

/// Meta key present once every record has a height index row.
pub const HEIGHT_INDEX_READY_KEY: &str = "height_index_ready";

/// Rows written per write transaction during a rebuild, so that inserts
/// interleave with the rebuild instead of queueing behind one huge commit.
const REBUILD_BATCH: usize = 10_000;

const HEIGHT_PREFIX_LEN: usize = 8;

/// LMDB's default `mdb_env_get_maxkeysize`.
const LMDB_MAX_KEY_SIZE: usize = 511;

const _: () = assert!(HEIGHT_PREFIX_LEN + ibcscan_store::MAX_HASH_LEN <= LMDB_MAX_KEY_SIZE);

fn height_prefix(height: u64) -> [u8; HEIGHT_PREFIX_LEN] {
    (u64::MAX - height).to_be_bytes()
}

/// Build the index key for a record.
pub fn height_key(height: u64, hash: &BlockHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(HEIGHT_PREFIX_LEN + hash.as_bytes().len());
    key.extend_from_slice(&height_prefix(height));
    key.extend_from_slice(hash.as_bytes());
    key
}

/// Split an index key into `(height, hash bytes)`.
pub fn decode_height_key(key: &[u8]) -> Result<(u64, &[u8]), LmdbError> {
    if key.len() <= HEIGHT_PREFIX_LEN {
        return Err(LmdbError::Corruption(format!(
            "height index key too short ({} bytes)",
            key.len()
        )));
    }
    let (prefix, hash) = key.split_at(HEIGHT_PREFIX_LEN);
    let mut buf = [0u8; HEIGHT_PREFIX_LEN];
    buf.copy_from_slice(prefix);
    Ok((u64::MAX - u64::from_be_bytes(buf), hash))
}

/// Inclusive lower and exclusive upper key prefix for all rows at `height`.
///
/// Height 0 has the largest prefix, so its range is unbounded above.
pub(crate) fn height_range(height: u64) -> ([u8; HEIGHT_PREFIX_LEN], Option<[u8; HEIGHT_PREFIX_LEN]>) {
    let upper = height.checked_sub(1).map(height_prefix);
    (height_prefix(height), upper)
}

/// Shared readiness flag plus the handle of a running rebuild.
#[derive(Default)]
pub(crate) struct HeightIndexState {
    ready: AtomicBool,
    builder: Mutex<Option<JoinHandle<Result<u64, LmdbError>>>>,
}

impl HeightIndexState {
    pub(crate) fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub(crate) fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn mark_building(&self) {
        self.ready.store(false, Ordering::Release);
    }

    fn set_builder(&self, handle: JoinHandle<Result<u64, LmdbError>>) -> Result<(), LmdbError> {
        let mut slot = self
            .builder
            .lock()
            .map_err(|_| LmdbError::Index("builder handle lock poisoned".into()))?;
        *slot = Some(handle);
        Ok(())
    }

    /// Block until a running rebuild finishes. Returns the rows written, or
    /// `None` if no rebuild was running.
    pub(crate) fn join_builder(&self) -> Result<Option<u64>, LmdbError> {
        let handle = self
            .builder
            .lock()
            .map_err(|_| LmdbError::Index("builder handle lock poisoned".into()))?
            .take();
        match handle {
            Some(handle) => {
                let rows = handle
                    .join()
                    .map_err(|_| LmdbError::Index("height index builder panicked".into()))??;
                Ok(Some(rows))
            }
            None => Ok(None),
        }
    }
}

/// Repopulates `block_heights` from `blocks`.
pub(crate) struct HeightIndexBuilder {
    pub(crate) env: Arc<Env>,
    pub(crate) blocks_db: Database<Bytes, Bytes>,
    pub(crate) heights_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl HeightIndexBuilder {
    /// Rebuild on the calling thread, then set the ready marker.
    ///
    /// Rows come from a read snapshot. Records inserted after the snapshot
    /// write their own rows, so the index is complete once this returns.
    pub(crate) fn rebuild(&self) -> Result<u64, LmdbError> {
        let started = Instant::now();
        let keys = self.snapshot_keys()?;

        for chunk in keys.chunks(REBUILD_BATCH) {
            let mut wtxn = self.env.write_txn()?;
            for key in chunk {
                self.heights_db.put(&mut wtxn, key, &[])?;
            }
            wtxn.commit()?;
            tracing::debug!(rows = chunk.len(), "height index batch committed");
        }

        let mut wtxn = self.env.write_txn()?;
        self.meta_db
            .put(&mut wtxn, HEIGHT_INDEX_READY_KEY.as_bytes(), &[1])?;
        wtxn.commit()?;

        let rows = keys.len() as u64;
        tracing::info!(
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "height index rebuilt"
        );
        Ok(rows)
    }

    /// Rebuild on a named background thread; `state` turns ready on success.
    pub(crate) fn spawn(self, state: Arc<HeightIndexState>) -> Result<(), LmdbError> {
        let builder_state = Arc::clone(&state);
        let handle = std::thread::Builder::new()
            .name("height-index".into())
            .spawn(move || {
                let result = self.rebuild();
                match &result {
                    Ok(_) => builder_state.mark_ready(),
                    Err(e) => tracing::error!(
                        error = %e,
                        "height index rebuild failed, height queries keep scanning"
                    ),
                }
                result
            })?;
        state.set_builder(handle)
    }

    fn snapshot_keys(&self) -> Result<Vec<Vec<u8>>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        let mut keys = Vec::with_capacity(self.blocks_db.len(&rtxn)? as usize);
        for entry in self.blocks_db.iter(&rtxn)? {
            let (_, value) = entry?;
            let record: BlockRecord = bincode::deserialize(value)?;
            keys.push(height_key(record.height, &record.hash));
        }
        Ok(keys)
    }
}
