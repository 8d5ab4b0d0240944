//! LMDB environment setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use ibcscan_store::{MetaStore, StoreError};

use crate::block::LmdbBlockStore;
use crate::height_index::{HeightIndexBuilder, HeightIndexState, HEIGHT_INDEX_READY_KEY};
use crate::integrity::check_data_dir;
use crate::meta::LmdbMetaStore;
use crate::migration::Migrator;
use crate::write_batch::WriteBatch;
use crate::LmdbError;

pub const BLOCKS_DB: &str = "blocks";
pub const HEIGHTS_DB: &str = "block_heights";
pub const META_DB: &str = "meta";

/// Tuning for [`LmdbEnvironment::open`].
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Maximum size of the memory map, in bytes. Bounds the database size.
    pub map_size: usize,
    /// Maximum number of named databases.
    pub max_dbs: u32,
    /// Rebuild a missing height index on a background thread instead of
    /// during `open`.
    pub background_index: bool,
}

impl StoreConfig {
    /// Small map and a synchronous index build, for temp-dir tests.
    pub fn for_tests() -> Self {
        Self {
            map_size: 16 * 1024 * 1024,
            max_dbs: 8,
            background_index: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            map_size: 1 << 30,
            max_dbs: 8,
            background_index: true,
        }
    }
}

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    path: PathBuf,
    pub(crate) blocks_db: Database<Bytes, Bytes>,
    pub(crate) heights_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
    pub(crate) height_index: Arc<HeightIndexState>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    ///
    /// Runs schema migrations, then makes sure the height index covers every
    /// record. A missing index is rebuilt in the background when
    /// `config.background_index` is set; the store is usable meanwhile.
    pub fn open(path: &Path, config: &StoreConfig) -> Result<Self, LmdbError> {
        check_data_dir(path)?;
        std::fs::create_dir_all(path)?;

        let mut options = EnvOpenOptions::new();
        options.map_size(config.map_size).max_dbs(config.max_dbs);
        // SAFETY: each data directory is opened by one environment per
        // process, and the files are not modified by other means.
        let env = unsafe { options.open(path) }?;

        let mut wtxn = env.write_txn()?;
        let blocks_db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some(BLOCKS_DB))?;
        let heights_db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some(HEIGHTS_DB))?;
        let meta_db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        let environment = Self {
            env: Arc::new(env),
            path: path.to_path_buf(),
            blocks_db,
            heights_db,
            meta_db,
            height_index: Arc::new(HeightIndexState::default()),
        };

        Migrator::run(&environment.meta_store())?;
        environment.prepare_height_index(config.background_index)?;

        tracing::info!(
            path = %path.display(),
            height_index_ready = environment.is_height_index_ready(),
            "block store opened"
        );
        Ok(environment)
    }

    fn prepare_height_index(&self, background: bool) -> Result<(), LmdbError> {
        let meta = self.meta_store();
        let marked = meta
            .get_meta(HEIGHT_INDEX_READY_KEY)
            .map_err(|e| LmdbError::Index(e.to_string()))?
            .is_some();
        if marked {
            self.height_index.mark_ready();
            return Ok(());
        }

        let records = {
            let rtxn = self.env.read_txn()?;
            self.blocks_db.len(&rtxn)?
        };
        if records == 0 {
            meta.put_meta(HEIGHT_INDEX_READY_KEY, &[1])
                .map_err(|e| LmdbError::Index(e.to_string()))?;
            self.height_index.mark_ready();
            return Ok(());
        }

        let builder = HeightIndexBuilder {
            env: Arc::clone(&self.env),
            blocks_db: self.blocks_db,
            heights_db: self.heights_db,
            meta_db: self.meta_db,
        };
        if background {
            tracing::info!(records, "height index incomplete, rebuilding in background");
            builder.spawn(Arc::clone(&self.height_index))
        } else {
            tracing::info!(records, "height index incomplete, rebuilding");
            builder.rebuild()?;
            self.height_index.mark_ready();
            Ok(())
        }
    }

    /// Whether height queries are served by the index (rather than a scan).
    pub fn is_height_index_ready(&self) -> bool {
        self.height_index.is_ready()
    }

    /// Block until a background index rebuild has finished.
    ///
    /// Returns immediately if the index is already ready. Fails if the
    /// rebuild failed; height queries then keep using the scan fallback.
    pub fn wait_for_height_index(&self) -> Result<(), StoreError> {
        self.height_index.join_builder()?;
        if self.height_index.is_ready() {
            Ok(())
        } else {
            Err(LmdbError::Index("height index is not available".into()).into())
        }
    }

    pub fn block_store(&self) -> LmdbBlockStore {
        LmdbBlockStore {
            env: Arc::clone(&self.env),
            blocks_db: self.blocks_db,
            heights_db: self.heights_db,
            height_index: Arc::clone(&self.height_index),
        }
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }

    /// Begin a write batch that inserts many records in one transaction.
    pub fn write_batch(&self) -> Result<WriteBatch<'_>, StoreError> {
        WriteBatch::new(self)
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
