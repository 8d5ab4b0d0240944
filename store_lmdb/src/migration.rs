//! Database schema migration engine.
//!
//! Tracks a monotonically increasing schema version in the meta store and
//! runs sequential migration functions to bring an older database up to date.
//!
//! - v1: `blocks` only.
//! - v2: adds the descending `block_heights` index.

use ibcscan_store::MetaStore;

use crate::height_index::HEIGHT_INDEX_READY_KEY;
use crate::LmdbError;

/// The schema version that the current code expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Runs database migrations to bring the schema up to date.
pub struct Migrator;

impl Migrator {
    /// Check the stored schema version and run any needed migrations.
    ///
    /// - Version 0 means a fresh database (no version stored yet).
    /// - If the stored version matches `CURRENT_SCHEMA_VERSION`, this is a no-op.
    /// - If the stored version is *higher* than what this code supports,
    ///   the database was written by a newer release and we refuse to open it.
    pub fn run(meta_store: &impl MetaStore) -> Result<(), LmdbError> {
        let current = meta_store
            .get_schema_version()
            .map_err(|e| LmdbError::Schema(e.to_string()))?;

        if current == CURRENT_SCHEMA_VERSION {
            tracing::debug!(version = current, "database schema is up to date");
            return Ok(());
        }

        if current > CURRENT_SCHEMA_VERSION {
            return Err(LmdbError::Schema(format!(
                "database schema version {} is newer than supported version {}",
                current, CURRENT_SCHEMA_VERSION
            )));
        }

        for version in current..CURRENT_SCHEMA_VERSION {
            tracing::info!(from = version, to = version + 1, "running migration");
            run_migration(meta_store, version, version + 1)?;
        }

        meta_store
            .set_schema_version(CURRENT_SCHEMA_VERSION)
            .map_err(|e| LmdbError::Schema(e.to_string()))?;

        tracing::info!(version = CURRENT_SCHEMA_VERSION, "migration complete");
        Ok(())
    }
}

fn run_migration(meta_store: &impl MetaStore, from: u32, to: u32) -> Result<(), LmdbError> {
    match (from, to) {
        // Blank slate.
        (0, 1) => Ok(()),
        // v1 databases have records but no height rows. Clearing the marker
        // makes the environment rebuild the index when it opens.
        (1, 2) => meta_store
            .delete_meta(HEIGHT_INDEX_READY_KEY)
            .map_err(|e| LmdbError::Schema(e.to_string())),
        _ => Err(LmdbError::Schema(format!(
            "unknown migration: {} -> {}",
            from, to
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LmdbEnvironment, StoreConfig};

    fn open_meta() -> (tempfile::TempDir, crate::LmdbMetaStore) {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), &StoreConfig::for_tests()).unwrap();
        (dir, env.meta_store())
    }

    #[test]
    fn unknown_migration_is_error() {
        let (_dir, meta) = open_meta();
        assert!(run_migration(&meta, 99, 100).is_err());
    }

    #[test]
    fn fresh_database_is_stamped_current() {
        let (_dir, meta) = open_meta();
        assert_eq!(meta.get_schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn v1_upgrade_clears_index_marker() {
        let (_dir, meta) = open_meta();
        meta.set_schema_version(1).unwrap();
        meta.put_meta(HEIGHT_INDEX_READY_KEY, &[1]).unwrap();

        Migrator::run(&meta).unwrap();

        assert_eq!(meta.get_schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
        assert_eq!(meta.get_meta(HEIGHT_INDEX_READY_KEY).unwrap(), None);
    }

    #[test]
    fn newer_schema_is_refused() {
        let (_dir, meta) = open_meta();
        meta.set_schema_version(CURRENT_SCHEMA_VERSION + 1).unwrap();

        let err = Migrator::run(&meta).unwrap_err();
        assert!(matches!(err, LmdbError::Schema(_)));
    }
}
