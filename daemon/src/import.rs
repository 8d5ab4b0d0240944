//! Bulk loading of newline-delimited JSON block records.
//!
//! Each non-blank line is one record document. Records are written in
//! batches of `batch_size` per write transaction. Hashes already in the
//! store are counted and skipped, so re-running an import is harmless.
//! Any other failure stops the import; batches committed before it stay.

use std::io::BufRead;

use ibcscan_store::StoreError;
use ibcscan_store_lmdb::LmdbEnvironment;
use ibcscan_types::BlockRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("line {line}: read failed: {source}")]
    Io {
        line: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: not a block record: {source}")]
    Parse {
        line: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: {source}")]
    Store {
        line: u64,
        #[source]
        source: StoreError,
    },
}

/// Outcome of a completed import.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: u64,
    pub duplicates: u64,
}

pub fn import_records(
    env: &LmdbEnvironment,
    reader: impl BufRead,
    batch_size: usize,
) -> Result<ImportSummary, ImportError> {
    let mut summary = ImportSummary::default();
    let mut batch = env
        .write_batch()
        .map_err(|source| ImportError::Store { line: 0, source })?;
    let mut line_no = 0u64;

    for line in reader.lines() {
        line_no += 1;
        let line = line.map_err(|source| ImportError::Io {
            line: line_no,
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let record: BlockRecord = serde_json::from_str(&line).map_err(|source| ImportError::Parse {
            line: line_no,
            source,
        })?;
        match batch.insert(&record) {
            Ok(()) => {}
            Err(e) if e.is_duplicate() => {
                tracing::debug!(line = line_no, hash = %record.hash, "already stored, skipping");
                summary.duplicates += 1;
                continue;
            }
            Err(source) => {
                return Err(ImportError::Store {
                    line: line_no,
                    source,
                })
            }
        }

        if batch.len() as usize >= batch_size {
            summary.inserted += batch
                .commit()
                .map_err(|source| ImportError::Store { line: line_no, source })?;
            tracing::debug!(line = line_no, inserted = summary.inserted, "import batch committed");
            batch = env
                .write_batch()
                .map_err(|source| ImportError::Store { line: line_no, source })?;
        }
    }

    summary.inserted += batch
        .commit()
        .map_err(|source| ImportError::Store { line: line_no, source })?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibcscan_store::BlockRecordStore;
    use ibcscan_store_lmdb::StoreConfig;
    use ibcscan_types::BlockHash;
    use std::io::Cursor;

    fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().expect("temp dir");
        let env = LmdbEnvironment::open(dir.path(), &StoreConfig::for_tests()).expect("open env");
        (dir, env)
    }

    const TWO_BLOCKS: &str = r#"{"height":100,"hash":"A","txn":5,"time":1000,"proposer":"p1"}

{"height":101,"hash":"B","txn":2,"time":1010,"proposer":"p2"}
"#;

    #[test]
    fn imports_records_and_skips_blank_lines() {
        let (_dir, env) = temp_env();

        let summary = import_records(&env, Cursor::new(TWO_BLOCKS), 1).unwrap();

        assert_eq!(summary, ImportSummary { inserted: 2, duplicates: 0 });
        let latest = env.block_store().find_latest_block().unwrap().unwrap();
        assert_eq!(latest.hash, BlockHash::new("B"));
        assert_eq!(latest.proposer, "p2");
    }

    #[test]
    fn rerunning_an_import_only_counts_duplicates() {
        let (_dir, env) = temp_env();
        import_records(&env, Cursor::new(TWO_BLOCKS), 10).unwrap();

        let summary = import_records(&env, Cursor::new(TWO_BLOCKS), 10).unwrap();

        assert_eq!(summary, ImportSummary { inserted: 0, duplicates: 2 });
        assert_eq!(env.block_store().block_count().unwrap(), 2);
    }

    #[test]
    fn bad_line_reports_position_and_keeps_committed_batches() {
        let (_dir, env) = temp_env();
        let input = format!("{TWO_BLOCKS}not json\n");

        let err = import_records(&env, Cursor::new(input), 1).unwrap_err();

        assert!(matches!(err, ImportError::Parse { line: 4, .. }));
        assert_eq!(env.block_store().block_count().unwrap(), 2);
    }

    #[test]
    fn empty_hash_aborts_uncommitted_batch() {
        let (_dir, env) = temp_env();
        let input = format!("{TWO_BLOCKS}{{\"height\":102}}\n");

        let err = import_records(&env, Cursor::new(input), 100).unwrap_err();

        assert!(matches!(
            err,
            ImportError::Store { line: 4, source: StoreError::InvalidRecord(_) }
        ));
        assert_eq!(env.block_store().block_count().unwrap(), 0);
    }

    #[test]
    fn negative_time_is_a_parse_error_naming_the_value() {
        let (_dir, env) = temp_env();
        let input = r#"{"height":1,"hash":"A","txn":0,"time":-1,"proposer":"p"}"#;

        let err = import_records(&env, Cursor::new(input), 10).unwrap_err();

        assert!(matches!(err, ImportError::Parse { line: 1, .. }));
        assert!(err.to_string().contains("before the Unix epoch"), "{err}");
    }
}
