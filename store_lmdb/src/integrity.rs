//! LMDB database integrity checks.
//!
//! Run on demand (`ibcscan check`) to detect corruption: unreadable tables,
//! records that no longer decode, and height index rows that disagree with
//! the records they point at.

use std::path::Path;

use heed::types::Bytes;
use ibcscan_types::BlockRecord;

use crate::environment::{LmdbEnvironment, BLOCKS_DB, HEIGHTS_DB, META_DB};
use crate::height_index::decode_height_key;
use crate::LmdbError;

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub records: u64,
    pub index_entries: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Database names that we expect to exist in a valid block store.
const EXPECTED_DATABASES: &[&str] = &[BLOCKS_DB, HEIGHTS_DB, META_DB];

/// Check database integrity.
///
/// Opens each expected database and counts entries, decodes every record,
/// and resolves every height index row. Problems are recorded in the report
/// rather than causing a hard error.
pub fn check_integrity(env: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    let rtxn = env.env().read_txn()?;

    for &db_name in EXPECTED_DATABASES {
        match env.env().open_database::<Bytes, Bytes>(&rtxn, Some(db_name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{}': {}", db_name, e)),
                }
            }
            Ok(None) => report
                .errors
                .push(format!("database '{}' is missing", db_name)),
            Err(e) => report
                .errors
                .push(format!("failed to open database '{}': {}", db_name, e)),
        }
    }

    for entry in env.blocks_db.iter(&rtxn)? {
        let (key, value) = entry?;
        report.records += 1;
        match bincode::deserialize::<BlockRecord>(value) {
            Ok(record) if record.hash.as_bytes() != key => report.errors.push(format!(
                "record stored under '{}' carries hash '{}'",
                String::from_utf8_lossy(key),
                record.hash
            )),
            Ok(_) => {}
            Err(e) => report.errors.push(format!(
                "record '{}' does not decode: {}",
                String::from_utf8_lossy(key),
                e
            )),
        }
    }

    for entry in env.heights_db.iter(&rtxn)? {
        let (key, _) = entry?;
        report.index_entries += 1;
        let (height, hash) = match decode_height_key(key) {
            Ok(parts) => parts,
            Err(e) => {
                report.errors.push(e.to_string());
                continue;
            }
        };
        match env.blocks_db.get(&rtxn, hash)? {
            Some(value) => match bincode::deserialize::<BlockRecord>(value) {
                Ok(record) if record.height != height => report.errors.push(format!(
                    "height index puts '{}' at {} but the record says {}",
                    record.hash, height, record.height
                )),
                // Undecodable records were reported above.
                _ => {}
            },
            None => report.errors.push(format!(
                "height index row at {} references missing block '{}'",
                height,
                String::from_utf8_lossy(hash)
            )),
        }
    }

    if env.is_height_index_ready() && report.index_entries != report.records {
        report.errors.push(format!(
            "height index has {} rows for {} records",
            report.index_entries, report.records
        ));
    }

    Ok(report)
}

/// Check if the data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent or empty) directory. Returns an
/// error if the path is a file, or a non-empty directory without `data.mdb`,
/// which suggests a wrong path or a damaged store.
pub fn check_data_dir(path: &Path) -> Result<(), LmdbError> {
    if !path.exists() {
        return Ok(());
    }
    if !path.is_dir() {
        return Err(LmdbError::DataDir(format!(
            "{} is not a directory",
            path.display()
        )));
    }
    if path.join("data.mdb").exists() {
        return Ok(());
    }
    if std::fs::read_dir(path)?.next().is_none() {
        return Ok(());
    }
    Err(LmdbError::DataDir(format!(
        "directory is not empty but data.mdb is missing at {}",
        path.display()
    )))
}
