//! The block record persisted by the store.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Timestamp;

/// The content identifier of a block, as reported by the chain.
///
/// Hashes are opaque strings (usually upper-case hex). The store compares
/// them byte-for-byte and never normalises case.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockHash(String);

impl BlockHash {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// An empty hash cannot be used as a key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.0.chars().take(8).collect();
        if short.len() < self.0.len() {
            write!(f, "BlockHash({short}\u{2026})")
        } else {
            write!(f, "BlockHash({short})")
        }
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockHash {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BlockHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One finalized block observed on a chain.
///
/// Created once at ingestion time and never mutated afterwards. Fields
/// missing from an ingested document decode as their zero value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockRecord {
    /// Sequence number of the block on its chain.
    pub height: u64,
    /// Unique content identifier.
    pub hash: BlockHash,
    /// Number of transactions included in the block.
    pub txn: u64,
    /// Block production time.
    pub time: Timestamp,
    /// Identifier of the proposing validator.
    pub proposer: String,
}

impl BlockRecord {
    pub fn new(
        height: u64,
        hash: impl Into<BlockHash>,
        txn: u64,
        time: Timestamp,
        proposer: impl Into<String>,
    ) -> Self {
        Self {
            height,
            hash: hash.into(),
            txn,
            time,
            proposer: proposer.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_document_uses_flat_field_names() {
        let record = BlockRecord::new(100, "A", 5, Timestamp::new(1000), "p1");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "height": 100,
                "hash": "A",
                "txn": 5,
                "time": 1000,
                "proposer": "p1",
            })
        );
    }

    #[test]
    fn missing_fields_decode_as_zero_values() {
        let record: BlockRecord = serde_json::from_str(r#"{"height": 7, "hash": "H"}"#).unwrap();
        assert_eq!(record.height, 7);
        assert_eq!(record.hash.as_str(), "H");
        assert_eq!(record.txn, 0);
        assert_eq!(record.time, Timestamp::EPOCH);
        assert!(record.proposer.is_empty());
    }

    #[test]
    fn debug_truncates_long_hashes() {
        let hash = BlockHash::new("0123456789ABCDEF");
        assert_eq!(format!("{hash:?}"), "BlockHash(01234567\u{2026})");
        assert_eq!(format!("{:?}", BlockHash::new("AB")), "BlockHash(AB)");
    }
}
