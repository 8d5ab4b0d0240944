//! LMDB storage backend for the ibcscan block store.
//!
//! Implements the traits from `ibcscan-store` using the `heed` LMDB bindings.
//! One environment holds three named databases:
//! - `blocks`: block hash → bincode [`BlockRecord`](ibcscan_types::BlockRecord).
//!   The primary table; its key enforces hash uniqueness.
//! - `block_heights`: `(u64::MAX - height)_be(8) ++ hash` → empty. Big-endian
//!   keys sort ascending, so the first entry is the highest block.
//! - `meta`: schema version and the height-index-ready marker.

pub mod block;
pub mod environment;
pub mod error;
pub mod height_index;
pub mod integrity;
pub mod meta;
pub mod migration;
pub mod write_batch;

pub use block::LmdbBlockStore;
pub use environment::{LmdbEnvironment, StoreConfig};
pub use error::LmdbError;
pub use integrity::{check_integrity, IntegrityReport};
pub use meta::LmdbMetaStore;
pub use write_batch::WriteBatch;
