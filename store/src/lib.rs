//! Abstract storage traits for the ibcscan block store.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. Readers and ingesters depend only on the traits.

pub mod block;
pub mod error;
pub mod meta;
pub mod timeout;

pub use block::{validate_record, BlockRecordStore, MAX_HASH_LEN};
pub use error::StoreError;
pub use meta::MetaStore;
pub use timeout::AsyncBlockStore;
