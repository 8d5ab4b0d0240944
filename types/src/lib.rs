//! Record types for the ibcscan block store.
//!
//! These are the value types shared by the storage traits, the storage
//! backends and the command-line daemon.

pub mod block;
pub mod time;

pub use block::{BlockHash, BlockRecord};
pub use time::Timestamp;
