//! Nullable infrastructure for deterministic testing.
//!
//! Storage is abstracted behind the `ibcscan-store` traits. This crate
//! provides an implementation that:
//! - Behaves like the real store (uniqueness, ordering, "not found" as `None`)
//! - Can be seeded and inspected programmatically
//! - Never touches the filesystem
//!
//! Usage: swap the LMDB store for a nullable in tests of readers and ingesters.

pub mod store;

pub use store::NullBlockStore;
