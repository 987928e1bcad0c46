//! RecordStore Storage - record version payloads
//!
//! Every accepted write produces one immutable payload addressed by its
//! version path (`{kind}/{id}/{version}`). This crate defines the blob
//! store contract and provides:
//! - An in-memory store (tests, dry runs)
//! - A redb-backed store holding JSON-encoded payloads

pub mod blob;
pub mod memory;
pub mod redb_store;
pub mod tables;

// Re-exports
pub use blob::BlobStore;
pub use memory::InMemoryBlobStore;
pub use redb_store::{BlobStoreError, RedbBlobStore};
