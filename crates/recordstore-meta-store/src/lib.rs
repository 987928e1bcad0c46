//! RecordStore Metadata Store - record metadata repository
//!
//! This crate defines the metadata repository contract and provides an
//! in-memory implementation and a persistent one backed by redb. Both
//! bump `RecordMetadata::revision` on every overwrite and support
//! revision-checked updates for optimistic locking.

pub mod memory;
pub mod repository;
pub mod store;
pub mod tables;

// Re-exports
pub use memory::InMemoryMetadataRepository;
pub use repository::{CompareAndUpdate, LegalTagPage, MetadataRepository};
pub use store::{MetaStoreError, RedbMetadataRepository};
