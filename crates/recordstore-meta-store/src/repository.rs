//! Metadata repository contract

use async_trait::async_trait;
use recordstore_common::{Error, RecordMetadata, Result};
use std::collections::HashMap;

/// One page of a legal tag query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegalTagPage {
    /// Cursor for the next page; `None` when exhausted
    pub cursor: Option<String>,
    pub records: Vec<RecordMetadata>,
}

/// Outcome of a revision-checked batch update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompareAndUpdate {
    /// Records written, with their new revision
    pub updated: Vec<RecordMetadata>,
    /// Ids whose stored revision changed since they were read
    pub locked: Vec<String>,
}

/// Trait for record metadata persistence
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Get metadata of one record
    async fn get(&self, id: &str) -> Result<Option<RecordMetadata>>;

    /// Get metadata of many records; absent ids are left out of the map
    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, RecordMetadata>>;

    /// Insert or overwrite records unconditionally. An overwrite bumps the
    /// stored revision; a first insert keeps the supplied one.
    async fn create_or_update(&self, records: Vec<RecordMetadata>) -> Result<Vec<RecordMetadata>>;

    /// Remove one record's metadata
    async fn delete(&self, id: &str) -> Result<()>;

    /// Page through records carrying a legal tag, ordered by id
    async fn query_by_legal_tag(
        &self,
        legal_tag: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<LegalTagPage>;

    /// Write each record only if its stored revision still equals
    /// `record.revision`; other records are reported as locked.
    async fn compare_and_update(&self, records: Vec<RecordMetadata>) -> Result<CompareAndUpdate>;
}

/// Check a stored revision against the revision the caller read
///
/// # Errors
/// Returns `Error::ConcurrentModification` if the record is gone or its
/// revision moved.
pub fn check_revision(stored: Option<&RecordMetadata>, expected: &RecordMetadata) -> Result<()> {
    match stored {
        Some(current) if current.revision == expected.revision => Ok(()),
        _ => Err(Error::ConcurrentModification(expected.id.clone())),
    }
}
