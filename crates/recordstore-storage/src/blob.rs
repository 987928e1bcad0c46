//! Blob store contract
//!
//! Operations are per record; callers fan out across a batch with their
//! own bounded concurrency.

use async_trait::async_trait;
use recordstore_common::{RecordData, RecordMetadata, RecordProcessing, Result, record_hash};

/// Trait for version payload storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Write the payload of the newest version in `record.metadata`
    async fn write(&self, record: &RecordProcessing) -> Result<()>;

    /// Read one version payload by path
    async fn read(&self, version_path: &str) -> Result<Option<RecordData>>;

    /// Delete every version of a record
    async fn delete(&self, metadata: &RecordMetadata) -> Result<()>;

    /// Delete one version of a record
    async fn delete_version(&self, metadata: &RecordMetadata, version: u64) -> Result<()>;

    /// Hash of the newest stored version; `None` without a readable version
    async fn get_hash(&self, metadata: &RecordMetadata) -> Result<Option<String>> {
        let Some(path) = metadata.latest_version_path() else {
            return Ok(None);
        };
        match self.read(path).await? {
            Some(data) => Ok(Some(record_hash(&data)?)),
            None => Ok(None),
        }
    }
}
