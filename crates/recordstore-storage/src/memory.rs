//! In-memory blob store

use async_trait::async_trait;
use parking_lot::RwLock;
use recordstore_common::{Error, RecordData, RecordMetadata, RecordProcessing, Result};
use std::collections::HashMap;

use crate::blob::BlobStore;

/// Process-local version payloads keyed by version path
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    versions: RwLock<HashMap<String, RecordData>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored versions
    pub fn len(&self) -> usize {
        self.versions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.read().is_empty()
    }

    /// Check whether a version path is stored
    pub fn contains(&self, version_path: &str) -> bool {
        self.versions.read().contains_key(version_path)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write(&self, record: &RecordProcessing) -> Result<()> {
        let path = record.metadata.latest_version_path().ok_or_else(|| {
            Error::persistence(format!("record '{}' has no version path", record.metadata.id))
        })?;
        self.versions
            .write()
            .insert(path.to_string(), record.data.clone());
        Ok(())
    }

    async fn read(&self, version_path: &str) -> Result<Option<RecordData>> {
        Ok(self.versions.read().get(version_path).cloned())
    }

    async fn delete(&self, metadata: &RecordMetadata) -> Result<()> {
        let mut versions = self.versions.write();
        for path in &metadata.version_paths {
            versions.remove(path);
        }
        Ok(())
    }

    async fn delete_version(&self, metadata: &RecordMetadata, version: u64) -> Result<()> {
        self.versions.write().remove(&metadata.version_path(version));
        Ok(())
    }
}
