//! Batch access to version payloads
//!
//! Fans per-record blob store calls out over the shared worker pool and
//! merges the results by record id before returning.

use recordstore_common::{RecordData, RecordMetadata, RecordProcessing, Result};
use recordstore_storage::BlobStore;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

use crate::pool::WorkerPool;

#[derive(Clone)]
pub struct VersionStorage {
    store: Arc<dyn BlobStore>,
    pool: WorkerPool,
}

impl VersionStorage {
    pub fn new(store: Arc<dyn BlobStore>, pool: WorkerPool) -> Self {
        Self { store, pool }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Write the newest version of every record
    pub async fn write(&self, records: &[RecordProcessing]) -> Result<()> {
        let store = &self.store;
        self.pool
            .try_map(records, |record| async move {
                store.write(record).await?;
                Ok((record.metadata.id.clone(), ()))
            })
            .await?;
        Ok(())
    }

    /// Read payloads by record id -> version path; missing payloads are left out
    pub async fn read(&self, paths: &HashMap<String, String>) -> Result<BTreeMap<String, RecordData>> {
        let store = &self.store;
        let found = self
            .pool
            .try_map(paths, |(id, path)| async move {
                Ok((id.clone(), store.read(path).await?))
            })
            .await?;
        Ok(found
            .into_iter()
            .filter_map(|(id, data)| data.map(|d| (id, d)))
            .collect())
    }

    /// Hash of each record's newest stored version; records without one are left out
    pub async fn get_hash(&self, records: &[RecordMetadata]) -> Result<BTreeMap<String, String>> {
        let store = &self.store;
        let hashes = self
            .pool
            .try_map(records, |metadata| async move {
                Ok((metadata.id.clone(), store.get_hash(metadata).await?))
            })
            .await?;
        Ok(hashes
            .into_iter()
            .filter_map(|(id, hash)| hash.map(|h| (id, h)))
            .collect())
    }

    /// Delete every version of a record
    pub async fn delete(&self, metadata: &RecordMetadata) -> Result<()> {
        self.store.delete(metadata).await
    }

    /// Delete one version of a record
    pub async fn delete_version(&self, metadata: &RecordMetadata, version: u64) -> Result<()> {
        self.store.delete_version(metadata, version).await
    }

    /// Best-effort removal of the newest version of each record
    pub async fn discard_latest(&self, records: &[RecordProcessing]) {
        for record in records {
            let Some(version) = record.metadata.latest_version() else {
                continue;
            };
            if let Err(e) = self.delete_version(&record.metadata, version).await {
                warn!(
                    record_id = %record.metadata.id,
                    version,
                    "Failed to discard version: {}",
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordstore_common::{OperationType, record_hash};
    use recordstore_storage::InMemoryBlobStore;
    use serde_json::json;

    fn processing(id: &str, version: u64) -> RecordProcessing {
        let mut metadata = RecordMetadata {
            id: id.to_string(),
            kind: "tenant1:wks:well:1.0.0".to_string(),
            ..RecordMetadata::default()
        };
        metadata.add_version_path(version);
        let mut data = RecordData::default();
        data.data.insert("id".into(), json!(id));
        RecordProcessing {
            data,
            metadata,
            operation: OperationType::Create,
        }
    }

    #[tokio::test]
    async fn test_write_read_and_hash() {
        let store = Arc::new(InMemoryBlobStore::new());
        let storage = VersionStorage::new(store.clone(), WorkerPool::new(2));
        let records: Vec<_> = (0..5).map(|i| processing(&format!("tenant1:r{i}"), 1)).collect();

        storage.write(&records).await.unwrap();
        assert_eq!(store.len(), 5);

        let mut paths: HashMap<String, String> = records
            .iter()
            .map(|r| (r.metadata.id.clone(), r.metadata.latest_version_path().unwrap().to_string()))
            .collect();
        paths.insert("tenant1:missing".into(), "tenant1:wks:well:1.0.0/tenant1:missing/1".into());
        let read = storage.read(&paths).await.unwrap();
        assert_eq!(read.len(), 5);
        assert_eq!(read["tenant1:r3"], records[3].data);

        let metadata: Vec<_> = records.iter().map(|r| r.metadata.clone()).collect();
        let hashes = storage.get_hash(&metadata).await.unwrap();
        assert_eq!(hashes["tenant1:r0"], record_hash(&records[0].data).unwrap());
    }

    #[tokio::test]
    async fn test_discard_latest() {
        let store = Arc::new(InMemoryBlobStore::new());
        let storage = VersionStorage::new(store.clone(), WorkerPool::new(2));
        let records = vec![processing("tenant1:a", 7)];
        storage.write(&records).await.unwrap();

        storage.discard_latest(&records).await;
        assert!(store.is_empty());
    }
}
