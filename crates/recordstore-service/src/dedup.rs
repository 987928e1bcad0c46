//! Duplicate detector
//!
//! An update whose payload hashes the same as the record's newest stored
//! version is skipped instead of written as a new version. The hash is
//! taken over the serialized `data` and `meta` in their given field
//! order, so reordering fields produces a new version. Any failure while
//! hashing aborts the ingestion rather than writing everything.

use recordstore_common::{Error, RecordData, RecordMetadata, Result, TransferInfo, record_hash};
use tracing::debug;

use crate::versions::VersionStorage;

/// An update candidate: metadata cloned from the stored record (no new
/// version appended yet) and the incoming payload.
pub type UpdateCandidate = (RecordMetadata, RecordData);

pub struct DuplicateDetector {
    storage: VersionStorage,
}

impl DuplicateDetector {
    pub fn new(storage: VersionStorage) -> Self {
        Self { storage }
    }

    /// Remove duplicates from `candidates`, recording their ids as skipped.
    ///
    /// # Errors
    /// Returns `Error::DuplicateCheckFailed` if any stored or incoming
    /// hash cannot be computed.
    pub async fn remove_duplicates(
        &self,
        transfer: &mut TransferInfo,
        candidates: Vec<UpdateCandidate>,
    ) -> Result<Vec<UpdateCandidate>> {
        let metadata: Vec<RecordMetadata> = candidates.iter().map(|(m, _)| m.clone()).collect();
        let stored = self
            .storage
            .get_hash(&metadata)
            .await
            .map_err(|e| Error::DuplicateCheckFailed(e.to_string()))?;

        let mut remaining = Vec::with_capacity(candidates.len());
        for (metadata, data) in candidates {
            let Some(previous) = stored.get(&metadata.id) else {
                remaining.push((metadata, data));
                continue;
            };
            let incoming = record_hash(&data).map_err(|e| {
                Error::DuplicateCheckFailed(format!("record '{}': {e}", metadata.id))
            })?;
            if *previous == incoming {
                debug!(record_id = %metadata.id, "Skipping duplicate record");
                transfer.skipped_records.push(metadata.id);
            } else {
                remaining.push((metadata, data));
            }
        }
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerPool;
    use crate::testkit::FaultyBlobStore;
    use recordstore_common::{OperationType, RecordProcessing};
    use recordstore_storage::{BlobStore, InMemoryBlobStore};
    use serde_json::json;
    use std::sync::Arc;

    fn stored(id: &str, fields: &[(&str, i64)]) -> (RecordMetadata, RecordData) {
        let mut metadata = RecordMetadata {
            id: id.to_string(),
            kind: "tenant1:wks:well:1.0.0".to_string(),
            ..RecordMetadata::default()
        };
        metadata.add_version_path(1);
        let mut data = RecordData::default();
        for (k, v) in fields {
            data.data.insert((*k).to_string(), json!(v));
        }
        (metadata, data)
    }

    async fn seed(store: &dyn BlobStore, records: &[(RecordMetadata, RecordData)]) {
        for (metadata, data) in records {
            store
                .write(&RecordProcessing {
                    data: data.clone(),
                    metadata: metadata.clone(),
                    operation: OperationType::Create,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_identical_payload_is_skipped() {
        let store = Arc::new(InMemoryBlobStore::new());
        let same = stored("tenant1:same", &[("a", 1), ("b", 2)]);
        let changed = stored("tenant1:changed", &[("a", 1)]);
        seed(store.as_ref(), &[same.clone(), changed.clone()]).await;

        let detector = DuplicateDetector::new(VersionStorage::new(store, WorkerPool::new(4)));
        let mut transfer = TransferInfo::new("alice", 2, 2);
        let mut changed_update = changed;
        changed_update.1.data.insert("a".into(), json!(99));

        let remaining = detector
            .remove_duplicates(&mut transfer, vec![same, changed_update])
            .await
            .unwrap();

        assert_eq!(transfer.skipped_records, vec!["tenant1:same".to_string()]);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0.id, "tenant1:changed");
    }

    #[tokio::test]
    async fn test_reordered_fields_are_not_duplicates() {
        let store = Arc::new(InMemoryBlobStore::new());
        let original = stored("tenant1:r", &[("a", 1), ("b", 2)]);
        seed(store.as_ref(), std::slice::from_ref(&original)).await;

        let detector = DuplicateDetector::new(VersionStorage::new(store, WorkerPool::new(4)));
        let mut transfer = TransferInfo::new("alice", 2, 1);
        let reordered = stored("tenant1:r", &[("b", 2), ("a", 1)]);

        let remaining = detector
            .remove_duplicates(&mut transfer, vec![reordered])
            .await
            .unwrap();
        assert!(transfer.skipped_records.is_empty());
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_previous_version_is_not_duplicate() {
        let store = Arc::new(InMemoryBlobStore::new());
        let detector = DuplicateDetector::new(VersionStorage::new(store, WorkerPool::new(4)));
        let mut transfer = TransferInfo::new("alice", 2, 1);

        let remaining = detector
            .remove_duplicates(&mut transfer, vec![stored("tenant1:r", &[("a", 1)])])
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(transfer.skipped_records.is_empty());
    }

    #[tokio::test]
    async fn test_read_failure_fails_closed() {
        let store = Arc::new(FaultyBlobStore::default());
        store.fail_reads(true);
        let detector = DuplicateDetector::new(VersionStorage::new(store, WorkerPool::new(4)));
        let mut transfer = TransferInfo::new("alice", 2, 1);

        let err = detector
            .remove_duplicates(&mut transfer, vec![stored("tenant1:r", &[("a", 1)])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateCheckFailed(_)));
        assert_eq!(err.http_status_code(), 500);
    }
}
