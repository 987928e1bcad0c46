//! Batch persistence
//!
//! Writes version payloads first and metadata second, so metadata never
//! points at a payload that was not written. If the metadata write fails
//! the freshly written versions are discarded again.

use recordstore_common::{Error, RecordMetadata, RecordProcessing, Result, TransferInfo};
use recordstore_meta_store::MetadataRepository;
use std::sync::Arc;
use tracing::{debug, error};

use crate::versions::VersionStorage;

pub struct PersistenceService {
    repository: Arc<dyn MetadataRepository>,
    storage: VersionStorage,
}

impl PersistenceService {
    pub fn new(repository: Arc<dyn MetadataRepository>, storage: VersionStorage) -> Self {
        Self {
            repository,
            storage,
        }
    }

    /// Persist one ingestion batch; returns the stored metadata
    pub async fn persist_record_batch(
        &self,
        transfer: &TransferInfo,
        records: &[RecordProcessing],
    ) -> Result<Vec<RecordMetadata>> {
        if let Err(e) = self.storage.write(records).await {
            error!(version = transfer.version, "Failed to write record versions: {}", e);
            self.storage.discard_latest(records).await;
            return Err(into_persistence(e));
        }

        let metadata: Vec<RecordMetadata> = records.iter().map(|r| r.metadata.clone()).collect();
        match self.repository.create_or_update(metadata).await {
            Ok(stored) => {
                debug!(
                    version = transfer.version,
                    count = stored.len(),
                    "Persisted record batch"
                );
                Ok(stored)
            }
            Err(e) => {
                error!(version = transfer.version, "Failed to write record metadata: {}", e);
                self.storage.discard_latest(records).await;
                Err(into_persistence(e))
            }
        }
    }
}

fn into_persistence(e: Error) -> Error {
    match e {
        Error::PersistenceFailure(_) => e,
        other => Error::persistence(other.to_string()),
    }
}
