//! Persistent blob store backed by redb.
//!
//! Payloads are stored as JSON so that arbitrary `data` values survive a
//! round trip with their field order intact.

use async_trait::async_trait;
use recordstore_common::{Error, RecordData, RecordMetadata, RecordProcessing, Result};
use redb::Database;
use std::path::Path;
use tracing::debug;

use crate::blob::BlobStore;
use crate::tables;

/// Error type for blob store operations
#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("record '{0}' has no version path")]
    NoVersion(String),
}

impl From<redb::TransactionError> for BlobStoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<BlobStoreError> for Error {
    fn from(e: BlobStoreError) -> Self {
        Self::PersistenceFailure(format!("blob store: {e}"))
    }
}

pub type BlobStoreResult<T> = std::result::Result<T, BlobStoreError>;

/// Blob store backed by a redb database file.
pub struct RedbBlobStore {
    db: Database,
}

impl RedbBlobStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> BlobStoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::RECORD_VERSIONS)?;
        }
        write_txn.commit()?;

        debug!("Opened blob store at {}", path.display());
        Ok(Self { db })
    }

    fn put(&self, record: &RecordProcessing) -> BlobStoreResult<()> {
        let path = record
            .metadata
            .latest_version_path()
            .ok_or_else(|| BlobStoreError::NoVersion(record.metadata.id.clone()))?;
        let bytes = serde_json::to_vec(&record.data)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::RECORD_VERSIONS)?;
            table.insert(path, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get(&self, version_path: &str) -> BlobStoreResult<Option<RecordData>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::RECORD_VERSIONS)?;
        match table.get(version_path)? {
            Some(val) => Ok(Some(serde_json::from_slice(val.value())?)),
            None => Ok(None),
        }
    }

    fn remove<'a>(&self, paths: impl IntoIterator<Item = &'a str>) -> BlobStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::RECORD_VERSIONS)?;
            for path in paths {
                table.remove(path)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for RedbBlobStore {
    fn name(&self) -> &str {
        "redb"
    }

    async fn write(&self, record: &RecordProcessing) -> Result<()> {
        Ok(self.put(record)?)
    }

    async fn read(&self, version_path: &str) -> Result<Option<RecordData>> {
        Ok(self.get(version_path)?)
    }

    async fn delete(&self, metadata: &RecordMetadata) -> Result<()> {
        Ok(self.remove(metadata.version_paths.iter().map(String::as_str))?)
    }

    async fn delete_version(&self, metadata: &RecordMetadata, version: u64) -> Result<()> {
        let path = metadata.version_path(version);
        Ok(self.remove([path.as_str()])?)
    }
}
