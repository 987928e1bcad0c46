//! Persistent metadata repository backed by redb.
//!
//! Each record's metadata is one bincode value keyed by record id. Every
//! write is a single write transaction; revision-checked updates read and
//! compare inside the same transaction they write in.

use async_trait::async_trait;
use recordstore_common::{Error, RecordMetadata, Result};
use redb::{Database, ReadableTable};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error};

use crate::repository::{CompareAndUpdate, LegalTagPage, MetadataRepository, check_revision};
use crate::tables;

/// Error type for metadata store operations
#[derive(Debug, thiserror::Error)]
pub enum MetaStoreError {
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
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for MetaStoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<MetaStoreError> for Error {
    fn from(e: MetaStoreError) -> Self {
        Self::PersistenceFailure(format!("metadata store: {e}"))
    }
}

pub type MetaStoreResult<T> = std::result::Result<T, MetaStoreError>;

/// Metadata repository backed by a redb database file.
pub struct RedbMetadataRepository {
    db: Database,
}

impl RedbMetadataRepository {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> MetaStoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create the table eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::RECORD_METADATA)?;
        }
        write_txn.commit()?;

        debug!("Opened metadata store at {}", path.display());
        Ok(Self { db })
    }

    fn load(&self, ids: &[String]) -> MetaStoreResult<HashMap<String, RecordMetadata>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::RECORD_METADATA)?;
        let mut result = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(val) = table.get(id.as_str())? {
                result.insert(id.clone(), bincode::deserialize(val.value())?);
            }
        }
        Ok(result)
    }

    fn store(&self, records: Vec<RecordMetadata>) -> MetaStoreResult<Vec<RecordMetadata>> {
        let write_txn = self.db.begin_write()?;
        let mut written = Vec::with_capacity(records.len());
        {
            let mut table = write_txn.open_table(tables::RECORD_METADATA)?;
            for mut metadata in records {
                let previous = match table.get(metadata.id.as_str())? {
                    Some(val) => Some(bincode::deserialize::<RecordMetadata>(val.value())?.revision),
                    None => None,
                };
                if let Some(previous) = previous {
                    metadata.revision = previous.max(metadata.revision) + 1;
                }
                let bytes = bincode::serialize(&metadata)?;
                table.insert(metadata.id.as_str(), bytes.as_slice())?;
                written.push(metadata);
            }
        }
        write_txn.commit()?;
        Ok(written)
    }

    fn remove(&self, id: &str) -> MetaStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::RECORD_METADATA)?;
            table.remove(id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn scan_legal_tag(
        &self,
        legal_tag: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> MetaStoreResult<LegalTagPage> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::RECORD_METADATA)?;
        let mut page = LegalTagPage::default();
        let start = cursor.unwrap_or_default();
        for entry in table.range(start..)? {
            let entry = entry?;
            let key = entry.0.value();
            if cursor == Some(key) {
                continue;
            }
            let metadata: RecordMetadata = match bincode::deserialize(entry.1.value()) {
                Ok(m) => m,
                Err(e) => {
                    error!("Failed to decode record metadata '{}': {}", key, e);
                    continue;
                }
            };
            if !metadata.legal.legal_tags.contains(legal_tag) {
                continue;
            }
            if page.records.len() == limit {
                page.cursor = page.records.last().map(|m| m.id.clone());
                break;
            }
            page.records.push(metadata);
        }
        Ok(page)
    }

    fn compare_and_store(&self, records: Vec<RecordMetadata>) -> MetaStoreResult<CompareAndUpdate> {
        let write_txn = self.db.begin_write()?;
        let mut outcome = CompareAndUpdate::default();
        {
            let mut table = write_txn.open_table(tables::RECORD_METADATA)?;
            for mut metadata in records {
                // Read and compare, then drop the guard before mutating
                let stored = match table.get(metadata.id.as_str())? {
                    Some(val) => Some(bincode::deserialize::<RecordMetadata>(val.value())?),
                    None => None,
                };
                if check_revision(stored.as_ref(), &metadata).is_err() {
                    outcome.locked.push(metadata.id);
                    continue;
                }
                metadata.revision += 1;
                let bytes = bincode::serialize(&metadata)?;
                table.insert(metadata.id.as_str(), bytes.as_slice())?;
                outcome.updated.push(metadata);
            }
        }
        if !outcome.updated.is_empty() {
            write_txn.commit()?;
        }
        Ok(outcome)
    }
}

#[async_trait]
impl MetadataRepository for RedbMetadataRepository {
    fn name(&self) -> &str {
        "redb"
    }

    async fn get(&self, id: &str) -> Result<Option<RecordMetadata>> {
        let mut found = self.load(&[id.to_string()])?;
        Ok(found.remove(id))
    }

    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, RecordMetadata>> {
        Ok(self.load(ids)?)
    }

    async fn create_or_update(&self, records: Vec<RecordMetadata>) -> Result<Vec<RecordMetadata>> {
        Ok(self.store(records)?)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        Ok(self.remove(id)?)
    }

    async fn query_by_legal_tag(
        &self,
        legal_tag: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<LegalTagPage> {
        Ok(self.scan_legal_tag(legal_tag, limit, cursor)?)
    }

    async fn compare_and_update(&self, records: Vec<RecordMetadata>) -> Result<CompareAndUpdate> {
        Ok(self.compare_and_store(records)?)
    }
}
