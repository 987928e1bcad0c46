//! In-memory metadata repository

use async_trait::async_trait;
use parking_lot::RwLock;
use recordstore_common::{RecordMetadata, Result};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use crate::repository::{CompareAndUpdate, LegalTagPage, MetadataRepository, check_revision};

/// Process-local metadata repository, ordered by record id
#[derive(Debug, Default)]
pub struct InMemoryMetadataRepository {
    records: RwLock<BTreeMap<String, RecordMetadata>>,
}

impl InMemoryMetadataRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if the repository is empty
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn put(records: &mut BTreeMap<String, RecordMetadata>, mut metadata: RecordMetadata) -> RecordMetadata {
        if let Some(previous) = records.get(&metadata.id) {
            metadata.revision = previous.revision.max(metadata.revision) + 1;
        }
        records.insert(metadata.id.clone(), metadata.clone());
        metadata
    }
}

#[async_trait]
impl MetadataRepository for InMemoryMetadataRepository {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, id: &str) -> Result<Option<RecordMetadata>> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, RecordMetadata>> {
        let records = self.records.read();
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id).map(|m| (id.clone(), m.clone())))
            .collect())
    }

    async fn create_or_update(&self, records: Vec<RecordMetadata>) -> Result<Vec<RecordMetadata>> {
        let mut stored = self.records.write();
        Ok(records.into_iter().map(|m| Self::put(&mut stored, m)).collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records.write().remove(id);
        Ok(())
    }

    async fn query_by_legal_tag(
        &self,
        legal_tag: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<LegalTagPage> {
        let records = self.records.read();
        let start = cursor.map_or(Bound::Unbounded, |c| Bound::Excluded(c.to_string()));
        let mut page = LegalTagPage::default();
        let mut matching = records
            .range((start, Bound::Unbounded))
            .map(|(_, m)| m)
            .filter(|m| m.legal.legal_tags.contains(legal_tag));

        for metadata in matching.by_ref().take(limit) {
            page.records.push(metadata.clone());
        }
        if matching.next().is_some() {
            page.cursor = page.records.last().map(|m| m.id.clone());
        }
        Ok(page)
    }

    async fn compare_and_update(&self, records: Vec<RecordMetadata>) -> Result<CompareAndUpdate> {
        let mut stored = self.records.write();
        let mut outcome = CompareAndUpdate::default();
        for metadata in records {
            if check_revision(stored.get(&metadata.id), &metadata).is_err() {
                outcome.locked.push(metadata.id);
                continue;
            }
            outcome.updated.push(Self::put(&mut stored, metadata));
        }
        Ok(outcome)
    }
}
