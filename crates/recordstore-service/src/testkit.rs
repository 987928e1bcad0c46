//! Test doubles and a wired-up service harness

use async_trait::async_trait;
use parking_lot::Mutex;
use recordstore_auth::{RequestContext, StaticEntitlements};
use recordstore_common::config::ProcessingConfig;
use recordstore_common::{
    Acl, Error, Legal, PubSubInfo, Record, RecordData, RecordMetadata, RecordProcessing, Result,
};
use recordstore_meta_store::{
    CompareAndUpdate, InMemoryMetadataRepository, LegalTagPage, MetadataRepository,
};
use recordstore_storage::{BlobStore, InMemoryBlobStore};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::audit::{AuditAction, AuditLogger};
use crate::legal::StaticLegalService;
use crate::notification::NotificationSink;
use crate::services::{RecordServices, ServiceDependencies};

pub const TENANT: &str = "tenant1";
pub const KIND: &str = "tenant1:wks:well:1.0.0";
pub const OWNERS: &str = "data.owners@tenant1.example.com";
pub const VIEWERS: &str = "data.viewers@tenant1.example.com";
pub const OWNER: &str = "alice@example.com";
pub const VIEWER: &str = "bob@example.com";
pub const OUTSIDER: &str = "eve@example.com";
pub const TAG: &str = "tenant1-public";

/// Sink that records every batch it was asked to publish
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<PubSubInfo>>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<Vec<PubSubInfo>> {
        self.batches.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<PubSubInfo> {
        self.batches.lock().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn publish_message(&self, _ctx: &RequestContext, messages: &[PubSubInfo]) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::persistence("bus unavailable"));
        }
        self.batches.lock().push(messages.to_vec());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub success: bool,
    pub record_ids: Vec<String>,
}

/// Audit logger that keeps entries in memory
#[derive(Default)]
pub struct RecordingAuditLogger {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAuditLogger {
    pub fn last(&self) -> Option<AuditEntry> {
        self.entries.lock().last().cloned()
    }
}

impl AuditLogger for RecordingAuditLogger {
    fn success(&self, _ctx: &RequestContext, action: AuditAction, record_ids: &[String]) {
        self.entries.lock().push(AuditEntry {
            action,
            success: true,
            record_ids: record_ids.to_vec(),
        });
    }

    fn failure(&self, _ctx: &RequestContext, action: AuditAction, record_ids: &[String], _reason: &str) {
        self.entries.lock().push(AuditEntry {
            action,
            success: false,
            record_ids: record_ids.to_vec(),
        });
    }
}

/// In-memory blob store with switchable failures
#[derive(Default)]
pub struct FaultyBlobStore {
    inner: InMemoryBlobStore,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FaultyBlobStore {
    pub fn inner(&self) -> &InMemoryBlobStore {
        &self.inner
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for FaultyBlobStore {
    fn name(&self) -> &str {
        "faulty"
    }

    async fn write(&self, record: &RecordProcessing) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::persistence("blob write failed"));
        }
        self.inner.write(record).await
    }

    async fn read(&self, version_path: &str) -> Result<Option<RecordData>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::persistence("blob read failed"));
        }
        self.inner.read(version_path).await
    }

    async fn delete(&self, metadata: &RecordMetadata) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::persistence("blob delete failed"));
        }
        self.inner.delete(metadata).await
    }

    async fn delete_version(&self, metadata: &RecordMetadata, version: u64) -> Result<()> {
        self.inner.delete_version(metadata, version).await
    }
}

/// In-memory repository with switchable failures and simulated concurrent writers
#[derive(Default)]
pub struct FaultyRepository {
    inner: InMemoryMetadataRepository,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
    /// Ids rewritten by "another writer" right before the next compare-and-update
    race: Mutex<Vec<String>>,
}

impl FaultyRepository {
    pub fn inner(&self) -> &InMemoryMetadataRepository {
        &self.inner
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn race_on_next_update<I>(&self, ids: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.race.lock().extend(ids.into_iter().map(Into::into));
    }
}

#[async_trait]
impl MetadataRepository for FaultyRepository {
    fn name(&self) -> &str {
        "faulty"
    }

    async fn get(&self, id: &str) -> Result<Option<RecordMetadata>> {
        self.inner.get(id).await
    }

    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, RecordMetadata>> {
        self.inner.get_many(ids).await
    }

    async fn create_or_update(&self, records: Vec<RecordMetadata>) -> Result<Vec<RecordMetadata>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::persistence("metadata write failed"));
        }
        self.inner.create_or_update(records).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::persistence("metadata delete failed"));
        }
        self.inner.delete(id).await
    }

    async fn query_by_legal_tag(
        &self,
        legal_tag: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<LegalTagPage> {
        self.inner.query_by_legal_tag(legal_tag, limit, cursor).await
    }

    async fn compare_and_update(&self, records: Vec<RecordMetadata>) -> Result<CompareAndUpdate> {
        let raced: Vec<String> = std::mem::take(&mut *self.race.lock());
        if !raced.is_empty() {
            let current = self.inner.get_many(&raced).await?;
            self.inner
                .create_or_update(current.into_values().collect())
                .await?;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::persistence("metadata write failed"));
        }
        self.inner.compare_and_update(records).await
    }
}

/// Services over in-memory backends with one owner, one viewer and one outsider
pub struct Harness {
    pub services: RecordServices,
    pub repository: Arc<FaultyRepository>,
    pub blobs: Arc<FaultyBlobStore>,
    pub sink: Arc<RecordingSink>,
    pub audit: Arc<RecordingAuditLogger>,
}

impl Harness {
    pub fn new() -> Self {
        let repository = Arc::new(FaultyRepository::default());
        let blobs = Arc::new(FaultyBlobStore::default());
        let entitlements = Arc::new(StaticEntitlements::new());
        entitlements.add_member(OWNER, OWNERS);
        entitlements.add_member(OWNER, VIEWERS);
        entitlements.add_member(VIEWER, VIEWERS);
        entitlements.add_group("data.other@tenant1.example.com");
        let sink = Arc::new(RecordingSink::default());
        let audit = Arc::new(RecordingAuditLogger::default());

        let services = RecordServices::new(
            &ProcessingConfig {
                max_concurrency: 4,
                legal_query_page_size: 2,
                ..ProcessingConfig::default()
            },
            ServiceDependencies {
                repository: repository.clone(),
                blobs: blobs.clone(),
                entitlements,
                legal: Arc::new(StaticLegalService::new(
                    [TAG, "tenant1-private"],
                    ["US", "NO"],
                )),
                notifications: sink.clone(),
                audit: audit.clone(),
                schemas: None,
            },
        );

        Self {
            services,
            repository,
            blobs,
            sink,
            audit,
        }
    }

    pub fn ctx(&self) -> RequestContext {
        RequestContext::new(TENANT, OWNER)
    }

    /// Ingest records as the owner, failing the test on error
    pub async fn ingest(&self, records: Vec<Record>) -> recordstore_common::TransferInfo {
        self.services
            .ingestion
            .create_update_records(&self.ctx(), false, records, OWNER)
            .await
            .unwrap()
    }

    pub async fn stored(&self, id: &str) -> Option<RecordMetadata> {
        self.repository.inner().get(id).await.unwrap()
    }
}

/// A well record owned by `OWNERS`, readable by `VIEWERS`
pub fn record(id: &str) -> Record {
    record_with(id, &[("name", Value::from(id))])
}

pub fn record_with(id: &str, fields: &[(&str, Value)]) -> Record {
    let data: Map<String, Value> = fields
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect();
    Record {
        id: Some(id.to_string()),
        kind: KIND.to_string(),
        data,
        meta: None,
        ancestry: None,
        acl: Acl::new([OWNERS], [VIEWERS]),
        legal: Legal::new([TAG], ["US"]),
    }
}
