//! Ingestion orchestrator
//!
//! Turns a batch of caller records into one new version per changed
//! record. The batch moves through strictly ordered stages:
//!
//! 1. validate kinds, ids and ACLs (ids are assigned here)
//! 2. fetch existing metadata of the records and of every parent
//! 3. reject references to missing parents
//! 4. check read access to every fetched record
//! 5. validate legal tags and countries, inherit legal data from parents
//! 6. split into creates and updates (updates need owner access)
//! 7. optionally drop updates identical to their latest version
//! 8. persist the remaining records as one batch
//!
//! Any failure before step 8 aborts the whole batch without writing.

use recordstore_auth::{AccessGate, RequestContext};
use recordstore_common::{
    Error, LegalCompliance, OperationType, ParentRef, PubSubInfo, Record, RecordData,
    RecordMetadata, RecordProcessing, RecordState, Result, TransferInfo, VersionGenerator,
    current_time_millis,
};
use recordstore_meta_store::MetadataRepository;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audit::AuditLogger;
use crate::dedup::{DuplicateDetector, UpdateCandidate};
use crate::legal::LegalService;
use crate::metrics;
use crate::notification::NotificationEmitter;
use crate::persistence::PersistenceService;
use crate::services::ServiceCore;
use crate::validator::RecordValidator;

pub struct IngestionService {
    validator: RecordValidator,
    repository: Arc<dyn MetadataRepository>,
    gate: AccessGate,
    legal: Arc<dyn LegalService>,
    dedup: DuplicateDetector,
    persistence: PersistenceService,
    notifications: NotificationEmitter,
    audit: Arc<dyn AuditLogger>,
    versions: VersionGenerator,
}

/// Existing metadata and parent references of a validated batch
struct BatchContext {
    existing: HashMap<String, RecordMetadata>,
    parents: HashMap<String, Vec<ParentRef>>,
}

impl IngestionService {
    pub fn new(core: &ServiceCore, validator: RecordValidator) -> Self {
        Self {
            validator,
            repository: core.repository.clone(),
            gate: core.gate.clone(),
            legal: core.legal.clone(),
            dedup: DuplicateDetector::new(core.storage.clone()),
            persistence: PersistenceService::new(core.repository.clone(), core.storage.clone()),
            notifications: core.notifications.clone(),
            audit: core.audit.clone(),
            versions: VersionGenerator::new(),
        }
    }

    /// Create or update a batch of records on behalf of `user`.
    ///
    /// Records identical to their latest version are skipped when
    /// `skip_duplicates` is set. Returns the batch summary.
    pub async fn create_update_records(
        &self,
        ctx: &RequestContext,
        skip_duplicates: bool,
        mut records: Vec<Record>,
        user: &str,
    ) -> Result<TransferInfo> {
        let ctx = ctx.clone().with_user(user);
        match self.ingest(&ctx, skip_duplicates, &mut records).await {
            Ok(transfer) => Ok(transfer),
            Err(e) => {
                let ids: Vec<String> = records
                    .iter()
                    .map(Record::id)
                    .filter(|id| !id.is_empty())
                    .map(ToString::to_string)
                    .collect();
                self.audit
                    .create_or_update_records_fail(&ctx, &ids, &e.to_string());
                Err(e)
            }
        }
    }

    async fn ingest(
        &self,
        ctx: &RequestContext,
        skip_duplicates: bool,
        records: &mut [Record],
    ) -> Result<TransferInfo> {
        self.validator.validate(ctx, records).await?;

        let batch = self.load_batch(ctx, records).await?;
        validate_parents_exist(records, &batch)?;
        self.validate_user_has_access(ctx, &batch).await?;
        self.validate_legal(ctx, records, &batch).await?;

        let mut transfer =
            TransferInfo::new(ctx.user.clone(), self.versions.next_version(), records.len());
        let to_process = self
            .records_for_processing(ctx, skip_duplicates, records, &batch, &mut transfer)
            .await?;

        if !transfer.skipped_records.is_empty() {
            metrics::records_skipped(transfer.skipped_records.len());
        }
        if to_process.is_empty() {
            debug!(version = transfer.version, "Nothing to persist in batch");
            return Ok(transfer);
        }

        self.persistence
            .persist_record_batch(&transfer, &to_process)
            .await?;

        transfer.written_records = to_process.iter().map(|r| r.metadata.id.clone()).collect();
        self.audit
            .create_or_update_records_success(ctx, &transfer.written_records);
        metrics::records_written(to_process.len());
        info!(
            version = transfer.version,
            written = transfer.written_records.len(),
            skipped = transfer.skipped_records.len(),
            tenant = %ctx.tenant,
            "Ingested record batch"
        );

        let messages: Vec<PubSubInfo> = to_process
            .iter()
            .map(|r| PubSubInfo::new(r.metadata.id.clone(), r.metadata.kind.clone(), r.operation))
            .collect();
        self.notifications.emit(ctx, &messages).await;

        Ok(transfer)
    }

    /// Fetch existing metadata of every record and every referenced parent
    async fn load_batch(&self, ctx: &RequestContext, records: &[Record]) -> Result<BatchContext> {
        let mut parents = HashMap::new();
        let mut ids = BTreeSet::new();
        for record in records {
            let refs = record.parent_refs(&ctx.tenant)?;
            if !refs.is_empty() {
                ids.extend(refs.iter().map(|p| p.id.clone()));
                parents.insert(record.id().to_string(), refs);
            }
            ids.insert(record.id().to_string());
        }

        let ids: Vec<String> = ids.into_iter().collect();
        let existing = self.repository.get_many(&ids).await?;
        Ok(BatchContext { existing, parents })
    }

    async fn validate_user_has_access(&self, ctx: &RequestContext, batch: &BatchContext) -> Result<()> {
        let existing: Vec<RecordMetadata> = batch.existing.values().cloned().collect();
        if self.gate.has_access(ctx, &existing).await? {
            Ok(())
        } else {
            Err(Error::access_denied(
                "the user is not authorized to perform this action",
            ))
        }
    }

    async fn validate_legal(
        &self,
        ctx: &RequestContext,
        records: &mut [Record],
        batch: &BatchContext,
    ) -> Result<()> {
        let tags: BTreeSet<String> = records
            .iter()
            .flat_map(|r| r.legal.legal_tags.iter().cloned())
            .collect();
        let countries: BTreeSet<String> = records
            .iter()
            .flat_map(|r| r.legal.other_relevant_data_countries.iter().cloned())
            .collect();

        self.legal.validate_legal_tags(ctx, &tags).await?;
        self.legal
            .validate_other_relevant_data_countries(ctx, &countries)
            .await?;
        self.legal
            .populate_legal_info_from_parents(ctx, records, &batch.existing, &batch.parents)
            .await?;

        for record in records.iter_mut() {
            record.legal.status = LegalCompliance::Compliant;
        }
        Ok(())
    }

    async fn records_for_processing(
        &self,
        ctx: &RequestContext,
        skip_duplicates: bool,
        records: &[Record],
        batch: &BatchContext,
        transfer: &mut TransferInfo,
    ) -> Result<Vec<RecordProcessing>> {
        let now = current_time_millis();
        let mut to_process = Vec::with_capacity(records.len());
        let mut with_versions: Vec<UpdateCandidate> = Vec::new();
        let mut without_versions: Vec<UpdateCandidate> = Vec::new();

        for record in records {
            let data = RecordData::from(record);
            let Some(existing) = batch.existing.get(record.id()) else {
                let mut metadata = RecordMetadata::from_record(record);
                metadata.user.clone_from(&transfer.user);
                metadata.status = RecordState::Active;
                metadata.create_time = now;
                metadata.add_version_path(transfer.version);
                to_process.push(RecordProcessing {
                    data,
                    metadata,
                    operation: OperationType::Create,
                });
                continue;
            };

            if !self.gate.has_owner_access(ctx, existing).await? {
                warn!(record_id = %record.id(), user = %ctx.user, "User does not have owner access to record");
                return Err(Error::access_denied(
                    "the user is not authorized to update records",
                ));
            }

            let mut metadata = RecordMetadata::from_record(record);
            metadata.user.clone_from(&existing.user);
            metadata.create_time = existing.create_time;
            metadata.version_paths.clone_from(&existing.version_paths);
            metadata.revision = existing.revision;

            if metadata.has_version() {
                with_versions.push((metadata, data));
            } else {
                warn!(record_id = %metadata.id, "Record does not have versions available");
                without_versions.push((metadata, data));
            }
        }

        if skip_duplicates && !with_versions.is_empty() {
            with_versions = self.dedup.remove_duplicates(transfer, with_versions).await?;
        }

        for (mut metadata, data) in with_versions.into_iter().chain(without_versions) {
            metadata.add_version_path(transfer.version);
            metadata.modify_user = Some(transfer.user.clone());
            metadata.modify_time = Some(now);
            metadata.status = RecordState::Active;
            to_process.push(RecordProcessing {
                data,
                metadata,
                operation: OperationType::Update,
            });
        }
        Ok(to_process)
    }
}

fn validate_parents_exist(records: &[Record], batch: &BatchContext) -> Result<()> {
    for record in records {
        let Some(refs) = batch.parents.get(record.id()) else {
            continue;
        };
        if let Some(missing) = refs.iter().find(|p| !batch.existing.contains_key(&p.id)) {
            return Err(Error::ParentNotFound(missing.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditAction;
    use crate::testkit::{Harness, OUTSIDER, OWNER, TENANT, VIEWER, record, record_with};
    use recordstore_common::{Ancestry, Legal};
    use serde_json::Value;

    async fn submit(h: &Harness, user: &str, skip: bool, records: Vec<Record>) -> Result<TransferInfo> {
        h.services
            .ingestion
            .create_update_records(&RequestContext::new(TENANT, user), skip, records, user)
            .await
    }

    #[tokio::test]
    async fn test_create_records() {
        let h = Harness::new();
        let mut unnamed = record("ignored");
        unnamed.id = None;

        let transfer = submit(&h, OWNER, false, vec![record("tenant1:test:id1"), unnamed])
            .await
            .unwrap();

        assert_eq!(transfer.record_count, 2);
        assert_eq!(transfer.written_records.len(), 2);
        assert!(transfer.skipped_records.is_empty());
        let generated = transfer
            .written_records
            .iter()
            .find(|id| *id != "tenant1:test:id1")
            .unwrap();
        assert!(generated.starts_with("tenant1:"));

        let stored = h.stored("tenant1:test:id1").await.unwrap();
        assert_eq!(stored.user, OWNER);
        assert!(stored.is_active());
        assert_eq!(stored.latest_version(), Some(transfer.version));
        assert_eq!(stored.legal.status, LegalCompliance::Compliant);
        assert_eq!(h.blobs.inner().len(), 2);

        let ops: Vec<OperationType> = h.sink.messages().iter().map(|m| m.op).collect();
        assert_eq!(ops, vec![OperationType::Create, OperationType::Create]);
        let entry = h.audit.last().unwrap();
        assert_eq!(entry.action, AuditAction::CreateOrUpdateRecords);
        assert!(entry.success);
    }

    #[tokio::test]
    async fn test_identical_resubmission_is_skipped() {
        let h = Harness::new();
        let first = submit(&h, OWNER, true, vec![record("tenant1:test:id1")])
            .await
            .unwrap();
        assert_eq!(first.written_records, vec!["tenant1:test:id1"]);

        let second = submit(&h, OWNER, true, vec![record("tenant1:test:id1")])
            .await
            .unwrap();
        assert_eq!(second.skipped_records, vec!["tenant1:test:id1"]);
        assert!(second.written_records.is_empty());

        let stored = h.stored("tenant1:test:id1").await.unwrap();
        assert_eq!(stored.versions(), vec![first.version]);
        assert_eq!(h.blobs.inner().len(), 1);
        assert_eq!(h.sink.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_written_and_skipped_are_disjoint() {
        let h = Harness::new();
        submit(&h, OWNER, true, vec![record("tenant1:test:same"), record("tenant1:test:changed")])
            .await
            .unwrap();

        let changed = record_with("tenant1:test:changed", &[("name", Value::from("renamed"))]);
        let transfer = submit(&h, OWNER, true, vec![record("tenant1:test:same"), changed])
            .await
            .unwrap();

        assert_eq!(transfer.skipped_records, vec!["tenant1:test:same"]);
        assert_eq!(transfer.written_records, vec!["tenant1:test:changed"]);
        let stored = h.stored("tenant1:test:changed").await.unwrap();
        assert_eq!(stored.versions().len(), 2);
        assert_eq!(stored.modify_user.as_deref(), Some(OWNER));
        assert_eq!(h.sink.messages().pop().unwrap().op, OperationType::Update);
    }

    #[tokio::test]
    async fn test_field_order_change_is_a_new_version() {
        let h = Harness::new();
        let ordered = |a: i64, b: i64, flip: bool| {
            let fields = if flip {
                vec![("b", Value::from(b)), ("a", Value::from(a))]
            } else {
                vec![("a", Value::from(a)), ("b", Value::from(b))]
            };
            record_with("tenant1:test:id1", &fields)
        };
        submit(&h, OWNER, true, vec![ordered(1, 2, false)]).await.unwrap();

        let transfer = submit(&h, OWNER, true, vec![ordered(1, 2, true)]).await.unwrap();
        assert!(transfer.skipped_records.is_empty());
        assert_eq!(transfer.written_records, vec!["tenant1:test:id1"]);
    }

    #[tokio::test]
    async fn test_duplicates_written_without_skip() {
        let h = Harness::new();
        submit(&h, OWNER, false, vec![record("tenant1:test:id1")]).await.unwrap();
        let transfer = submit(&h, OWNER, false, vec![record("tenant1:test:id1")])
            .await
            .unwrap();
        assert_eq!(transfer.written_records, vec!["tenant1:test:id1"]);
        assert_eq!(h.blobs.inner().len(), 2);
    }

    #[tokio::test]
    async fn test_update_requires_owner_access() {
        let h = Harness::new();
        submit(&h, OWNER, false, vec![record("tenant1:test:id1")]).await.unwrap();

        let err = submit(&h, VIEWER, false, vec![record("tenant1:test:id1")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));
        assert_eq!(h.stored("tenant1:test:id1").await.unwrap().versions().len(), 1);
        let entry = h.audit.last().unwrap();
        assert!(!entry.success);
        assert_eq!(entry.record_ids, vec!["tenant1:test:id1"]);
    }

    #[tokio::test]
    async fn test_unreadable_existing_record_denies_batch() {
        let h = Harness::new();
        submit(&h, OWNER, false, vec![record("tenant1:test:id1")]).await.unwrap();

        let err = submit(
            &h,
            OUTSIDER,
            false,
            vec![record("tenant1:test:new"), record("tenant1:test:id1")],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));
        assert!(h.stored("tenant1:test:new").await.is_none());
    }

    #[tokio::test]
    async fn test_missing_parent_aborts_batch() {
        let h = Harness::new();
        let mut records: Vec<Record> = (0..9)
            .map(|i| record(&format!("tenant1:test:r{i}")))
            .collect();
        let mut child = record("tenant1:test:child");
        child.ancestry = Some(Ancestry {
            parents: vec!["tenant1:test:absent:1".to_string()],
        });
        records.push(child);

        let err = submit(&h, OWNER, false, records).await.unwrap_err();
        assert!(matches!(err, Error::ParentNotFound(ref id) if id == "tenant1:test:absent"));
        assert!(h.repository.inner().is_empty());
        assert!(h.blobs.inner().is_empty());
        assert!(h.sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_child_inherits_parent_legal() {
        let h = Harness::new();
        let mut parent = record("tenant1:test:parent");
        parent.legal = Legal::new(["tenant1-private"], ["NO"]);
        let transfer = submit(&h, OWNER, false, vec![parent]).await.unwrap();

        let mut child = record("tenant1:test:child");
        child.ancestry = Some(Ancestry {
            parents: vec![format!("tenant1:test:parent:{}", transfer.version)],
        });
        submit(&h, OWNER, false, vec![child]).await.unwrap();

        let stored = h.stored("tenant1:test:child").await.unwrap();
        assert!(stored.legal.legal_tags.contains("tenant1-private"));
        assert!(stored.legal.legal_tags.contains("tenant1-public"));
        assert!(stored.legal.other_relevant_data_countries.contains("NO"));
        assert!(stored.legal.other_relevant_data_countries.contains("US"));
    }

    #[tokio::test]
    async fn test_validation_errors_write_nothing() {
        let h = Harness::new();

        let mut bad_kind = record("tenant1:test:id1");
        bad_kind.kind = "other:wks:well:1.0.0".to_string();
        let err = submit(&h, OWNER, false, vec![bad_kind]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidKind { .. }));

        let err = submit(
            &h,
            OWNER,
            false,
            vec![record("tenant1:test:id1"), record("tenant1:test:id1")],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateIdInBatch(_)));

        let mut bad_tag = record("tenant1:test:id1");
        bad_tag.legal = Legal::new(["expired"], ["US"]);
        let err = submit(&h, OWNER, false, vec![bad_tag]).await.unwrap_err();
        assert!(matches!(err, Error::LegalValidationFailed(_)));

        let mut ownerless = record("tenant1:test:orphan");
        ownerless.acl.owners.clear();
        let err = submit(&h, OWNER, false, vec![ownerless]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidAcl(_)));

        assert!(h.repository.inner().is_empty());
        assert!(h.blobs.inner().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_writes_nothing() {
        let h = Harness::new();
        h.blobs.fail_writes(true);

        let err = submit(&h, OWNER, false, vec![record("tenant1:test:id1")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PersistenceFailure(_)));
        assert!(h.repository.inner().is_empty());
        assert!(h.sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_check_failure_aborts() {
        let h = Harness::new();
        submit(&h, OWNER, true, vec![record("tenant1:test:id1")]).await.unwrap();
        h.blobs.fail_reads(true);

        let err = submit(&h, OWNER, true, vec![record("tenant1:test:id1")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateCheckFailed(_)));
        assert_eq!(h.stored("tenant1:test:id1").await.unwrap().versions().len(), 1);
    }
}
