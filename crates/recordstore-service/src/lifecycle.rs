//! Record lifecycle
//!
//! Records move `active -> deleted -> purged` or `active -> purged`;
//! nothing leaves `purged`. Soft delete only flips the status. Purge
//! removes metadata and every version payload and restores the metadata
//! if the payloads cannot be removed. Bulk metadata patches are applied
//! under optimistic locking: a record written by someone else since it
//! was read is reported as locked, not overwritten.

use recordstore_auth::{AccessGate, RequestContext};
use recordstore_common::naming::is_record_id_valid;
use recordstore_common::{
    BulkUpdateRecordsResponse, Error, OperationType, PatchOp, PatchOperation, PubSubInfo,
    RecordMetadata, RecordQuery, RecordState, Result, current_time_millis,
};
use recordstore_meta_store::MetadataRepository;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::audit::{AuditAction, AuditLogger};
use crate::legal::LegalService;
use crate::metrics;
use crate::notification::NotificationEmitter;
use crate::services::ServiceCore;
use crate::versions::VersionStorage;

const ACL_VIEWERS: &str = "/acl/viewers";
const ACL_OWNERS: &str = "/acl/owners";
const LEGAL_TAGS: &str = "/legal/legaltags";
const LEGAL_COUNTRIES: &str = "/legal/otherRelevantDataCountries";

pub struct RecordLifecycleService {
    repository: Arc<dyn MetadataRepository>,
    storage: VersionStorage,
    gate: AccessGate,
    legal: Arc<dyn LegalService>,
    notifications: NotificationEmitter,
    audit: Arc<dyn AuditLogger>,
}

impl RecordLifecycleService {
    pub fn new(core: &ServiceCore) -> Self {
        Self {
            repository: core.repository.clone(),
            storage: core.storage.clone(),
            gate: core.gate.clone(),
            legal: core.legal.clone(),
            notifications: core.notifications.clone(),
            audit: core.audit.clone(),
        }
    }

    /// Soft-delete an active record on behalf of `user`.
    ///
    /// Version payloads are kept.
    pub async fn delete_record(&self, ctx: &RequestContext, id: &str, user: &str) -> Result<()> {
        let ctx = ctx.clone().with_user(user);
        match self.delete(&ctx, id).await {
            Ok(metadata) => {
                self.audit.delete_record_success(&ctx, id);
                metrics::record_deleted();
                info!(record_id = %id, tenant = %ctx.tenant, "Record deleted");
                self.notifications
                    .emit(&ctx, &[PubSubInfo::new(id, metadata.kind, OperationType::Delete)])
                    .await;
                Ok(())
            }
            Err(e) => {
                self.audit.delete_record_fail(&ctx, id, &e.to_string());
                Err(e)
            }
        }
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<RecordMetadata> {
        let mut metadata = match self.repository.get(id).await? {
            Some(m) if m.is_active() => m,
            _ => return Err(Error::RecordNotFound(id.to_string())),
        };

        if !self.gate.has_access_to(ctx, &metadata).await? {
            return Err(Error::access_denied(
                "the user is not authorized to perform this action",
            ));
        }

        metadata.status = RecordState::Deleted;
        metadata.modify_user = Some(ctx.user.clone());
        metadata.modify_time = Some(current_time_millis());
        self.repository.create_or_update(vec![metadata.clone()]).await?;
        Ok(metadata)
    }

    /// Permanently remove a record's metadata and every version payload.
    ///
    /// # Errors
    /// `RollbackFailed` if the payloads could not be removed and the
    /// metadata could not be restored either.
    pub async fn purge_record(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        match self.purge(ctx, id).await {
            Ok(metadata) => {
                self.audit.purge_record_success(ctx, id);
                metrics::record_purged();
                info!(record_id = %id, tenant = %ctx.tenant, "Record purged");
                self.notifications
                    .emit(ctx, &[PubSubInfo::new(id, metadata.kind, OperationType::Delete)])
                    .await;
                Ok(())
            }
            Err(e) => {
                self.audit.purge_record_fail(ctx, id, &e.to_string());
                Err(e)
            }
        }
    }

    async fn purge(&self, ctx: &RequestContext, id: &str) -> Result<RecordMetadata> {
        if !is_record_id_valid(id, &ctx.tenant) {
            return Err(Error::InvalidRecordId {
                id: id.to_string(),
                tenant: ctx.tenant.clone(),
            });
        }

        let metadata = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))?;

        if !self.gate.has_owner_access(ctx, &metadata).await? {
            return Err(Error::access_denied(
                "the user is not authorized to purge the record",
            ));
        }

        self.repository.delete(id).await?;

        if let Err(e) = self.storage.delete(&metadata).await {
            error!(record_id = %id, "Failed to delete record versions, restoring metadata: {}", e);
            if let Err(rollback) = self.repository.create_or_update(vec![metadata.clone()]).await {
                error!(record_id = %id, "Failed to restore metadata: {}", rollback);
                return Err(Error::RollbackFailed {
                    id: id.to_string(),
                    message: rollback.to_string(),
                });
            }
            metrics::purge_rolled_back();
            return Err(match e {
                Error::PersistenceFailure(_) => e,
                other => Error::persistence(other.to_string()),
            });
        }
        Ok(metadata)
    }

    /// Apply metadata patch operations to every record selected by `query`.
    ///
    /// Every distinct input id ends up in exactly one of the response
    /// lists: updated, not found, unauthorized or locked.
    pub async fn bulk_update_records(
        &self,
        ctx: &RequestContext,
        query: RecordQuery,
        ops: &[PatchOperation],
        user: &str,
    ) -> Result<BulkUpdateRecordsResponse> {
        let ctx = ctx.clone().with_user(user);
        let result = self.bulk_update(&ctx, query, ops).await;
        match &result {
            Ok(response) => {
                self.audit
                    .update_records_metadata_success(&ctx, &response.record_ids);
            }
            Err(e) => {
                self.audit
                    .failure(&ctx, AuditAction::UpdateRecordsMetadata, &[], &e.to_string());
            }
        }
        result
    }

    async fn bulk_update(
        &self,
        ctx: &RequestContext,
        query: RecordQuery,
        ops: &[PatchOperation],
    ) -> Result<BulkUpdateRecordsResponse> {
        self.validate_patch(ctx, ops).await?;

        let mut seen = HashSet::new();
        let ids: Vec<String> = query
            .ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        if let Some(id) = ids.iter().find(|id| !is_record_id_valid(id, &ctx.tenant)) {
            return Err(Error::InvalidRecordId {
                id: id.clone(),
                tenant: ctx.tenant.clone(),
            });
        }

        let existing = self.repository.get_many(&ids).await?;
        let mut response = BulkUpdateRecordsResponse::default();
        let now = current_time_millis();
        let mut patched = Vec::new();

        for id in &ids {
            let Some(metadata) = existing.get(id).filter(|m| m.is_active()) else {
                response.not_found_record_ids.push(id.clone());
                continue;
            };
            if !self.gate.has_owner_access(ctx, metadata).await? {
                response.unauthorized_record_ids.push(id.clone());
                continue;
            }
            let mut metadata = metadata.clone();
            apply_patch(&mut metadata, ops)?;
            metadata.modify_user = Some(ctx.user.clone());
            metadata.modify_time = Some(now);
            patched.push(metadata);
        }

        if !patched.is_empty() {
            let outcome = self.repository.compare_and_update(patched).await?;
            response.record_ids = outcome.updated.iter().map(|m| m.id.clone()).collect();
            response.locked_record_ids = outcome.locked;
            let messages: Vec<PubSubInfo> = outcome
                .updated
                .iter()
                .map(|m| PubSubInfo::new(m.id.clone(), m.kind.clone(), OperationType::Update))
                .collect();
            self.notifications.emit(ctx, &messages).await;
        }

        if !response.locked_record_ids.is_empty() {
            warn!(
                locked = ?response.locked_record_ids,
                "Records modified concurrently, patch not applied"
            );
            metrics::bulk_update_locked(response.locked_record_ids.len());
        }
        response.record_count = response.record_ids.len();
        debug!(
            updated = response.record_count,
            not_found = response.not_found_record_ids.len(),
            unauthorized = response.unauthorized_record_ids.len(),
            locked = response.locked_record_ids.len(),
            "Bulk metadata update finished"
        );
        Ok(response)
    }

    /// Check paths, ACL groups and legal values before any record is read
    async fn validate_patch(&self, ctx: &RequestContext, ops: &[PatchOperation]) -> Result<()> {
        if ops.is_empty() {
            return Err(Error::invalid_patch("no patch operations provided"));
        }

        let mut groups = BTreeSet::new();
        let mut tags = BTreeSet::new();
        let mut countries = BTreeSet::new();
        for op in ops {
            if op.op != PatchOp::Remove && op.value.is_empty() {
                return Err(Error::invalid_patch(format!(
                    "operation '{}' on '{}' requires a value",
                    op.op, op.path
                )));
            }
            match op.path.as_str() {
                ACL_VIEWERS | ACL_OWNERS => groups.extend(op.value.iter().cloned()),
                LEGAL_TAGS if op.op != PatchOp::Remove => tags.extend(op.value.iter().cloned()),
                LEGAL_COUNTRIES if op.op != PatchOp::Remove => {
                    countries.extend(op.value.iter().cloned());
                }
                LEGAL_TAGS | LEGAL_COUNTRIES => {}
                other => {
                    return Err(Error::invalid_patch(format!("unsupported path '{other}'")));
                }
            }
        }

        if !groups.is_empty() && !self.gate.entitlements().is_valid_acl(ctx, &groups).await? {
            return Err(Error::InvalidAcl(
                "Invalid ACLs provided in acl path.".to_string(),
            ));
        }
        if !tags.is_empty() {
            self.legal.validate_legal_tags(ctx, &tags).await?;
        }
        if !countries.is_empty() {
            self.legal
                .validate_other_relevant_data_countries(ctx, &countries)
                .await?;
        }
        Ok(())
    }
}

/// Apply patch operations in order to one record's metadata
fn apply_patch(metadata: &mut RecordMetadata, ops: &[PatchOperation]) -> Result<()> {
    for op in ops {
        match op.path.as_str() {
            ACL_VIEWERS => patch_list(&mut metadata.acl.viewers, op),
            ACL_OWNERS => patch_list(&mut metadata.acl.owners, op),
            LEGAL_TAGS => patch_set(&mut metadata.legal.legal_tags, op),
            LEGAL_COUNTRIES => patch_set(&mut metadata.legal.other_relevant_data_countries, op),
            other => return Err(Error::invalid_patch(format!("unsupported path '{other}'"))),
        }
    }
    if metadata.acl.owners.is_empty() {
        return Err(Error::invalid_patch(format!(
            "patch would leave record '{}' without owners",
            metadata.id
        )));
    }
    Ok(())
}

fn patch_list(list: &mut Vec<String>, op: &PatchOperation) {
    match op.op {
        PatchOp::Add => push_unique(list, &op.value),
        PatchOp::Replace => {
            list.clear();
            push_unique(list, &op.value);
        }
        PatchOp::Remove => list.retain(|v| !op.value.contains(v)),
    }
}

fn push_unique(list: &mut Vec<String>, values: &[String]) {
    for value in values {
        if !list.contains(value) {
            list.push(value.clone());
        }
    }
}

fn patch_set(set: &mut BTreeSet<String>, op: &PatchOperation) {
    match op.op {
        PatchOp::Add => set.extend(op.value.iter().cloned()),
        PatchOp::Replace => *set = op.value.iter().cloned().collect(),
        PatchOp::Remove => set.retain(|v| !op.value.contains(v)),
    }
}
