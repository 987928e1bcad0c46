//! Audit trail
//!
//! Every ingest, delete, purge and metadata patch leaves an audit entry,
//! whether it succeeded or failed. The default logger writes `tracing`
//! events on the `audit` target so they can be routed separately.

use recordstore_auth::RequestContext;
use tracing::{info, warn};

/// Audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    CreateOrUpdateRecords,
    DeleteRecord,
    PurgeRecord,
    UpdateRecordsMetadata,
    UpdateRecordsCompliance,
}

impl AuditAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateOrUpdateRecords => "create_or_update_records",
            Self::DeleteRecord => "delete_record",
            Self::PurgeRecord => "purge_record",
            Self::UpdateRecordsMetadata => "update_records_metadata",
            Self::UpdateRecordsCompliance => "update_records_compliance",
        }
    }
}

/// Trait for audit sinks
pub trait AuditLogger: Send + Sync {
    fn success(&self, ctx: &RequestContext, action: AuditAction, record_ids: &[String]);

    fn failure(&self, ctx: &RequestContext, action: AuditAction, record_ids: &[String], reason: &str);

    fn create_or_update_records_success(&self, ctx: &RequestContext, record_ids: &[String]) {
        self.success(ctx, AuditAction::CreateOrUpdateRecords, record_ids);
    }

    fn create_or_update_records_fail(&self, ctx: &RequestContext, record_ids: &[String], reason: &str) {
        self.failure(ctx, AuditAction::CreateOrUpdateRecords, record_ids, reason);
    }

    fn delete_record_success(&self, ctx: &RequestContext, record_id: &str) {
        self.success(ctx, AuditAction::DeleteRecord, &[record_id.to_string()]);
    }

    fn delete_record_fail(&self, ctx: &RequestContext, record_id: &str, reason: &str) {
        self.failure(ctx, AuditAction::DeleteRecord, &[record_id.to_string()], reason);
    }

    fn purge_record_success(&self, ctx: &RequestContext, record_id: &str) {
        self.success(ctx, AuditAction::PurgeRecord, &[record_id.to_string()]);
    }

    fn purge_record_fail(&self, ctx: &RequestContext, record_id: &str, reason: &str) {
        self.failure(ctx, AuditAction::PurgeRecord, &[record_id.to_string()], reason);
    }

    fn update_records_metadata_success(&self, ctx: &RequestContext, record_ids: &[String]) {
        self.success(ctx, AuditAction::UpdateRecordsMetadata, record_ids);
    }
}

/// Audit logger writing to the `audit` tracing target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn success(&self, ctx: &RequestContext, action: AuditAction, record_ids: &[String]) {
        info!(
            target: "audit",
            action = action.as_str(),
            outcome = "success",
            tenant = %ctx.tenant,
            user = %ctx.user,
            correlation_id = %ctx.correlation_id,
            records = ?record_ids,
            "Audit"
        );
    }

    fn failure(&self, ctx: &RequestContext, action: AuditAction, record_ids: &[String], reason: &str) {
        warn!(
            target: "audit",
            action = action.as_str(),
            outcome = "failure",
            tenant = %ctx.tenant,
            user = %ctx.user,
            correlation_id = %ctx.correlation_id,
            records = ?record_ids,
            reason,
            "Audit"
        );
    }
}
