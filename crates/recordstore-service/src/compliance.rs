//! Legal compliance updates
//!
//! When a legal tag changes status every record carrying it takes the new
//! status. Records that became incompliant are announced as deletes so
//! consumers drop them; records that became compliant again as updates.

use recordstore_auth::RequestContext;
use recordstore_common::{LegalCompliance, OperationType, PubSubInfo, Result};
use recordstore_meta_store::MetadataRepository;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audit::{AuditAction, AuditLogger};
use crate::legal::LegalService;
use crate::notification::NotificationEmitter;
use crate::services::ServiceCore;

pub struct LegalComplianceService {
    repository: Arc<dyn MetadataRepository>,
    legal: Arc<dyn LegalService>,
    notifications: NotificationEmitter,
    audit: Arc<dyn AuditLogger>,
    page_size: usize,
}

impl LegalComplianceService {
    pub fn new(core: &ServiceCore, page_size: usize) -> Self {
        Self {
            repository: core.repository.clone(),
            legal: core.legal.clone(),
            notifications: core.notifications.clone(),
            audit: core.audit.clone(),
            page_size: page_size.max(1),
        }
    }

    /// Apply legal tag status changes; returns the new status per record id
    pub async fn update_compliance(
        &self,
        ctx: &RequestContext,
        changes: &BTreeMap<String, LegalCompliance>,
    ) -> Result<BTreeMap<String, LegalCompliance>> {
        let mut updated = BTreeMap::new();
        for (tag, status) in changes {
            if let Err(e) = self.update_tag(ctx, tag, *status, &mut updated).await {
                let ids: Vec<String> = updated.keys().cloned().collect();
                self.audit
                    .failure(ctx, AuditAction::UpdateRecordsCompliance, &ids, &e.to_string());
                return Err(e);
            }
            self.legal.invalidate_legal_tag(&ctx.tenant, tag);
        }

        let ids: Vec<String> = updated.keys().cloned().collect();
        self.audit
            .success(ctx, AuditAction::UpdateRecordsCompliance, &ids);
        info!(
            tags = changes.len(),
            records = updated.len(),
            tenant = %ctx.tenant,
            "Legal compliance updated"
        );
        Ok(updated)
    }

    async fn update_tag(
        &self,
        ctx: &RequestContext,
        tag: &str,
        status: LegalCompliance,
        updated: &mut BTreeMap<String, LegalCompliance>,
    ) -> Result<()> {
        let op = match status {
            LegalCompliance::Compliant => OperationType::Update,
            LegalCompliance::Incompliant => OperationType::Delete,
        };

        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .repository
                .query_by_legal_tag(tag, self.page_size, cursor.as_deref())
                .await?;
            let mut records = page.records;
            for metadata in &mut records {
                metadata.legal.status = status;
            }

            if !records.is_empty() {
                let stored = self.repository.create_or_update(records).await?;
                let messages: Vec<PubSubInfo> = stored
                    .iter()
                    .map(|m| PubSubInfo::new(m.id.clone(), m.kind.clone(), op))
                    .collect();
                for metadata in &stored {
                    updated.insert(metadata.id.clone(), status);
                }
                debug!(legal_tag = %tag, count = stored.len(), status = %status, "Updated compliance page");
                self.notifications.emit(ctx, &messages).await;
            }

            match page.cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{Harness, OWNER, TAG, record};
    use recordstore_common::{Ancestry, Error, Legal};

    fn change(tag: &str, status: LegalCompliance) -> BTreeMap<String, LegalCompliance> {
        BTreeMap::from([(tag.to_string(), status)])
    }

    #[tokio::test]
    async fn test_incompliant_tag_pages_through_records() {
        let h = Harness::new();
        let mut private = record("tenant1:test:private");
        private.legal = Legal::new(["tenant1-private"], ["US"]);
        h.ingest(vec![
            record("tenant1:test:a"),
            record("tenant1:test:b"),
            record("tenant1:test:c"),
            private,
        ])
        .await;

        let updated = h
            .services
            .compliance
            .update_compliance(&h.ctx(), &change(TAG, LegalCompliance::Incompliant))
            .await
            .unwrap();

        assert_eq!(
            updated.keys().cloned().collect::<Vec<_>>(),
            vec!["tenant1:test:a", "tenant1:test:b", "tenant1:test:c"]
        );
        let stored = h.stored("tenant1:test:b").await.unwrap();
        assert_eq!(stored.legal.status, LegalCompliance::Incompliant);
        let private = h.stored("tenant1:test:private").await.unwrap();
        assert_eq!(private.legal.status, LegalCompliance::Compliant);

        let deletes = h
            .sink
            .messages()
            .into_iter()
            .filter(|m| m.op == OperationType::Delete)
            .count();
        assert_eq!(deletes, 3);
    }

    #[tokio::test]
    async fn test_child_of_incompliant_parent_is_rejected() {
        let h = Harness::new();
        let transfer = h.ingest(vec![record("tenant1:test:parent")]).await;
        h.services
            .compliance
            .update_compliance(&h.ctx(), &change(TAG, LegalCompliance::Incompliant))
            .await
            .unwrap();

        let mut child = record("tenant1:test:child");
        child.ancestry = Some(Ancestry {
            parents: vec![format!("tenant1:test:parent:{}", transfer.version)],
        });
        let err = h
            .services
            .ingestion
            .create_update_records(&h.ctx(), false, vec![child], OWNER)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LegalValidationFailed(_)));
        assert!(h.stored("tenant1:test:child").await.is_none());
    }

    #[tokio::test]
    async fn test_compliant_again_announces_updates() {
        let h = Harness::new();
        h.ingest(vec![record("tenant1:test:a")]).await;
        let compliance = &h.services.compliance;
        compliance
            .update_compliance(&h.ctx(), &change(TAG, LegalCompliance::Incompliant))
            .await
            .unwrap();
        compliance
            .update_compliance(&h.ctx(), &change(TAG, LegalCompliance::Compliant))
            .await
            .unwrap();

        let last = h.sink.messages().pop().unwrap();
        assert_eq!(last.op, OperationType::Update);
        let stored = h.stored("tenant1:test:a").await.unwrap();
        assert_eq!(stored.legal.status, LegalCompliance::Compliant);
    }
}
