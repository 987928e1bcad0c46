//! Record validator
//!
//! Checks a whole batch before anything is read or written: kind naming,
//! optional schema conformance, id naming and uniqueness, and ACL groups.
//! The only mutation is assigning generated ids to records without one.

use recordstore_auth::{EntitlementsService, RequestContext};
use recordstore_common::naming::{is_kind_from_tenant_valid, is_record_id_valid, new_record_id};
use recordstore_common::{Error, Record, Result};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::schema::SchemaRegistry;

pub struct RecordValidator {
    entitlements: Arc<dyn EntitlementsService>,
    schemas: Option<Arc<dyn SchemaRegistry>>,
}

impl RecordValidator {
    pub fn new(entitlements: Arc<dyn EntitlementsService>) -> Self {
        Self {
            entitlements,
            schemas: None,
        }
    }

    /// Also check each record's data against its kind's schema
    #[must_use]
    pub fn with_schemas(mut self, schemas: Arc<dyn SchemaRegistry>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// Validate a batch for `ctx.tenant`, assigning ids where missing.
    pub async fn validate(&self, ctx: &RequestContext, records: &mut [Record]) -> Result<()> {
        validate_kinds(records, &ctx.tenant)?;
        self.validate_schemas(ctx, records).await?;
        assign_record_ids(records, &ctx.tenant)?;
        self.validate_acl(ctx, records).await?;
        debug!(count = records.len(), tenant = %ctx.tenant, "Validated record batch");
        Ok(())
    }

    async fn validate_schemas(&self, ctx: &RequestContext, records: &[Record]) -> Result<()> {
        let Some(schemas) = &self.schemas else {
            return Ok(());
        };
        for record in records {
            let schema = schemas
                .schema_for(ctx, &record.kind)
                .await?
                .ok_or_else(|| Error::InvalidKind {
                    kind: record.kind.clone(),
                    tenant: ctx.tenant.clone(),
                })?;
            schema.check(record)?;
        }
        Ok(())
    }

    /// One entitlements call for the union of every owner and viewer
    async fn validate_acl(&self, ctx: &RequestContext, records: &[Record]) -> Result<()> {
        if let Some(record) = records
            .iter()
            .find(|r| r.acl.owners.is_empty() || r.acl.viewers.is_empty())
        {
            return Err(Error::InvalidAcl(format!(
                "record {} must have at least one owner and one viewer",
                record.id()
            )));
        }
        let groups: BTreeSet<String> = records.iter().flat_map(|r| r.acl.all_groups()).collect();
        if self.entitlements.is_valid_acl(ctx, &groups).await? {
            Ok(())
        } else {
            Err(Error::InvalidAcl(
                "acl does not match the tenant or domain".to_string(),
            ))
        }
    }
}

fn validate_kinds(records: &[Record], tenant: &str) -> Result<()> {
    match records
        .iter()
        .find(|r| !is_kind_from_tenant_valid(&r.kind, tenant))
    {
        Some(record) => Err(Error::InvalidKind {
            kind: record.kind.clone(),
            tenant: tenant.to_string(),
        }),
        None => Ok(()),
    }
}

/// Check supplied ids, then generate ids unique within the batch
fn assign_record_ids(records: &mut [Record], tenant: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records.iter() {
        let Some(id) = record.id.as_deref().filter(|id| !id.is_empty()) else {
            continue;
        };
        if !seen.insert(id.to_string()) {
            return Err(Error::DuplicateIdInBatch(id.to_string()));
        }
        if !is_record_id_valid(id, tenant) {
            return Err(Error::InvalidRecordId {
                id: id.to_string(),
                tenant: tenant.to_string(),
            });
        }
    }

    for record in records.iter_mut() {
        if record.id.as_deref().is_some_and(|id| !id.is_empty()) {
            continue;
        }
        let mut id = new_record_id(tenant);
        while seen.contains(&id) {
            id = new_record_id(tenant);
        }
        seen.insert(id.clone());
        record.id = Some(id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, StaticSchemaRegistry};
    use recordstore_auth::{AllowAllEntitlements, DenyAllEntitlements, StaticEntitlements};
    use recordstore_common::Acl;
    use serde_json::json;

    const KIND: &str = "tenant1:wks:well:1.0.0";

    fn ctx() -> RequestContext {
        RequestContext::new("tenant1", "alice")
    }

    fn record(id: Option<&str>) -> Record {
        Record {
            id: id.map(ToString::to_string),
            kind: KIND.to_string(),
            acl: Acl::new(["owners@tenant1"], ["viewers@tenant1"]),
            ..Record::default()
        }
    }

    fn allow_all() -> RecordValidator {
        RecordValidator::new(Arc::new(AllowAllEntitlements))
    }

    #[tokio::test]
    async fn test_invalid_kind() {
        let mut records = vec![record(None)];
        records[0].kind = "tenant2:wks:well:1.0.0".into();

        let err = allow_all().validate(&ctx(), &mut records).await.unwrap_err();
        assert!(matches!(err, Error::InvalidKind { kind, tenant } if kind == "tenant2:wks:well:1.0.0" && tenant == "tenant1"));
    }

    #[tokio::test]
    async fn test_invalid_record_id() {
        let mut records = vec![record(Some("tenant2:wks:abc"))];
        let err = allow_all().validate(&ctx(), &mut records).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRecordId { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_id_in_batch() {
        let mut records = vec![record(Some("tenant1:wks:abc")), record(Some("tenant1:wks:abc"))];
        let err = allow_all().validate(&ctx(), &mut records).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateIdInBatch(id) if id == "tenant1:wks:abc"));
    }

    #[tokio::test]
    async fn test_generated_ids_are_unique_and_tenant_scoped() {
        let mut records = vec![record(None), record(Some("tenant1:wks:given")), record(None)];
        allow_all().validate(&ctx(), &mut records).await.unwrap();

        let ids: HashSet<&str> = records.iter().map(Record::id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("tenant1:wks:given"));
        assert!(records.iter().all(|r| r.id().starts_with("tenant1:")));
    }

    #[tokio::test]
    async fn test_invalid_acl_single_call() {
        let mut records = vec![record(None)];
        let validator = RecordValidator::new(Arc::new(DenyAllEntitlements));
        let err = validator.validate(&ctx(), &mut records).await.unwrap_err();
        assert!(matches!(err, Error::InvalidAcl(_)));
    }

    #[tokio::test]
    async fn test_empty_owners_or_viewers_rejected() {
        let mut ownerless = vec![record(Some("tenant1:wks:orphan"))];
        ownerless[0].acl = Acl::new(Vec::<String>::new(), ["viewers@tenant1"]);
        let err = allow_all().validate(&ctx(), &mut ownerless).await.unwrap_err();
        assert!(matches!(err, Error::InvalidAcl(msg) if msg.contains("tenant1:wks:orphan")));

        let mut unreadable = vec![record(None), record(None)];
        unreadable[1].acl.viewers.clear();
        assert!(matches!(
            allow_all().validate(&ctx(), &mut unreadable).await,
            Err(Error::InvalidAcl(_))
        ));
    }

    #[tokio::test]
    async fn test_acl_union_checked_against_groups() {
        let entitlements = StaticEntitlements::new();
        entitlements.add_group("owners@tenant1");
        entitlements.add_group("viewers@tenant1");
        let validator = RecordValidator::new(Arc::new(entitlements));

        let mut ok = vec![record(None)];
        assert!(validator.validate(&ctx(), &mut ok).await.is_ok());

        let mut bad = vec![record(None), record(None)];
        bad[1].acl.viewers.push("strangers@tenant1".into());
        assert!(matches!(
            validator.validate(&ctx(), &mut bad).await,
            Err(Error::InvalidAcl(_))
        ));
    }

    #[tokio::test]
    async fn test_schema_check() {
        let schemas = Arc::new(StaticSchemaRegistry::new());
        schemas.register(KIND, Schema::new(["name"]));
        let validator = allow_all().with_schemas(schemas);

        let mut good = vec![record(None)];
        good[0].data.insert("name".into(), json!("well-1"));
        assert!(validator.validate(&ctx(), &mut good).await.is_ok());

        let mut bad = vec![record(None)];
        bad[0].data.insert("depth".into(), json!(10));
        assert!(matches!(
            validator.validate(&ctx(), &mut bad).await,
            Err(Error::InvalidRecord { .. })
        ));

        let mut unknown = vec![record(None)];
        unknown[0].kind = "tenant1:wks:unknown:1.0.0".into();
        assert!(matches!(
            validator.validate(&ctx(), &mut unknown).await,
            Err(Error::InvalidKind { .. })
        ));
    }
}
