//! Schema registry
//!
//! A schema is the set of top-level keys a record's `data` must carry.

use async_trait::async_trait;
use parking_lot::RwLock;
use recordstore_auth::RequestContext;
use recordstore_common::{Error, Record, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::cache::Cache;

/// Required top-level data keys of a kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub keys: BTreeSet<String>,
}

impl Schema {
    pub fn new<K>(keys: K) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Check that a record's data keys match exactly
    ///
    /// # Errors
    /// Returns `Error::InvalidRecord` on any missing or extra key.
    pub fn check(&self, record: &Record) -> Result<()> {
        let keys: BTreeSet<&str> = record.data.keys().map(String::as_str).collect();
        let expected: BTreeSet<&str> = self.keys.iter().map(String::as_str).collect();
        if keys == expected {
            return Ok(());
        }
        let missing: Vec<&str> = expected.difference(&keys).copied().collect();
        let extra: Vec<&str> = keys.difference(&expected).copied().collect();
        Err(Error::InvalidRecord {
            id: record.id().to_string(),
            reason: format!("missing keys [{}], unexpected keys [{}]", missing.join(", "), extra.join(", ")),
        })
    }
}

/// Trait for kind schema lookups
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn schema_for(&self, ctx: &RequestContext, kind: &str) -> Result<Option<Schema>>;
}

/// Registry holding schemas registered at startup
#[derive(Debug, Default)]
pub struct StaticSchemaRegistry {
    schemas: RwLock<HashMap<String, Schema>>,
}

impl StaticSchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kind: impl Into<String>, schema: Schema) {
        self.schemas.write().insert(kind.into(), schema);
    }
}

#[async_trait]
impl SchemaRegistry for StaticSchemaRegistry {
    async fn schema_for(&self, _ctx: &RequestContext, kind: &str) -> Result<Option<Schema>> {
        Ok(self.schemas.read().get(kind).cloned())
    }
}

/// Read-through cache in front of another registry
pub struct CachedSchemaRegistry {
    inner: Arc<dyn SchemaRegistry>,
    cache: Arc<dyn Cache<Schema>>,
}

impl CachedSchemaRegistry {
    pub fn new(inner: Arc<dyn SchemaRegistry>, cache: Arc<dyn Cache<Schema>>) -> Self {
        Self { inner, cache }
    }

    /// Forget a kind's schema for a tenant
    pub fn invalidate(&self, tenant: &str, kind: &str) {
        self.cache.delete(tenant, kind);
    }
}

#[async_trait]
impl SchemaRegistry for CachedSchemaRegistry {
    async fn schema_for(&self, ctx: &RequestContext, kind: &str) -> Result<Option<Schema>> {
        if let Some(schema) = self.cache.get(&ctx.tenant, kind) {
            return Ok(Some(schema));
        }
        let schema = self.inner.schema_for(ctx, kind).await?;
        if let Some(schema) = &schema {
            self.cache.put(&ctx.tenant, kind, schema.clone());
        }
        Ok(schema)
    }
}
