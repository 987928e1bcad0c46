//! Access gate
//!
//! Decides whether the acting user may read or own existing records.
//! Read access is granted without an entitlements call for records that
//! are not active, records with no stored version, and records authored
//! by the acting user. The remaining records are grouped by viewer set so
//! each distinct ACL is checked once.

use recordstore_common::{RecordMetadata, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::context::RequestContext;
use crate::entitlements::EntitlementsService;

/// Read/owner access checks over record metadata
#[derive(Clone)]
pub struct AccessGate {
    entitlements: Arc<dyn EntitlementsService>,
}

impl AccessGate {
    /// Create a gate over an entitlements service
    pub fn new(entitlements: Arc<dyn EntitlementsService>) -> Self {
        Self { entitlements }
    }

    /// Entitlements service behind this gate
    #[must_use]
    pub fn entitlements(&self) -> &Arc<dyn EntitlementsService> {
        &self.entitlements
    }

    /// Check read access to every record; false if any record is denied.
    ///
    /// An empty slice is trivially accessible.
    pub async fn has_access(&self, ctx: &RequestContext, records: &[RecordMetadata]) -> Result<bool> {
        let mut acl_sets: Vec<BTreeSet<String>> = Vec::new();
        for metadata in records {
            if !metadata.is_active() || !metadata.has_version() || metadata.user == ctx.user {
                continue;
            }
            let viewers: BTreeSet<String> = metadata.acl.viewers.iter().cloned().collect();
            if !acl_sets.contains(&viewers) {
                acl_sets.push(viewers);
            }
        }

        for viewers in &acl_sets {
            if !self.entitlements.has_access_to_data(ctx, viewers).await? {
                debug!(user = %ctx.user, tenant = %ctx.tenant, "Viewer access denied");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Check read access to a single record
    pub async fn has_access_to(&self, ctx: &RequestContext, metadata: &RecordMetadata) -> Result<bool> {
        self.has_access(ctx, std::slice::from_ref(metadata)).await
    }

    /// Check owner access to a record; viewer membership never suffices
    pub async fn has_owner_access(&self, ctx: &RequestContext, metadata: &RecordMetadata) -> Result<bool> {
        self.entitlements
            .has_owner_access(ctx, &metadata.acl.owners)
            .await
    }
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("entitlements", &self.entitlements.name())
            .finish()
    }
}
