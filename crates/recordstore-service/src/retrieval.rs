//! Record retrieval
//!
//! Reads the newest version of each requested record. Ids that are
//! absent or no longer active are reported as not found; ids the caller
//! cannot read are reported as unauthorized.

use recordstore_auth::{AccessGate, RequestContext};
use recordstore_common::{Record, Result};
use recordstore_meta_store::MetadataRepository;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::services::ServiceCore;
use crate::versions::VersionStorage;

/// Outcome of a multi-record fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRecordsResponse {
    pub records: Vec<Record>,
    pub not_found_record_ids: Vec<String>,
    pub unauthorized_record_ids: Vec<String>,
}

pub struct RecordRetrievalService {
    repository: Arc<dyn MetadataRepository>,
    storage: VersionStorage,
    gate: AccessGate,
}

impl RecordRetrievalService {
    pub fn new(core: &ServiceCore) -> Self {
        Self {
            repository: core.repository.clone(),
            storage: core.storage.clone(),
            gate: core.gate.clone(),
        }
    }

    /// Fetch the newest version of each record, in request order
    pub async fn fetch_records(&self, ctx: &RequestContext, ids: &[String]) -> Result<FetchRecordsResponse> {
        let mut seen = BTreeSet::new();
        let ids: Vec<&String> = ids.iter().filter(|id| seen.insert(id.as_str())).collect();
        let owned: Vec<String> = ids.iter().map(|id| (*id).clone()).collect();
        let existing = self.repository.get_many(&owned).await?;

        let mut response = FetchRecordsResponse::default();
        let mut readable = Vec::new();
        for id in ids {
            let Some(metadata) = existing.get(id.as_str()).filter(|m| m.is_active()) else {
                response.not_found_record_ids.push(id.clone());
                continue;
            };
            if self.gate.has_access_to(ctx, metadata).await? {
                readable.push(metadata);
            } else {
                response.unauthorized_record_ids.push(id.clone());
            }
        }

        let paths: HashMap<String, String> = readable
            .iter()
            .filter_map(|m| {
                m.latest_version_path()
                    .map(|p| (m.id.clone(), p.to_string()))
            })
            .collect();
        let mut payloads = self.storage.read(&paths).await?;

        for metadata in readable {
            let Some(payload) = payloads.remove(&metadata.id) else {
                warn!(record_id = %metadata.id, "Record has no readable version");
                response.not_found_record_ids.push(metadata.id.clone());
                continue;
            };
            response.records.push(Record {
                id: Some(metadata.id.clone()),
                kind: metadata.kind.clone(),
                data: payload.data,
                meta: payload.meta,
                ancestry: metadata.ancestry.clone(),
                acl: metadata.acl.clone(),
                legal: metadata.legal.clone(),
            });
        }

        debug!(
            found = response.records.len(),
            not_found = response.not_found_record_ids.len(),
            unauthorized = response.unauthorized_record_ids.len(),
            "Fetched records"
        );
        Ok(response)
    }
}
