//! Core type definitions for RecordStore
//!
//! This module defines the record data model: caller-supplied records,
//! the durable metadata envelope, per-version payloads and the batch
//! bookkeeping types handed between the ingestion and persistence layers.

use crate::error::{Error, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Opaque key-value payload (field order is preserved)
pub type DataMap = Map<String, Value>;

/// Access control list of a record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    /// Groups allowed to modify and delete the record
    pub owners: Vec<String>,
    /// Groups allowed to read the record
    pub viewers: Vec<String>,
}

impl Acl {
    /// Create an ACL from owner and viewer groups
    pub fn new<O, V>(owners: O, viewers: V) -> Self
    where
        O: IntoIterator,
        O::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self {
            owners: owners.into_iter().map(Into::into).collect(),
            viewers: viewers.into_iter().map(Into::into).collect(),
        }
    }

    /// Union of owner and viewer groups
    #[must_use]
    pub fn all_groups(&self) -> BTreeSet<String> {
        self.owners.iter().chain(&self.viewers).cloned().collect()
    }
}

/// Legal compliance status of a record
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegalCompliance {
    #[default]
    #[display("compliant")]
    Compliant,
    #[display("incompliant")]
    Incompliant,
}

/// Legal block of a record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Legal {
    /// Legal tag names the record must satisfy
    #[serde(rename = "legaltags", default)]
    pub legal_tags: BTreeSet<String>,
    /// Other relevant data countries (ORDC)
    #[serde(default)]
    pub other_relevant_data_countries: BTreeSet<String>,
    /// Compliance status
    #[serde(default)]
    pub status: LegalCompliance,
}

impl Legal {
    /// Create a legal block with the given tags and countries
    pub fn new<T, C>(tags: T, countries: C) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            legal_tags: tags.into_iter().map(Into::into).collect(),
            other_relevant_data_countries: countries.into_iter().map(Into::into).collect(),
            status: LegalCompliance::Compliant,
        }
    }

    /// Merge another legal block into this one (union of tags and countries)
    pub fn merge(&mut self, other: &Self) {
        self.legal_tags.extend(other.legal_tags.iter().cloned());
        self.other_relevant_data_countries
            .extend(other.other_relevant_data_countries.iter().cloned());
        if other.status == LegalCompliance::Incompliant {
            self.status = LegalCompliance::Incompliant;
        }
    }
}

/// Reference to a specific version of a parent record (`"{id}:{version}"`)
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash)]
#[display("{id}:{version}")]
pub struct ParentRef {
    pub id: String,
    pub version: u64,
}

impl ParentRef {
    /// Parse a parent reference; the version is the last `:` component.
    ///
    /// # Errors
    /// Returns `Error::InvalidRecordId` if the reference has no numeric version.
    pub fn parse(reference: &str, tenant: &str) -> Result<Self> {
        let invalid = || Error::InvalidRecordId {
            id: reference.to_string(),
            tenant: tenant.to_string(),
        };
        let (id, version) = reference.rsplit_once(':').ok_or_else(invalid)?;
        let version = version.parse::<u64>().map_err(|_| invalid())?;
        if id.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            id: id.to_string(),
            version,
        })
    }
}

/// Ancestry of a record (parent references)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestry {
    pub parents: Vec<String>,
}

/// A caller-supplied record
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record identifier; generated on create when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tenant-qualified type name (`tenant:group:type:version`)
    pub kind: String,
    /// Opaque payload
    #[serde(default)]
    pub data: DataMap,
    /// Optional meta blocks stored alongside the payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<DataMap>>,
    /// Parent references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestry: Option<Ancestry>,
    pub acl: Acl,
    #[serde(default)]
    pub legal: Legal,
}

impl Record {
    /// Record id, or an empty string before id assignment
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Raw parent references of this record
    #[must_use]
    pub fn parents(&self) -> &[String] {
        self.ancestry
            .as_ref()
            .map_or(&[] as &[String], |a| a.parents.as_slice())
    }

    /// Parsed parent references
    ///
    /// # Errors
    /// Returns `Error::InvalidRecordId` for malformed references.
    pub fn parent_refs(&self, tenant: &str) -> Result<Vec<ParentRef>> {
        self.parents()
            .iter()
            .map(|p| ParentRef::parse(p, tenant))
            .collect()
    }
}

/// Lifecycle state of a record
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    #[default]
    #[display("active")]
    Active,
    #[display("deleted")]
    Deleted,
    #[display("purged")]
    Purged,
}

/// Durable metadata envelope of a record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub id: String,
    pub kind: String,
    pub acl: Acl,
    pub legal: Legal,
    pub ancestry: Option<Ancestry>,
    pub status: RecordState,
    /// Original author
    pub user: String,
    /// Creation time (unix millis)
    pub create_time: u64,
    pub modify_user: Option<String>,
    /// Last modification time (unix millis)
    pub modify_time: Option<u64>,
    /// Version paths, oldest to newest
    pub version_paths: Vec<String>,
    /// Optimistic-lock revision, bumped by the repository on every write
    pub revision: u64,
}

impl RecordMetadata {
    /// Build metadata from an accepted record
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id().to_string(),
            kind: record.kind.clone(),
            acl: record.acl.clone(),
            legal: record.legal.clone(),
            ancestry: record.ancestry.clone(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RecordState::Active
    }

    #[must_use]
    pub fn has_version(&self) -> bool {
        !self.version_paths.is_empty()
    }

    /// Storage path of a given version
    #[must_use]
    pub fn version_path(&self, version: u64) -> String {
        format!("{}/{}/{version}", self.kind, self.id)
    }

    /// Append the path of a new version
    pub fn add_version_path(&mut self, version: u64) {
        let path = self.version_path(version);
        self.version_paths.push(path);
    }

    /// Path of the newest version, if any
    #[must_use]
    pub fn latest_version_path(&self) -> Option<&str> {
        self.version_paths.last().map(String::as_str)
    }

    /// Newest version number, if any
    #[must_use]
    pub fn latest_version(&self) -> Option<u64> {
        self.latest_version_path().and_then(version_from_path)
    }

    /// All version numbers, oldest to newest
    #[must_use]
    pub fn versions(&self) -> Vec<u64> {
        self.version_paths
            .iter()
            .filter_map(|p| version_from_path(p))
            .collect()
    }
}

/// Extract the version number (last path segment) from a version path
#[must_use]
pub fn version_from_path(path: &str) -> Option<u64> {
    path.rsplit('/').next().and_then(|v| v.parse().ok())
}

/// Payload of a single record version
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordData {
    #[serde(default)]
    pub data: DataMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<DataMap>>,
}

impl From<&Record> for RecordData {
    fn from(record: &Record) -> Self {
        Self {
            data: record.data.clone(),
            meta: record.meta.clone(),
        }
    }
}

/// Kind of change applied to a record
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    #[display("create")]
    Create,
    #[display("update")]
    Update,
    #[display("delete")]
    Delete,
}

/// One unit of work handed to persistence
#[derive(Clone, Debug, PartialEq)]
pub struct RecordProcessing {
    pub data: RecordData,
    pub metadata: RecordMetadata,
    pub operation: OperationType,
}

/// Summary of one ingestion batch
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInfo {
    /// Acting user
    pub user: String,
    /// Version identifier shared by every record written in the batch
    pub version: u64,
    /// Number of records submitted
    pub record_count: usize,
    /// Ids written in this batch
    pub written_records: Vec<String>,
    /// Ids skipped as duplicates of their latest version
    pub skipped_records: Vec<String>,
}

impl TransferInfo {
    /// Create a transfer for a batch of `record_count` records
    pub fn new(user: impl Into<String>, version: u64, record_count: usize) -> Self {
        Self {
            user: user.into(),
            version,
            record_count,
            written_records: Vec::new(),
            skipped_records: Vec::new(),
        }
    }
}

/// Change notification for one record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubSubInfo {
    pub id: String,
    pub kind: String,
    pub op: OperationType,
}

impl PubSubInfo {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, op: OperationType) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            op,
        }
    }
}

/// Patch operation verb
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    #[display("add")]
    Add,
    #[display("replace")]
    Replace,
    #[display("remove")]
    Remove,
}

/// A single metadata patch operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default)]
    pub value: Vec<String>,
}

impl PatchOperation {
    pub fn new<V>(op: PatchOp, path: impl Into<String>, value: V) -> Self
    where
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self {
            op,
            path: path.into(),
            value: value.into_iter().map(Into::into).collect(),
        }
    }
}

/// Record selection for bulk operations
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub ids: Vec<String>,
}

/// Outcome of a bulk metadata update; every input id lands in exactly one list
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateRecordsResponse {
    pub record_count: usize,
    pub record_ids: Vec<String>,
    pub not_found_record_ids: Vec<String>,
    pub unauthorized_record_ids: Vec<String>,
    pub locked_record_ids: Vec<String>,
}
