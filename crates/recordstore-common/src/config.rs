//! Configuration types for RecordStore
//!
//! This module defines configuration structures used across components.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Root configuration for the record services
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Tenant (data partition) served by this process
    pub tenant: TenantConfig,
    /// Worker pool and batching configuration
    pub processing: ProcessingConfig,
    /// Persistence backend configuration
    pub storage: StorageConfig,
    /// Static entitlements (used when no entitlements service is wired)
    pub entitlements: EntitlementsConfig,
    /// Static legal tag configuration
    pub legal: LegalConfig,
    /// Kind -> top-level data keys; empty disables schema checks
    pub schemas: BTreeMap<String, BTreeSet<String>>,
}

/// Tenant identity
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantConfig {
    /// Tenant name; first component of every kind and record id
    pub name: String,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            name: "tenant1".to_string(),
        }
    }
}

/// Worker pool and batching configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum concurrent blob reads/writes across all requests
    pub max_concurrency: usize,
    /// Messages per notification publish call
    pub publish_batch_size: usize,
    /// Default for `skip_duplicates` when the caller does not choose
    pub skip_duplicates_default: bool,
    /// Maximum cached entries per cache
    pub cache_capacity: usize,
    /// Page size when scanning records by legal tag
    pub legal_query_page_size: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            publish_batch_size: 50,
            skip_duplicates_default: false,
            cache_capacity: 1024,
            legal_query_page_size: 500,
        }
    }
}

/// Persistence backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Process-local maps (tests, dry runs)
    Memory,
    /// redb files under `data_dir`
    #[default]
    Redb,
}

/// Persistence configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selected at startup
    pub backend: Backend,
    /// Directory for redb files
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Redb,
            data_dir: PathBuf::from("/var/lib/recordstore"),
        }
    }
}

/// Static entitlements: valid groups and user memberships
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitlementsConfig {
    /// Groups that may appear in record ACLs
    pub groups: BTreeSet<String>,
    /// User email -> groups the user belongs to
    pub members: BTreeMap<String, BTreeSet<String>>,
}

/// Static legal configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalConfig {
    /// Legal tags that currently validate
    pub valid_tags: BTreeSet<String>,
    /// Accepted ORDC country codes
    pub valid_countries: BTreeSet<String>,
}
