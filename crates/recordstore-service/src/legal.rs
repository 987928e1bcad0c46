//! Legal service contract and implementations
//!
//! Legal tags are owned by an external compliance service; records only
//! name them. Parent records constrain their children: a child inherits
//! every parent's tags and countries, and a child of an incompliant parent
//! is rejected.

use async_trait::async_trait;
use recordstore_auth::RequestContext;
use recordstore_common::config::LegalConfig;
use recordstore_common::{Error, LegalCompliance, ParentRef, Record, RecordMetadata, Result};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::cache::Cache;

/// Trait for legal validation and parent propagation
#[async_trait]
pub trait LegalService: Send + Sync {
    /// Fail with `LegalValidationFailed` if any tag is unknown or expired
    async fn validate_legal_tags(&self, ctx: &RequestContext, tags: &BTreeSet<String>) -> Result<()>;

    /// Fail with `LegalValidationFailed` if any country code is not accepted
    async fn validate_other_relevant_data_countries(
        &self,
        ctx: &RequestContext,
        countries: &BTreeSet<String>,
    ) -> Result<()>;

    /// Merge each parent's legal block into its children
    ///
    /// `parents` maps a child record id to its parsed parent references;
    /// every referenced parent is present in `existing`.
    async fn populate_legal_info_from_parents(
        &self,
        _ctx: &RequestContext,
        records: &mut [Record],
        existing: &HashMap<String, RecordMetadata>,
        parents: &HashMap<String, Vec<ParentRef>>,
    ) -> Result<()> {
        merge_parent_legal(records, existing, parents)
    }

    /// Drop any cached state for a legal tag
    fn invalidate_legal_tag(&self, _tenant: &str, _tag: &str) {}
}

/// Union parent tags and countries into each child
///
/// # Errors
/// Returns `Error::LegalValidationFailed` if a parent is incompliant.
pub fn merge_parent_legal(
    records: &mut [Record],
    existing: &HashMap<String, RecordMetadata>,
    parents: &HashMap<String, Vec<ParentRef>>,
) -> Result<()> {
    for record in records.iter_mut() {
        let Some(refs) = parents.get(record.id()) else {
            continue;
        };
        for parent in refs {
            let Some(metadata) = existing.get(&parent.id) else {
                return Err(Error::ParentNotFound(parent.id.clone()));
            };
            if metadata.legal.status == LegalCompliance::Incompliant {
                return Err(Error::legal(format!(
                    "parent record '{}' of '{}' is not legally compliant",
                    parent.id,
                    record.id()
                )));
            }
            record.legal.merge(&metadata.legal);
        }
    }
    Ok(())
}

/// Legal service backed by configured tag and country lists
#[derive(Debug, Default, Clone)]
pub struct StaticLegalService {
    valid_tags: BTreeSet<String>,
    valid_countries: BTreeSet<String>,
}

impl StaticLegalService {
    pub fn new<T, C>(tags: T, countries: C) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            valid_tags: tags.into_iter().map(Into::into).collect(),
            valid_countries: countries.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn from_config(config: &LegalConfig) -> Self {
        Self::new(config.valid_tags.iter().cloned(), config.valid_countries.iter().cloned())
    }

    /// Check one tag without going through the contract
    #[must_use]
    pub fn is_valid_tag(&self, tag: &str) -> bool {
        self.valid_tags.contains(tag)
    }
}

#[async_trait]
impl LegalService for StaticLegalService {
    async fn validate_legal_tags(&self, _ctx: &RequestContext, tags: &BTreeSet<String>) -> Result<()> {
        let invalid: Vec<&str> = tags
            .iter()
            .filter(|t| !self.valid_tags.contains(*t))
            .map(String::as_str)
            .collect();
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(Error::legal(format!("invalid legal tags: {}", invalid.join(", "))))
        }
    }

    async fn validate_other_relevant_data_countries(
        &self,
        _ctx: &RequestContext,
        countries: &BTreeSet<String>,
    ) -> Result<()> {
        let invalid: Vec<&str> = countries
            .iter()
            .filter(|c| !self.valid_countries.contains(*c))
            .map(String::as_str)
            .collect();
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(Error::legal(format!(
                "invalid other relevant data countries: {}",
                invalid.join(", ")
            )))
        }
    }
}

/// Legal service that remembers valid tags per tenant
///
/// Only successful tag validations are cached; a compliance change for a
/// tag must invalidate it.
pub struct CachedLegalService {
    inner: Arc<dyn LegalService>,
    cache: Arc<dyn Cache<bool>>,
}

impl CachedLegalService {
    pub fn new(inner: Arc<dyn LegalService>, cache: Arc<dyn Cache<bool>>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl LegalService for CachedLegalService {
    async fn validate_legal_tags(&self, ctx: &RequestContext, tags: &BTreeSet<String>) -> Result<()> {
        let uncached: BTreeSet<String> = tags
            .iter()
            .filter(|t| self.cache.get(&ctx.tenant, t) != Some(true))
            .cloned()
            .collect();
        if uncached.is_empty() {
            debug!(count = tags.len(), "Legal tags served from cache");
            return Ok(());
        }
        self.inner.validate_legal_tags(ctx, &uncached).await?;
        for tag in &uncached {
            self.cache.put(&ctx.tenant, tag, true);
        }
        Ok(())
    }

    async fn validate_other_relevant_data_countries(
        &self,
        ctx: &RequestContext,
        countries: &BTreeSet<String>,
    ) -> Result<()> {
        self.inner
            .validate_other_relevant_data_countries(ctx, countries)
            .await
    }

    async fn populate_legal_info_from_parents(
        &self,
        ctx: &RequestContext,
        records: &mut [Record],
        existing: &HashMap<String, RecordMetadata>,
        parents: &HashMap<String, Vec<ParentRef>>,
    ) -> Result<()> {
        self.inner
            .populate_legal_info_from_parents(ctx, records, existing, parents)
            .await
    }

    fn invalidate_legal_tag(&self, tenant: &str, tag: &str) {
        self.cache.delete(tenant, tag);
        self.inner.invalidate_legal_tag(tenant, tag);
    }
}
