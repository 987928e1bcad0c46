//! Entitlements contract and implementations
//!
//! The entitlements service owns group membership. Records only carry
//! group references in their ACL; every decision about whether a user
//! belongs to one of those groups is delegated here.

use async_trait::async_trait;
use parking_lot::RwLock;
use recordstore_common::Result;
use recordstore_common::config::EntitlementsConfig;
use std::collections::{BTreeSet, HashMap};

use crate::context::RequestContext;

/// Trait for entitlement lookups
#[async_trait]
pub trait EntitlementsService: Send + Sync {
    /// Name for logging
    fn name(&self) -> &str;

    /// Check that every group reference is a valid group of the tenant
    async fn is_valid_acl(&self, ctx: &RequestContext, groups: &BTreeSet<String>) -> Result<bool>;

    /// Check that the acting user belongs to at least one owner group
    async fn has_owner_access(&self, ctx: &RequestContext, owners: &[String]) -> Result<bool>;

    /// Check that the acting user belongs to at least one of the given groups
    async fn has_access_to_data(
        &self,
        ctx: &RequestContext,
        groups: &BTreeSet<String>,
    ) -> Result<bool>;
}

/// Allow-all entitlements (for testing or single-user setups)
#[derive(Debug, Default)]
pub struct AllowAllEntitlements;

#[async_trait]
impl EntitlementsService for AllowAllEntitlements {
    fn name(&self) -> &str {
        "allow-all"
    }

    async fn is_valid_acl(&self, _ctx: &RequestContext, _groups: &BTreeSet<String>) -> Result<bool> {
        Ok(true)
    }

    async fn has_owner_access(&self, _ctx: &RequestContext, _owners: &[String]) -> Result<bool> {
        Ok(true)
    }

    async fn has_access_to_data(
        &self,
        _ctx: &RequestContext,
        _groups: &BTreeSet<String>,
    ) -> Result<bool> {
        Ok(true)
    }
}

/// Deny-all entitlements (for testing)
#[derive(Debug, Default)]
pub struct DenyAllEntitlements;

#[async_trait]
impl EntitlementsService for DenyAllEntitlements {
    fn name(&self) -> &str {
        "deny-all"
    }

    async fn is_valid_acl(&self, _ctx: &RequestContext, _groups: &BTreeSet<String>) -> Result<bool> {
        Ok(false)
    }

    async fn has_owner_access(&self, _ctx: &RequestContext, _owners: &[String]) -> Result<bool> {
        Ok(false)
    }

    async fn has_access_to_data(
        &self,
        _ctx: &RequestContext,
        _groups: &BTreeSet<String>,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// Entitlements backed by a fixed group list and user memberships
///
/// Group names are compared case-insensitively, as group emails are.
pub struct StaticEntitlements {
    /// Valid groups (lowercased)
    groups: RwLock<BTreeSet<String>>,
    /// Memberships indexed by user (lowercased groups)
    members: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl Default for StaticEntitlements {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticEntitlements {
    /// Create an empty store; every ACL is invalid until groups are added
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(BTreeSet::new()),
            members: RwLock::new(HashMap::new()),
        }
    }

    /// Build from configuration
    #[must_use]
    pub fn from_config(config: &EntitlementsConfig) -> Self {
        let store = Self::new();
        for group in &config.groups {
            store.add_group(group);
        }
        for (user, groups) in &config.members {
            for group in groups {
                store.add_member(user, group);
            }
        }
        store
    }

    /// Register a valid group
    pub fn add_group(&self, group: &str) {
        self.groups.write().insert(group.to_ascii_lowercase());
    }

    /// Add a user to a group (registering the group if needed)
    pub fn add_member(&self, user: &str, group: &str) {
        let group = group.to_ascii_lowercase();
        self.groups.write().insert(group.clone());
        self.members
            .write()
            .entry(user.to_string())
            .or_default()
            .insert(group);
    }

    /// Groups of a user
    pub fn groups_of(&self, user: &str) -> BTreeSet<String> {
        self.members.read().get(user).cloned().unwrap_or_default()
    }

    fn is_member_of_any<'a>(&self, user: &str, groups: impl IntoIterator<Item = &'a String>) -> bool {
        let members = self.members.read();
        let Some(user_groups) = members.get(user) else {
            return false;
        };
        groups
            .into_iter()
            .any(|g| user_groups.contains(&g.to_ascii_lowercase()))
    }
}

#[async_trait]
impl EntitlementsService for StaticEntitlements {
    fn name(&self) -> &str {
        "static"
    }

    async fn is_valid_acl(&self, _ctx: &RequestContext, groups: &BTreeSet<String>) -> Result<bool> {
        let valid = self.groups.read();
        Ok(groups
            .iter()
            .all(|g| valid.contains(&g.to_ascii_lowercase())))
    }

    async fn has_owner_access(&self, ctx: &RequestContext, owners: &[String]) -> Result<bool> {
        Ok(self.is_member_of_any(&ctx.user, owners))
    }

    async fn has_access_to_data(
        &self,
        ctx: &RequestContext,
        groups: &BTreeSet<String>,
    ) -> Result<bool> {
        Ok(self.is_member_of_any(&ctx.user, groups))
    }
}
