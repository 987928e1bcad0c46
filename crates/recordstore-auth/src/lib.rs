//! RecordStore Authorization
//!
//! This crate provides:
//! - The request context carried through every service call
//! - The entitlements contract (ACL validation, owner and data access)
//! - Static, allow-all and deny-all entitlements implementations
//! - The access gate deciding read and owner access to existing records
//!
//! # Example
//!
//! ```rust,ignore
//! use recordstore_auth::{AccessGate, RequestContext, StaticEntitlements};
//! use std::sync::Arc;
//!
//! let entitlements = Arc::new(StaticEntitlements::from_config(&config.entitlements));
//! let gate = AccessGate::new(entitlements);
//! let ctx = RequestContext::new("tenant1", "alice@example.com");
//! let allowed = gate.has_access(&ctx, &existing).await?;
//! ```

pub mod access;
pub mod context;
pub mod entitlements;

pub use access::AccessGate;
pub use context::RequestContext;
pub use entitlements::{
    AllowAllEntitlements, DenyAllEntitlements, EntitlementsService, StaticEntitlements,
};
