//! RecordStore Service - record ingestion and lifecycle
//!
//! This crate implements the record services on top of the repository,
//! blob store, entitlements and legal contracts:
//! - Record validation and batch ingestion with duplicate detection
//! - Soft delete, purge with rollback and bulk metadata patches
//! - Record retrieval and legal compliance updates
//! - Batched change notifications and the audit trail
//!
//! Backends are chosen once by the embedding process and passed in
//! through [`ServiceDependencies`].

pub mod audit;
pub mod cache;
pub mod compliance;
pub mod dedup;
pub mod ingestion;
pub mod legal;
pub mod lifecycle;
pub mod metrics;
pub mod notification;
pub mod persistence;
pub mod pool;
pub mod retrieval;
pub mod schema;
pub mod services;
pub mod validator;
pub mod versions;

#[cfg(test)]
mod testkit;

// Re-exports
pub use audit::{AuditAction, AuditLogger, TracingAuditLogger};
pub use cache::{Cache, CacheStats, InMemoryCache};
pub use compliance::LegalComplianceService;
pub use dedup::DuplicateDetector;
pub use ingestion::IngestionService;
pub use legal::{CachedLegalService, LegalService, StaticLegalService};
pub use lifecycle::RecordLifecycleService;
pub use notification::{
    DEFAULT_PUBLISH_BATCH_SIZE, LoggingNotificationSink, NotificationEmitter, NotificationSink,
};
pub use persistence::PersistenceService;
pub use pool::{DEFAULT_MAX_CONCURRENCY, WorkerPool};
pub use retrieval::{FetchRecordsResponse, RecordRetrievalService};
pub use schema::{CachedSchemaRegistry, Schema, SchemaRegistry, StaticSchemaRegistry};
pub use services::{RecordServices, ServiceCore, ServiceDependencies};
pub use validator::RecordValidator;
pub use versions::VersionStorage;
