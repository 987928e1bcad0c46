//! Service wiring
//!
//! Backends are chosen once at startup and handed in as trait objects;
//! every service shares the same worker pool, access gate and sinks.

use recordstore_auth::{AccessGate, EntitlementsService};
use recordstore_common::config::ProcessingConfig;
use recordstore_meta_store::MetadataRepository;
use recordstore_storage::BlobStore;
use std::sync::Arc;

use crate::audit::AuditLogger;
use crate::compliance::LegalComplianceService;
use crate::ingestion::IngestionService;
use crate::legal::LegalService;
use crate::lifecycle::RecordLifecycleService;
use crate::notification::{NotificationEmitter, NotificationSink};
use crate::pool::WorkerPool;
use crate::retrieval::RecordRetrievalService;
use crate::schema::SchemaRegistry;
use crate::validator::RecordValidator;
use crate::versions::VersionStorage;

/// External collaborators, one implementation each
pub struct ServiceDependencies {
    pub repository: Arc<dyn MetadataRepository>,
    pub blobs: Arc<dyn BlobStore>,
    pub entitlements: Arc<dyn EntitlementsService>,
    pub legal: Arc<dyn LegalService>,
    pub notifications: Arc<dyn NotificationSink>,
    pub audit: Arc<dyn AuditLogger>,
    pub schemas: Option<Arc<dyn SchemaRegistry>>,
}

/// Components shared by every service
#[derive(Clone)]
pub struct ServiceCore {
    pub repository: Arc<dyn MetadataRepository>,
    pub storage: VersionStorage,
    pub gate: AccessGate,
    pub legal: Arc<dyn LegalService>,
    pub notifications: NotificationEmitter,
    pub audit: Arc<dyn AuditLogger>,
}

/// All record services over one set of backends
pub struct RecordServices {
    pub ingestion: IngestionService,
    pub lifecycle: RecordLifecycleService,
    pub retrieval: RecordRetrievalService,
    pub compliance: LegalComplianceService,
}

impl RecordServices {
    pub fn new(config: &ProcessingConfig, deps: ServiceDependencies) -> Self {
        let pool = WorkerPool::new(config.max_concurrency);
        let core = ServiceCore {
            repository: deps.repository,
            storage: VersionStorage::new(deps.blobs, pool),
            gate: AccessGate::new(deps.entitlements.clone()),
            legal: deps.legal,
            notifications: NotificationEmitter::new(deps.notifications, config.publish_batch_size),
            audit: deps.audit,
        };

        let mut validator = RecordValidator::new(deps.entitlements);
        if let Some(schemas) = deps.schemas {
            validator = validator.with_schemas(schemas);
        }

        Self {
            ingestion: IngestionService::new(&core, validator),
            lifecycle: RecordLifecycleService::new(&core),
            retrieval: RecordRetrievalService::new(&core),
            compliance: LegalComplianceService::new(&core, config.legal_query_page_size),
        }
    }
}
