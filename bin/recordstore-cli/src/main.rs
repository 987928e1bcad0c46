//! RecordStore CLI - operator command line interface
//!
//! Wires the configured backends to the record services and runs a
//! single operation: ingest a JSON batch, fetch, delete, purge, patch
//! metadata, or apply legal tag status changes.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use recordstore_auth::{RequestContext, StaticEntitlements};
use recordstore_common::config::Backend;
use recordstore_common::{
    LegalCompliance, PatchOperation, Record, RecordQuery, ServiceConfig,
};
use recordstore_meta_store::{
    InMemoryMetadataRepository, MetadataRepository, RedbMetadataRepository,
};
use recordstore_service::{
    CachedLegalService, CachedSchemaRegistry, InMemoryCache, LoggingNotificationSink,
    RecordServices, Schema, SchemaRegistry, ServiceDependencies, StaticLegalService,
    StaticSchemaRegistry, TracingAuditLogger,
};
use recordstore_storage::{BlobStore, InMemoryBlobStore, RedbBlobStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "recordstore-cli")]
#[command(about = "RecordStore operator CLI")]
#[command(version)]
struct Args {
    /// Configuration file (TOML); RECORDSTORE__* variables override it
    #[arg(short, long, env = "RECORDSTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Acting user
    #[arg(short, long, env = "RECORDSTORE_USER")]
    user: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or update records from a JSON array
    Ingest {
        /// File holding the records
        file: PathBuf,
        /// Skip records identical to their latest version
        #[arg(long)]
        skip_duplicates: Option<bool>,
    },
    /// Print the latest version of records
    Fetch {
        /// Record ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Soft-delete a record
    Delete {
        /// Record id
        id: String,
    },
    /// Permanently remove a record and all its versions
    Purge {
        /// Record id
        id: String,
    },
    /// Apply metadata patch operations from a JSON array
    Patch {
        /// File holding the patch operations
        #[arg(long)]
        ops: PathBuf,
        /// Record ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Change the compliance status of a legal tag
    Compliance {
        /// Legal tag name
        tag: String,
        /// New status
        #[arg(value_enum)]
        status: StatusArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StatusArg {
    Compliant,
    Incompliant,
}

impl From<StatusArg> for LegalCompliance {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Compliant => Self::Compliant,
            StatusArg::Incompliant => Self::Incompliant,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }
    let config = builder
        .add_source(config::Environment::with_prefix("RECORDSTORE").separator("__"))
        .build()
        .context("failed to load configuration")?
        .try_deserialize()
        .context("invalid configuration")?;
    Ok(config)
}

fn open_backends(
    config: &ServiceConfig,
) -> Result<(Arc<dyn MetadataRepository>, Arc<dyn BlobStore>)> {
    match config.storage.backend {
        Backend::Memory => Ok((
            Arc::new(InMemoryMetadataRepository::new()),
            Arc::new(InMemoryBlobStore::new()),
        )),
        Backend::Redb => {
            let dir = &config.storage.data_dir;
            let repository = RedbMetadataRepository::open(dir.join("meta.redb"))
                .context("failed to open metadata store")?;
            let blobs = RedbBlobStore::open(dir.join("blobs.redb"))
                .context("failed to open blob store")?;
            Ok((Arc::new(repository), Arc::new(blobs)))
        }
    }
}

fn build_services(config: &ServiceConfig) -> Result<RecordServices> {
    let (repository, blobs) = open_backends(config)?;
    let capacity = config.processing.cache_capacity;

    let legal = CachedLegalService::new(
        Arc::new(StaticLegalService::from_config(&config.legal)),
        Arc::new(InMemoryCache::<bool>::new(capacity)),
    );

    let schemas: Option<Arc<dyn SchemaRegistry>> = if config.schemas.is_empty() {
        None
    } else {
        let registry = StaticSchemaRegistry::new();
        for (kind, keys) in &config.schemas {
            registry.register(kind.clone(), Schema::new(keys.iter().cloned()));
        }
        Some(Arc::new(CachedSchemaRegistry::new(
            Arc::new(registry),
            Arc::new(InMemoryCache::<Schema>::new(capacity)),
        )))
    };

    info!(
        tenant = %config.tenant.name,
        repository = repository.name(),
        blobs = blobs.name(),
        "Starting record services"
    );

    Ok(RecordServices::new(
        &config.processing,
        ServiceDependencies {
            repository,
            blobs,
            entitlements: Arc::new(StaticEntitlements::from_config(&config.entitlements)),
            legal: Arc::new(legal),
            notifications: Arc::new(LoggingNotificationSink),
            audit: Arc::new(TracingAuditLogger),
            schemas,
        },
    ))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(args.config.as_deref())?;
    let services = build_services(&config)?;
    let ctx = RequestContext::new(config.tenant.name.clone(), args.user.clone());

    match args.command {
        Commands::Ingest {
            file,
            skip_duplicates,
        } => {
            let records: Vec<Record> = read_json(&file)?;
            let skip = skip_duplicates.unwrap_or(config.processing.skip_duplicates_default);
            let transfer = services
                .ingestion
                .create_update_records(&ctx, skip, records, &args.user)
                .await?;
            print_json(&transfer)?;
        }
        Commands::Fetch { ids } => {
            let response = services.retrieval.fetch_records(&ctx, &ids).await?;
            print_json(&response)?;
        }
        Commands::Delete { id } => {
            services
                .lifecycle
                .delete_record(&ctx, &id, &args.user)
                .await?;
            println!("Deleted {id}");
        }
        Commands::Purge { id } => {
            services.lifecycle.purge_record(&ctx, &id).await?;
            println!("Purged {id}");
        }
        Commands::Patch { ops, ids } => {
            let ops: Vec<PatchOperation> = read_json(&ops)?;
            let response = services
                .lifecycle
                .bulk_update_records(&ctx, RecordQuery { ids }, &ops, &args.user)
                .await?;
            print_json(&response)?;
        }
        Commands::Compliance { tag, status } => {
            let changes = BTreeMap::from([(tag, LegalCompliance::from(status))]);
            let updated = services
                .compliance
                .update_compliance(&ctx, &changes)
                .await?;
            print_json(&updated)?;
        }
    }

    Ok(())
}
