//! Remote resource initialization
//!
//! Sets up the service connection and makes sure the target database, collection
//! and bulk-import procedure exist before any documents are sent.

use anyhow::{Context, Result};
use docbulk_core::config::{Config, ProvisioningConfig};
use docbulk_storage::{
    Collection, CollectionSpec, Database, InMemoryDocumentService, ProvisioningResolver,
    RetryExecutor, ScriptDefinition, StoredProcedure, BULK_IMPORT_SCRIPT,
};
use std::sync::Arc;
use tracing::info;

/// Handles shared by the provisioning and load flows
pub struct Connection {
    pub service: Arc<InMemoryDocumentService>,
    pub executor: Arc<RetryExecutor>,
    pub resolver: ProvisioningResolver,
}

/// Resources a bulk load writes through
#[derive(Debug, Clone)]
pub struct ProvisionedTarget {
    pub database: Database,
    pub collection: Collection,
    pub procedure: StoredProcedure,
}

/// Starts an emulated service from `config` with one retry executor for every call
pub fn connect(config: &Config) -> Connection {
    let service = Arc::new(InMemoryDocumentService::from_config(&config.emulator));
    let executor = Arc::new(RetryExecutor::new());
    let resolver = ProvisioningResolver::new(service.clone(), executor.clone())
        .with_default_offer_type(&config.provisioning.offer_type);
    Connection {
        service,
        executor,
        resolver,
    }
}

/// Ensure the database, collection and bulk-import procedure exist
///
/// With `recreate` (or `recreate_database` in config) the database is dropped and
/// created empty first. The bulk-import procedure is always replaced so the
/// registered body matches the configured script.
pub async fn ensure_target_provisioned(
    resolver: &ProvisioningResolver,
    config: &ProvisioningConfig,
    recreate: bool,
) -> Result<ProvisionedTarget> {
    let spec = config
        .collection_spec
        .as_deref()
        .map(CollectionSpec::from_file)
        .transpose()
        .context("Failed to load collection template")?;

    let database = if recreate || config.recreate_database {
        resolver.recreate_database(&config.database_id).await?
    } else {
        resolver.ensure_database(&config.database_id).await?
    };

    let collection = resolver
        .ensure_collection(&database, &config.collection_id, spec.as_ref())
        .await?;

    let body = bulk_import_body(config)?;
    let procedure = resolver
        .replace_stored_procedure(
            &collection,
            &ScriptDefinition::new(&config.bulk_import_procedure, body),
        )
        .await?;

    info!("Bulk-import procedure ready at {}", procedure.self_link);
    Ok(ProvisionedTarget {
        database,
        collection,
        procedure,
    })
}

fn bulk_import_body(config: &ProvisioningConfig) -> Result<String> {
    match &config.bulk_import_script {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bulk-import script {}", path.display())),
        None => Ok(BULK_IMPORT_SCRIPT.to_string()),
    }
}
