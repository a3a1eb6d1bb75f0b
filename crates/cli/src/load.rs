//! The `load` command: provision, then push the corpus through the bulk-import procedure

use crate::init::{connect, ensure_target_provisioned};
use anyhow::{Context, Result};
use docbulk_core::config::Config;
use docbulk_loader::{BulkLoader, Corpus, LoadProgress, StoredProcedureSink};
use docbulk_storage::RetryStats;
use tracing::{info, warn};

/// Outcome of a completed load
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub target: String,
    pub corpus_documents: usize,
    pub progress: LoadProgress,
    pub retry: RetryStats,
    /// Documents present in the collection once the load finished
    pub documents_stored: usize,
}

pub async fn run_load(config: &Config, recreate: bool) -> Result<LoadSummary> {
    let corpus = Corpus::open(
        &config.loader.source_dir,
        &config.loader.file_pattern,
        config.loader.max_files,
    )?;
    if corpus.is_empty() {
        warn!(
            "No documents matching '{}' in {}",
            config.loader.file_pattern,
            config.loader.source_dir.display()
        );
    }

    let connection = connect(config);
    let target =
        ensure_target_provisioned(&connection.resolver, &config.provisioning, recreate).await?;

    let sink = StoredProcedureSink::new(connection.service.clone(), target.procedure.clone());
    let mut loader = BulkLoader::from_config(sink, connection.executor.clone(), &config.loader);

    let result = loader.run(&corpus).await;
    let progress = result.with_context(|| {
        format!(
            "Bulk load stopped after {} of {} documents",
            loader.progress().cursor,
            corpus.len()
        )
    })?;

    let documents_stored = connection
        .service
        .documents(&target.database.id, &target.collection.id)
        .await
        .len();
    info!(
        "{documents_stored} documents now stored in {}",
        target.collection.self_link
    );

    Ok(LoadSummary {
        target: target.procedure.self_link,
        corpus_documents: corpus.len(),
        progress,
        retry: connection.executor.stats(),
        documents_stored,
    })
}
