//! Bulk-load orchestration
//!
//! [`BulkLoader`] walks the corpus with a cursor. Each step sizes the next batch
//! from the cursor, submits it through the [`RetryExecutor`], and advances the
//! cursor by the number of documents the remote call reports as committed. A
//! partially committed batch is therefore re-offered from the first uncommitted
//! document on the next step.

use crate::batch::{BatchDescriptor, BatchSizer};
use crate::corpus::Corpus;
use crate::sink::BatchSink;
use docbulk_core::{Error, LoaderConfig, OversizedPolicy, Result};
use docbulk_storage::RetryExecutor;
use std::sync::Arc;
use tracing::{debug, info};

/// Progress of one bulk load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadProgress {
    /// Number of leading corpus documents committed so far
    pub cursor: usize,
    pub total_inserted: u64,
    pub batches_submitted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Running,
    Done,
}

pub struct BulkLoader<S> {
    sink: S,
    executor: Arc<RetryExecutor>,
    sizer: BatchSizer,
    oversized: OversizedPolicy,
    progress: LoadProgress,
    state: LoadState,
}

impl<S: BatchSink> BulkLoader<S> {
    pub fn new(sink: S, executor: Arc<RetryExecutor>, max_batch_bytes: usize) -> Self {
        Self {
            sink,
            executor,
            sizer: BatchSizer::new(max_batch_bytes),
            oversized: OversizedPolicy::default(),
            progress: LoadProgress::default(),
            state: LoadState::Running,
        }
    }

    pub fn from_config(sink: S, executor: Arc<RetryExecutor>, config: &LoaderConfig) -> Self {
        Self::new(sink, executor, config.max_script_size)
            .with_oversized_policy(config.oversized_documents)
    }

    pub fn with_oversized_policy(mut self, policy: OversizedPolicy) -> Self {
        self.oversized = policy;
        self
    }

    /// Progress as of the last completed step; still valid after a failed step
    pub fn progress(&self) -> LoadProgress {
        self.progress
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Loads the whole corpus, returning the final progress
    pub async fn run(&mut self, corpus: &Corpus) -> Result<LoadProgress> {
        info!(
            "Bulk load of {} documents to {} (max {} bytes per batch)",
            corpus.len(),
            self.sink.target(),
            self.sizer.ceiling()
        );
        while self.step(corpus).await? == LoadState::Running {}

        let stats = self.executor.stats();
        info!(
            "Bulk load complete: {} documents in {} batches ({} throttled attempts, {}ms waiting)",
            self.progress.total_inserted,
            self.progress.batches_submitted,
            stats.throttled_attempts,
            stats.total_delay.as_millis()
        );
        Ok(self.progress)
    }

    /// Performs one transition: submits the next batch, or finishes at the end of the corpus
    pub async fn step(&mut self, corpus: &Corpus) -> Result<LoadState> {
        if self.state == LoadState::Done {
            return Ok(LoadState::Done);
        }

        let Some(batch) = self.sizer.next_batch(corpus, self.progress.cursor) else {
            self.state = LoadState::Done;
            return Ok(LoadState::Done);
        };

        if self.oversized == OversizedPolicy::Reject && batch.payload_len() > self.sizer.ceiling() {
            let source = corpus
                .get(batch.start)
                .map(|item| item.source.as_str())
                .unwrap_or_default();
            return Err(Error::invalid_input(format!(
                "document {source} is {} bytes serialized, over the {} byte batch limit",
                batch.payload_len(),
                self.sizer.ceiling()
            )));
        }

        let committed = self.submit(&batch).await?;
        self.progress.cursor += committed;
        self.progress.total_inserted += committed as u64;
        self.progress.batches_submitted += 1;

        debug!(
            "Batch {}: offered documents [{}, {}) ({} bytes), committed {committed}, cursor now {}",
            self.progress.batches_submitted,
            batch.start,
            batch.end,
            batch.payload_len(),
            self.progress.cursor
        );
        Ok(LoadState::Running)
    }

    /// Sends one batch and checks the reported count against what was offered
    async fn submit(&self, batch: &BatchDescriptor) -> Result<usize> {
        let sink = &self.sink;
        let payload = &batch.payload;
        let reported = self
            .executor
            .execute("execute stored procedure", move || sink.insert_batch(payload))
            .await
            .map_err(|e| Error::remote("execute stored procedure", self.sink.target(), e))?;

        let committed = usize::try_from(reported).unwrap_or(usize::MAX);
        if committed == 0 {
            return Err(Error::protocol_violation(format!(
                "{} committed 0 of {} documents offered at cursor {}",
                self.sink.target(),
                batch.len(),
                batch.start
            )));
        }
        if committed > batch.len() {
            return Err(Error::protocol_violation(format!(
                "{} reported {reported} documents committed but only {} were offered at cursor {}",
                self.sink.target(),
                batch.len(),
                batch.start
            )));
        }
        Ok(committed)
    }
}
