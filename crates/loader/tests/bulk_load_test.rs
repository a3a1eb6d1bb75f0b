use async_trait::async_trait;
use docbulk_core::{Error, OversizedPolicy};
use docbulk_loader::{BatchSink, BulkLoader, Corpus, LoadProgress, LoadState, StoredProcedureSink};
use docbulk_storage::{
    InMemoryDocumentService, ProvisioningResolver, RawPayload, RemoteError, RetryExecutor,
    ScriptDefinition, BULK_IMPORT_SCRIPT,
};
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sink that replays scripted responses and records what it was offered
#[derive(Default)]
struct ScriptedSink {
    responses: Mutex<VecDeque<Result<u64, RemoteError>>>,
    offered: Mutex<Vec<usize>>,
}

impl ScriptedSink {
    fn new(responses: Vec<Result<u64, RemoteError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            offered: Mutex::new(Vec::new()),
        }
    }

    /// Number of documents in each payload received, throttled attempts included
    fn offered(&self) -> Vec<usize> {
        self.offered.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchSink for ScriptedSink {
    async fn insert_batch(&self, payload: &RawPayload) -> Result<u64, RemoteError> {
        let docs: Vec<serde_json::Value> = serde_json::from_slice(payload.as_bytes()).unwrap();
        self.offered.lock().unwrap().push(docs.len());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(docs.len() as u64))
    }

    fn target(&self) -> String {
        "dbs/test/colls/test/sprocs/BulkImport".to_string()
    }
}

/// A JSON document padded to exactly `size` bytes
fn padded_document(id: usize, size: usize) -> Vec<u8> {
    let prefix = format!(r#"{{"id":"{id}","pad":""#);
    let suffix = r#""}"#;
    let padding = size - prefix.len() - suffix.len();
    format!("{prefix}{}{suffix}", "x".repeat(padding)).into_bytes()
}

fn small_documents(count: usize) -> Corpus {
    Corpus::from_documents((0..count).map(|i| format!(r#"{{"id":"{i}"}}"#)))
}

#[tokio::test]
async fn test_five_twenty_kilobyte_documents() {
    let corpus = Corpus::from_documents((0..5).map(|i| padded_document(i, 20_000)));
    let sink = Arc::new(ScriptedSink::default());
    let mut loader = BulkLoader::new(sink.clone(), Arc::new(RetryExecutor::new()), 50_000);

    let progress = loader.run(&corpus).await.unwrap();

    assert_eq!(sink.offered(), vec![2, 2, 1]);
    assert_eq!(
        progress,
        LoadProgress {
            cursor: 5,
            total_inserted: 5,
            batches_submitted: 3,
        }
    );
    assert_eq!(loader.state(), LoadState::Done);
}

#[tokio::test]
async fn test_partial_commit_re_offers_remainder() {
    let corpus = small_documents(3);
    let sink = Arc::new(ScriptedSink::new(vec![Ok(1)]));
    let mut loader = BulkLoader::new(sink.clone(), Arc::new(RetryExecutor::new()), 10_000);

    assert_eq!(loader.step(&corpus).await.unwrap(), LoadState::Running);
    assert_eq!(loader.progress().cursor, 1);

    assert_eq!(loader.step(&corpus).await.unwrap(), LoadState::Running);
    assert_eq!(loader.progress().cursor, 3);
    assert_eq!(loader.step(&corpus).await.unwrap(), LoadState::Done);

    // Second batch starts at document 1, not document 3
    assert_eq!(sink.offered(), vec![3, 2]);
    assert_eq!(loader.progress().total_inserted, 3);
}

#[tokio::test]
async fn test_cursor_is_monotonic_and_ends_at_corpus_length() {
    let corpus = small_documents(20);
    let sink = ScriptedSink::new(vec![Ok(3), Ok(1), Ok(4), Ok(2), Ok(4)]);
    let mut loader = BulkLoader::new(sink, Arc::new(RetryExecutor::new()), 60);

    let mut cursors = vec![0];
    while loader.step(&corpus).await.unwrap() == LoadState::Running {
        cursors.push(loader.progress().cursor);
    }

    assert!(cursors.windows(2).all(|w| w[1] > w[0]), "{cursors:?}");
    assert_eq!(loader.progress().cursor, corpus.len());
    assert_eq!(loader.progress().total_inserted, 20);
}

#[tokio::test]
async fn test_zero_commit_is_protocol_violation() {
    let corpus = small_documents(4);
    let sink = ScriptedSink::new(vec![Ok(2), Ok(0)]);
    let mut loader = BulkLoader::new(sink, Arc::new(RetryExecutor::new()), 10_000);

    let err = loader.run(&corpus).await.unwrap_err();

    assert!(matches!(err, Error::ProtocolViolation(_)), "{err}");
    assert_eq!(loader.progress().cursor, 2);
    assert_eq!(loader.state(), LoadState::Running);
}

#[tokio::test]
async fn test_over_commit_is_protocol_violation() {
    let corpus = small_documents(2);
    let sink = ScriptedSink::new(vec![Ok(5)]);
    let mut loader = BulkLoader::new(sink, Arc::new(RetryExecutor::new()), 10_000);

    let err = loader.run(&corpus).await.unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation(_)));
    assert_eq!(loader.progress(), LoadProgress::default());
}

#[tokio::test]
async fn test_fatal_remote_error_aborts_with_last_progress() {
    let corpus = small_documents(6);
    let sink = ScriptedSink::new(vec![
        Ok(2),
        Err(RemoteError::BadRequest("document too large".to_string())),
    ]);
    let mut loader = BulkLoader::new(sink, Arc::new(RetryExecutor::new()), 30);

    let err = loader.run(&corpus).await.unwrap_err();

    match err {
        Error::Remote {
            operation,
            resource,
            ..
        } => {
            assert_eq!(operation, "execute stored procedure");
            assert_eq!(resource, "dbs/test/colls/test/sprocs/BulkImport");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(loader.progress().cursor, 2);
    assert_eq!(loader.progress().batches_submitted, 1);
}

#[tokio::test(start_paused = true)]
async fn test_throttled_batch_is_resubmitted() {
    let corpus = small_documents(2);
    let sink = Arc::new(ScriptedSink::new(vec![
        Err(RemoteError::throttled(Duration::from_millis(100))),
        Err(RemoteError::throttled(Duration::from_millis(200))),
    ]));
    let executor = Arc::new(RetryExecutor::new());
    let mut loader = BulkLoader::new(sink.clone(), executor.clone(), 10_000);

    let progress = loader.run(&corpus).await.unwrap();

    assert_eq!(progress.total_inserted, 2);
    assert_eq!(progress.batches_submitted, 1);
    assert_eq!(sink.offered(), vec![2, 2, 2]);
    assert_eq!(executor.stats().total_delay, Duration::from_millis(300));
}

#[tokio::test]
async fn test_reject_policy_stops_before_oversized_document() {
    let corpus = Corpus::from_documents(vec![
        padded_document(0, 20),
        padded_document(1, 500),
        padded_document(2, 20),
    ]);
    let sink = Arc::new(ScriptedSink::default());
    let mut loader = BulkLoader::new(sink.clone(), Arc::new(RetryExecutor::new()), 100)
        .with_oversized_policy(OversizedPolicy::Reject);

    let err = loader.run(&corpus).await.unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(err.to_string().contains("document[1]"));
    assert_eq!(sink.offered(), vec![1]);
    assert_eq!(loader.progress().cursor, 1);
}

#[tokio::test]
async fn test_submit_policy_sends_oversized_document_alone() {
    let corpus = Corpus::from_documents(vec![
        padded_document(0, 20),
        padded_document(1, 500),
        padded_document(2, 20),
    ]);
    let sink = Arc::new(ScriptedSink::default());
    let mut loader = BulkLoader::new(sink.clone(), Arc::new(RetryExecutor::new()), 100);

    let progress = loader.run(&corpus).await.unwrap();

    assert_eq!(sink.offered(), vec![1, 1, 1]);
    assert_eq!(progress.cursor, 3);
}

#[tokio::test]
async fn test_empty_corpus_is_done_immediately() {
    let sink = Arc::new(ScriptedSink::default());
    let mut loader = BulkLoader::new(sink.clone(), Arc::new(RetryExecutor::new()), 100);

    let progress = loader.run(&Corpus::default()).await.unwrap();

    assert_eq!(progress, LoadProgress::default());
    assert!(sink.offered().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_against_emulator() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..25 {
        std::fs::write(
            dir.path().join(format!("doc-{i:03}.json")),
            padded_document(i, 400),
        )
        .unwrap();
    }
    std::fs::write(dir.path().join("README.md"), "not a document").unwrap();

    let service = Arc::new(
        InMemoryDocumentService::new()
            .with_throttling(4, Duration::from_millis(15))
            .with_execution_budget(3),
    );
    let executor = Arc::new(RetryExecutor::new());
    let resolver = ProvisioningResolver::new(service.clone(), executor.clone());

    let db = resolver.recreate_database("bench").await.unwrap();
    let collection = resolver.ensure_collection(&db, "items", None).await.unwrap();
    let procedure = resolver
        .replace_stored_procedure(
            &collection,
            &ScriptDefinition::new("BulkImport", BULK_IMPORT_SCRIPT),
        )
        .await
        .unwrap();

    let corpus = Corpus::open(dir.path(), "*.json", 20).unwrap();
    let sink = StoredProcedureSink::new(service.clone(), procedure);
    let mut loader = BulkLoader::new(sink, executor.clone(), 2_000);

    let progress = loader.run(&corpus).await.unwrap();

    assert_eq!(progress.cursor, 20);
    assert_eq!(progress.total_inserted, 20);
    assert_eq!(service.documents("bench", "items").await.len(), 20);
    assert!(executor.stats().throttled_attempts > 0);
}
