//! Destinations for serialized batches

use async_trait::async_trait;
use docbulk_storage::{DocumentService, RawPayload, RemoteError, StoredProcedure};
use std::sync::Arc;

/// A remote batch-insert call
///
/// Receives one `[doc, ...]` payload and reports how many documents it committed,
/// which may be fewer than offered.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn insert_batch(&self, payload: &RawPayload) -> Result<u64, RemoteError>;

    /// Resource identifier used in error messages
    fn target(&self) -> String;
}

#[async_trait]
impl<T: BatchSink + ?Sized> BatchSink for Arc<T> {
    async fn insert_batch(&self, payload: &RawPayload) -> Result<u64, RemoteError> {
        (**self).insert_batch(payload).await
    }

    fn target(&self) -> String {
        (**self).target()
    }
}

/// Submits batches to a server-side stored procedure
pub struct StoredProcedureSink {
    service: Arc<dyn DocumentService>,
    procedure: StoredProcedure,
}

impl StoredProcedureSink {
    pub fn new(service: Arc<dyn DocumentService>, procedure: StoredProcedure) -> Self {
        Self { service, procedure }
    }
}

#[async_trait]
impl BatchSink for StoredProcedureSink {
    async fn insert_batch(&self, payload: &RawPayload) -> Result<u64, RemoteError> {
        let response = self
            .service
            .execute_stored_procedure(&self.procedure, std::slice::from_ref(payload))
            .await?;
        parse_committed_count(&response)
    }

    fn target(&self) -> String {
        self.procedure.self_link.clone()
    }
}

/// Reads the committed-document count from a procedure response body
fn parse_committed_count(response: &serde_json::Value) -> Result<u64, RemoteError> {
    let count = match response {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    count.ok_or_else(|| {
        RemoteError::InvalidResponse(format!(
            "expected a non-negative document count, got {response}"
        ))
    })
}
