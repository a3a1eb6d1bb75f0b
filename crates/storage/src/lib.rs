//! Client-side driver pieces for a remote, rate-limited document database
//!
//! - [`DocumentService`]: the boundary to the remote service
//! - [`RetryExecutor`]: absorbs throttling by honouring the server's retry-after hint
//! - [`ProvisioningResolver`]: idempotent get-or-create of databases, collections and scripts
//! - [`InMemoryDocumentService`]: an in-process emulator of the service

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod collection_spec;
pub mod emulator;
pub mod error;
pub mod models;
pub mod provisioning;
pub mod retry;

pub use collection_spec::{CollectionSpec, ScriptDefinition, TriggerDefinition};
pub use emulator::InMemoryDocumentService;
pub use error::{RemoteError, STATUS_TOO_MANY_REQUESTS};
pub use models::{
    Collection, CollectionRequest, Database, IndexPath, IndexingMode, IndexingPolicy, RawPayload,
    StoredProcedure, Trigger, TriggerOperation, TriggerType, UserDefinedFunction,
};
pub use provisioning::{ProvisioningResolver, RegisteredScripts};
pub use retry::{Attempt, RetryExecutor, RetryStats};

use async_trait::async_trait;

/// JavaScript body of the bundled server-side batch-insert procedure
pub const BULK_IMPORT_SCRIPT: &str = include_str!("../scripts/bulk_import.js");

/// Operations consumed from the remote document service
///
/// Lookups return `Ok(None)` when the resource does not exist. Every call may fail
/// with [`RemoteError::Throttled`], which callers route through a [`RetryExecutor`].
#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn read_database(&self, id: &str) -> Result<Option<Database>, RemoteError>;

    async fn create_database(&self, id: &str) -> Result<Database, RemoteError>;

    async fn delete_database(&self, database: &Database) -> Result<(), RemoteError>;

    async fn read_collection(
        &self,
        database: &Database,
        id: &str,
    ) -> Result<Option<Collection>, RemoteError>;

    async fn create_collection(
        &self,
        database: &Database,
        request: &CollectionRequest,
    ) -> Result<Collection, RemoteError>;

    async fn read_stored_procedure(
        &self,
        collection: &Collection,
        id: &str,
    ) -> Result<Option<StoredProcedure>, RemoteError>;

    async fn create_stored_procedure(
        &self,
        collection: &Collection,
        definition: &ScriptDefinition,
    ) -> Result<StoredProcedure, RemoteError>;

    async fn delete_stored_procedure(&self, procedure: &StoredProcedure)
        -> Result<(), RemoteError>;

    async fn read_trigger(
        &self,
        collection: &Collection,
        id: &str,
    ) -> Result<Option<Trigger>, RemoteError>;

    async fn create_trigger(
        &self,
        collection: &Collection,
        definition: &TriggerDefinition,
    ) -> Result<Trigger, RemoteError>;

    async fn read_user_defined_function(
        &self,
        collection: &Collection,
        id: &str,
    ) -> Result<Option<UserDefinedFunction>, RemoteError>;

    async fn create_user_defined_function(
        &self,
        collection: &Collection,
        definition: &ScriptDefinition,
    ) -> Result<UserDefinedFunction, RemoteError>;

    /// Executes a stored procedure with pre-serialized arguments and returns its response body
    async fn execute_stored_procedure(
        &self,
        procedure: &StoredProcedure,
        args: &[RawPayload],
    ) -> Result<serde_json::Value, RemoteError>;
}
