//! In-process emulator of the remote document service
//!
//! Keeps databases, collections, scripts and documents in memory. It can throttle
//! every Nth request, inject failures into specific calls, and caps how many
//! documents a single stored procedure execution commits, which is enough to
//! exercise provisioning and bulk loading without a real service.
//!
//! Every stored procedure executes with batch-insert semantics: the first argument
//! must be a JSON array of documents, and the response is the number committed.

use crate::collection_spec::{ScriptDefinition, TriggerDefinition};
use crate::error::RemoteError;
use crate::models::{
    Collection, CollectionRequest, Database, RawPayload, StoredProcedure, Trigger,
    UserDefinedFunction,
};
use crate::DocumentService;
use async_trait::async_trait;
use docbulk_core::EmulatorConfig;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct CollectionState {
    collection: Option<Collection>,
    procedures: BTreeMap<String, StoredProcedure>,
    triggers: BTreeMap<String, Trigger>,
    functions: BTreeMap<String, UserDefinedFunction>,
    documents: BTreeMap<String, serde_json::Value>,
}

struct DatabaseState {
    database: Database,
    collections: BTreeMap<String, CollectionState>,
}

#[derive(Default)]
struct EmulatorState {
    databases: BTreeMap<String, DatabaseState>,
    requests: u64,
    calls: HashMap<&'static str, usize>,
    injected: VecDeque<RemoteError>,
    scheduled: HashMap<(&'static str, usize), RemoteError>,
}

impl EmulatorState {
    /// Counts the request and decides whether it is rejected before doing any work
    fn admit(
        &mut self,
        operation: &'static str,
        throttle_every: u64,
        retry_after: Duration,
    ) -> Result<(), RemoteError> {
        let call_number = {
            let count = self.calls.entry(operation).or_insert(0);
            *count += 1;
            *count
        };
        self.requests += 1;

        if let Some(err) = self.scheduled.remove(&(operation, call_number)) {
            return Err(err);
        }
        if let Some(err) = self.injected.pop_front() {
            return Err(err);
        }
        if throttle_every > 0 && self.requests % throttle_every == 0 {
            debug!("Emulator throttling {operation} (request {})", self.requests);
            return Err(RemoteError::throttled(retry_after));
        }
        Ok(())
    }

    fn database(&self, id: &str) -> Result<&DatabaseState, RemoteError> {
        self.databases
            .get(id)
            .ok_or_else(|| RemoteError::NotFound(format!("dbs/{id}")))
    }

    fn collection_mut(
        &mut self,
        database_id: &str,
        collection_id: &str,
    ) -> Result<&mut CollectionState, RemoteError> {
        self.databases
            .get_mut(database_id)
            .and_then(|db| db.collections.get_mut(collection_id))
            .ok_or_else(|| RemoteError::NotFound(format!("dbs/{database_id}/colls/{collection_id}")))
    }
}

/// Splits `dbs/{db}/colls/{coll}/sprocs/{id}` into its three ids
fn parse_procedure_link(link: &str) -> Option<(&str, &str, &str)> {
    let parts: Vec<&str> = link.split('/').collect();
    match parts.as_slice() {
        ["dbs", db, "colls", coll, "sprocs", id] => Some((*db, *coll, *id)),
        _ => None,
    }
}

fn new_rid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// In-memory [`DocumentService`] used by tests and the CLI
pub struct InMemoryDocumentService {
    state: Mutex<EmulatorState>,
    throttle_every: u64,
    throttle_retry_after: Duration,
    max_documents_per_execution: usize,
}

impl Default for InMemoryDocumentService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentService {
    /// An emulator that never throttles and commits whole batches
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EmulatorState::default()),
            throttle_every: 0,
            throttle_retry_after: Duration::ZERO,
            max_documents_per_execution: 0,
        }
    }

    pub fn from_config(config: &EmulatorConfig) -> Self {
        Self::new()
            .with_throttling(
                config.throttle_every,
                Duration::from_millis(config.throttle_retry_after_ms),
            )
            .with_execution_budget(config.max_documents_per_execution)
    }

    /// Throttle every `every`th request with the given retry-after hint (0 disables)
    pub fn with_throttling(mut self, every: u64, retry_after: Duration) -> Self {
        self.throttle_every = every;
        self.throttle_retry_after = retry_after;
        self
    }

    /// Cap the documents a single procedure execution commits (0 means unlimited)
    pub fn with_execution_budget(mut self, max_documents: usize) -> Self {
        self.max_documents_per_execution = max_documents;
        self
    }

    /// Fail the next request, whatever it is, with `err`
    pub async fn inject_failure(&self, err: RemoteError) {
        self.state.lock().await.injected.push_back(err);
    }

    /// Throttle the next `count` requests with the given retry-after hint
    pub async fn inject_throttles(&self, count: usize, retry_after: Duration) {
        let mut state = self.state.lock().await;
        for _ in 0..count {
            state.injected.push_back(RemoteError::throttled(retry_after));
        }
    }

    /// Fail the `call_number`th (1-based) call of `operation` with `err`
    pub async fn fail_call(&self, operation: &'static str, call_number: usize, err: RemoteError) {
        self.state
            .lock()
            .await
            .scheduled
            .insert((operation, call_number), err);
    }

    /// Number of times `operation` has been requested, including rejected requests
    pub async fn calls(&self, operation: &str) -> usize {
        self.state
            .lock()
            .await
            .calls
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    /// Total requests received
    pub async fn request_count(&self) -> u64 {
        self.state.lock().await.requests
    }

    /// Documents stored in a collection, ordered by id
    pub async fn documents(&self, database_id: &str, collection_id: &str) -> Vec<serde_json::Value> {
        self.state
            .lock()
            .await
            .databases
            .get(database_id)
            .and_then(|db| db.collections.get(collection_id))
            .map(|coll| coll.documents.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Scripts registered on a collection as (kind, id), grouped by kind
    pub async fn script_ids(&self, database_id: &str, collection_id: &str) -> Vec<(String, String)> {
        let state = self.state.lock().await;
        let Some(coll) = state
            .databases
            .get(database_id)
            .and_then(|db| db.collections.get(collection_id))
        else {
            return Vec::new();
        };

        let procedures = coll.procedures.keys().map(|id| ("sproc", id));
        let triggers = coll.triggers.keys().map(|id| ("trigger", id));
        let functions = coll.functions.keys().map(|id| ("udf", id));
        procedures
            .chain(triggers)
            .chain(functions)
            .map(|(kind, id)| (kind.to_string(), id.clone()))
            .collect()
    }

    async fn lock_admitted(
        &self,
        operation: &'static str,
    ) -> Result<tokio::sync::MutexGuard<'_, EmulatorState>, RemoteError> {
        let mut state = self.state.lock().await;
        state.admit(operation, self.throttle_every, self.throttle_retry_after)?;
        Ok(state)
    }
}

#[async_trait]
impl DocumentService for InMemoryDocumentService {
    async fn read_database(&self, id: &str) -> Result<Option<Database>, RemoteError> {
        let state = self.lock_admitted("read_database").await?;
        Ok(state.databases.get(id).map(|db| db.database.clone()))
    }

    async fn create_database(&self, id: &str) -> Result<Database, RemoteError> {
        let mut state = self.lock_admitted("create_database").await?;
        if state.databases.contains_key(id) {
            return Err(RemoteError::Conflict(format!("dbs/{id}")));
        }
        let database = Database {
            id: id.to_string(),
            rid: new_rid(),
            self_link: format!("dbs/{id}"),
        };
        state.databases.insert(
            id.to_string(),
            DatabaseState {
                database: database.clone(),
                collections: BTreeMap::new(),
            },
        );
        Ok(database)
    }

    async fn delete_database(&self, database: &Database) -> Result<(), RemoteError> {
        let mut state = self.lock_admitted("delete_database").await?;
        state
            .databases
            .remove(&database.id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(database.self_link.clone()))
    }

    async fn read_collection(
        &self,
        database: &Database,
        id: &str,
    ) -> Result<Option<Collection>, RemoteError> {
        let state = self.lock_admitted("read_collection").await?;
        let db = state.database(&database.id)?;
        Ok(db
            .collections
            .get(id)
            .and_then(|coll| coll.collection.clone()))
    }

    async fn create_collection(
        &self,
        database: &Database,
        request: &CollectionRequest,
    ) -> Result<Collection, RemoteError> {
        let mut state = self.lock_admitted("create_collection").await?;
        let db = state
            .databases
            .get_mut(&database.id)
            .ok_or_else(|| RemoteError::NotFound(database.self_link.clone()))?;
        if db.collections.contains_key(&request.id) {
            return Err(RemoteError::Conflict(format!(
                "{}/colls/{}",
                database.self_link, request.id
            )));
        }
        let collection = Collection {
            id: request.id.clone(),
            rid: new_rid(),
            self_link: format!("{}/colls/{}", database.self_link, request.id),
            database_id: database.id.clone(),
            indexing_policy: request.indexing_policy.clone(),
            offer_type: request.offer_type.clone(),
        };
        db.collections.insert(
            request.id.clone(),
            CollectionState {
                collection: Some(collection.clone()),
                ..Default::default()
            },
        );
        Ok(collection)
    }

    async fn read_stored_procedure(
        &self,
        collection: &Collection,
        id: &str,
    ) -> Result<Option<StoredProcedure>, RemoteError> {
        let mut state = self.lock_admitted("read_stored_procedure").await?;
        let coll = state.collection_mut(&collection.database_id, &collection.id)?;
        Ok(coll.procedures.get(id).cloned())
    }

    async fn create_stored_procedure(
        &self,
        collection: &Collection,
        definition: &ScriptDefinition,
    ) -> Result<StoredProcedure, RemoteError> {
        let mut state = self.lock_admitted("create_stored_procedure").await?;
        let coll = state.collection_mut(&collection.database_id, &collection.id)?;
        let self_link = format!("{}/sprocs/{}", collection.self_link, definition.id);
        if coll.procedures.contains_key(&definition.id) {
            return Err(RemoteError::Conflict(self_link));
        }
        let procedure = StoredProcedure {
            id: definition.id.clone(),
            rid: new_rid(),
            self_link,
            body: definition.body.clone(),
        };
        coll.procedures
            .insert(definition.id.clone(), procedure.clone());
        Ok(procedure)
    }

    async fn delete_stored_procedure(
        &self,
        procedure: &StoredProcedure,
    ) -> Result<(), RemoteError> {
        let mut state = self.lock_admitted("delete_stored_procedure").await?;
        let (db, coll, id) = parse_procedure_link(&procedure.self_link)
            .ok_or_else(|| RemoteError::BadRequest(format!("malformed link {}", procedure.self_link)))?;
        state
            .collection_mut(db, coll)?
            .procedures
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(procedure.self_link.clone()))
    }

    async fn read_trigger(
        &self,
        collection: &Collection,
        id: &str,
    ) -> Result<Option<Trigger>, RemoteError> {
        let mut state = self.lock_admitted("read_trigger").await?;
        let coll = state.collection_mut(&collection.database_id, &collection.id)?;
        Ok(coll.triggers.get(id).cloned())
    }

    async fn create_trigger(
        &self,
        collection: &Collection,
        definition: &TriggerDefinition,
    ) -> Result<Trigger, RemoteError> {
        let mut state = self.lock_admitted("create_trigger").await?;
        let coll = state.collection_mut(&collection.database_id, &collection.id)?;
        let self_link = format!("{}/triggers/{}", collection.self_link, definition.id);
        if coll.triggers.contains_key(&definition.id) {
            return Err(RemoteError::Conflict(self_link));
        }
        let trigger = Trigger {
            id: definition.id.clone(),
            self_link,
            body: definition.body.clone(),
            trigger_type: definition.trigger_type,
            trigger_operation: definition.trigger_operation,
        };
        coll.triggers.insert(definition.id.clone(), trigger.clone());
        Ok(trigger)
    }

    async fn read_user_defined_function(
        &self,
        collection: &Collection,
        id: &str,
    ) -> Result<Option<UserDefinedFunction>, RemoteError> {
        let mut state = self.lock_admitted("read_user_defined_function").await?;
        let coll = state.collection_mut(&collection.database_id, &collection.id)?;
        Ok(coll.functions.get(id).cloned())
    }

    async fn create_user_defined_function(
        &self,
        collection: &Collection,
        definition: &ScriptDefinition,
    ) -> Result<UserDefinedFunction, RemoteError> {
        let mut state = self.lock_admitted("create_user_defined_function").await?;
        let coll = state.collection_mut(&collection.database_id, &collection.id)?;
        let self_link = format!("{}/udfs/{}", collection.self_link, definition.id);
        if coll.functions.contains_key(&definition.id) {
            return Err(RemoteError::Conflict(self_link));
        }
        let function = UserDefinedFunction {
            id: definition.id.clone(),
            self_link,
            body: definition.body.clone(),
        };
        coll.functions.insert(definition.id.clone(), function.clone());
        Ok(function)
    }

    async fn execute_stored_procedure(
        &self,
        procedure: &StoredProcedure,
        args: &[RawPayload],
    ) -> Result<serde_json::Value, RemoteError> {
        let mut state = self.lock_admitted("execute_stored_procedure").await?;
        let (db, coll, id) = parse_procedure_link(&procedure.self_link)
            .ok_or_else(|| RemoteError::BadRequest(format!("malformed link {}", procedure.self_link)))?;
        let coll = state.collection_mut(db, coll)?;
        if !coll.procedures.contains_key(id) {
            return Err(RemoteError::NotFound(procedure.self_link.clone()));
        }

        let payload = args
            .first()
            .ok_or_else(|| RemoteError::BadRequest("The array is undefined or null.".to_string()))?;
        let docs: Vec<serde_json::Value> = serde_json::from_slice(payload.as_bytes())
            .map_err(|e| RemoteError::BadRequest(format!("argument is not a JSON array: {e}")))?;

        let budget = match self.max_documents_per_execution {
            0 => docs.len(),
            max => docs.len().min(max),
        };

        // A rejected batch commits nothing
        if let Some(position) = docs.iter().take(budget).position(|doc| !doc.is_object()) {
            return Err(RemoteError::BadRequest(format!(
                "document {position} in batch is not a JSON object"
            )));
        }

        let mut committed = 0usize;
        for doc in docs.into_iter().take(budget) {
            let doc_id = doc
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(new_rid);
            coll.documents.insert(doc_id, doc);
            committed += 1;
        }

        Ok(serde_json::Value::from(committed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn collection_with_procedure(
        service: &InMemoryDocumentService,
    ) -> (Collection, StoredProcedure) {
        let db = service.create_database("db").await.unwrap();
        let coll = service
            .create_collection(&db, &CollectionRequest::new("coll"))
            .await
            .unwrap();
        let sproc = service
            .create_stored_procedure(&coll, &ScriptDefinition::new("BulkImport", "function() {}"))
            .await
            .unwrap();
        (coll, sproc)
    }

    #[tokio::test]
    async fn test_database_lifecycle() {
        let service = InMemoryDocumentService::new();
        assert_eq!(service.read_database("db").await.unwrap(), None);

        let db = service.create_database("db").await.unwrap();
        assert_eq!(db.self_link, "dbs/db");
        assert_eq!(service.read_database("db").await.unwrap(), Some(db.clone()));
        assert!(matches!(
            service.create_database("db").await,
            Err(RemoteError::Conflict(_))
        ));

        service.delete_database(&db).await.unwrap();
        assert_eq!(service.read_database("db").await.unwrap(), None);
        assert_eq!(service.calls("read_database").await, 3);
    }

    #[tokio::test]
    async fn test_execute_commits_documents() {
        let service = InMemoryDocumentService::new();
        let (_, sproc) = collection_with_procedure(&service).await;

        let payload = RawPayload::from(r#"[{"id":"a","n":1},{"id":"b","n":2}]"#);
        let response = service
            .execute_stored_procedure(&sproc, &[payload])
            .await
            .unwrap();
        assert_eq!(response, serde_json::json!(2));

        let docs = service.documents("db", "coll").await;
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["n"], 1);
    }

    #[tokio::test]
    async fn test_execution_budget_limits_commit() {
        let service = InMemoryDocumentService::new().with_execution_budget(1);
        let (_, sproc) = collection_with_procedure(&service).await;

        let payload = RawPayload::from(r#"[{"id":"a"},{"id":"b"},{"id":"c"}]"#);
        let response = service
            .execute_stored_procedure(&sproc, &[payload])
            .await
            .unwrap();
        assert_eq!(response, serde_json::json!(1));
        assert_eq!(service.documents("db", "coll").await.len(), 1);
    }

    #[tokio::test]
    async fn test_execute_rejects_malformed_argument() {
        let service = InMemoryDocumentService::new();
        let (_, sproc) = collection_with_procedure(&service).await;

        let result = service
            .execute_stored_procedure(&sproc, &[RawPayload::from("[{\"id\":")])
            .await;
        assert!(matches!(result, Err(RemoteError::BadRequest(_))));

        let result = service.execute_stored_procedure(&sproc, &[]).await;
        assert!(matches!(result, Err(RemoteError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_throttles_every_nth_request() {
        let service =
            InMemoryDocumentService::new().with_throttling(2, Duration::from_millis(30));

        assert!(service.read_database("db").await.is_ok());
        assert_eq!(
            service.read_database("db").await,
            Err(RemoteError::throttled(Duration::from_millis(30)))
        );
        assert!(service.read_database("db").await.is_ok());
        assert_eq!(service.request_count().await, 3);
    }

    #[tokio::test]
    async fn test_scheduled_failure_hits_only_that_call() {
        let service = InMemoryDocumentService::new();
        service
            .fail_call("create_database", 2, RemoteError::BadRequest("nope".to_string()))
            .await;

        assert!(service.create_database("a").await.is_ok());
        assert!(matches!(
            service.create_database("b").await,
            Err(RemoteError::BadRequest(_))
        ));
        assert!(service.create_database("c").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_procedure_then_execute_is_not_found() {
        let service = InMemoryDocumentService::new();
        let (coll, sproc) = collection_with_procedure(&service).await;

        service.delete_stored_procedure(&sproc).await.unwrap();
        assert_eq!(
            service.read_stored_procedure(&coll, "BulkImport").await.unwrap(),
            None
        );
        let result = service
            .execute_stored_procedure(&sproc, &[RawPayload::from("[]")])
            .await;
        assert!(matches!(result, Err(RemoteError::NotFound(_))));
    }

    #[test]
    fn test_parse_procedure_link() {
        assert_eq!(
            parse_procedure_link("dbs/d/colls/c/sprocs/p"),
            Some(("d", "c", "p"))
        );
        assert_eq!(parse_procedure_link("dbs/d/colls/c"), None);
    }

    #[tokio::test]
    async fn test_execute_with_non_object_commits_nothing() {
        let service = InMemoryDocumentService::new();
        let (_, sproc) = collection_with_procedure(&service).await;

        let payload = RawPayload::from(r#"[{"id":"a"},{"id":"b"},42]"#);
        let result = service.execute_stored_procedure(&sproc, &[payload]).await;

        assert!(matches!(result, Err(RemoteError::BadRequest(msg)) if msg.contains("document 2")));
        assert!(service.documents("db", "coll").await.is_empty());
    }

    #[tokio::test]
    async fn test_read_trigger_and_function() {
        let service = InMemoryDocumentService::new();
        let (coll, _) = collection_with_procedure(&service).await;
        assert_eq!(service.read_trigger(&coll, "stamp").await.unwrap(), None);
        assert_eq!(
            service.read_user_defined_function(&coll, "tax").await.unwrap(),
            None
        );

        let trigger = service
            .create_trigger(
                &coll,
                &TriggerDefinition {
                    id: "stamp".to_string(),
                    body: "function stamp() {}".to_string(),
                    trigger_type: Default::default(),
                    trigger_operation: Default::default(),
                },
            )
            .await
            .unwrap();
        let function = service
            .create_user_defined_function(&coll, &ScriptDefinition::new("tax", "function tax(x) {}"))
            .await
            .unwrap();

        assert_eq!(service.read_trigger(&coll, "stamp").await.unwrap(), Some(trigger));
        assert_eq!(
            service.read_user_defined_function(&coll, "tax").await.unwrap(),
            Some(function)
        );
    }
}
