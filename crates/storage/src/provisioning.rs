//! Idempotent get-or-create resolution of remote resources
//!
//! Databases, collections and scripts are looked up by id first and
//! only created when absent, so a provisioning step can be re-run safely. Every
//! remote call goes through the shared [`RetryExecutor`].

use crate::collection_spec::{CollectionSpec, ScriptDefinition};
use crate::error::RemoteError;
use crate::models::{
    Collection, CollectionRequest, Database, StoredProcedure, Trigger, UserDefinedFunction,
    DEFAULT_OFFER_TYPE,
};
use crate::retry::RetryExecutor;
use crate::DocumentService;
use docbulk_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Scripts present after [`ProvisioningResolver::register_scripts`], found or created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisteredScripts {
    pub stored_procedures: Vec<StoredProcedure>,
    pub triggers: Vec<Trigger>,
    pub user_defined_functions: Vec<UserDefinedFunction>,
}

impl RegisteredScripts {
    pub fn len(&self) -> usize {
        self.stored_procedures.len() + self.triggers.len() + self.user_defined_functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves databases, collections and scripts, creating what is missing
pub struct ProvisioningResolver {
    service: Arc<dyn DocumentService>,
    executor: Arc<RetryExecutor>,
    default_offer_type: String,
}

impl ProvisioningResolver {
    pub fn new(service: Arc<dyn DocumentService>, executor: Arc<RetryExecutor>) -> Self {
        Self {
            service,
            executor,
            default_offer_type: DEFAULT_OFFER_TYPE.to_string(),
        }
    }

    /// Offer type used for collections created without a template
    pub fn with_default_offer_type(mut self, offer_type: impl Into<String>) -> Self {
        self.default_offer_type = offer_type.into();
        self
    }

    /// Returns the database `id`, creating it if it does not exist
    pub async fn ensure_database(&self, id: &str) -> Result<Database> {
        if let Some(database) = self.find_database(id).await? {
            debug!("Database '{id}' already exists");
            return Ok(database);
        }
        self.create_database(id).await
    }

    /// Deletes the database `id` if present, then creates it empty
    pub async fn recreate_database(&self, id: &str) -> Result<Database> {
        if let Some(database) = self.find_database(id).await? {
            info!("Deleting existing database '{id}'");
            let service = &self.service;
            let target = &database;
            self.executor
                .execute("delete database", move || service.delete_database(target))
                .await
                .map_err(|e| Error::remote("delete database", &database.self_link, e))?;
        }
        self.create_database(id).await
    }

    /// Returns the collection `id` in `database`, creating it if it does not exist
    ///
    /// A newly created collection takes its indexing policy and offer type from
    /// `spec`. The `id` argument names the collection even when `spec.id` differs.
    /// The template's scripts are registered whether the collection was created or
    /// found, so a step that failed partway completes when re-run.
    pub async fn ensure_collection(
        &self,
        database: &Database,
        id: &str,
        spec: Option<&CollectionSpec>,
    ) -> Result<Collection> {
        if let Some(spec) = spec {
            spec.validate()?;
            if spec.id != id {
                warn!(
                    "Collection template '{}' applied to collection '{id}'; using '{id}'",
                    spec.id
                );
            }
        }

        let service = &self.service;
        let existing = self
            .executor
            .execute("read collection", move || service.read_collection(database, id))
            .await
            .map_err(|e| {
                Error::remote("read collection", format!("{}/colls/{id}", database.self_link), e)
            })?;

        let collection = match existing {
            Some(collection) => {
                debug!("Collection '{id}' already exists in database '{}'", database.id);
                collection
            }
            None => {
                let request = match spec {
                    Some(spec) => spec.to_request(id),
                    None => CollectionRequest {
                        offer_type: self.default_offer_type.clone(),
                        ..CollectionRequest::new(id)
                    },
                };

                info!(
                    "Creating collection '{id}' in database '{}' (offer {})",
                    database.id, request.offer_type
                );
                let request_ref = &request;
                self.executor
                    .execute("create collection", move || {
                        service.create_collection(database, request_ref)
                    })
                    .await
                    .map_err(|e| {
                        Error::remote(
                            "create collection",
                            format!("{}/colls/{id}", database.self_link),
                            e,
                        )
                    })?
            }
        };

        if let Some(spec) = spec {
            self.register_scripts(&collection, spec).await?;
        }
        Ok(collection)
    }

    /// Makes sure every script in `spec` exists on `collection`
    ///
    /// Order is stored procedures, then triggers, then user-defined functions. Each
    /// script is looked up by id and created only when absent; an existing script is
    /// left as it is. The first failure stops registration and scripts created
    /// before it stay in place.
    pub async fn register_scripts(
        &self,
        collection: &Collection,
        spec: &CollectionSpec,
    ) -> Result<RegisteredScripts> {
        spec.validate()?;
        let service = &self.service;
        let mut registered = RegisteredScripts::default();

        for definition in &spec.stored_procedures {
            let kind = "stored procedure";
            let id = definition.id.as_str();
            let existing = self
                .executor
                .execute("read stored procedure", move || {
                    service.read_stored_procedure(collection, id)
                })
                .await
                .map_err(|e| script_error(kind, id, collection, e))?;
            let procedure = match existing {
                Some(procedure) => procedure,
                None => self
                    .executor
                    .execute("create stored procedure", move || {
                        service.create_stored_procedure(collection, definition)
                    })
                    .await
                    .map_err(|e| script_error(kind, id, collection, e))?,
            };
            registered.stored_procedures.push(procedure);
        }

        for definition in &spec.triggers {
            let kind = "trigger";
            let id = definition.id.as_str();
            let existing = self
                .executor
                .execute("read trigger", move || service.read_trigger(collection, id))
                .await
                .map_err(|e| script_error(kind, id, collection, e))?;
            let trigger = match existing {
                Some(trigger) => trigger,
                None => self
                    .executor
                    .execute("create trigger", move || {
                        service.create_trigger(collection, definition)
                    })
                    .await
                    .map_err(|e| script_error(kind, id, collection, e))?,
            };
            registered.triggers.push(trigger);
        }

        for definition in &spec.user_defined_functions {
            let kind = "user-defined function";
            let id = definition.id.as_str();
            let existing = self
                .executor
                .execute("read user-defined function", move || {
                    service.read_user_defined_function(collection, id)
                })
                .await
                .map_err(|e| script_error(kind, id, collection, e))?;
            let function = match existing {
                Some(function) => function,
                None => self
                    .executor
                    .execute("create user-defined function", move || {
                        service.create_user_defined_function(collection, definition)
                    })
                    .await
                    .map_err(|e| script_error(kind, id, collection, e))?,
            };
            registered.user_defined_functions.push(function);
        }

        info!(
            "{} scripts present on collection '{}'",
            registered.len(),
            collection.id
        );
        Ok(registered)
    }

    /// Returns the stored procedure `definition.id`, creating it if it does not exist
    pub async fn ensure_stored_procedure(
        &self,
        collection: &Collection,
        definition: &ScriptDefinition,
    ) -> Result<StoredProcedure> {
        if let Some(procedure) = self.find_stored_procedure(collection, &definition.id).await? {
            debug!(
                "Stored procedure '{}' already exists on '{}'",
                definition.id, collection.id
            );
            return Ok(procedure);
        }
        self.create_stored_procedure(collection, definition).await
    }

    /// Deletes the stored procedure `definition.id` if present, then creates it from `definition`
    pub async fn replace_stored_procedure(
        &self,
        collection: &Collection,
        definition: &ScriptDefinition,
    ) -> Result<StoredProcedure> {
        if let Some(procedure) = self.find_stored_procedure(collection, &definition.id).await? {
            debug!("Replacing stored procedure '{}'", procedure.id);
            let service = &self.service;
            let target = &procedure;
            self.executor
                .execute("delete stored procedure", move || {
                    service.delete_stored_procedure(target)
                })
                .await
                .map_err(|e| Error::remote("delete stored procedure", &procedure.self_link, e))?;
        }
        self.create_stored_procedure(collection, definition).await
    }

    async fn find_database(&self, id: &str) -> Result<Option<Database>> {
        let service = &self.service;
        self.executor
            .execute("read database", move || service.read_database(id))
            .await
            .map_err(|e| Error::remote("read database", format!("dbs/{id}"), e))
    }

    async fn create_database(&self, id: &str) -> Result<Database> {
        info!("Creating database '{id}'");
        let service = &self.service;
        self.executor
            .execute("create database", move || service.create_database(id))
            .await
            .map_err(|e| Error::remote("create database", format!("dbs/{id}"), e))
    }

    async fn find_stored_procedure(
        &self,
        collection: &Collection,
        id: &str,
    ) -> Result<Option<StoredProcedure>> {
        let service = &self.service;
        self.executor
            .execute("read stored procedure", move || {
                service.read_stored_procedure(collection, id)
            })
            .await
            .map_err(|e| {
                Error::remote(
                    "read stored procedure",
                    format!("{}/sprocs/{id}", collection.self_link),
                    e,
                )
            })
    }

    async fn create_stored_procedure(
        &self,
        collection: &Collection,
        definition: &ScriptDefinition,
    ) -> Result<StoredProcedure> {
        info!(
            "Creating stored procedure '{}' on collection '{}'",
            definition.id, collection.id
        );
        let service = &self.service;
        self.executor
            .execute("create stored procedure", move || {
                service.create_stored_procedure(collection, definition)
            })
            .await
            .map_err(|e| script_error("stored procedure", &definition.id, collection, e))
    }
}

fn script_error(kind: &str, id: &str, collection: &Collection, err: RemoteError) -> Error {
    Error::script_registration(kind, id, &collection.id, err)
}
