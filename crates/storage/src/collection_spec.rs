//! Declarative collection template
//!
//! A [`CollectionSpec`] is read once (usually from a JSON file) and describes the
//! indexing policy, offer type and server-side scripts of a collection:
//!
//! ```json
//! {
//!   "id": "orders",
//!   "indexingPolicy": { "automatic": true, "indexingMode": "consistent" },
//!   "offerType": "S2",
//!   "storedProcedures": [{ "id": "BulkImport", "body": "function bulkImport(docs) { ... }" }],
//!   "triggers": [{ "id": "stamp", "body": "...", "triggerType": "Pre" }],
//!   "userDefinedFunctions": [{ "id": "tax", "body": "function tax(x) { ... }" }]
//! }
//! ```

use crate::models::{
    CollectionRequest, IndexingPolicy, TriggerOperation, TriggerType, DEFAULT_OFFER_TYPE,
};
use docbulk_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A named script body (stored procedure or user-defined function)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDefinition {
    pub id: String,
    pub body: String,
}

impl ScriptDefinition {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDefinition {
    pub id: String,
    pub body: String,
    #[serde(default)]
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub trigger_operation: TriggerOperation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSpec {
    pub id: String,
    #[serde(default)]
    pub indexing_policy: Option<IndexingPolicy>,
    #[serde(default = "default_offer_type")]
    pub offer_type: String,
    #[serde(default)]
    pub stored_procedures: Vec<ScriptDefinition>,
    #[serde(default)]
    pub triggers: Vec<TriggerDefinition>,
    #[serde(default)]
    pub user_defined_functions: Vec<ScriptDefinition>,
}

fn default_offer_type() -> String {
    DEFAULT_OFFER_TYPE.to_string()
}

impl CollectionSpec {
    /// An empty template for `id` with the default offer and indexing policy
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            indexing_policy: None,
            offer_type: default_offer_type(),
            stored_procedures: Vec::new(),
            triggers: Vec::new(),
            user_defined_functions: Vec::new(),
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse collection spec: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read collection spec {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&content)
    }

    /// Total number of scripts the template registers
    pub fn script_count(&self) -> usize {
        self.stored_procedures.len() + self.triggers.len() + self.user_defined_functions.len()
    }

    /// Creation parameters for a collection named `id` built from this template
    pub fn to_request(&self, id: &str) -> CollectionRequest {
        CollectionRequest {
            id: id.to_string(),
            indexing_policy: self.indexing_policy.clone().unwrap_or_default(),
            offer_type: self.offer_type.clone(),
        }
    }

    /// Checks script definitions locally before anything is created remotely
    pub fn validate(&self) -> Result<()> {
        let groups: [(&str, Vec<(&str, &str)>); 3] = [
            (
                "stored procedure",
                self.stored_procedures
                    .iter()
                    .map(|s| (s.id.as_str(), s.body.as_str()))
                    .collect(),
            ),
            (
                "trigger",
                self.triggers
                    .iter()
                    .map(|t| (t.id.as_str(), t.body.as_str()))
                    .collect(),
            ),
            (
                "user-defined function",
                self.user_defined_functions
                    .iter()
                    .map(|u| (u.id.as_str(), u.body.as_str()))
                    .collect(),
            ),
        ];

        for (kind, scripts) in groups {
            let mut seen = HashSet::new();
            for (id, body) in scripts {
                if id.trim().is_empty() {
                    return Err(Error::invalid_input(format!(
                        "{kind} in collection spec '{}' has an empty id",
                        self.id
                    )));
                }
                if body.trim().is_empty() {
                    return Err(Error::invalid_input(format!(
                        "{kind} '{id}' in collection spec '{}' has an empty body",
                        self.id
                    )));
                }
                if !seen.insert(id) {
                    return Err(Error::invalid_input(format!(
                        "duplicate {kind} '{id}' in collection spec '{}'",
                        self.id
                    )));
                }
            }
        }
        Ok(())
    }
}
