//! Remote resource models returned by a document service

use serde::{Deserialize, Serialize};

/// Offer (throughput tier) applied when none is requested
pub const DEFAULT_OFFER_TYPE: &str = "S1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    pub id: String,
    pub rid: String,
    pub self_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub rid: String,
    pub self_link: String,
    pub database_id: String,
    pub indexing_policy: IndexingPolicy,
    pub offer_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProcedure {
    pub id: String,
    pub rid: String,
    pub self_link: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub id: String,
    pub self_link: String,
    pub body: String,
    pub trigger_type: TriggerType,
    pub trigger_operation: TriggerOperation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDefinedFunction {
    pub id: String,
    pub self_link: String,
    pub body: String,
}

/// Indexing policy applied to a collection at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingPolicy {
    #[serde(default = "default_automatic")]
    pub automatic: bool,
    #[serde(default)]
    pub indexing_mode: IndexingMode,
    #[serde(default)]
    pub included_paths: Vec<IndexPath>,
    #[serde(default)]
    pub excluded_paths: Vec<IndexPath>,
}

impl Default for IndexingPolicy {
    fn default() -> Self {
        Self {
            automatic: true,
            indexing_mode: IndexingMode::default(),
            included_paths: Vec::new(),
            excluded_paths: Vec::new(),
        }
    }
}

fn default_automatic() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingMode {
    #[default]
    Consistent,
    Lazy,
    None,
}

/// A document path in an indexing policy
///
/// Index specifications are passed through to the service untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPath {
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerType {
    #[default]
    Pre,
    Post,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerOperation {
    #[default]
    All,
    Create,
    Replace,
    Delete,
}

/// Parameters for creating a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRequest {
    pub id: String,
    pub indexing_policy: IndexingPolicy,
    pub offer_type: String,
}

impl CollectionRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            indexing_policy: IndexingPolicy::default(),
            offer_type: DEFAULT_OFFER_TYPE.to_string(),
        }
    }
}

/// Pre-serialized stored procedure argument, passed through without re-encoding
///
/// The service accepts arbitrary document shapes, so the payload is never parsed
/// on the client side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPayload(Vec<u8>);

impl RawPayload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for RawPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for RawPayload {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}
