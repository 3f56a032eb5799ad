//! Content lake API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Query
// =============================================================================

/// Query request body.
#[derive(Debug, Serialize)]
pub(crate) struct QueryRequest<'a> {
    pub query: &'a str,
    pub params: &'a Value,
}

/// Query response body.
#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub result: Value,
}

// =============================================================================
// Assets
// =============================================================================

/// The two kinds of binary asset the API stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    File,
}

impl AssetKind {
    /// Name used by the API ("image" / "file").
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::File => "file",
        }
    }

    /// Path segment of the upload endpoint.
    pub fn endpoint(&self) -> &'static str {
        match self {
            AssetKind::Image => "images",
            AssetKind::File => "files",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asset upload response body.
#[derive(Debug, Deserialize)]
pub(crate) struct AssetUploadResponse {
    pub document: Value,
}

// =============================================================================
// Mutations
// =============================================================================

/// A single mutation inside a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutation {
    /// Create the document, or replace it entirely if the id exists.
    CreateOrReplace(Value),
}

impl Mutation {
    /// Id of the document this mutation targets.
    pub fn document_id(&self) -> Option<&str> {
        match self {
            Mutation::CreateOrReplace(doc) => doc.get("_id").and_then(Value::as_str),
        }
    }
}

/// Mutate request body.
#[derive(Debug, Serialize)]
pub(crate) struct MutateRequest<'a> {
    pub mutations: &'a [Mutation],
}

/// Result of a committed transaction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateResponse {
    /// Id of the transaction that applied the mutations
    #[serde(default)]
    pub transaction_id: String,

    /// Per-document results
    #[serde(default)]
    pub results: Vec<MutationResult>,
}

/// Per-document mutation result.
#[derive(Debug, Clone, Deserialize)]
pub struct MutationResult {
    pub id: String,
    #[serde(default)]
    pub operation: Option<String>,
}

// =============================================================================
// Errors
// =============================================================================

/// Error body returned by the API on non-2xx responses.
///
/// The API is not consistent about shape: mutation errors nest a
/// `description` inside `error`, other endpoints put a string in `error`
/// and the text in `message`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    pub fn description(&self) -> Option<String> {
        if let Some(desc) = self
            .error
            .as_ref()
            .and_then(|e| e.get("description"))
            .and_then(Value::as_str)
        {
            return Some(desc.to_string());
        }
        if let Some(message) = &self.message {
            return Some(message.clone());
        }
        self.error.as_ref().and_then(Value::as_str).map(String::from)
    }
}

/// Pull a human-readable description out of an error response body.
pub(crate) fn describe_error(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.description())
        .unwrap_or_else(|| body.trim().to_string())
}
