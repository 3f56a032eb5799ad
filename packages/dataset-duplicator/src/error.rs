//! Typed errors for the duplicator library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match
//! on the failure class and pick what to show the operator.

use thiserror::Error;

use crate::pipeline::replicate::ReplicationReport;
use crate::types::status::Tone;

/// Boxed error used at trait seams (store backends, hooks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by a duplication session or one of its components.
#[derive(Debug, Error)]
pub enum DuplicatorError {
    /// A store query failed during closure expansion or reconciliation.
    /// Partial results are discarded.
    #[error("fetch failed: {0}")]
    Fetch(#[source] StoreError),

    /// Downloading or re-uploading one asset failed; the run was aborted.
    #[error("asset transfer failed for {id}: {source}")]
    AssetTransfer {
        id: String,
        #[source]
        source: StoreError,
    },

    /// The destination rejected the transaction. Nothing was written.
    #[error("{description}")]
    Commit { description: String },

    /// The post-commit hook failed. The commit itself succeeded and
    /// `report` describes what was written.
    #[error("Error in onDuplicated hook: {source}")]
    Hook {
        report: Box<ReplicationReport>,
        #[source]
        source: BoxError,
    },

    /// The session cannot start with the given configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No destination workspace is selected.
    #[error("no destination selected")]
    NoDestination,
}

impl DuplicatorError {
    /// Severity used when this error is shown as status text.
    pub fn tone(&self) -> Tone {
        match self {
            DuplicatorError::Fetch(_)
            | DuplicatorError::AssetTransfer { .. }
            | DuplicatorError::Commit { .. }
            | DuplicatorError::Hook { .. } => Tone::Critical,
            DuplicatorError::Config(_) | DuplicatorError::NoDestination => Tone::Caution,
        }
    }
}

/// Errors raised by a [`DocumentStore`](crate::traits::store::DocumentStore)
/// or [`AssetFetcher`](crate::traits::fetcher::AssetFetcher).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Query execution failed
    #[error("query failed: {0}")]
    Query(#[source] BoxError),

    /// The backend cannot evaluate this query or filter fragment
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    /// Asset upload failed
    #[error("asset upload failed: {0}")]
    Upload(#[source] BoxError),

    /// Asset download failed
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: BoxError,
    },

    /// Transaction rejected; `description` is the store's own wording
    #[error("{description}")]
    Transaction { description: String },

    /// A document lacks a field the operation needs
    #[error("document {id} is missing field `{field}`")]
    MissingField { id: String, field: &'static str },

    /// The store returned something that is not a document
    #[error("malformed document: {0}")]
    MalformedDocument(String),
}

/// Configuration problems that stop a session from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Duplication needs an origin plus at least one other workspace
    #[error(
        "Cross Dataset Duplicator requires at least two Workspaces with different Datasets \
         (found {found})"
    )]
    NotEnoughWorkspaces { found: usize },

    /// No plugin configuration was supplied
    #[error("Cross Dataset Duplicator plugin configuration is missing")]
    MissingPluginConfig,

    /// `follow` contained something other than `inbound` / `outbound`
    #[error("unknown follow mode: {0}")]
    UnknownFollowMode(String),

    /// Configuration text could not be parsed
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type alias for duplicator operations.
pub type Result<T> = std::result::Result<T, DuplicatorError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
