//! Post-commit callback.

use async_trait::async_trait;

use crate::error::BoxError;
use crate::types::config::Workspace;

/// Context handed to the hook after a successful commit.
#[derive(Debug, Clone)]
pub struct DuplicatedContext {
    pub origin: Workspace,
    pub destination: Workspace,
    pub document_ids: Vec<String>,
    pub transaction_id: String,
}

/// Runs after the destination accepted a transaction.
///
/// A failing hook never rolls back the commit.
#[async_trait]
pub trait PostCommitHook: Send + Sync {
    async fn on_duplicated(&self, context: &DuplicatedContext) -> Result<(), BoxError>;
}
