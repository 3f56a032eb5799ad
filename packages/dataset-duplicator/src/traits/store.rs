//! Storage traits for reading and writing a dataset.
//!
//! A `DocumentStore` is bound to one project + dataset pair. The session
//! asks a `StoreProvider` for the store behind each workspace.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::StoreResult;
use crate::types::config::Workspace;
use crate::types::document::{AssetKind, Document};

/// A read against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentQuery {
    /// Documents whose id is in `ids`, optionally narrowed by a boolean
    /// filter fragment and reshaped by a projection.
    ByIds {
        ids: Vec<String>,
        filter: Option<String>,
        projection: Option<String>,
    },

    /// Documents holding a reference to `id`.
    References { id: String },

    /// A query string passed through unchanged.
    Raw { query: String },
}

impl DocumentQuery {
    pub fn by_ids(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        DocumentQuery::ByIds {
            ids: ids.into_iter().map(Into::into).collect(),
            filter: None,
            projection: None,
        }
    }

    /// Narrow a `ByIds` query. No effect on other variants.
    pub fn with_filter(mut self, fragment: Option<&str>) -> Self {
        if let DocumentQuery::ByIds { filter, .. } = &mut self {
            *filter = fragment.map(str::to_string);
        }
        self
    }

    /// Reshape the results of a `ByIds` query. No effect on other variants.
    pub fn with_projection(mut self, shape: impl Into<String>) -> Self {
        if let DocumentQuery::ByIds { projection, .. } = &mut self {
            *projection = Some(shape.into());
        }
        self
    }

    /// Render as a GROQ query string plus its parameters.
    pub fn to_groq(&self) -> (String, Value) {
        match self {
            DocumentQuery::ByIds {
                ids,
                filter,
                projection,
            } => {
                let mut query = String::from("*[_id in $fetchIds");
                // Grouped so `||` inside the fragment cannot widen the id match.
                if let Some(fragment) = filter {
                    query.push_str(" && (");
                    query.push_str(fragment);
                    query.push(')');
                }
                query.push(']');
                if let Some(shape) = projection {
                    query.push_str(shape);
                }
                (query, json!({ "fetchIds": ids }))
            }
            DocumentQuery::References { id } => {
                ("*[references($id)]".to_string(), json!({ "id": id }))
            }
            DocumentQuery::Raw { query } => (query.clone(), json!({})),
        }
    }
}

/// An ordered batch of create-or-replace writes applied atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    pub documents: Vec<Document>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_or_replace(mut self, document: Document) -> Self {
        self.documents.push(document);
        self
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn document_ids(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.id().to_string()).collect()
    }
}

/// What the store reports after applying a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub transaction_id: String,
    pub document_ids: Vec<String>,
}

/// A dataset that can be queried, receive asset uploads, and apply
/// transactions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run a query and return the matching documents.
    async fn fetch(&self, query: &DocumentQuery) -> StoreResult<Vec<Document>>;

    /// Upload binary content, returning the asset record the store created.
    ///
    /// The store assigns the id; it is usually but not always the id the
    /// asset had at the origin.
    async fn upload_asset(
        &self,
        kind: AssetKind,
        content: Bytes,
        filename: Option<&str>,
    ) -> StoreResult<Document>;

    /// Apply every write or none of them.
    async fn commit(&self, transaction: Transaction) -> StoreResult<CommitReceipt>;

    /// Name for logs.
    fn name(&self) -> &str;
}

/// Resolves the store behind a workspace.
pub trait StoreProvider: Send + Sync {
    fn store_for(&self, workspace: &Workspace) -> Arc<dyn DocumentStore>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_ids_groq() {
        let query = DocumentQuery::by_ids(["a", "b"])
            .with_filter(Some("_type != \"secret\""))
            .with_projection("{_id}");
        let (text, params) = query.to_groq();
        assert_eq!(text, "*[_id in $fetchIds && (_type != \"secret\")]{_id}");
        assert_eq!(params, json!({ "fetchIds": ["a", "b"] }));
    }

    #[test]
    fn test_or_filter_stays_scoped_to_ids() {
        let (text, _) = DocumentQuery::by_ids(["a"])
            .with_filter(Some("_type == \"post\" || _type == \"author\""))
            .to_groq();
        assert_eq!(
            text,
            "*[_id in $fetchIds && (_type == \"post\" || _type == \"author\")]"
        );
    }

    #[test]
    fn test_by_ids_without_filter() {
        let (text, _) = DocumentQuery::by_ids(["a"]).with_filter(None).to_groq();
        assert_eq!(text, "*[_id in $fetchIds]");
    }

    #[test]
    fn test_references_groq() {
        let (text, params) = DocumentQuery::References { id: "a".into() }.to_groq();
        assert_eq!(text, "*[references($id)]");
        assert_eq!(params, json!({ "id": "a" }));
    }

    #[test]
    fn test_transaction_preserves_order() {
        let tx = Transaction::new()
            .create_or_replace(Document::new("b", "post"))
            .create_or_replace(Document::new("a", "post"));
        assert_eq!(tx.document_ids(), vec!["b", "a"]);
    }
}
