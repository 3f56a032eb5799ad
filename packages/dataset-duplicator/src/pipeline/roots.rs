//! Choosing the root documents a duplication starts from.

use tracing::debug;

use crate::error::StoreResult;
use crate::traits::store::{DocumentQuery, DocumentStore};
use crate::types::document::Document;

/// Title shown on the disabled document action.
pub const UNPUBLISHED_ACTION_TITLE: &str = "Document must be Published to begin";

/// Label of the document action.
pub const DOCUMENT_ACTION_LABEL: &str = "Duplicate to...";

/// Whether the document action is available, and what it starts from.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionState {
    Enabled { roots: Vec<Document> },
    Disabled { title: &'static str },
}

impl ActionState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ActionState::Enabled { .. })
    }
}

/// State of the document action for a document with the given draft and
/// published versions. Only a published document with no pending draft
/// can be duplicated.
pub fn document_action_state(draft: Option<&Document>, published: Option<&Document>) -> ActionState {
    match (draft, published) {
        (None, Some(published)) => ActionState::Enabled {
            roots: vec![published.clone()],
        },
        _ => ActionState::Disabled {
            title: UNPUBLISHED_ACTION_TITLE,
        },
    }
}

/// Run an operator query and keep published documents of registered types.
pub async fn query_roots(
    store: &dyn DocumentStore,
    query: &str,
    registered_types: &[String],
) -> StoreResult<Vec<Document>> {
    let documents = store
        .fetch(&DocumentQuery::Raw {
            query: query.to_string(),
        })
        .await?;
    let fetched = documents.len();

    let roots: Vec<Document> = documents
        .into_iter()
        .filter(|doc| !doc.is_draft())
        .filter(|doc| {
            doc.doc_type()
                .is_some_and(|t| registered_types.iter().any(|r| r == t))
        })
        .collect();

    debug!(
        store = store.name(),
        fetched,
        kept = roots.len(),
        "Resolved query roots"
    );

    Ok(roots)
}

/// The roots plus every document referencing the first root.
pub async fn inbound_roots(store: &dyn DocumentStore, roots: &[Document]) -> StoreResult<Vec<Document>> {
    let Some(first) = roots.first() else {
        return Ok(Vec::new());
    };

    let referrers = store
        .fetch(&DocumentQuery::References {
            id: first.id().to_string(),
        })
        .await?;

    debug!(
        store = store.name(),
        root = first.id(),
        referrers = referrers.len(),
        "Resolved inbound references"
    );

    let mut combined = roots.to_vec();
    combined.extend(
        referrers
            .into_iter()
            .filter(|doc| !roots.iter().any(|root| root.id() == doc.id())),
    );
    Ok(combined)
}
