//! Reference closure: every document reachable from a set of roots.
//!
//! Ids are claimed in a shared [`VisitedIds`] before their fetch is issued,
//! so cycles terminate and sibling branches never fetch the same id twice.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::pipeline::references::extract_reference_ids;
use crate::traits::store::{DocumentQuery, DocumentStore};
use crate::types::candidate::CandidateItem;
use crate::types::document::{draft_id, Document};

/// Ids already claimed by some branch of a closure walk.
///
/// Cloning shares the underlying set.
#[derive(Debug, Clone, Default)]
pub struct VisitedIds(Arc<Mutex<HashSet<String>>>);

impl VisitedIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id` if absent. Returns true for the caller that inserted it.
    pub fn claim(&self, id: &str) -> bool {
        let mut set = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if set.contains(id) {
            false
        } else {
            set.insert(id.to_string())
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Walks outbound references through a store.
pub struct ClosureCollector<'a> {
    store: &'a dyn DocumentStore,
    filter: Option<String>,
    projection: Option<String>,
}

impl<'a> ClosureCollector<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            filter: None,
            projection: None,
        }
    }

    /// Only collect documents matching this filter fragment.
    pub fn with_filter(mut self, filter: Option<&str>) -> Self {
        self.filter = filter.map(str::to_string);
        self
    }

    /// Reshape fetched documents.
    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    /// Collect `fetch_ids` and everything they reference.
    ///
    /// Each document appears once, first seen wins. Ids the store does not
    /// return (dangling or filtered out) are skipped silently.
    pub async fn collect(
        &self,
        fetch_ids: &[String],
        visited: &VisitedIds,
    ) -> StoreResult<Vec<Document>> {
        let roots: Vec<String> = fetch_ids
            .iter()
            .filter(|id| visited.claim(id))
            .cloned()
            .collect();

        let documents = self.expand(roots, visited).await?;

        let mut seen = HashSet::with_capacity(documents.len());
        Ok(documents
            .into_iter()
            .filter(|doc| seen.insert(doc.id().to_string()))
            .collect())
    }

    fn expand<'b>(
        &'b self,
        ids: Vec<String>,
        visited: &'b VisitedIds,
    ) -> BoxFuture<'b, StoreResult<Vec<Document>>> {
        async move {
            if ids.is_empty() {
                return Ok(Vec::new());
            }

            let requested = ids.len();
            let query = DocumentQuery::ByIds {
                ids,
                filter: self.filter.clone(),
                projection: self.projection.clone(),
            };
            let fetched = self.store.fetch(&query).await?;

            debug!(
                store = self.store.name(),
                requested,
                fetched = fetched.len(),
                "Fetched closure batch"
            );

            let branches: Vec<_> = fetched
                .iter()
                .map(|doc| {
                    let unclaimed: Vec<String> = extract_reference_ids(doc)
                        .into_iter()
                        .filter(|id| visited.claim(id))
                        .collect();
                    self.expand(unclaimed, visited)
                })
                .collect();

            let nested = try_join_all(branches).await?;

            let mut documents = fetched;
            documents.extend(nested.into_iter().flatten());
            Ok(documents)
        }
        .boxed()
    }
}

/// Projection used when only existence matters.
pub const ID_ONLY_PROJECTION: &str = "{_id}";

/// Build the candidate set for `root_ids`.
///
/// Runs the full closure, then an id-only fetch of each root's draft id
/// (with its own visited set) to flag roots shadowed by an unpublished
/// draft.
pub async fn gather_candidates(
    store: &dyn DocumentStore,
    root_ids: &[String],
    filter: Option<&str>,
) -> StoreResult<Vec<CandidateItem>> {
    let draft_ids: Vec<String> = root_ids.iter().map(|id| draft_id(id)).collect();

    let full = ClosureCollector::new(store).with_filter(filter);
    let id_only = ClosureCollector::new(store)
        .with_filter(filter)
        .with_projection(ID_ONLY_PROJECTION);
    let (visited, visited_drafts) = (VisitedIds::new(), VisitedIds::new());

    let (documents, drafts) = futures::try_join!(
        full.collect(root_ids, &visited),
        id_only.collect(&draft_ids, &visited_drafts),
    )?;

    let existing_drafts: HashSet<&str> = drafts.iter().map(|d| d.id()).collect();
    let candidates: Vec<CandidateItem> = documents
        .into_iter()
        .map(|doc| {
            let has_draft = existing_drafts.contains(draft_id(doc.id()).as_str());
            CandidateItem::new(doc).with_draft(has_draft)
        })
        .collect();

    info!(
        store = store.name(),
        roots = root_ids.len(),
        candidates = candidates.len(),
        drafts = existing_drafts.len(),
        "Gathered references"
    );

    Ok(candidates)
}
