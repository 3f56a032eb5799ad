//! Classifying candidates against the destination dataset.
//!
//! Only `_updatedAt` is compared. A destination copy edited without its
//! timestamp changing reads as identical.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

use crate::error::StoreResult;
use crate::traits::store::{DocumentQuery, DocumentStore};
use crate::types::candidate::CandidateItem;
use crate::types::document::Document;
use crate::types::status::LifecycleStatus;

/// Projection for the destination snapshot query.
pub const SNAPSHOT_PROJECTION: &str = "{ _id, _updatedAt }";

/// `_updatedAt` of every candidate id the destination holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationSnapshot {
    updated_at: HashMap<String, Option<String>>,
}

impl DestinationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let updated_at = documents
            .into_iter()
            .map(|doc| (doc.id().to_string(), doc.updated_at().map(str::to_string)))
            .collect();
        Self { updated_at }
    }

    /// `None` when absent; `Some(None)` when present without a timestamp.
    pub fn get(&self, id: &str) -> Option<Option<&str>> {
        self.updated_at.get(id).map(|ts| ts.as_deref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.updated_at.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.updated_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updated_at.is_empty()
    }
}

/// Fetch the destination's view of `ids` in one batched query.
pub async fn fetch_snapshot(
    destination: &dyn DocumentStore,
    ids: &[String],
) -> StoreResult<DestinationSnapshot> {
    if ids.is_empty() {
        return Ok(DestinationSnapshot::new());
    }

    let query = DocumentQuery::by_ids(ids.iter().cloned()).with_projection(SNAPSHOT_PROJECTION);
    let documents = destination.fetch(&query).await?;
    let snapshot = DestinationSnapshot::from_documents(documents);

    debug!(
        store = destination.name(),
        requested = ids.len(),
        existing = snapshot.len(),
        "Fetched destination snapshot"
    );

    Ok(snapshot)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Classify one document given its origin timestamp and the destination
/// entry from [`DestinationSnapshot::get`].
pub fn classify(origin: Option<&str>, destination: Option<Option<&str>>) -> LifecycleStatus {
    let Some(destination) = destination else {
        return LifecycleStatus::New;
    };
    let (Some(origin), Some(destination)) = (origin, destination) else {
        return LifecycleStatus::Undetermined;
    };
    if origin == destination {
        return LifecycleStatus::Identical;
    }

    match (parse_timestamp(origin), parse_timestamp(destination)) {
        (Some(origin), Some(destination)) => match destination.cmp(&origin) {
            Ordering::Greater => LifecycleStatus::NewerAtDestination,
            Ordering::Less => LifecycleStatus::StaleAtDestination,
            Ordering::Equal => LifecycleStatus::Identical,
        },
        _ => LifecycleStatus::Undetermined,
    }
}

/// Set every candidate's status from the snapshot.
pub fn reconcile(candidates: &mut [CandidateItem], snapshot: &DestinationSnapshot) {
    for item in candidates.iter_mut() {
        item.status = classify(item.document.updated_at(), snapshot.get(item.id()));
    }
}

/// Forget all statuses, e.g. when there is no destination to compare with.
pub fn clear_statuses(candidates: &mut [CandidateItem]) {
    for item in candidates.iter_mut() {
        item.status = LifecycleStatus::Undetermined;
    }
}

/// Fetch a snapshot for `candidates` and classify them.
pub async fn refresh(
    destination: &dyn DocumentStore,
    candidates: &mut [CandidateItem],
) -> StoreResult<()> {
    let ids: Vec<String> = candidates.iter().map(|c| c.id().to_string()).collect();
    let snapshot = fetch_snapshot(destination, &ids).await?;
    reconcile(candidates, &snapshot);
    Ok(())
}
