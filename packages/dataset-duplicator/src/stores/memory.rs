//! In-memory dataset for testing and development.
//!
//! Evaluates the structured queries the pipeline issues. Filter fragments
//! have no evaluator here; register a predicate for each fragment a test
//! uses with [`MemoryStore::with_filter`].

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{StoreError, StoreResult};
use crate::pipeline::references::extract_reference_ids;
use crate::traits::store::{CommitReceipt, DocumentQuery, DocumentStore, StoreProvider, Transaction};
use crate::types::config::Workspace;
use crate::types::document::{AssetKind, Document};

type Predicate = Arc<dyn Fn(&Document) -> bool + Send + Sync>;

/// Record of a call made to the memory store.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryStoreCall {
    Fetch { query: DocumentQuery },
    Upload { kind: AssetKind, filename: Option<String>, size: usize },
    Commit { document_ids: Vec<String> },
}

/// A dataset held in memory.
///
/// Data is lost when the store is dropped.
pub struct MemoryStore {
    name: String,
    documents: RwLock<HashMap<String, Document>>,
    filters: RwLock<HashMap<String, Predicate>>,
    raw_results: RwLock<HashMap<String, Vec<Document>>>,
    minted_ids: RwLock<HashMap<String, String>>,
    fetch_failure: RwLock<Option<String>>,
    upload_failure: RwLock<Option<String>>,
    commit_failure: RwLock<Option<String>>,
    calls: RwLock<Vec<MemoryStoreCall>>,
    transactions: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(HashMap::new()),
            filters: RwLock::new(HashMap::new()),
            raw_results: RwLock::new(HashMap::new()),
            minted_ids: RwLock::new(HashMap::new()),
            fetch_failure: RwLock::new(None),
            upload_failure: RwLock::new(None),
            commit_failure: RwLock::new(None),
            calls: RwLock::new(Vec::new()),
            transactions: AtomicUsize::new(0),
        }
    }

    /// Add a document.
    pub fn with_document(self, document: Document) -> Self {
        self.insert(document);
        self
    }

    /// Register the predicate a filter fragment stands for.
    pub fn with_filter(
        self,
        fragment: impl Into<String>,
        predicate: impl Fn(&Document) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filters
            .write()
            .unwrap()
            .insert(fragment.into(), Arc::new(predicate));
        self
    }

    /// Canned result for a raw query string.
    pub fn with_raw_result(self, query: impl Into<String>, documents: Vec<Document>) -> Self {
        self.raw_results
            .write()
            .unwrap()
            .insert(query.into(), documents);
        self
    }

    /// Id to assign when a file with this name is uploaded.
    pub fn with_minted_id(self, filename: impl Into<String>, id: impl Into<String>) -> Self {
        self.minted_ids
            .write()
            .unwrap()
            .insert(filename.into(), id.into());
        self
    }

    /// Make every fetch fail.
    pub fn failing_fetch(self, message: impl Into<String>) -> Self {
        *self.fetch_failure.write().unwrap() = Some(message.into());
        self
    }

    /// Make every upload fail.
    pub fn failing_upload(self, message: impl Into<String>) -> Self {
        *self.upload_failure.write().unwrap() = Some(message.into());
        self
    }

    /// Make every commit fail with this description.
    pub fn failing_commit(self, description: impl Into<String>) -> Self {
        self.set_commit_failure(Some(description.into()));
        self
    }

    pub fn set_commit_failure(&self, description: Option<String>) {
        *self.commit_failure.write().unwrap() = description;
    }

    pub fn insert(&self, document: Document) {
        self.documents
            .write()
            .unwrap()
            .insert(document.id().to_string(), document);
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.documents.read().unwrap().get(id).cloned()
    }

    pub fn document_count(&self) -> usize {
        self.documents.read().unwrap().len()
    }

    /// Every stored document, sorted by id.
    pub fn snapshot(&self) -> Vec<Document> {
        let mut documents: Vec<Document> = self.documents.read().unwrap().values().cloned().collect();
        documents.sort_by(|a, b| a.id().cmp(b.id()));
        documents
    }

    pub fn calls(&self) -> Vec<MemoryStoreCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.count_calls(|call| matches!(call, MemoryStoreCall::Fetch { .. }))
    }

    pub fn upload_count(&self) -> usize {
        self.count_calls(|call| matches!(call, MemoryStoreCall::Upload { .. }))
    }

    pub fn commit_count(&self) -> usize {
        self.count_calls(|call| matches!(call, MemoryStoreCall::Commit { .. }))
    }

    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    fn count_calls(&self, predicate: impl Fn(&MemoryStoreCall) -> bool) -> usize {
        self.calls.read().unwrap().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: MemoryStoreCall) {
        self.calls.write().unwrap().push(call);
    }

    fn filter_predicate(&self, fragment: Option<&str>) -> StoreResult<Option<Predicate>> {
        match fragment {
            None => Ok(None),
            Some(fragment) => self
                .filters
                .read()
                .unwrap()
                .get(fragment)
                .cloned()
                .map(Some)
                .ok_or_else(|| StoreError::UnsupportedQuery(format!("filter `{}`", fragment))),
        }
    }

    fn by_ids(
        &self,
        ids: &[String],
        filter: Option<&str>,
        projection: Option<&str>,
    ) -> StoreResult<Vec<Document>> {
        let predicate = self.filter_predicate(filter)?;
        let fields = projection.map(parse_projection).transpose()?;

        let documents = self.documents.read().unwrap();
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| documents.get(id))
            .filter(|doc| predicate.as_ref().map_or(true, |p| p(doc)))
            .map(|doc| match &fields {
                Some(fields) => project(doc, fields),
                None => doc.clone(),
            })
            .collect())
    }

    fn referencing(&self, id: &str) -> Vec<Document> {
        let mut documents: Vec<Document> = self
            .documents
            .read()
            .unwrap()
            .values()
            .filter(|doc| extract_reference_ids(doc).iter().any(|r| r == id))
            .cloned()
            .collect();
        documents.sort_by(|a, b| a.id().cmp(b.id()));
        documents
    }

    fn mint_id(&self, kind: AssetKind, content: &[u8], filename: Option<&str>) -> (String, String) {
        let extension = filename
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "bin".to_string());

        if let Some(id) = filename.and_then(|name| self.minted_ids.read().unwrap().get(name).cloned()) {
            return (id, extension);
        }

        let hash = hex::encode(Sha256::digest(content));
        let hash = &hash[..40];
        let id = match kind {
            AssetKind::Image => format!("image-{}-1x1-{}", hash, extension),
            AssetKind::File => format!("file-{}-{}", hash, extension),
        };
        (id, extension)
    }
}

/// Field names from a `{ a, b }` projection.
fn parse_projection(projection: &str) -> StoreResult<Vec<String>> {
    let unsupported = || StoreError::UnsupportedQuery(format!("projection `{}`", projection));
    let inner = projection
        .trim()
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(unsupported)?;

    inner
        .split(',')
        .map(str::trim)
        .map(|field| {
            if !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                Ok(field.to_string())
            } else {
                Err(unsupported())
            }
        })
        .collect()
}

fn project(document: &Document, fields: &[String]) -> Document {
    let mut projected = Document::default();
    for field in fields {
        if let Some(value) = document.get(field) {
            projected.set(field.clone(), value.clone());
        }
    }
    projected
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch(&self, query: &DocumentQuery) -> StoreResult<Vec<Document>> {
        self.record(MemoryStoreCall::Fetch {
            query: query.clone(),
        });
        if let Some(message) = self.fetch_failure.read().unwrap().clone() {
            return Err(StoreError::Query(message.into()));
        }

        match query {
            DocumentQuery::ByIds {
                ids,
                filter,
                projection,
            } => self.by_ids(ids, filter.as_deref(), projection.as_deref()),
            DocumentQuery::References { id } => Ok(self.referencing(id)),
            DocumentQuery::Raw { query } => self
                .raw_results
                .read()
                .unwrap()
                .get(query)
                .cloned()
                .ok_or_else(|| StoreError::UnsupportedQuery(query.clone())),
        }
    }

    async fn upload_asset(
        &self,
        kind: AssetKind,
        content: Bytes,
        filename: Option<&str>,
    ) -> StoreResult<Document> {
        self.record(MemoryStoreCall::Upload {
            kind,
            filename: filename.map(str::to_string),
            size: content.len(),
        });
        if let Some(message) = self.upload_failure.read().unwrap().clone() {
            return Err(StoreError::Upload(message.into()));
        }

        let (id, extension) = self.mint_id(kind, &content, filename);
        let mut asset = Document::new(id.clone(), kind.document_type())
            .with_field("extension", extension)
            .with_field("size", content.len())
            .with_field("url", format!("memory://{}/{}", self.name, id))
            .with_updated_at(now());
        if let Some(filename) = filename {
            asset.set("originalFilename", filename);
        }

        self.insert(asset.clone());
        Ok(asset)
    }

    async fn commit(&self, transaction: Transaction) -> StoreResult<CommitReceipt> {
        let document_ids = transaction.document_ids();
        self.record(MemoryStoreCall::Commit {
            document_ids: document_ids.clone(),
        });
        if let Some(description) = self.commit_failure.read().unwrap().clone() {
            return Err(StoreError::Transaction { description });
        }

        let updated_at = now();
        let mut documents = self.documents.write().unwrap();
        for mut document in transaction.documents {
            document.set("_updatedAt", updated_at.clone());
            documents.insert(document.id().to_string(), document);
        }

        let n = self.transactions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CommitReceipt {
            transaction_id: format!("{}-tx-{}", self.name, n),
            document_ids,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Memory stores keyed by `project.dataset`.
#[derive(Default)]
pub struct MemoryStoreProvider {
    stores: RwLock<HashMap<String, Arc<MemoryStore>>>,
}

impl MemoryStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(workspace: &Workspace) -> String {
        format!("{}.{}", workspace.project_id, workspace.dataset)
    }

    /// Serve `store` for the workspace's project and dataset.
    pub fn with_store(self, workspace: &Workspace, store: Arc<MemoryStore>) -> Self {
        self.stores
            .write()
            .unwrap()
            .insert(Self::key(workspace), store);
        self
    }

    /// The store for a workspace, created empty on first use.
    pub fn memory_store(&self, workspace: &Workspace) -> Arc<MemoryStore> {
        self.stores
            .write()
            .unwrap()
            .entry(Self::key(workspace))
            .or_insert_with(|| Arc::new(MemoryStore::new(Self::key(workspace))))
            .clone()
    }
}

impl StoreProvider for MemoryStoreProvider {
    fn store_for(&self, workspace: &Workspace) -> Arc<dyn DocumentStore> {
        self.memory_store(workspace)
    }
}
