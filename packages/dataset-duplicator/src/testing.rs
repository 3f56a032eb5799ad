//! Testing utilities including mock implementations.
//!
//! Useful for exercising sessions and pipelines without a network. Pair
//! these with [`MemoryStore`](crate::stores::MemoryStore) for the dataset
//! side.

use async_trait::async_trait;
use bytes::Bytes;
use content_lake_client::ApiToken;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{BoxError, StoreError, StoreResult};
use crate::traits::fetcher::AssetFetcher;
use crate::traits::hook::{DuplicatedContext, PostCommitHook};
use crate::types::document::{Document, FILE_ASSET_TYPE, IMAGE_ASSET_TYPE};

// =============================================================================
// Fixtures
// =============================================================================

/// A plain document.
pub fn document(id: &str, doc_type: &str) -> Document {
    Document::new(id, doc_type)
}

/// A reference value pointing at `id`.
pub fn reference(id: &str) -> Value {
    json!({ "_type": "reference", "_ref": id })
}

/// An image asset record. The extension is taken from the id.
pub fn image_asset(id: &str, url: &str) -> Document {
    let extension = id.rsplit('-').next().unwrap_or("png");
    Document::new(id, IMAGE_ASSET_TYPE)
        .with_field("url", url)
        .with_field("extension", extension)
        .with_field("originalFilename", format!("original.{}", extension))
}

/// A file asset record. The extension is taken from the id.
pub fn file_asset(id: &str, url: &str) -> Document {
    let extension = id.rsplit('-').next().unwrap_or("bin");
    Document::new(id, FILE_ASSET_TYPE)
        .with_field("url", url)
        .with_field("extension", extension)
        .with_field("originalFilename", format!("original.{}", extension))
}

/// RFC 3339 timestamp `seconds` after a fixed instant.
pub fn timestamp(seconds: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(1_700_000_000 + seconds, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

// =============================================================================
// MockAssetFetcher
// =============================================================================

/// Record of a download made through the mock fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub url: String,
    /// Whether a bearer token was sent
    pub authenticated: bool,
}

/// A mock asset fetcher.
///
/// Unknown URLs return their own bytes as content. Tracks how many
/// downloads are in flight at once.
#[derive(Default)]
pub struct MockAssetFetcher {
    content: Arc<RwLock<HashMap<String, Bytes>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    calls: Arc<RwLock<Vec<FetchCall>>>,
}

impl MockAssetFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` for `url`.
    pub fn with_content(self, url: impl Into<String>, content: impl Into<Bytes>) -> Self {
        self.content
            .write()
            .unwrap()
            .insert(url.into(), content.into());
        self
    }

    /// Fail downloads of `url`.
    pub fn failing(self, url: impl Into<String>) -> Self {
        self.failing.write().unwrap().insert(url.into());
        self
    }

    /// Hold every download open this long.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Most downloads ever in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetFetcher for MockAssetFetcher {
    async fn download(&self, url: &str, bearer: Option<&ApiToken>) -> StoreResult<Bytes> {
        self.calls.write().unwrap().push(FetchCall {
            url: url.to_string(),
            authenticated: bearer.is_some(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.failing.read().unwrap().contains(url) {
            Err(StoreError::Download {
                url: url.to_string(),
                source: "connection reset".into(),
            })
        } else {
            let content = self.content.read().unwrap().get(url).cloned();
            Ok(content.unwrap_or_else(|| Bytes::from(url.as_bytes().to_vec())))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// =============================================================================
// RecordingHook
// =============================================================================

/// A post-commit hook that records its calls and can be told to fail.
#[derive(Default)]
pub struct RecordingHook {
    calls: RwLock<Vec<DuplicatedContext>>,
    failure: Option<String>,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            calls: RwLock::new(Vec::new()),
            failure: Some(message.into()),
        }
    }

    pub fn calls(&self) -> Vec<DuplicatedContext> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl PostCommitHook for RecordingHook {
    async fn on_duplicated(&self, context: &DuplicatedContext) -> Result<(), BoxError> {
        self.calls.write().unwrap().push(context.clone());
        match &self.failure {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }
}
