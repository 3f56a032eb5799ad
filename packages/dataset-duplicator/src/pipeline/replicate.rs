//! Copying selected candidates to the destination.
//!
//! Assets are downloaded and re-uploaded with bounded concurrency, then
//! every document (asset records included) goes into one atomic
//! create-or-replace transaction.

use content_lake_client::ApiToken;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{DuplicatorError, Result, StoreError, StoreResult};
use crate::pipeline::references::{extract_references, format_path, set_at_path};
use crate::traits::fetcher::AssetFetcher;
use crate::traits::store::{DocumentStore, Transaction};
use crate::types::candidate::CandidateItem;
use crate::types::config::ReplicationConfig;
use crate::types::document::{AssetKind, Document};

/// Asset copies finished so far out of the total for this run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        Self { completed, total }
    }
}

/// An asset the destination stored under a different id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierRemap {
    pub old_id: String,
    pub new_id: String,
}

/// Result of one asset download + upload.
#[derive(Debug, Clone)]
pub struct AssetCopy {
    pub original_id: String,
    pub uploaded: Document,
    pub remap: Option<IdentifierRemap>,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationReport {
    pub transaction_id: String,
    pub committed_ids: Vec<String>,
    pub assets_uploaded: usize,
    pub remaps: Vec<IdentifierRemap>,
}

/// The image download URL that returns the untouched original.
pub fn raw_download_url(url: &str) -> StoreResult<String> {
    let mut parsed = Url::parse(url).map_err(|e| StoreError::Download {
        url: url.to_string(),
        source: Box::new(e),
    })?;
    parsed.query_pairs_mut().append_pair("dlRaw", "true");
    Ok(parsed.into())
}

/// Point every reference to a remapped id at its new id. Returns the
/// number of references rewritten.
pub fn apply_remaps(documents: &mut [Document], remaps: &[IdentifierRemap]) -> usize {
    if remaps.is_empty() {
        return 0;
    }
    let lookup: HashMap<&str, &str> = remaps
        .iter()
        .map(|r| (r.old_id.as_str(), r.new_id.as_str()))
        .collect();

    let mut rewritten = 0;
    for document in documents.iter_mut() {
        for hit in extract_references(document) {
            let Some(new_id) = lookup.get(hit.target.as_str()) else {
                continue;
            };
            if set_at_path(document, &hit.path, Value::String(new_id.to_string())) {
                debug!(
                    document_id = document.id(),
                    path = %format_path(&hit.path),
                    old_id = %hit.target,
                    new_id = *new_id,
                    "Rewrote reference"
                );
                rewritten += 1;
            }
        }
    }
    rewritten
}

/// One create-or-replace per document, in order.
pub fn build_transaction(documents: Vec<Document>) -> Transaction {
    documents
        .into_iter()
        .fold(Transaction::new(), Transaction::create_or_replace)
}

/// Copies candidates into a destination store.
pub struct ReplicationPipeline<'a> {
    destination: &'a dyn DocumentStore,
    fetcher: &'a dyn AssetFetcher,
    token: Option<&'a ApiToken>,
    config: ReplicationConfig,
}

impl<'a> ReplicationPipeline<'a> {
    pub fn new(destination: &'a dyn DocumentStore, fetcher: &'a dyn AssetFetcher) -> Self {
        Self {
            destination,
            fetcher,
            token: None,
            config: ReplicationConfig::default(),
        }
    }

    /// Token sent when downloading image originals.
    pub fn with_token(mut self, token: Option<&'a ApiToken>) -> Self {
        self.token = token;
        self
    }

    pub fn with_config(mut self, config: ReplicationConfig) -> Self {
        self.config = config;
        self
    }

    /// Replicate every included item.
    ///
    /// `on_progress` sees `(0, total)` first and then one call per finished
    /// asset. The first asset failure aborts the run before anything is
    /// committed; assets uploaded by then stay at the destination.
    pub async fn run<F>(&self, items: &[CandidateItem], on_progress: F) -> Result<ReplicationReport>
    where
        F: Fn(Progress) + Sync,
    {
        let included: Vec<&CandidateItem> = items.iter().filter(|item| item.include).collect();
        let assets: Vec<&CandidateItem> = included
            .iter()
            .copied()
            .filter(|item| item.is_asset())
            .collect();
        let asset_total = assets.len();

        info!(
            destination = self.destination.name(),
            documents = included.len() - asset_total,
            assets = asset_total,
            concurrency = self.config.asset_concurrency,
            "Starting replication"
        );
        on_progress(Progress::new(0, asset_total));

        let completed = AtomicUsize::new(0);
        let (completed, on_progress) = (&completed, &on_progress);

        let copies: Vec<AssetCopy> = stream::iter(assets)
            .map(|item| async move {
                let copy = self.copy_asset(&item.document).await.map_err(|source| {
                    error!(asset_id = item.id(), error = %source, "Asset transfer failed");
                    DuplicatorError::AssetTransfer {
                        id: item.id().to_string(),
                        source,
                    }
                })?;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                on_progress(Progress::new(done, asset_total));
                Ok::<_, DuplicatorError>(copy)
            })
            .buffered(self.config.asset_concurrency.max(1))
            .try_collect()
            .await?;

        let remaps: Vec<IdentifierRemap> = copies.iter().filter_map(|c| c.remap.clone()).collect();
        let mut uploaded: HashMap<String, Document> = copies
            .into_iter()
            .map(|copy| (copy.original_id, copy.uploaded))
            .collect();

        let mut documents: Vec<Document> = included
            .iter()
            .filter_map(|item| {
                if item.is_asset() {
                    uploaded.remove(item.id())
                } else {
                    Some(item.document.clone())
                }
            })
            .collect();

        let rewritten = apply_remaps(&mut documents, &remaps);
        if rewritten > 0 {
            debug!(rewritten, remaps = remaps.len(), "Applied identifier remaps");
        }

        let transaction = build_transaction(documents);
        if transaction.is_empty() {
            warn!("Nothing selected to duplicate");
            return Ok(ReplicationReport::default());
        }

        let receipt = self.destination.commit(transaction).await.map_err(|err| {
            error!(destination = self.destination.name(), error = %err, "Commit failed");
            match err {
                StoreError::Transaction { description } => DuplicatorError::Commit { description },
                other => DuplicatorError::Commit {
                    description: other.to_string(),
                },
            }
        })?;

        info!(
            destination = self.destination.name(),
            transaction_id = %receipt.transaction_id,
            documents = receipt.document_ids.len(),
            "Replication committed"
        );

        Ok(ReplicationReport {
            transaction_id: receipt.transaction_id,
            committed_ids: receipt.document_ids,
            assets_uploaded: asset_total,
            remaps,
        })
    }

    /// Download one asset's original and upload it to the destination.
    pub async fn copy_asset(&self, asset: &Document) -> StoreResult<AssetCopy> {
        let id = asset.id();
        let kind = asset
            .asset_kind()
            .ok_or_else(|| StoreError::MalformedDocument(format!("{} is not an asset", id)))?;
        let url = asset.url().ok_or_else(|| StoreError::MissingField {
            id: id.to_string(),
            field: "url",
        })?;

        // File originals are public; image originals need the raw flag and a token.
        let content = match kind {
            AssetKind::Image => {
                self.fetcher
                    .download(&raw_download_url(url)?, self.token)
                    .await?
            }
            AssetKind::File => self.fetcher.download(url, None).await?,
        };
        let size = content.len();

        let uploaded = self
            .destination
            .upload_asset(kind, content, asset.original_filename())
            .await?;

        let remap = (kind == AssetKind::Image
            && asset.extension() == Some(self.config.sanitized_extension.as_str()))
        .then(|| IdentifierRemap {
            old_id: id.to_string(),
            new_id: uploaded.id().to_string(),
        });

        debug!(
            asset_id = id,
            new_id = uploaded.id(),
            kind = %kind,
            bytes = size,
            remapped = remap.is_some(),
            "Copied asset"
        );

        Ok(AssetCopy {
            original_id: id.to_string(),
            uploaded,
            remap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::references::extract_reference_ids;
    use crate::stores::memory::MemoryStore;
    use crate::testing::{document, file_asset, image_asset, reference, MockAssetFetcher};
    use std::sync::Mutex;

    #[test]
    fn test_raw_download_url() {
        assert_eq!(
            raw_download_url("https://cdn.example.com/images/p/d/abc.svg").unwrap(),
            "https://cdn.example.com/images/p/d/abc.svg?dlRaw=true"
        );
        assert_eq!(
            raw_download_url("https://cdn.example.com/a.png?w=10").unwrap(),
            "https://cdn.example.com/a.png?w=10&dlRaw=true"
        );
        assert!(raw_download_url("not a url").is_err());
    }

    #[test]
    fn test_apply_remaps_rewrites_matching_references_only() {
        let mut documents = vec![document("a", "post")
            .with_field("logo", serde_json::json!({ "asset": reference("image-old-1x1-svg") }))
            .with_field("author", reference("b"))];
        let remaps = vec![IdentifierRemap {
            old_id: "image-old-1x1-svg".into(),
            new_id: "image-new-1x1-svg".into(),
        }];

        assert_eq!(apply_remaps(&mut documents, &remaps), 1);
        assert_eq!(
            extract_reference_ids(&documents[0]),
            vec!["image-new-1x1-svg", "b"]
        );
    }

    #[tokio::test]
    async fn test_file_download_sends_no_token() {
        let destination = MemoryStore::new("destination");
        let fetcher = MockAssetFetcher::new().with_content("https://cdn/doc.pdf", b"pdf".to_vec());
        let token = ApiToken::new("secret");

        let pipeline = ReplicationPipeline::new(&destination, &fetcher).with_token(Some(&token));
        pipeline
            .copy_asset(&file_asset("file-abc-pdf", "https://cdn/doc.pdf"))
            .await
            .unwrap();

        let calls = fetcher.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "https://cdn/doc.pdf");
        assert!(!calls[0].authenticated);
    }

    #[tokio::test]
    async fn test_image_download_is_raw_and_authenticated() {
        let destination = MemoryStore::new("destination");
        let fetcher = MockAssetFetcher::new();
        let token = ApiToken::new("secret");

        let pipeline = ReplicationPipeline::new(&destination, &fetcher).with_token(Some(&token));
        pipeline
            .copy_asset(&image_asset("image-abc-10x10-png", "https://cdn/a.png"))
            .await
            .unwrap();

        let calls = fetcher.calls();
        assert_eq!(calls[0].url, "https://cdn/a.png?dlRaw=true");
        assert!(calls[0].authenticated);
    }

    #[tokio::test]
    async fn test_progress_counts_assets_only() {
        let destination = MemoryStore::new("destination");
        let fetcher = MockAssetFetcher::new();
        let items = vec![
            CandidateItem::new(document("a", "post")),
            CandidateItem::new(image_asset("image-a-1x1-png", "https://cdn/a.png")),
            CandidateItem::new(file_asset("file-b-pdf", "https://cdn/b.pdf")),
        ];

        let seen = Mutex::new(Vec::new());
        let report = ReplicationPipeline::new(&destination, &fetcher)
            .run(&items, |p| seen.lock().unwrap().push(p))
            .await
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.first(), Some(&Progress::new(0, 2)));
        assert_eq!(seen.last(), Some(&Progress::new(2, 2)));
        assert_eq!(seen.len(), 3);
        assert_eq!(report.assets_uploaded, 2);
        assert_eq!(report.committed_ids.len(), 3);
    }

    #[tokio::test]
    async fn test_excluded_items_are_skipped() {
        let destination = MemoryStore::new("destination");
        let fetcher = MockAssetFetcher::new();
        let mut items = vec![
            CandidateItem::new(document("a", "post")),
            CandidateItem::new(document("b", "post")),
        ];
        items[1].include = false;

        let report = ReplicationPipeline::new(&destination, &fetcher)
            .run(&items, |_| {})
            .await
            .unwrap();

        assert_eq!(report.committed_ids, vec!["a"]);
        assert!(destination.get("b").is_none());
    }

    #[tokio::test]
    async fn test_store_error_description_surfaces_verbatim() {
        let destination = MemoryStore::new("destination")
            .failing_commit("Mutation(s) failed with 1 error(s)");
        let fetcher = MockAssetFetcher::new();
        let items = vec![CandidateItem::new(document("a", "post"))];

        let err = ReplicationPipeline::new(&destination, &fetcher)
            .run(&items, |_| {})
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Mutation(s) failed with 1 error(s)");
    }
}
