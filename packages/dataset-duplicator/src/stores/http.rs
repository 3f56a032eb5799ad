//! Store backed by the content lake HTTP API.

use async_trait::async_trait;
use bytes::Bytes;
use content_lake_client::{ApiToken, ClientError, ContentLakeClient, Mutation};
use std::sync::Arc;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::fetcher::AssetFetcher;
use crate::traits::store::{CommitReceipt, DocumentQuery, DocumentStore, StoreProvider, Transaction};
use crate::types::config::Workspace;
use crate::types::document::{AssetKind, Document};

fn client_kind(kind: AssetKind) -> content_lake_client::AssetKind {
    match kind {
        AssetKind::Image => content_lake_client::AssetKind::Image,
        AssetKind::File => content_lake_client::AssetKind::File,
    }
}

/// A dataset reached over HTTP.
#[derive(Clone)]
pub struct HttpStore {
    client: ContentLakeClient,
    name: String,
}

impl HttpStore {
    pub fn new(client: ContentLakeClient) -> Self {
        let config = client.config();
        let name = format!("{}.{}", config.project_id, config.dataset);
        Self { client, name }
    }

    pub fn client(&self) -> &ContentLakeClient {
        &self.client
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn fetch(&self, query: &DocumentQuery) -> StoreResult<Vec<Document>> {
        let (groq, params) = query.to_groq();
        debug!(store = %self.name, query = %groq, "Running query");

        let rows = self
            .client
            .query(&groq, &params)
            .await
            .map_err(|e| StoreError::Query(Box::new(e)))?;

        rows.into_iter().map(Document::from_value).collect()
    }

    async fn upload_asset(
        &self,
        kind: AssetKind,
        content: Bytes,
        filename: Option<&str>,
    ) -> StoreResult<Document> {
        let value = self
            .client
            .upload_asset(client_kind(kind), content, filename)
            .await
            .map_err(|e| StoreError::Upload(Box::new(e)))?;
        Document::from_value(value)
    }

    async fn commit(&self, transaction: Transaction) -> StoreResult<CommitReceipt> {
        let mutations: Vec<Mutation> = transaction
            .documents
            .into_iter()
            .map(|doc| Mutation::CreateOrReplace(doc.into_value()))
            .collect();

        let response = self.client.mutate(&mutations).await.map_err(|e| match e {
            ClientError::Api { description, .. } => StoreError::Transaction { description },
            other => StoreError::Transaction {
                description: other.to_string(),
            },
        })?;

        Ok(CommitReceipt {
            transaction_id: response.transaction_id,
            document_ids: response.results.into_iter().map(|r| r.id).collect(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl AssetFetcher for HttpStore {
    async fn download(&self, url: &str, bearer: Option<&ApiToken>) -> StoreResult<Bytes> {
        self.client
            .download(url, bearer)
            .await
            .map_err(|e| StoreError::Download {
                url: url.to_string(),
                source: Box::new(e),
            })
    }
}

/// Derives per-workspace stores from one base client.
///
/// Every store shares the base client's token and connection pool.
#[derive(Clone)]
pub struct HttpStoreProvider {
    base: ContentLakeClient,
}

impl HttpStoreProvider {
    pub fn new(base: ContentLakeClient) -> Self {
        Self { base }
    }

    /// A fetcher using the base client's connection pool.
    pub fn fetcher(&self) -> Arc<dyn AssetFetcher> {
        Arc::new(HttpStore::new(self.base.clone()))
    }
}

impl StoreProvider for HttpStoreProvider {
    fn store_for(&self, workspace: &Workspace) -> Arc<dyn DocumentStore> {
        let client = self
            .base
            .with_dataset(workspace.dataset.clone(), Some(workspace.project_id.as_str()));
        Arc::new(HttpStore::new(client))
    }
}
