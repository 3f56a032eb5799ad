//! Downloading asset originals.

use async_trait::async_trait;
use bytes::Bytes;
use content_lake_client::ApiToken;

use crate::error::StoreResult;

/// Fetches the binary content behind an asset URL.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Download `url`. When `bearer` is set it is sent as
    /// `Authorization: Bearer <token>`.
    async fn download(&self, url: &str, bearer: Option<&ApiToken>) -> StoreResult<Bytes>;
}
