//! Pure content lake REST client
//!
//! A small client for the hosted document store's HTTP API with no
//! domain-specific logic. Supports GROQ queries, asset uploads, transactional
//! mutations and raw asset downloads.
//!
//! # Example
//!
//! ```rust,ignore
//! use content_lake_client::{ContentLakeClient, Mutation};
//! use serde_json::json;
//!
//! let client = ContentLakeClient::from_env()?;
//!
//! // Query
//! let docs = client
//!     .query("*[_id in $ids]", &json!({ "ids": ["a", "b"] }))
//!     .await?;
//!
//! // Same project, other dataset
//! let staging = client.with_dataset("staging", None);
//! staging
//!     .mutate(&[Mutation::CreateOrReplace(docs[0].clone())])
//!     .await?;
//! ```

pub mod credentials;
pub mod error;
pub mod types;

pub use credentials::ApiToken;
pub use error::{ClientError, Result};
pub use types::{AssetKind, MutateResponse, Mutation, MutationResult};

use bytes::Bytes;
use reqwest::{header, Client, Response};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// API version pinned for every request.
pub const DEFAULT_API_VERSION: &str = "2021-05-19";

/// Connection settings for one project + dataset pair.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Project the dataset belongs to
    pub project_id: String,

    /// Dataset to read from and write to
    pub dataset: String,

    /// Dated API version (without the leading `v`)
    pub api_version: String,

    /// Token sent as a bearer credential on API calls
    pub token: Option<ApiToken>,

    /// Override for the API host (defaults to `https://<project>.api.sanity.io`)
    pub api_host: Option<String>,
}

impl ClientConfig {
    /// Create a config for a project and dataset.
    pub fn new(project_id: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset: dataset.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            token: None,
            api_host: None,
        }
    }

    /// Read `SANITY_PROJECT_ID`, `SANITY_DATASET`, and optionally
    /// `SANITY_API_TOKEN` / `SANITY_API_VERSION` / `SANITY_API_HOST`.
    pub fn from_env() -> Result<Self> {
        let project_id = std::env::var("SANITY_PROJECT_ID")
            .map_err(|_| ClientError::Config("SANITY_PROJECT_ID not set".into()))?;
        let dataset = std::env::var("SANITY_DATASET")
            .map_err(|_| ClientError::Config("SANITY_DATASET not set".into()))?;

        let mut config = Self::new(project_id, dataset);
        if let Ok(token) = std::env::var("SANITY_API_TOKEN") {
            config.token = Some(ApiToken::new(token));
        }
        if let Ok(version) = std::env::var("SANITY_API_VERSION") {
            config.api_version = version.trim_start_matches('v').to_string();
        }
        if let Ok(host) = std::env::var("SANITY_API_HOST") {
            config.api_host = Some(host);
        }
        Ok(config)
    }

    /// Set the API token.
    pub fn with_token(mut self, token: impl Into<ApiToken>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set a custom API host (proxies, local test servers).
    pub fn with_api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = Some(host.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(ClientError::Config("project id is empty".into()));
        }
        if self.dataset.trim().is_empty() {
            return Err(ClientError::Config("dataset is empty".into()));
        }
        Ok(())
    }
}

/// Content lake API client bound to one dataset.
#[derive(Clone)]
pub struct ContentLakeClient {
    http_client: Client,
    config: ClientConfig,
}

impl ContentLakeClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            http_client: Client::new(),
            config,
        })
    }

    /// Create from environment variables (see [`ClientConfig::from_env`]).
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Set a custom HTTP client.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    /// A client for another dataset, optionally in another project.
    ///
    /// The HTTP connection pool and token are shared.
    pub fn with_dataset(&self, dataset: impl Into<String>, project_id: Option<&str>) -> Self {
        let mut config = self.config.clone();
        config.dataset = dataset.into();
        if let Some(project_id) = project_id {
            config.project_id = project_id.to_string();
        }
        Self {
            http_client: self.http_client.clone(),
            config,
        }
    }

    /// Get the active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Versioned base URL, e.g. `https://abc123.api.sanity.io/v2021-05-19`.
    pub fn base_url(&self) -> String {
        let host = self
            .config
            .api_host
            .clone()
            .unwrap_or_else(|| format!("https://{}.api.sanity.io", self.config.project_id));
        format!(
            "{}/v{}",
            host.trim_end_matches('/'),
            self.config.api_version
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/{}/{}", self.base_url(), path, self.config.dataset);
        Url::parse(&raw).map_err(|e| ClientError::Config(format!("invalid URL {}: {}", raw, e)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.header(header::AUTHORIZATION, token.bearer()),
            None => request,
        }
    }

    /// Run a GROQ query with bound parameters.
    ///
    /// Queries that return a single object are wrapped in a one-element vec;
    /// `null` results become an empty vec.
    pub async fn query(&self, query: &str, params: &Value) -> Result<Vec<Value>> {
        let start = std::time::Instant::now();
        let url = self.endpoint("data/query")?;

        let response = self
            .authorize(self.http_client.post(url))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&types::QueryRequest { query, params })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Query request failed");
                ClientError::Network(e.to_string())
            })?;

        let response = check_status(response, "query").await?;
        let body: types::QueryResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        let rows = match body.result {
            Value::Array(rows) => rows,
            Value::Null => Vec::new(),
            other => vec![other],
        };

        debug!(
            dataset = %self.config.dataset,
            rows = rows.len(),
            duration_ms = start.elapsed().as_millis(),
            "Query completed"
        );

        Ok(rows)
    }

    /// Upload a binary asset. Returns the asset document the API created.
    pub async fn upload_asset(
        &self,
        kind: AssetKind,
        data: Bytes,
        filename: Option<&str>,
    ) -> Result<Value> {
        let mut url = self.endpoint(&format!("assets/{}", kind.endpoint()))?;
        if let Some(filename) = filename {
            url.query_pairs_mut().append_pair("filename", filename);
        }

        let size = data.len();
        let response = self
            .authorize(self.http_client.post(url))
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, kind = %kind, "Asset upload failed");
                ClientError::Network(e.to_string())
            })?;

        let response = check_status(response, "asset upload").await?;
        let body: types::AssetUploadResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        debug!(kind = %kind, bytes = size, "Asset uploaded");
        Ok(body.document)
    }

    /// Apply mutations as one transaction. Either all apply or none do.
    pub async fn mutate(&self, mutations: &[Mutation]) -> Result<MutateResponse> {
        let mut url = self.endpoint("data/mutate")?;
        url.query_pairs_mut()
            .append_pair("returnIds", "true")
            .append_pair("visibility", "sync");

        let response = self
            .authorize(self.http_client.post(url))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&types::MutateRequest { mutations })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Mutation request failed");
                ClientError::Network(e.to_string())
            })?;

        let response = check_status(response, "mutate").await?;
        let body: MutateResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        debug!(
            transaction_id = %body.transaction_id,
            mutations = mutations.len(),
            "Transaction committed"
        );
        Ok(body)
    }

    /// Download raw bytes from an absolute URL (asset CDN links).
    ///
    /// The token is only sent when `bearer` is given; CDN file URLs are
    /// public and must be fetched without credentials.
    pub async fn download(&self, url: &str, bearer: Option<&ApiToken>) -> Result<Bytes> {
        let mut request = self.http_client.get(url);
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, token.bearer());
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, url = %url, "Download failed");
            ClientError::Network(e.to_string())
        })?;

        let response = check_status(response, "download").await?;
        response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))
    }
}

async fn check_status(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    let description = types::describe_error(&error_text);
    warn!(status = %status, error = %description, operation, "Content lake API error");
    Err(ClientError::Api {
        status: status.as_u16(),
        description,
    })
}
