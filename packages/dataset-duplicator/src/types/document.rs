//! Documents, ids and assets.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::error::{StoreError, StoreResult};

/// Prefix that marks the unpublished working copy of a document.
pub const DRAFTS_PREFIX: &str = "drafts.";

/// `_type` of file asset documents.
pub const FILE_ASSET_TYPE: &str = "sanity.fileAsset";

/// `_type` of image asset documents.
pub const IMAGE_ASSET_TYPE: &str = "sanity.imageAsset";

/// Kind of binary asset, which decides the upload endpoint and how the
/// original is downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    File,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::File => "file",
        }
    }

    /// `_type` the store gives documents of this kind.
    pub fn document_type(&self) -> &'static str {
        match self {
            AssetKind::Image => IMAGE_ASSET_TYPE,
            AssetKind::File => FILE_ASSET_TYPE,
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn asset_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(image-[A-Za-z0-9]+-\d+x\d+-[a-z0-9]+|file-[A-Za-z0-9]+-[a-z0-9]+)$")
            .expect("asset id pattern is valid")
    })
}

/// Whether an id is in the asset id-range (`image-<hash>-<W>x<H>-<ext>` or
/// `file-<hash>-<ext>`).
pub fn is_asset_id(id: &str) -> bool {
    asset_id_pattern().is_match(id)
}

/// Whether an id names a draft.
pub fn is_draft_id(id: &str) -> bool {
    id.starts_with(DRAFTS_PREFIX)
}

/// The draft variant of an id. Already-draft ids are returned unchanged.
pub fn draft_id(id: &str) -> String {
    if is_draft_id(id) {
        id.to_string()
    } else {
        format!("{}{}", DRAFTS_PREFIX, id)
    }
}

/// The published variant of an id.
pub fn published_id(id: &str) -> &str {
    id.strip_prefix(DRAFTS_PREFIX).unwrap_or(id)
}

/// A tree-structured record from the store.
///
/// Field order is preserved as received so that walks over the tree are
/// deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Create a document with an id and type.
    pub fn new(id: impl Into<String>, doc_type: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("_id".to_string(), Value::String(id.into()));
        fields.insert("_type".to_string(), Value::String(doc_type.into()));
        Self(fields)
    }

    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(StoreError::MalformedDocument(format!(
                "expected object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Set a field (builder pattern).
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Set `_updatedAt` (builder pattern).
    pub fn with_updated_at(self, updated_at: impl Into<String>) -> Self {
        self.with_field("_updatedAt", updated_at.into())
    }

    /// Set a field in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// `_id`, or the empty string for projections that dropped it.
    pub fn id(&self) -> &str {
        self.get_str("_id").unwrap_or("")
    }

    /// `_type`.
    pub fn doc_type(&self) -> Option<&str> {
        self.get_str("_type")
    }

    /// `_updatedAt` exactly as stored.
    pub fn updated_at(&self) -> Option<&str> {
        self.get_str("_updatedAt")
    }

    /// `_updatedAt` parsed as an RFC 3339 instant.
    pub fn updated_at_parsed(&self) -> Option<DateTime<Utc>> {
        self.updated_at()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn is_draft(&self) -> bool {
        is_draft_id(self.id())
    }

    pub fn is_asset(&self) -> bool {
        is_asset_id(self.id())
    }

    /// Asset kind, `None` for plain documents.
    ///
    /// `_type` wins over the id prefix, since it is what the store uses.
    pub fn asset_kind(&self) -> Option<AssetKind> {
        if !self.is_asset() {
            return None;
        }
        match self.doc_type() {
            Some(FILE_ASSET_TYPE) => Some(AssetKind::File),
            Some(IMAGE_ASSET_TYPE) => Some(AssetKind::Image),
            _ if self.id().starts_with("file-") => Some(AssetKind::File),
            _ => Some(AssetKind::Image),
        }
    }

    /// Source URL of an asset.
    pub fn url(&self) -> Option<&str> {
        self.get_str("url")
    }

    pub fn original_filename(&self) -> Option<&str> {
        self.get_str("originalFilename")
    }

    /// File-format extension of an asset (`svg`, `png`, ...).
    pub fn extension(&self) -> Option<&str> {
        self.get_str("extension")
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
