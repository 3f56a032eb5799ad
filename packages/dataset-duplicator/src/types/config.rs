//! Configuration types for the duplicator.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ConfigError;

/// Which direction closure traversal follows references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowMode {
    /// Documents that reference the roots
    Inbound,
    /// Documents the roots reference
    Outbound,
}

impl FollowMode {
    /// Mode a session starts in: the only configured mode, else outbound.
    pub fn initial(follow: &[FollowMode]) -> FollowMode {
        match follow {
            [only] => *only,
            _ => FollowMode::Outbound,
        }
    }
}

impl FromStr for FollowMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(FollowMode::Inbound),
            "outbound" => Ok(FollowMode::Outbound),
            other => Err(ConfigError::UnknownFollowMode(other.to_string())),
        }
    }
}

/// Plugin configuration.
///
/// Missing fields fall back to the defaults, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicatorConfig {
    /// Offer the standalone query tool
    pub tool: bool,

    /// Document types that get the "Duplicate to..." action
    pub types: Vec<String>,

    /// Store-query boolean fragment restricting which ids closure
    /// expansion may collect, e.g. `!(_id in path("secrets.**"))`
    pub filter: String,

    /// Traversal directions the operator may choose from
    pub follow: Vec<FollowMode>,
}

impl Default for DuplicatorConfig {
    fn default() -> Self {
        Self {
            tool: true,
            types: vec![],
            filter: String::new(),
            follow: vec![FollowMode::Outbound],
        }
    }
}

impl DuplicatorConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from JSON.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Set the document types that get the document action.
    pub fn with_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.types = types.into_iter().map(|t| t.into()).collect();
        self
    }

    /// Set the closure filter fragment.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Set the follow modes.
    pub fn with_follow(mut self, follow: impl IntoIterator<Item = FollowMode>) -> Self {
        self.follow = follow.into_iter().collect();
        self
    }

    /// Disable the standalone tool.
    pub fn without_tool(mut self) -> Self {
        self.tool = false;
        self
    }

    /// The filter fragment, or `None` when blank.
    pub fn filter_fragment(&self) -> Option<&str> {
        let trimmed = self.filter.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    pub fn follows(&self, mode: FollowMode) -> bool {
        self.follow.contains(&mode)
    }

    /// Whether the document action is offered for a schema type.
    pub fn action_enabled_for(&self, schema_type: &str) -> bool {
        self.types.iter().any(|t| t == schema_type)
    }
}

/// A named binding to a project + dataset pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    pub project_id: String,
    pub dataset: String,
}

impl Workspace {
    pub fn new(
        name: impl Into<String>,
        project_id: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            title: None,
            project_id: project_id.into(),
            dataset: dataset.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title if set, else the name.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// Whether both workspaces point at the same dataset.
    pub fn same_dataset(&self, other: &Workspace) -> bool {
        self.project_id == other.project_id && self.dataset == other.dataset
    }
}

/// Default number of asset transfers in flight.
pub const DEFAULT_ASSET_CONCURRENCY: usize = 3;

/// Configuration for the replication pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Maximum concurrent asset download+upload operations
    pub asset_concurrency: usize,

    /// Extension whose uploads the destination re-processes under a new id
    pub sanitized_extension: String,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            asset_concurrency: DEFAULT_ASSET_CONCURRENCY,
            sanitized_extension: "svg".to_string(),
        }
    }
}

impl ReplicationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the asset concurrency (minimum 1).
    pub fn with_asset_concurrency(mut self, concurrency: usize) -> Self {
        self.asset_concurrency = concurrency.max(1);
        self
    }
}
