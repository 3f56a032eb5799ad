//! Cross-Dataset Document Duplication
//!
//! Copies a document, everything it references, and the binary assets it
//! uses from one dataset into another, as a single atomic transaction.
//!
//! # How a duplication runs
//!
//! - Pick root documents (a published document, an operator query, or the
//!   documents referencing a root)
//! - Walk references to collect the full closure, skipping what the
//!   configured filter excludes
//! - Classify every candidate against the destination by `_updatedAt`
//! - Let the operator include or exclude candidates
//! - Re-upload assets (at most 3 at a time), rewrite references to assets
//!   the destination re-minted, and commit everything at once
//!
//! # Usage
//!
//! ```rust,ignore
//! use dataset_duplicator::{DuplicationSession, DuplicatorConfig, Workspace};
//! use dataset_duplicator::stores::HttpStoreProvider;
//! use content_lake_client::ContentLakeClient;
//! use std::sync::Arc;
//!
//! let provider = HttpStoreProvider::new(ContentLakeClient::from_env()?);
//! let origin = Workspace::new("production", "abc123", "production");
//! let staging = Workspace::new("staging", "abc123", "staging");
//!
//! let mut session = DuplicationSession::new(
//!     Some(DuplicatorConfig::default()),
//!     origin.clone(),
//!     vec![origin, staging],
//!     Arc::new(provider.clone()),
//!     provider.fetcher(),
//! )?;
//! session.load_token().await?;
//! session.load_roots(vec![article]).await?;
//! session.gather_references().await?;
//! let report = session.duplicate().await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Store, fetcher and hook seams
//! - [`types`] - Documents, candidates, statuses, configuration
//! - [`pipeline`] - Closure, reconciliation, selection, replication, session
//! - [`stores`] - Store implementations (MemoryStore, HttpStore)
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use content_lake_client::ApiToken;
pub use error::{BoxError, ConfigError, DuplicatorError, Result, StoreError, StoreResult};
pub use traits::{
    fetcher::AssetFetcher,
    hook::{DuplicatedContext, PostCommitHook},
    store::{CommitReceipt, DocumentQuery, DocumentStore, StoreProvider, Transaction},
};
pub use types::{
    candidate::CandidateItem,
    config::{DuplicatorConfig, FollowMode, ReplicationConfig, Workspace},
    document::{draft_id, is_asset_id, is_draft_id, published_id, AssetKind, Document},
    status::{LifecycleStatus, StatusBadge, StatusMessage, Tone},
};

// Re-export pipeline components
pub use pipeline::{
    // Closure
    gather_candidates, ClosureCollector, VisitedIds,
    // Reconciliation
    classify, reconcile, DestinationSnapshot,
    // References
    extract_references, set_at_path, PathSegment, ReferenceHit,
    // Replication
    IdentifierRemap, Progress, ReplicationPipeline, ReplicationReport,
    // Roots
    document_action_state, inbound_roots, query_roots, ActionState,
    // Selection
    SelectionAction, SelectionModel,
    // Session
    DuplicationSession, SessionPhase, WorkspaceOption,
};

// Re-export stores
pub use stores::{HttpStore, HttpStoreProvider, MemoryStore, MemoryStoreProvider};

// Re-export testing utilities
pub use testing::{MockAssetFetcher, RecordingHook};
