//! Duplication pipeline.
//!
//! The pipeline covers:
//! - Root resolution (document action, query tool, inbound referrers)
//! - Reference closure over the origin dataset
//! - Reconciliation against the destination
//! - Selection of what to copy
//! - Replication (asset transfer, reference rewrite, atomic commit)

pub mod closure;
pub mod reconcile;
pub mod references;
pub mod replicate;
pub mod roots;
pub mod secrets;
pub mod selection;
pub mod session;

pub use closure::{gather_candidates, ClosureCollector, VisitedIds};
pub use reconcile::{classify, fetch_snapshot, reconcile, DestinationSnapshot};
pub use references::{
    extract_reference_ids, extract_references, format_path, reference_count, set_at_path,
    PathSegment, ReferenceHit,
};
pub use replicate::{
    apply_remaps, build_transaction, raw_download_url, IdentifierRemap, Progress,
    ReplicationPipeline, ReplicationReport,
};
pub use roots::{document_action_state, inbound_roots, query_roots, ActionState};
pub use secrets::load_token;
pub use selection::{SelectionAction, SelectionModel};
pub use session::{initial_message, DuplicationSession, SessionPhase, WorkspaceOption};
