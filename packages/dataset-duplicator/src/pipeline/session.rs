//! Operator-facing duplication state.
//!
//! A `DuplicationSession` holds everything a front end renders: the
//! destination choice, the candidate set with its selection, the status
//! message and asset progress. Operations take `&mut self`, so only one runs
//! at a time; live status, phase and progress are published on `watch`
//! channels for observers while an operation is in flight.
//!
//! Dropping an operation's future part way leaves the session idle again.

use content_lake_client::ApiToken;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{ConfigError, DuplicatorError, Result};
use crate::pipeline::closure::gather_candidates;
use crate::pipeline::reconcile;
use crate::pipeline::references::reference_count;
use crate::pipeline::replicate::{Progress, ReplicationPipeline, ReplicationReport};
use crate::pipeline::roots::inbound_roots;
use crate::pipeline::secrets;
use crate::pipeline::selection::{SelectionAction, SelectionModel};
use crate::traits::fetcher::AssetFetcher;
use crate::traits::hook::{DuplicatedContext, PostCommitHook};
use crate::traits::store::{DocumentStore, StoreProvider};
use crate::types::candidate::CandidateItem;
use crate::types::config::{DuplicatorConfig, FollowMode, ReplicationConfig, Workspace};
use crate::types::document::{Document, IMAGE_ASSET_TYPE};
use crate::types::status::{StatusMessage, Tone};

/// Shown next to the first vector image in the candidate list.
pub const SVG_NOTICE: &str = "Due to how SVGs are sanitized after first uploaded, duplicated SVG \
assets may have new _id's at the destination. The newly generated _id will be the same in each \
duplication, but it will never be the same _id as the first time this Asset was uploaded. \
References to the asset will be updated to use the new _id.";

/// What the session is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Gathering,
    Duplicating,
}

/// A workspace as offered in the destination picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceOption {
    pub workspace: Workspace,
    /// Same dataset as the origin
    pub disabled: bool,
}

/// The caution shown when the roots reference other documents.
pub fn initial_message(document_count: usize, reference_count: usize) -> String {
    let documents = if document_count == 1 {
        "This Document contains".to_string()
    } else {
        format!("These {} Documents contain", document_count)
    };
    let references = if reference_count == 1 {
        "1 Reference.".to_string()
    } else {
        format!("{} References.", reference_count)
    };
    let those = if reference_count == 1 {
        "That Document"
    } else {
        "Those Documents"
    };
    format!(
        "{} {} {} may have References too. If referenced Documents do not exist at the target \
         Destination, this transaction will fail.",
        documents, references, those
    )
}

fn plural(count: usize, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 {
        one
    } else {
        many
    }
}

/// State and transitions for duplicating documents out of one workspace.
pub struct DuplicationSession {
    config: DuplicatorConfig,
    replication: ReplicationConfig,
    origin: Workspace,
    workspaces: Vec<WorkspaceOption>,
    destination: Option<usize>,
    provider: Arc<dyn StoreProvider>,
    fetcher: Arc<dyn AssetFetcher>,
    token: Option<ApiToken>,
    hook: Option<Arc<dyn PostCommitHook>>,
    follow: FollowMode,
    outbound_roots: Vec<Document>,
    inbound_roots: Vec<Document>,
    has_references: bool,
    selection: SelectionModel,
    phase: Arc<watch::Sender<SessionPhase>>,
    status: watch::Sender<Option<StatusMessage>>,
    progress: Arc<watch::Sender<Progress>>,
}

/// Returns the session to idle and clears progress when dropped.
struct PhaseGuard {
    phase: Arc<watch::Sender<SessionPhase>>,
    progress: Arc<watch::Sender<Progress>>,
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        self.phase.send_replace(SessionPhase::Idle);
        self.progress.send_replace(Progress::default());
    }
}

impl DuplicationSession {
    /// Start a session in `origin`.
    ///
    /// `workspaces` is every configured workspace, the origin included.
    /// Fails unless a plugin config is given and at least one other
    /// workspace points at a different dataset.
    pub fn new(
        config: Option<DuplicatorConfig>,
        origin: Workspace,
        workspaces: Vec<Workspace>,
        provider: Arc<dyn StoreProvider>,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> Result<Self> {
        let config = config.ok_or(ConfigError::MissingPluginConfig)?;

        let found = workspaces.len();
        let workspaces: Vec<WorkspaceOption> = workspaces
            .into_iter()
            .map(|workspace| WorkspaceOption {
                disabled: workspace.same_dataset(&origin),
                workspace,
            })
            .collect();
        let destination = workspaces.iter().position(|option| !option.disabled);
        if found < 2 || destination.is_none() {
            return Err(ConfigError::NotEnoughWorkspaces { found }.into());
        }

        let follow = FollowMode::initial(&config.follow);
        let (phase, _) = watch::channel(SessionPhase::Idle);
        let (status, _) = watch::channel(None);
        let (progress, _) = watch::channel(Progress::default());

        info!(
            origin = %origin.name,
            workspaces = found,
            follow = ?follow,
            "Duplication session ready"
        );

        Ok(Self {
            config,
            replication: ReplicationConfig::default(),
            origin,
            workspaces,
            destination,
            provider,
            fetcher,
            token: None,
            hook: None,
            follow,
            outbound_roots: Vec::new(),
            inbound_roots: Vec::new(),
            has_references: false,
            selection: SelectionModel::default(),
            phase: Arc::new(phase),
            status,
            progress: Arc::new(progress),
        })
    }

    /// Token for downloading image originals.
    pub fn with_token(mut self, token: ApiToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Callback to run after each successful commit.
    pub fn with_hook(mut self, hook: Arc<dyn PostCommitHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_replication_config(mut self, config: ReplicationConfig) -> Self {
        self.replication = config;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &DuplicatorConfig {
        &self.config
    }

    pub fn origin(&self) -> &Workspace {
        &self.origin
    }

    pub fn workspaces(&self) -> &[WorkspaceOption] {
        &self.workspaces
    }

    pub fn destination(&self) -> Option<&Workspace> {
        self.destination.map(|index| &self.workspaces[index].workspace)
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    pub fn follow(&self) -> FollowMode {
        self.follow
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn candidates(&self) -> &[CandidateItem] {
        self.selection.items()
    }

    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    pub fn roots(&self) -> &[Document] {
        match self.follow {
            FollowMode::Outbound => &self.outbound_roots,
            FollowMode::Inbound => &self.inbound_roots,
        }
    }

    /// Current status message.
    pub fn message(&self) -> Option<StatusMessage> {
        self.status.borrow().clone()
    }

    /// Current asset progress.
    pub fn progress(&self) -> Progress {
        *self.progress.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Option<StatusMessage>> {
        self.status.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    fn set_message(&self, message: Option<StatusMessage>) {
        self.status.send_replace(message);
    }

    fn enter(&self, phase: SessionPhase) -> PhaseGuard {
        self.phase.send_replace(phase);
        PhaseGuard {
            phase: Arc::clone(&self.phase),
            progress: Arc::clone(&self.progress),
        }
    }

    fn origin_store(&self) -> Arc<dyn DocumentStore> {
        self.provider.store_for(&self.origin)
    }

    fn destination_store(&self) -> Option<Arc<dyn DocumentStore>> {
        self.destination().map(|ws| self.provider.store_for(ws))
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Read the download token saved in the origin dataset.
    pub async fn load_token(&mut self) -> Result<bool> {
        let store = self.origin_store();
        let token = secrets::load_token(store.as_ref())
            .await
            .map_err(DuplicatorError::Fetch)?;
        if token.is_some() {
            self.token = token;
        }
        Ok(self.token.is_some())
    }

    /// Start from `documents`. When inbound following is configured, the
    /// documents referencing the first of them are loaded too.
    pub async fn load_roots(&mut self, documents: Vec<Document>) -> Result<()> {
        self.inbound_roots = if self.config.follows(FollowMode::Inbound) {
            let store = self.origin_store();
            inbound_roots(store.as_ref(), &documents)
                .await
                .map_err(DuplicatorError::Fetch)?
        } else {
            Vec::new()
        };
        self.outbound_roots = documents;

        if self.follow == FollowMode::Inbound && self.inbound_roots.is_empty() {
            self.follow = FollowMode::Outbound;
        }
        let roots = self.roots().to_vec();
        self.set_roots(roots).await
    }

    /// Switch traversal direction. Returns false when the mode is not
    /// configured or has nothing to show.
    pub async fn set_follow(&mut self, mode: FollowMode) -> Result<bool> {
        if !self.config.follows(mode) {
            return Ok(false);
        }
        if mode == FollowMode::Inbound && self.inbound_roots.is_empty() {
            return Ok(false);
        }
        self.follow = mode;
        let roots = self.roots().to_vec();
        self.set_roots(roots).await?;
        Ok(true)
    }

    /// Label for the inbound toggle.
    pub fn inbound_label(&self) -> String {
        if self.inbound_roots.is_empty() {
            "No inbound references".to_string()
        } else {
            format!("Inbound ({})", self.inbound_roots.len())
        }
    }

    /// Replace the candidate set with `documents`, all included.
    pub async fn set_roots(&mut self, documents: Vec<Document>) -> Result<()> {
        let references = reference_count(&documents);
        self.has_references = references > 0;
        self.set_message(self.has_references.then(|| {
            StatusMessage::new(initial_message(documents.len(), references), Tone::Caution)
        }));
        self.selection = SelectionModel::new(documents.into_iter().map(CandidateItem::new).collect());

        self.refresh_statuses().await
    }

    /// Switch destination and reclassify. Unknown or disabled names are
    /// ignored and return false.
    pub async fn select_destination(&mut self, name: &str) -> Result<bool> {
        let Some(index) = self
            .workspaces
            .iter()
            .position(|option| option.workspace.name == name && !option.disabled)
        else {
            return Ok(false);
        };

        self.destination = Some(index);
        info!(destination = name, "Destination selected");
        self.refresh_statuses().await?;
        Ok(true)
    }

    /// Reclassify candidates against the destination.
    pub async fn refresh_statuses(&mut self) -> Result<()> {
        let Some(destination) = self.destination_store() else {
            reconcile::clear_statuses(self.selection.items_mut());
            return Ok(());
        };

        if let Err(err) = reconcile::refresh(destination.as_ref(), self.selection.items_mut()).await {
            warn!(destination = destination.name(), error = %err, "Status refresh failed");
            self.set_message(Some(StatusMessage::critical(err.to_string())));
            return Err(DuplicatorError::Fetch(err));
        }
        Ok(())
    }

    /// Replace the candidates with the roots' full reference closure.
    ///
    /// On failure the previous candidates are kept.
    pub async fn gather_references(&mut self) -> Result<()> {
        let _gathering = self.enter(SessionPhase::Gathering);

        let root_ids: Vec<String> = self.roots().iter().map(|d| d.id().to_string()).collect();
        let origin = self.origin_store();
        let gathered =
            gather_candidates(origin.as_ref(), &root_ids, self.config.filter_fragment()).await;

        let result = match gathered {
            Ok(candidates) => {
                self.selection = SelectionModel::new(candidates);
                self.refresh_statuses().await
            }
            Err(err) => {
                warn!(origin = origin.name(), error = %err, "Gathering references failed");
                self.set_message(Some(StatusMessage::critical(err.to_string())));
                Err(DuplicatorError::Fetch(err))
            }
        };

        result
    }

    /// Flip one candidate. Statuses are left as they are.
    pub fn toggle(&mut self, id: &str) -> bool {
        self.selection.toggle(id)
    }

    /// Apply a bulk action. Statuses are left as they are.
    pub fn apply_selection(&mut self, action: SelectionAction) {
        self.selection.apply(action);
    }

    /// Copy the included candidates to the destination.
    ///
    /// A hook failure is reported after the commit already succeeded, as
    /// [`DuplicatorError::Hook`].
    pub async fn duplicate(&mut self) -> Result<ReplicationReport> {
        let destination_workspace = self
            .destination()
            .cloned()
            .ok_or(DuplicatorError::NoDestination)?;
        let destination = self.provider.store_for(&destination_workspace);

        let duplicating = self.enter(SessionPhase::Duplicating);
        self.set_message(Some(StatusMessage::info("Duplicating...")));

        let outcome = {
            let (status, progress) = (&self.status, &self.progress);
            ReplicationPipeline::new(destination.as_ref(), self.fetcher.as_ref())
                .with_token(self.token.as_ref())
                .with_config(self.replication.clone())
                .run(self.selection.items(), |p| {
                    progress.send_replace(p);
                    if p.completed > 0 {
                        status.send_replace(Some(StatusMessage::info(format!(
                            "Duplicating {}/{} Assets",
                            p.completed, p.total
                        ))));
                    }
                })
                .await
        };

        match &outcome {
            Ok(_) => {
                self.set_message(Some(StatusMessage::positive("Duplication complete!")));
                if let Err(err) = self.refresh_statuses().await {
                    warn!(error = %err, "Statuses not refreshed after commit");
                    self.set_message(Some(StatusMessage::positive("Duplication complete!")));
                }
            }
            Err(DuplicatorError::Commit { description }) => {
                self.set_message(Some(StatusMessage::critical(description.clone())));
            }
            Err(err) => {
                warn!(error = %err, "Duplication failed");
                self.set_message(Some(StatusMessage::critical("Duplication Failed")));
            }
        }

        drop(duplicating);

        let report = outcome?;
        if let Some(hook) = &self.hook {
            let context = DuplicatedContext {
                origin: self.origin.clone(),
                destination: destination_workspace,
                document_ids: report.committed_ids.clone(),
                transaction_id: report.transaction_id.clone(),
            };
            if let Err(source) = hook.on_duplicated(&context).await {
                let err = DuplicatorError::Hook {
                    report: Box::new(report),
                    source,
                };
                warn!(error = %err, "Post-commit hook failed");
                self.set_message(Some(StatusMessage::critical(err.to_string())));
                return Err(err);
            }
        }

        Ok(report)
    }

    // =========================================================================
    // Presentation
    // =========================================================================

    /// e.g. "3 / 5 Documents and Assets selected"
    pub fn heading_text(&self) -> String {
        format!(
            "{} / {} Documents and Assets selected",
            self.selection.selected_total(),
            self.selection.total()
        )
    }

    /// Label of the duplicate button.
    pub fn button_text(&self) -> String {
        let documents = self.selection.selected_documents();
        let assets = self.selection.selected_assets();

        let mut parts = vec!["Duplicate".to_string()];
        if documents > 0 {
            parts.push(format!("{} {}", documents, plural(documents, "Document", "Documents")));
        }
        if assets > 0 {
            if documents > 0 {
                parts.push("and".to_string());
            }
            parts.push(format!("{} {}", assets, plural(assets, "Asset", "Assets")));
        }
        if let Some(destination) = self.destination() {
            if destination.project_id != self.origin.project_id {
                parts.push("between Projects".to_string());
            }
            parts.push(format!("to {}", destination.display_title()));
        }
        parts.join(" ")
    }

    /// Whether duplicate can be pressed.
    pub fn can_act(&self) -> bool {
        self.phase() == SessionPhase::Idle
            && self.destination.is_some()
            && self.selection.selected_total() > 0
    }

    /// Whether "Gather References" is offered and can be pressed.
    pub fn can_gather(&self) -> bool {
        self.has_references && self.can_act()
    }

    /// Index of the first vector image candidate, where [`SVG_NOTICE`] goes.
    pub fn first_svg_index(&self) -> Option<usize> {
        self.selection.items().iter().position(|item| {
            item.document.extension() == Some("svg")
                && item.document.doc_type() == Some(IMAGE_ASSET_TYPE)
        })
    }
}
