//! End-to-end duplication flows against in-memory datasets.

use dataset_duplicator::testing::{document, file_asset, image_asset, reference, timestamp};
use dataset_duplicator::{
    gather_candidates, ApiToken, CandidateItem, ClosureCollector, ConfigError,
    DuplicationSession, DuplicatorConfig, DuplicatorError, FollowMode, LifecycleStatus,
    MemoryStore, MemoryStoreProvider, MockAssetFetcher, Progress, RecordingHook, ReplicationPipeline,
    SelectionAction, SessionPhase, Tone, VisitedIds, Workspace,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const SVG_URL: &str = "https://cdn.example.com/images/p/production/x.svg";

struct Fixture {
    origin: Arc<MemoryStore>,
    destination: Arc<MemoryStore>,
    fetcher: Arc<MockAssetFetcher>,
    origin_ws: Workspace,
    destination_ws: Workspace,
}

impl Fixture {
    /// DocA references AssetX (an svg) and DocB.
    fn new(destination: MemoryStore) -> Self {
        let origin = MemoryStore::new("origin")
            .with_document(
                document("doc-a", "article")
                    .with_updated_at(timestamp(0))
                    .with_field("hero", json!({ "_type": "image", "asset": reference("image-x-24x24-svg") }))
                    .with_field("author", reference("doc-b")),
            )
            .with_document(image_asset("image-x-24x24-svg", SVG_URL).with_updated_at(timestamp(0)))
            .with_document(document("doc-b", "author").with_updated_at(timestamp(0)));

        Self {
            origin: Arc::new(origin),
            destination: Arc::new(destination),
            fetcher: Arc::new(MockAssetFetcher::new()),
            origin_ws: Workspace::new("production", "proj1", "production"),
            destination_ws: Workspace::new("staging", "proj1", "staging").with_title("Staging"),
        }
    }

    fn session(&self, config: DuplicatorConfig) -> DuplicationSession {
        let provider = MemoryStoreProvider::new()
            .with_store(&self.origin_ws, self.origin.clone())
            .with_store(&self.destination_ws, self.destination.clone());

        DuplicationSession::new(
            Some(config),
            self.origin_ws.clone(),
            vec![self.origin_ws.clone(), self.destination_ws.clone()],
            Arc::new(provider),
            self.fetcher.clone(),
        )
        .unwrap()
        .with_token(ApiToken::new("viewer-token"))
    }

    fn root(&self) -> dataset_duplicator::Document {
        self.origin.get("doc-a").unwrap()
    }
}

#[tokio::test]
async fn test_end_to_end_with_svg_remap() {
    init_tracing();
    let fixture = Fixture::new(
        MemoryStore::new("destination").with_minted_id("original.svg", "image-x2-24x24-svg"),
    );
    let mut session = fixture.session(DuplicatorConfig::default());

    session.load_roots(vec![fixture.root()]).await.unwrap();
    let message = session.message().unwrap();
    assert_eq!(message.tone, Tone::Caution);
    assert!(message.text.starts_with("This Document contains 2 References."));
    assert!(session.can_gather());

    session.gather_references().await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(session.candidates().len(), 3);
    assert!(session
        .candidates()
        .iter()
        .all(|c| c.status == LifecycleStatus::New));
    assert_eq!(session.first_svg_index(), Some(1));
    assert_eq!(session.heading_text(), "3 / 3 Documents and Assets selected");
    assert_eq!(
        session.button_text(),
        "Duplicate 2 Documents and 1 Asset to Staging"
    );

    let report = session.duplicate().await.unwrap();

    assert_eq!(report.assets_uploaded, 1);
    assert_eq!(report.remaps.len(), 1);
    assert_eq!(report.remaps[0].old_id, "image-x-24x24-svg");
    assert_eq!(report.remaps[0].new_id, "image-x2-24x24-svg");

    let copied = fixture.destination.get("doc-a").unwrap();
    assert_eq!(copied.get("hero").unwrap()["asset"]["_ref"], "image-x2-24x24-svg");
    assert_eq!(copied.get("author").unwrap()["_ref"], "doc-b");
    assert!(fixture.destination.get("doc-b").is_some());
    assert!(fixture.destination.get("image-x2-24x24-svg").is_some());
    assert_eq!(fixture.destination.commit_count(), 1);

    let download = &fixture.fetcher.calls()[0];
    assert_eq!(download.url, format!("{}?dlRaw=true", SVG_URL));
    assert!(download.authenticated);

    assert_eq!(session.message().unwrap().text, "Duplication complete!");
    assert_eq!(session.progress(), Progress::default());
}

#[tokio::test]
async fn test_closure_terminates_on_cycles() {
    let store = MemoryStore::new("origin")
        .with_document(document("a", "post").with_field("next", reference("b")))
        .with_document(document("b", "post").with_field("next", reference("c")))
        .with_document(document("c", "post").with_field("back", reference("a")));

    let docs = ClosureCollector::new(&store)
        .collect(&["a".to_string()], &VisitedIds::new())
        .await
        .unwrap();

    let mut ids: Vec<&str> = docs.iter().map(|d| d.id()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_filter_excludes_from_closure() {
    let filter = "!(_id in path(\"c\"))";
    let store = MemoryStore::new("origin")
        .with_document(document("a", "post").with_field("next", reference("b")))
        .with_document(document("b", "post").with_field("next", reference("c")))
        .with_document(document("c", "post"))
        .with_filter(filter, |doc| doc.id() != "c");

    let candidates = gather_candidates(&store, &["a".to_string()], Some(filter))
        .await
        .unwrap();

    let mut ids: Vec<&str> = candidates.iter().map(|c| c.id()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn test_reconciliation_against_destination() {
    let destination = MemoryStore::new("destination")
        .with_document(document("doc-a", "article").with_updated_at(timestamp(0)))
        .with_document(document("doc-b", "author").with_updated_at(timestamp(-1)))
        .with_document(document("image-x-24x24-svg", "sanity.imageAsset").with_updated_at(timestamp(1)));
    let fixture = Fixture::new(destination);
    let mut session = fixture.session(DuplicatorConfig::default());

    session.load_roots(vec![fixture.root()]).await.unwrap();
    session.gather_references().await.unwrap();

    let status = |id: &str| {
        session
            .candidates()
            .iter()
            .find(|c| c.id() == id)
            .map(|c| c.status)
    };
    assert_eq!(status("doc-a"), Some(LifecycleStatus::Identical));
    assert_eq!(status("doc-b"), Some(LifecycleStatus::StaleAtDestination));
    assert_eq!(
        status("image-x-24x24-svg"),
        Some(LifecycleStatus::NewerAtDestination)
    );
}

#[tokio::test]
async fn test_selection_changes_do_not_refetch() {
    let fixture = Fixture::new(MemoryStore::new("destination"));
    let mut session = fixture.session(DuplicatorConfig::default());
    session.load_roots(vec![fixture.root()]).await.unwrap();
    session.gather_references().await.unwrap();

    let fetches = fixture.destination.fetch_count();
    assert!(session.toggle("doc-b"));
    session.apply_selection(SelectionAction::Assets);
    session.apply_selection(SelectionAction::Assets);
    assert_eq!(fixture.destination.fetch_count(), fetches);

    assert_eq!(session.selection().selected_total(), 1);
    assert_eq!(session.selection().disabled_action(), Some(SelectionAction::Assets));
    assert_eq!(session.button_text(), "Duplicate 1 Asset to Staging");
}

#[tokio::test]
async fn test_commit_failure_leaves_destination_untouched() {
    let fixture = Fixture::new(
        MemoryStore::new("destination")
            .failing_commit("Document \"doc-a\" references non-existent document \"doc-b\""),
    );
    let mut session = fixture.session(DuplicatorConfig::default());
    session.load_roots(vec![fixture.root()]).await.unwrap();

    let err = session.duplicate().await.unwrap_err();

    assert!(matches!(err, DuplicatorError::Commit { .. }));
    assert!(fixture.destination.get("doc-a").is_none());
    let message = session.message().unwrap();
    assert_eq!(
        message.text,
        "Document \"doc-a\" references non-existent document \"doc-b\""
    );
    assert_eq!(message.tone, Tone::Critical);
    assert_eq!(session.phase(), SessionPhase::Idle);
}

#[tokio::test]
async fn test_asset_failure_aborts_before_commit() {
    let fixture = Fixture::new(MemoryStore::new("destination"));
    let fetcher = Arc::new(MockAssetFetcher::new().failing(format!("{}?dlRaw=true", SVG_URL)));
    let provider = MemoryStoreProvider::new()
        .with_store(&fixture.origin_ws, fixture.origin.clone())
        .with_store(&fixture.destination_ws, fixture.destination.clone());
    let mut session = DuplicationSession::new(
        Some(DuplicatorConfig::default()),
        fixture.origin_ws.clone(),
        vec![fixture.origin_ws.clone(), fixture.destination_ws.clone()],
        Arc::new(provider),
        fetcher.clone(),
    )
    .unwrap();

    session.load_roots(vec![fixture.root()]).await.unwrap();
    session.gather_references().await.unwrap();
    let err = session.duplicate().await.unwrap_err();

    assert!(matches!(err, DuplicatorError::AssetTransfer { ref id, .. } if id == "image-x-24x24-svg"));
    assert_eq!(fixture.destination.commit_count(), 0);
    assert_eq!(session.message().unwrap().text, "Duplication Failed");
    assert!(!fetcher.calls()[0].authenticated);
}

#[tokio::test]
async fn test_asset_concurrency_is_bounded() {
    init_tracing();
    let destination = MemoryStore::new("destination");
    let fetcher = MockAssetFetcher::new().with_delay(Duration::from_millis(20));
    let items: Vec<CandidateItem> = (0..10)
        .map(|i| {
            CandidateItem::new(file_asset(
                &format!("file-asset{}-pdf", i),
                &format!("https://cdn.example.com/files/{}.pdf", i),
            ))
        })
        .collect();

    let report = ReplicationPipeline::new(&destination, &fetcher)
        .run(&items, |_| {})
        .await
        .unwrap();

    assert_eq!(report.assets_uploaded, 10);
    assert_eq!(fetcher.call_count(), 10);
    assert_eq!(fetcher.max_in_flight(), 3);
    assert!(fetcher.calls().iter().all(|c| !c.authenticated));
}

#[tokio::test]
async fn test_hook_failure_does_not_roll_back() {
    let fixture = Fixture::new(MemoryStore::new("destination"));
    let hook = Arc::new(RecordingHook::failing("webhook timed out"));
    let mut session = fixture
        .session(DuplicatorConfig::default())
        .with_hook(hook.clone());
    session.load_roots(vec![fixture.root()]).await.unwrap();

    let err = session.duplicate().await.unwrap_err();

    let DuplicatorError::Hook { report, .. } = &err else {
        panic!("expected a hook error, got {err:?}");
    };
    assert_eq!(report.committed_ids, vec!["doc-a"]);
    assert!(!report.transaction_id.is_empty());
    assert_eq!(err.tone(), Tone::Critical);
    assert!(fixture.destination.get("doc-a").is_some());
    assert_eq!(hook.call_count(), 1);
    assert_eq!(hook.calls()[0].document_ids, vec!["doc-a"]);
    assert_eq!(
        session.message().unwrap().text,
        "Error in onDuplicated hook: webhook timed out"
    );
}

#[tokio::test]
async fn test_dropped_duplicate_leaves_session_idle() {
    let mut fixture = Fixture::new(MemoryStore::new("destination"));
    fixture.fetcher = Arc::new(MockAssetFetcher::new().with_delay(Duration::from_millis(100)));
    let mut session = fixture.session(DuplicatorConfig::default());
    session.load_roots(vec![fixture.root()]).await.unwrap();
    session.gather_references().await.unwrap();
    let mut phases = session.subscribe_phase();

    let timed_out = tokio::time::timeout(Duration::from_millis(10), session.duplicate()).await;

    assert!(timed_out.is_err());
    assert!(phases.has_changed().unwrap());
    assert_eq!(*phases.borrow_and_update(), SessionPhase::Idle);
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(session.progress(), Progress::default());
    assert_eq!(fixture.destination.commit_count(), 0);
    assert!(session.can_act());

    let report = session.duplicate().await.unwrap();
    assert_eq!(report.assets_uploaded, 1);
    assert_eq!(fixture.destination.commit_count(), 1);
}

#[tokio::test]
async fn test_hook_runs_after_success() {
    let fixture = Fixture::new(MemoryStore::new("destination"));
    let hook = Arc::new(RecordingHook::new());
    let mut session = fixture
        .session(DuplicatorConfig::default())
        .with_hook(hook.clone());
    session.load_roots(vec![fixture.root()]).await.unwrap();

    session.duplicate().await.unwrap();

    let context = &hook.calls()[0];
    assert_eq!(context.destination.name, "staging");
    assert_eq!(context.origin.name, "production");
}

#[test]
fn test_configuration_invalid() {
    let origin = Workspace::new("production", "proj1", "production");
    let provider = Arc::new(MemoryStoreProvider::new());
    let fetcher = Arc::new(MockAssetFetcher::new());

    let missing = DuplicationSession::new(
        None,
        origin.clone(),
        vec![origin.clone(), Workspace::new("staging", "proj1", "staging")],
        provider.clone(),
        fetcher.clone(),
    );
    assert!(matches!(
        missing,
        Err(DuplicatorError::Config(ConfigError::MissingPluginConfig))
    ));

    let alone = DuplicationSession::new(
        Some(DuplicatorConfig::default()),
        origin.clone(),
        vec![origin.clone()],
        provider.clone(),
        fetcher.clone(),
    );
    assert!(matches!(
        alone,
        Err(DuplicatorError::Config(ConfigError::NotEnoughWorkspaces { found: 1 }))
    ));

    let same_dataset = DuplicationSession::new(
        Some(DuplicatorConfig::default()),
        origin.clone(),
        vec![origin.clone(), Workspace::new("mirror", "proj1", "production")],
        provider,
        fetcher,
    );
    assert!(matches!(
        same_dataset,
        Err(DuplicatorError::Config(ConfigError::NotEnoughWorkspaces { .. }))
    ));
}

#[tokio::test]
async fn test_destination_selection() {
    let fixture = Fixture::new(MemoryStore::new("destination"));
    let mut session = fixture.session(DuplicatorConfig::default());
    session.load_roots(vec![fixture.root()]).await.unwrap();

    assert_eq!(session.destination().map(|w| w.name.as_str()), Some("staging"));
    assert!(!session.select_destination("production").await.unwrap());
    assert!(!session.select_destination("nowhere").await.unwrap());
    assert!(session.select_destination("staging").await.unwrap());
    assert!(session.workspaces()[0].disabled);
}

#[tokio::test]
async fn test_between_projects_button_text() {
    let fixture = Fixture::new(MemoryStore::new("destination"));
    let other_project = Workspace::new("partner", "proj2", "production");
    let provider = MemoryStoreProvider::new()
        .with_store(&fixture.origin_ws, fixture.origin.clone())
        .with_store(&other_project, fixture.destination.clone());
    let mut session = DuplicationSession::new(
        Some(DuplicatorConfig::default()),
        fixture.origin_ws.clone(),
        vec![fixture.origin_ws.clone(), other_project],
        Arc::new(provider),
        fixture.fetcher.clone(),
    )
    .unwrap();

    session.set_roots(vec![fixture.root()]).await.unwrap();
    assert_eq!(
        session.button_text(),
        "Duplicate 1 Document between Projects to partner"
    );
}

#[tokio::test]
async fn test_inbound_follow_mode() {
    let fixture = Fixture::new(MemoryStore::new("destination"));
    fixture
        .origin
        .insert(document("doc-c", "article").with_field("author", reference("doc-b")));
    let mut session =
        fixture.session(DuplicatorConfig::default().with_follow([FollowMode::Inbound, FollowMode::Outbound]));

    let author = fixture.origin.get("doc-b").unwrap();
    session.load_roots(vec![author]).await.unwrap();
    assert_eq!(session.follow(), FollowMode::Outbound);
    assert_eq!(session.inbound_label(), "Inbound (3)");

    assert!(session.set_follow(FollowMode::Inbound).await.unwrap());
    let mut ids: Vec<&str> = session.candidates().iter().map(|c| c.id()).collect();
    ids.sort();
    assert_eq!(ids, vec!["doc-a", "doc-b", "doc-c"]);
}

#[tokio::test]
async fn test_load_token_from_origin() {
    let fixture = Fixture::new(MemoryStore::new("destination"));
    fixture.origin.insert(
        document("secrets.CrossDatasetDuplicator", "secrets").with_field("bearerToken", "stored-token"),
    );
    let provider = MemoryStoreProvider::new()
        .with_store(&fixture.origin_ws, fixture.origin.clone())
        .with_store(&fixture.destination_ws, fixture.destination.clone());
    let mut session = DuplicationSession::new(
        Some(DuplicatorConfig::default()),
        fixture.origin_ws.clone(),
        vec![fixture.origin_ws.clone(), fixture.destination_ws.clone()],
        Arc::new(provider),
        fixture.fetcher.clone(),
    )
    .unwrap();

    assert!(!session.has_token());
    assert!(session.load_token().await.unwrap());
    assert!(session.has_token());
}
