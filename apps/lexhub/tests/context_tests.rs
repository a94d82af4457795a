//! Integration tests for the Context Provider.
//!
//! Exercises permission scoping, preference shaping, related data,
//! cross-module notifications, search, analytics and predictive prefetch
//! against an in-memory hub.

#![allow(clippy::unwrap_used, clippy::panic)]

use lexhub::config::ContextSettings;
use lexhub::context::{
    ActionPredictor, ContextProvider, Insight, InsightGenerator, InsightInput, InsightKind,
    Prediction, SearchOptions, Visit,
};
use lexhub_core::mutation::MutationReport;
use lexhub_core::primitives::AUDIT_ENTITY;
use lexhub_core::{
    AccessPolicy, DataContext, DataHub, DataMutation, DataQuery, EntityRegistry, FieldValue,
    Fields, Filter, Filters, HubConfig, HubError, MemorySink, MemoryStore, ModuleRegistry, Record,
    RecordStore, RequirementsAssembler, TimeRange, TxnBody, UserPreferences, now_millis,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// HELPERS
// =============================================================================

/// Counts every primary-store round trip.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    reads: AtomicUsize,
    transactions: AtomicUsize,
}

impl CountingStore {
    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn transactions(&self) -> usize {
        self.transactions.load(Ordering::SeqCst)
    }
}

impl RecordStore for CountingStore {
    fn scan(&self, entity: &str) -> Result<Vec<Record>, HubError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.scan(entity)
    }

    fn fetch(&self, entity: &str, id: &str) -> Result<Option<Record>, HubError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(entity, id)
    }

    fn transact(&self, body: &mut TxnBody<'_>) -> Result<MutationReport, HubError> {
        self.transactions.fetch_add(1, Ordering::SeqCst);
        self.inner.transact(body)
    }
}

struct Fixture {
    provider: ContextProvider,
    sink: Arc<MemorySink>,
}

fn fixture_with(store: Arc<dyn RecordStore>, config: HubConfig) -> Fixture {
    let modules = Arc::new(ModuleRegistry::standard());
    let sink = Arc::new(MemorySink::new());
    let hub = Arc::new(
        DataHub::new(config, EntityRegistry::legal_defaults(), store)
            .with_events(sink.clone())
            .with_assembler(Arc::new(RequirementsAssembler::new(Arc::clone(&modules)))),
    );
    let provider = ContextProvider::new(
        hub,
        modules,
        Arc::new(AccessPolicy::standard()),
        &ContextSettings::default(),
    );
    Fixture { provider, sink }
}

fn fixture() -> Fixture {
    fixture_with(Arc::new(MemoryStore::new()), HubConfig::default())
}

/// Always predicts the same modules, in order.
struct FixedPredictor(Vec<&'static str>);

impl ActionPredictor for FixedPredictor {
    fn predict(&self, _history: &[Visit], _current_module: &str) -> Vec<Prediction> {
        self.0
            .iter()
            .map(|module| Prediction {
                module: module.to_string(),
                action: "view".to_string(),
                confidence: 1.0,
            })
            .collect()
    }
}

/// Reports how many entities it was shown.
struct EntityCount;

impl InsightGenerator for EntityCount {
    fn generate(&self, input: &InsightInput<'_>) -> Vec<Insight> {
        vec![Insight {
            kind: InsightKind::Trend,
            entity: input.module.module.clone(),
            message: format!("{} entities", input.current.len()),
        }]
    }
}

fn fields(pairs: &[(&str, &str)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), FieldValue::text(*v)))
        .collect()
}

fn create(hub: &DataHub, entity: &str, id: &str, pairs: &[(&str, &str)]) {
    hub.mutate(&DataMutation::create(entity, fields(pairs)).with_id(id))
        .unwrap();
}

/// One client with three cases, one document and one contract.
fn seed(hub: &DataHub) {
    create(
        hub,
        "Client",
        "c1",
        &[("name", "Ada Lovelace"), ("status", "ACTIVE"), ("email", "ada@example.com")],
    );
    create(hub, "Case", "k1", &[("title", "Estate of Byron"), ("status", "ACTIVE"), ("clientId", "c1")]);
    create(hub, "Case", "k2", &[("title", "Analytical Engine patent"), ("status", "ACTIVE"), ("clientId", "c1")]);
    create(hub, "Case", "k3", &[("title", "Babbage dispute"), ("status", "CLOSED"), ("clientId", "c1")]);
    create(hub, "Document", "d1", &[("title", "Will draft"), ("type", "brief"), ("caseId", "k1")]);
    create(hub, "Contract", "t1", &[("title", "Retainer"), ("clientId", "c1")]);
}

fn attorney(module: &str) -> DataContext {
    DataContext::new("u-attorney", "attorney", module, "view")
}

fn ids(records: &[Record]) -> Vec<&str> {
    let mut ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    ids
}

// =============================================================================
// PERMISSIONS
// =============================================================================

#[test]
fn client_is_denied_legal_research_without_touching_storage() {
    let store = Arc::new(CountingStore::default());
    let f = fixture_with(store.clone(), HubConfig::default());
    let context = DataContext::new("u-client", "client", "legal-research", "view");

    let err = f.provider.get_module_data(&context).unwrap_err();
    assert!(matches!(err, HubError::PermissionDenied));
    let err = f
        .provider
        .search_across_modules(&context, "smith", &SearchOptions::default())
        .unwrap_err();
    assert!(matches!(err, HubError::PermissionDenied));
    let err = f.provider.get_module_analytics(&context, None).unwrap_err();
    assert!(matches!(err, HubError::PermissionDenied));

    assert_eq!(store.reads(), 0);
    assert_eq!(store.transactions(), 0);
    assert!(f.sink.events().is_empty());
    assert!(f.provider.recent_behavior("u-client").is_empty());
}

#[test]
fn write_without_write_permission_commits_nothing() {
    let store = Arc::new(CountingStore::default());
    let f = fixture_with(store.clone(), HubConfig::default());
    let context = DataContext::new("u-para", "paralegal", "client-portal", "edit");

    let err = f
        .provider
        .update_module_data(&context, "Client", "create", fields(&[("name", "X")]))
        .unwrap_err();
    assert!(matches!(err, HubError::PermissionDenied));
    assert_eq!(store.transactions(), 0);
}

#[test]
fn unknown_module_is_not_registered() {
    let f = fixture();
    let err = f.provider.get_module_data(&attorney("billing")).unwrap_err();
    assert_eq!(err.kind(), "module_not_registered");
}

// =============================================================================
// MODULE DATA
// =============================================================================

#[test]
fn module_data_collects_primary_secondary_and_related() {
    let f = fixture();
    seed(f.provider.hub());

    let data = f.provider.get_module_data(&attorney("client-portal")).unwrap();

    assert_eq!(ids(&data.primary["Client"]), vec!["c1"]);
    assert_eq!(ids(&data.primary["Case"]), vec!["k1", "k2", "k3"]);
    assert_eq!(ids(&data.secondary["Document"]), vec!["d1"]);
    assert_eq!(ids(&data.secondary["Contract"]), vec!["t1"]);
    assert_eq!(ids(&data.related["Client.cases"]), vec!["k1", "k2", "k3"]);
    assert_eq!(ids(&data.related["Case.documents"]), vec!["d1"]);

    let meta = &data.metadata;
    assert_eq!(meta.total_count, 4);
    assert!(!meta.has_more);
    assert_eq!(meta.page_size, HubConfig::default().default_page_size);
    assert!(meta.cache.cached);
    assert_eq!(meta.suggested_actions[0], "view-case");
    assert!(meta.cache.expires_at > meta.generated_at);
}

#[test]
fn newest_records_come_first_by_default() {
    let f = fixture();
    seed(f.provider.hub());

    let data = f.provider.get_module_data(&attorney("client-portal")).unwrap();
    let cases = &data.primary["Case"];
    assert!(
        cases
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at)
    );
}

#[test]
fn full_primary_page_reports_more() {
    let f = fixture();
    seed(f.provider.hub());
    f.provider
        .set_preferences("u-attorney", UserPreferences::defaults(3));

    let data = f.provider.get_module_data(&attorney("client-portal")).unwrap();
    assert_eq!(data.primary["Case"].len(), 3);
    assert!(data.metadata.has_more);
    assert_eq!(data.metadata.page_size, 3);
}

#[test]
fn secondary_pages_are_capped() {
    let f = fixture();
    let hub = f.provider.hub();
    create(hub, "Case", "k1", &[("title", "Only case")]);
    for i in 0..15 {
        create(hub, "Document", &format!("d{i:02}"), &[("caseId", "k1")]);
    }

    let data = f.provider.get_module_data(&attorney("client-portal")).unwrap();
    assert_eq!(data.secondary["Document"].len(), 10);
    assert_eq!(data.related["Case.documents"].len(), 15);
}

#[test]
fn hidden_fields_never_leave_the_provider() {
    let f = fixture();
    seed(f.provider.hub());
    let mut preferences = UserPreferences::defaults(25);
    preferences.hidden_fields = vec!["email".to_string()];
    f.provider.set_preferences("u-attorney", preferences);

    let data = f.provider.get_module_data(&attorney("client-portal")).unwrap();
    let client = &data.primary["Client"][0];
    assert!(!client.fields.contains_key("email"));
    assert_eq!(client.text("name"), Some("Ada Lovelace"));

    let results = f
        .provider
        .search_across_modules(&attorney("client-portal"), "ada", &SearchOptions::default())
        .unwrap();
    let hit = &results.results["Client"].hits[0];
    assert!(!hit.record.fields.contains_key("email"));
}

#[test]
fn hidden_fields_are_stripped_from_related_records() {
    let f = fixture();
    seed(f.provider.hub());
    let mut preferences = UserPreferences::defaults(25);
    preferences.hidden_fields = vec!["title".to_string()];
    f.provider.set_preferences("u-attorney", preferences);

    let data = f.provider.get_module_data(&attorney("client-portal")).unwrap();
    let cases = &data.related["Client.cases"];
    let documents = &data.related["Case.documents"];
    assert_eq!(cases.len(), 3);
    assert_eq!(documents.len(), 1);
    assert!(cases.iter().all(|r| !r.fields.contains_key("title")));
    assert!(!documents[0].fields.contains_key("title"));
    assert_eq!(documents[0].text("caseId"), Some("k1"));
}

#[test]
fn stored_preferences_can_be_replaced() {
    let f = fixture();
    assert_eq!(f.provider.preferences("u-attorney").default_page_size, 25);

    f.provider
        .set_preferences("u-attorney", UserPreferences::defaults(5));
    assert_eq!(f.provider.preferences("u-attorney").default_page_size, 5);

    let mut replacement = UserPreferences::defaults(8);
    replacement.hidden_fields = vec!["email".to_string()];
    f.provider.set_preferences("u-attorney", replacement.clone());
    assert_eq!(f.provider.preferences("u-attorney"), replacement);
    assert_eq!(f.provider.cached_preference_count(), 1);
}

#[test]
fn context_filters_scope_primary_entities_and_are_remembered() {
    let f = fixture();
    seed(f.provider.hub());
    let mut filters = Filters::new();
    filters.insert("status".into(), Filter::Equals(FieldValue::text("CLOSED")));
    let context = attorney("client-portal").with_filters(filters);

    let data = f.provider.get_module_data(&context).unwrap();
    assert!(data.primary["Client"].is_empty());
    assert_eq!(ids(&data.primary["Case"]), vec!["k3"]);
    assert_eq!(ids(&data.secondary["Document"]), vec!["d1"]);

    let state = f
        .provider
        .context_state("u-attorney", "client-portal")
        .unwrap();
    assert_eq!(state["lastAction"], "view");
    assert_eq!(state["totalCount"], 1);
    assert!(state.contains_key("filters"));
    assert!(state.contains_key("lastAccess"));
}

#[test]
fn preferences_materialize_lazily() {
    let f = fixture();
    assert_eq!(f.provider.cached_preference_count(), 0);
    let preferences = f.provider.preferences("u-new");
    assert_eq!(
        preferences.default_page_size,
        HubConfig::default().default_page_size
    );
    assert_eq!(f.provider.cached_preference_count(), 1);
}

// =============================================================================
// WRITES
// =============================================================================

#[test]
fn module_update_notifies_other_modules() {
    let f = fixture();
    seed(f.provider.hub());
    let context = DataContext::new("u-attorney", "attorney", "client-portal", "open-case");

    let result = f
        .provider
        .update_module_data(
            &context,
            "Case",
            "create",
            fields(&[("title", "New matter"), ("clientId", "c1")]),
        )
        .unwrap();
    let id = result.record_id().unwrap().to_string();

    assert_eq!(f.sink.count("data.cross-module.update"), 1);
    let event = f
        .sink
        .events()
        .into_iter()
        .find(|e| e.name() == "data.cross-module.update")
        .unwrap();
    assert_eq!(event.entity(), "Case");

    let audit = f
        .provider
        .hub()
        .query(&DataQuery::new(AUDIT_ENTITY))
        .unwrap();
    assert!(audit.iter().any(|r| r.text("actor") == Some("u-attorney")));

    let state = f
        .provider
        .context_state("u-attorney", "client-portal")
        .unwrap();
    assert_eq!(state["lastMutation"], "create");
    assert_eq!(state["lastMutationEntity"], "Case");
    assert_eq!(state["lastMutationId"], id.as_str());
    assert_eq!(f.provider.recent_behavior("u-attorney")[0].action, "open-case");
}

#[test]
fn dangling_reference_fails_without_notification() {
    let f = fixture();
    let err = f
        .provider
        .update_module_data(
            &attorney("client-portal"),
            "Case",
            "create",
            fields(&[("clientId", "ghost")]),
        )
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_reference");
    assert_eq!(f.sink.count("data.cross-module.update"), 0);
}

#[test]
fn unsupported_operation_is_rejected() {
    let f = fixture();
    let err = f
        .provider
        .update_module_data(&attorney("client-portal"), "Case", "archive", Fields::new())
        .unwrap_err();
    assert_eq!(err.kind(), "unsupported_operation");
}

// =============================================================================
// SEARCH
// =============================================================================

#[test]
fn search_covers_module_entities() {
    let f = fixture();
    seed(f.provider.hub());

    let results = f
        .provider
        .search_across_modules(&attorney("client-portal"), "ada", &SearchOptions::default())
        .unwrap();
    assert_eq!(results.term, "ada");
    assert_eq!(results.results["Client"].count, 1);
    assert_eq!(results.total_found, 1);
    assert_eq!(results.searched, vec!["Client", "Case", "Document", "Contract"]);
}

#[test]
fn explicit_search_entities_must_be_registered() {
    let f = fixture();
    seed(f.provider.hub());
    let options = SearchOptions {
        entities: Some(vec!["Case".to_string(), "Invoice".to_string()]),
        ..SearchOptions::default()
    };

    let results = f
        .provider
        .search_across_modules(&attorney("client-portal"), "estate", &options)
        .unwrap();
    assert_eq!(results.searched, vec!["Case"]);
    assert_eq!(results.results["Case"].hits[0].record.id, "k1");
}

#[test]
fn empty_search_term_is_invalid() {
    let f = fixture();
    let err = f
        .provider
        .search_across_modules(&attorney("client-portal"), "  ", &SearchOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_query");
}

// =============================================================================
// ANALYTICS
// =============================================================================

#[test]
fn analytics_recommend_first_action_for_empty_entities() {
    let f = fixture();
    let analytics = f
        .provider
        .get_module_analytics(&attorney("document-management"), None)
        .unwrap();

    assert_eq!(analytics.analytics.len(), 1);
    assert_eq!(analytics.analytics[0].total_records, 0);
    let insight = &analytics.insights[0];
    assert_eq!(insight.kind, InsightKind::Recommendation);
    assert!(insight.message.contains("upload-document"));
    assert_eq!(analytics.metadata.dimensions, vec!["type", "status"]);
}

#[test]
fn analytics_flag_concentration_and_trend() {
    let f = fixture();
    let hub = f.provider.hub();
    for i in 0..5 {
        create(hub, "Document", &format!("d{i}"), &[("type", "brief"), ("status", "DRAFT")]);
    }
    let now = now_millis();
    let range = TimeRange::between(Some(now - 60_000), Some(now + 60_000));

    let analytics = f
        .provider
        .get_module_analytics(&attorney("document-management"), Some(range))
        .unwrap();

    assert_eq!(analytics.analytics[0].total_records, 5);
    let kinds: Vec<InsightKind> = analytics.insights.iter().map(|i| i.kind).collect();
    assert!(kinds.contains(&InsightKind::Alert));
    let trend = analytics
        .insights
        .iter()
        .find(|i| i.kind == InsightKind::Trend)
        .unwrap();
    assert!(trend.message.contains("rose from 0 to 5"));
}

#[test]
fn module_insight_generator_can_be_replaced() {
    let Fixture { provider, .. } = fixture();
    let provider = provider.with_insights("workflow-automation", Arc::new(EntityCount));

    let workflow = provider
        .get_module_analytics(&attorney("workflow-automation"), None)
        .unwrap();
    assert_eq!(workflow.insights.len(), 1);
    assert_eq!(workflow.insights[0].message, "2 entities");

    // Other modules keep the standard generators.
    let documents = provider
        .get_module_analytics(&attorney("document-management"), None)
        .unwrap();
    assert_eq!(documents.insights[0].kind, InsightKind::Recommendation);
}

// =============================================================================
// PREDICTIVE PREFETCH
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn repeated_transitions_schedule_prefetch() {
    let f = fixture();
    seed(f.provider.hub());

    let first = f.provider.get_module_data(&attorney("client-portal")).unwrap();
    let second = f
        .provider
        .get_module_data(&attorney("document-management"))
        .unwrap();
    let third = f.provider.get_module_data(&attorney("client-portal")).unwrap();

    assert_eq!(first.metadata.prefetch_scheduled, 0);
    assert_eq!(second.metadata.prefetch_scheduled, 0);
    assert_eq!(third.metadata.prefetch_scheduled, 1);
    assert_eq!(f.provider.recent_behavior("u-attorney").len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn prefetch_skips_modules_the_user_cannot_read() {
    let f = fixture();
    let client = |module: &str| DataContext::new("u-client", "client", module, "view");

    f.provider.get_module_data(&client("client-portal")).unwrap();
    // Denied visits are never recorded, so no transition can be learned.
    assert!(
        f.provider
            .get_module_data(&client("legal-research"))
            .is_err()
    );
    let again = f.provider.get_module_data(&client("client-portal")).unwrap();
    assert_eq!(again.metadata.prefetch_scheduled, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn prefetch_disabled_by_config() {
    let config = HubConfig {
        predictive_loading: false,
        ..HubConfig::default()
    };
    let f = fixture_with(Arc::new(MemoryStore::new()), config);

    for module in ["client-portal", "document-management", "client-portal"] {
        let data = f.provider.get_module_data(&attorney(module)).unwrap();
        assert_eq!(data.metadata.prefetch_scheduled, 0);
    }
}

#[test]
fn prefetch_needs_a_runtime() {
    let f = fixture();
    for module in ["client-portal", "document-management", "client-portal"] {
        let data = f.provider.get_module_data(&attorney(module)).unwrap();
        assert_eq!(data.metadata.prefetch_scheduled, 0);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn custom_predictor_is_capped_and_filtered() {
    let Fixture { provider, .. } = fixture();
    let provider = provider.with_predictor(Arc::new(FixedPredictor(vec![
        "billing",
        "workflow-automation",
        "document-management",
        "legal-research",
    ])));

    // Unknown and minimal-strategy modules use up the first two slots.
    let data = provider.get_module_data(&attorney("client-portal")).unwrap();
    assert_eq!(data.metadata.prefetch_scheduled, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn prefetch_uses_the_request_preferences() {
    let Fixture { provider, .. } = fixture();
    let provider = provider.with_predictor(Arc::new(FixedPredictor(vec!["document-management"])));
    let with_page = |module: &str| attorney(module).with_preferences(UserPreferences::defaults(12));

    // Empty store: four reads for the portal, three warmed for documents.
    let data = provider.get_module_data(&with_page("client-portal")).unwrap();
    assert_eq!(data.metadata.prefetch_scheduled, 1);
    let hub = Arc::clone(provider.hub());
    for _ in 0..200 {
        if hub.get_performance_metrics().total_queries >= 7 {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    let before = hub.get_performance_metrics();
    assert_eq!(before.total_queries, 7);

    provider
        .get_module_data(&with_page("document-management"))
        .unwrap();
    // Every document-management read was already warm.
    let after = hub.get_performance_metrics();
    assert_eq!(after.cache_misses, before.cache_misses);
    assert!(after.cache_hits >= before.cache_hits + 3);
}
