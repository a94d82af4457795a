//! Integration tests for the module adapters.
//!
//! Adapters are built through the same wiring the server uses, so these also
//! cover role resolution from configuration.

#![allow(clippy::unwrap_used, clippy::panic)]

use lexhub::adapters::ModuleRequest;
use lexhub::api::AppState;
use lexhub::config::LexhubConfig;
use lexhub::context::SearchOptions;
use lexhub_core::{
    DataMutation, FieldValue, Fields, MemorySink, MemoryStore, MutationOp, UserPreferences,
};
use serde_json::Value;
use std::sync::Arc;

// =============================================================================
// HELPERS
// =============================================================================

fn state() -> AppState {
    let mut config = LexhubConfig::default();
    config.hub.predictive_loading = false;
    config
        .users
        .insert("u-attorney".to_string(), "attorney".to_string());
    config
        .users
        .insert("u-para".to_string(), "paralegal".to_string());
    AppState::build(
        &config,
        Arc::new(MemoryStore::new()),
        Arc::new(MemorySink::new()),
    )
    .unwrap()
}

fn fields(pairs: &[(&str, &str)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), FieldValue::text(*v)))
        .collect()
}

fn create(state: &AppState, entity: &str, id: &str, pairs: &[(&str, &str)]) {
    state
        .hub
        .mutate(&DataMutation::create(entity, fields(pairs)).with_id(id))
        .unwrap();
}

fn seed(state: &AppState) {
    create(state, "Client", "c1", &[("name", "Ada Lovelace")]);
    create(state, "Case", "k1", &[("title", "Estate of Byron"), ("status", "ACTIVE"), ("clientId", "c1")]);
    create(state, "Case", "k2", &[("title", "Patent appeal"), ("status", "CLOSED"), ("clientId", "c1")]);
    create(state, "Document", "d1", &[("title", "Will"), ("type", "brief"), ("caseId", "k1")]);
    create(state, "Document", "d2", &[("title", "Codicil"), ("type", "brief"), ("caseId", "k1")]);
    create(state, "Document", "d3", &[("title", "Claim"), ("type", "filing"), ("caseId", "k2")]);
    create(state, "ResearchNote", "n1", &[("title", "Byron precedent"), ("jurisdiction", "UK"), ("caseId", "k1")]);
    create(state, "ResearchNote", "n2", &[("title", "Patent scope"), ("jurisdiction", "US"), ("caseId", "k2")]);
    create(state, "ResearchNote", "n3", &[("title", "Trust law"), ("jurisdiction", "UK"), ("caseId", "k1")]);
    create(state, "Workflow", "w1", &[("name", "Intake")]);
    create(state, "Task", "t1", &[("title", "Collect ID"), ("status", "OPEN"), ("workflowId", "w1")]);
    create(state, "Task", "t2", &[("title", "Sign retainer"), ("status", "DONE"), ("workflowId", "w1")]);
}

fn len(value: &Value) -> usize {
    value.as_array().map(Vec::len).unwrap_or_default()
}

// =============================================================================
// ROLE RESOLUTION
// =============================================================================

#[test]
fn roles_come_from_configuration() {
    let state = state();
    let adapter = state.adapters.adapter("client-portal").unwrap();
    assert_eq!(adapter.get_user_role("u-attorney"), "attorney");
    assert_eq!(adapter.get_user_role("u-para"), "paralegal");
    assert_eq!(adapter.get_user_role("someone-else"), "client");
}

#[test]
fn unknown_module_has_no_adapter() {
    let state = state();
    let err = state.adapters.adapter("billing").unwrap_err();
    assert_eq!(err.kind(), "module_not_registered");
}

#[test]
fn every_registered_module_has_an_adapter() {
    let state = state();
    let modules: Vec<&str> = state.adapters.modules().collect();
    assert_eq!(modules.len(), 7);
    for module in modules {
        assert_eq!(state.adapters.adapter(module).unwrap().module(), module);
    }
}

// =============================================================================
// SHAPES
// =============================================================================

#[test]
fn client_portal_summarizes_cases() {
    let state = state();
    seed(&state);
    let adapter = state.adapters.adapter("client-portal").unwrap();

    let body = adapter
        .get_module_data(&ModuleRequest::new("u-attorney"))
        .unwrap();

    assert_eq!(len(&body["clients"]), 1);
    assert_eq!(len(&body["cases"]), 2);
    assert_eq!(len(&body["documents"]), 3);
    assert_eq!(len(&body["caseDocuments"]), 3);
    assert_eq!(body["summary"]["activeCases"], 1);
    assert_eq!(body["summary"]["totalCount"], 3);
    assert_eq!(body["summary"]["hasMore"], false);
    assert_eq!(body["actions"][0], "view-case");
}

#[test]
fn document_management_counts_types() {
    let state = state();
    seed(&state);
    let adapter = state.adapters.adapter("document-management").unwrap();

    let body = adapter
        .get_module_data(&ModuleRequest::new("u-para"))
        .unwrap();

    assert_eq!(len(&body["documents"]), 3);
    assert_eq!(body["documentTypes"]["brief"], 2);
    assert_eq!(body["documentTypes"]["filing"], 1);
    assert_eq!(len(&body["relatedCases"]), 2);
    assert_eq!(body["pagination"]["total"], 3);
}

#[test]
fn legal_research_lists_jurisdictions_once() {
    let state = state();
    seed(&state);
    let adapter = state.adapters.adapter("legal-research").unwrap();

    let body = adapter
        .get_module_data(&ModuleRequest::new("u-attorney"))
        .unwrap();

    assert_eq!(len(&body["notes"]), 3);
    assert_eq!(body["jurisdictions"], serde_json::json!(["UK", "US"]));
    assert_eq!(len(&body["citedCases"]), 2);
}

#[test]
fn workflow_board_groups_tasks_by_status() {
    let state = state();
    seed(&state);
    let adapter = state.adapters.adapter("workflow-automation").unwrap();

    let body = adapter
        .get_module_data(&ModuleRequest::new("u-attorney"))
        .unwrap();

    assert_eq!(body["board"]["OPEN"], serde_json::json!(["t1"]));
    assert_eq!(body["board"]["DONE"], serde_json::json!(["t2"]));
    assert_eq!(len(&body["workflowTasks"]), 2);
}

#[test]
fn default_role_cannot_open_research() {
    let state = state();
    let adapter = state.adapters.adapter("legal-research").unwrap();
    let err = adapter
        .get_module_data(&ModuleRequest::new("walk-in"))
        .unwrap_err();
    assert_eq!(err.kind(), "permission_denied");
}

#[test]
fn request_preferences_override_stored_ones() {
    let state = state();
    seed(&state);
    let adapter = state.adapters.adapter("client-portal").unwrap();
    let mut request = ModuleRequest::new("u-attorney");
    request.preferences = Some(UserPreferences::defaults(1));

    let body = adapter.get_module_data(&request).unwrap();
    assert_eq!(len(&body["cases"]), 1);
    assert_eq!(body["summary"]["hasMore"], true);
}

// =============================================================================
// WRITES, SEARCH, ANALYTICS
// =============================================================================

#[test]
fn adapter_mutation_uses_resolved_role() {
    let state = state();
    seed(&state);
    let adapter = state.adapters.adapter("document-management").unwrap();

    let result = adapter
        .update_module_data(
            &ModuleRequest::new("u-para"),
            "Document",
            "update",
            fields(&[("id", "d1"), ("title", "Will v2")]),
        )
        .unwrap();
    assert_eq!(result.record_id(), Some("d1"));

    let err = adapter
        .update_module_data(
            &ModuleRequest::new("walk-in"),
            "Document",
            MutationOp::Delete.as_str(),
            fields(&[("id", "d1")]),
        )
        .unwrap_err();
    assert_eq!(err.kind(), "permission_denied");
}

#[test]
fn research_search_groups_hits_as_notes() {
    let state = state();
    seed(&state);
    let adapter = state.adapters.adapter("legal-research").unwrap();

    let body = adapter
        .search_module_data(
            &ModuleRequest::new("u-attorney"),
            "byron",
            &SearchOptions::default(),
        )
        .unwrap();

    assert_eq!(len(&body["notes"]), 1);
    assert_eq!(len(&body["cases"]), 1);
    assert_eq!(body["total"], 2);
    assert_eq!(body["term"], "byron");
}

#[test]
fn adapter_analytics_cover_primary_entities() {
    let state = state();
    seed(&state);
    let adapter = state.adapters.adapter("workflow-automation").unwrap();

    let analytics = adapter
        .get_module_analytics(&ModuleRequest::new("u-attorney"), None)
        .unwrap();
    let entities: Vec<&str> = analytics
        .analytics
        .iter()
        .map(|a| a.entity.as_str())
        .collect();
    assert_eq!(entities, vec!["Workflow", "Task"]);
    assert_eq!(analytics.analytics[1].total_records, 2);
}
