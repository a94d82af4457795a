//! Per-module response shapes.
//!
//! Records are grouped by their `kind` tag, never by inspecting values.

use super::{ModuleRequest, ModuleShaper};
use crate::context::{ModuleData, SearchResults};
use lexhub_core::Record;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// `ResearchNote` -> `researchNotes`.
pub fn collection_name(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => format!("{}{}s", first.to_ascii_lowercase(), chars.as_str()),
        None => String::new(),
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Primary and secondary records grouped by kind, in collection order.
fn grouped(data: &ModuleData) -> BTreeMap<String, Vec<&Record>> {
    let mut groups: BTreeMap<String, Vec<&Record>> = BTreeMap::new();
    for record in data.primary.values().chain(data.secondary.values()).flatten() {
        groups.entry(record.kind.clone()).or_default().push(record);
    }
    groups
}

fn collection<'a>(groups: &BTreeMap<String, Vec<&'a Record>>, kind: &str) -> Vec<&'a Record> {
    groups.get(kind).cloned().unwrap_or_default()
}

fn related<'a>(data: &'a ModuleData, path: &str) -> &'a [Record] {
    data.related.get(path).map(Vec::as_slice).unwrap_or_default()
}

/// Hits grouped under each kind's collection name plus a total.
fn grouped_hits(shaper: &dyn ModuleShaper, results: SearchResults) -> Value {
    let mut body = Map::new();
    for group in results.results.into_values() {
        for hit in group.hits {
            let name = shaper.collection(&hit.record.kind);
            if let Value::Array(items) = body
                .entry(name)
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                items.push(to_value(&hit));
            }
        }
    }
    body.insert("total".into(), results.total_found.into());
    body.insert("term".into(), results.term.into());
    Value::Object(body)
}

// =============================================================================
// CLIENT PORTAL
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct ClientPortalShape;

impl ModuleShaper for ClientPortalShape {
    fn module(&self) -> &str {
        "client-portal"
    }

    fn transform_data(&self, data: ModuleData, request: &ModuleRequest) -> Value {
        let groups = grouped(&data);
        let active_cases = collection(&groups, "Case")
            .iter()
            .filter(|c| c.text("status").is_some_and(|s| s.eq_ignore_ascii_case("ACTIVE")))
            .count();
        json!({
            "client": request.entity_id,
            "clients": to_value(&collection(&groups, "Client")),
            "cases": to_value(&collection(&groups, "Case")),
            "documents": to_value(&collection(&groups, "Document")),
            "contracts": to_value(&collection(&groups, "Contract")),
            "caseDocuments": to_value(&related(&data, "Case.documents")),
            "summary": {
                "activeCases": active_cases,
                "totalCount": data.metadata.total_count,
                "hasMore": data.metadata.has_more,
            },
            "actions": data.metadata.suggested_actions,
        })
    }

    fn transform_search_results(&self, results: SearchResults) -> Value {
        grouped_hits(self, results)
    }
}

// =============================================================================
// DOCUMENT MANAGEMENT
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentManagementShape;

impl ModuleShaper for DocumentManagementShape {
    fn module(&self) -> &str {
        "document-management"
    }

    fn transform_data(&self, data: ModuleData, _request: &ModuleRequest) -> Value {
        let groups = grouped(&data);
        let documents = collection(&groups, "Document");
        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
        for document in &documents {
            let kind = document.text("type").unwrap_or("untyped").to_string();
            *by_type.entry(kind).or_default() += 1;
        }
        json!({
            "documents": to_value(&documents),
            "documentTypes": by_type,
            "relatedCases": to_value(&related(&data, "Document.case")),
            "cases": to_value(&collection(&groups, "Case")),
            "clients": to_value(&collection(&groups, "Client")),
            "pagination": {
                "pageSize": data.metadata.page_size,
                "total": data.metadata.total_count,
                "hasMore": data.metadata.has_more,
            },
            "actions": data.metadata.suggested_actions,
        })
    }

    fn transform_search_results(&self, results: SearchResults) -> Value {
        grouped_hits(self, results)
    }
}

// =============================================================================
// LEGAL RESEARCH
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct LegalResearchShape;

impl ModuleShaper for LegalResearchShape {
    fn module(&self) -> &str {
        "legal-research"
    }

    fn collection(&self, kind: &str) -> String {
        match kind {
            "ResearchNote" => "notes".to_string(),
            other => collection_name(other),
        }
    }

    fn transform_data(&self, data: ModuleData, _request: &ModuleRequest) -> Value {
        let groups = grouped(&data);
        let notes = collection(&groups, "ResearchNote");
        let mut jurisdictions: Vec<&str> = notes.iter().filter_map(|n| n.text("jurisdiction")).collect();
        jurisdictions.sort_unstable();
        jurisdictions.dedup();
        json!({
            "notes": to_value(&notes),
            "jurisdictions": jurisdictions,
            "citedCases": to_value(&related(&data, "ResearchNote.case")),
            "cases": to_value(&collection(&groups, "Case")),
            "documents": to_value(&collection(&groups, "Document")),
            "actions": data.metadata.suggested_actions,
        })
    }

    fn transform_search_results(&self, results: SearchResults) -> Value {
        grouped_hits(self, results)
    }
}

// =============================================================================
// WORKFLOW AUTOMATION
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowAutomationShape;

impl ModuleShaper for WorkflowAutomationShape {
    fn module(&self) -> &str {
        "workflow-automation"
    }

    fn transform_data(&self, data: ModuleData, _request: &ModuleRequest) -> Value {
        let groups = grouped(&data);
        let tasks = collection(&groups, "Task");
        let mut board: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for task in &tasks {
            let status = task.text("status").unwrap_or("UNASSIGNED").to_string();
            board.entry(status).or_default().push(&task.id);
        }
        json!({
            "workflows": to_value(&collection(&groups, "Workflow")),
            "tasks": to_value(&tasks),
            "board": board,
            "workflowTasks": to_value(&related(&data, "Workflow.tasks")),
            "cases": to_value(&collection(&groups, "Case")),
            "actions": data.metadata.suggested_actions,
        })
    }

    fn transform_search_results(&self, results: SearchResults) -> Value {
        grouped_hits(self, results)
    }
}

// =============================================================================
// STANDARD
// =============================================================================

/// Generic shape for modules without a historical response format.
#[derive(Debug, Clone)]
pub struct StandardShape {
    module: String,
}

impl StandardShape {
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
        }
    }
}

impl ModuleShaper for StandardShape {
    fn module(&self) -> &str {
        &self.module
    }

    fn transform_data(&self, data: ModuleData, _request: &ModuleRequest) -> Value {
        to_value(&data)
    }

    fn transform_search_results(&self, results: SearchResults) -> Value {
        to_value(&results)
    }
}
