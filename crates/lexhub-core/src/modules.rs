//! # Module Requirements Registry
//!
//! Static per-module declaration of what data a module needs and who may
//! see it. Built once at startup, never mutated, looked up by module name.

use crate::HubError;
use crate::schema::EntityRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How eagerly a module's reads are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    /// Cache reads and prefetch predicted next views.
    Aggressive,
    /// Cache reads.
    #[default]
    Moderate,
    /// Always read through to the store.
    Minimal,
}

impl CacheStrategy {
    /// Whether reads for the module go through the cache.
    #[must_use]
    pub fn caches(self) -> bool {
        !matches!(self, Self::Minimal)
    }
}

/// What one module needs from the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRequirements {
    pub module: String,
    /// Entities fetched in full pages.
    pub primary: Vec<String>,
    /// Supporting entities fetched in capped pages.
    pub secondary: Vec<String>,
    /// Relation paths of the form `Entity.relation`.
    pub relations: Vec<String>,
    /// Every permission needed to read the module's data.
    pub permissions: Vec<String>,
    /// Every permission needed to write through the module.
    pub write_permissions: Vec<String>,
    pub cache_strategy: CacheStrategy,
    pub real_time_sync: bool,
    /// Next actions offered to the user alongside the data.
    pub suggested_actions: Vec<String>,
    /// Fields analytics group primary entities by.
    pub dimensions: Vec<String>,
}

impl ModuleRequirements {
    /// Primary then secondary entities, without duplicates.
    #[must_use]
    pub fn entities(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for entity in self.primary.iter().chain(&self.secondary) {
            if !seen.contains(&entity.as_str()) {
                seen.push(entity.as_str());
            }
        }
        seen
    }

    /// Split `Entity.relation` into its parts.
    #[must_use]
    pub fn split_relation(path: &str) -> Option<(&str, &str)> {
        path.split_once('.')
            .filter(|(entity, relation)| !entity.is_empty() && !relation.is_empty())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[allow(clippy::too_many_arguments)]
fn requirements(
    module: &str,
    primary: &[&str],
    secondary: &[&str],
    relations: &[&str],
    permissions: &[&str],
    write_permissions: &[&str],
    cache_strategy: CacheStrategy,
    real_time_sync: bool,
    suggested_actions: &[&str],
    dimensions: &[&str],
) -> ModuleRequirements {
    ModuleRequirements {
        module: module.to_string(),
        primary: strings(primary),
        secondary: strings(secondary),
        relations: strings(relations),
        permissions: strings(permissions),
        write_permissions: strings(write_permissions),
        cache_strategy,
        real_time_sync,
        suggested_actions: strings(suggested_actions),
        dimensions: strings(dimensions),
    }
}

/// Lookup table of every known module.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, ModuleRequirements>,
}

impl ModuleRegistry {
    /// Build a registry from explicit declarations. Later entries replace
    /// earlier ones with the same module name.
    #[must_use]
    pub fn from_requirements(entries: impl IntoIterator<Item = ModuleRequirements>) -> Self {
        Self {
            modules: entries
                .into_iter()
                .map(|r| (r.module.clone(), r))
                .collect(),
        }
    }

    /// The seven modules of the practice platform.
    #[must_use]
    pub fn standard() -> Self {
        use CacheStrategy::{Aggressive, Minimal, Moderate};
        Self::from_requirements([
            requirements(
                "client-portal",
                &["Client", "Case"],
                &["Document", "Contract"],
                &["Client.cases", "Case.documents"],
                &["client.read", "case.read"],
                &["client.write", "case.write"],
                Aggressive,
                true,
                &["view-case", "upload-document", "message-attorney"],
                &["status"],
            ),
            requirements(
                "ai-assistant",
                &["Conversation"],
                &["Case", "Document", "ResearchNote"],
                &["Conversation.messages"],
                &["ai.use"],
                &["ai.use"],
                Moderate,
                true,
                &["ask-question", "summarize-document", "draft-response"],
                &["status"],
            ),
            requirements(
                "document-management",
                &["Document"],
                &["Case", "Client"],
                &["Document.case"],
                &["document.read"],
                &["document.write"],
                Aggressive,
                false,
                &["upload-document", "tag-document", "share-document"],
                &["type", "status"],
            ),
            requirements(
                "legal-research",
                &["ResearchNote"],
                &["Case", "Document"],
                &["ResearchNote.case"],
                &["research.read"],
                &["research.write"],
                Moderate,
                false,
                &["start-research", "save-citation"],
                &["jurisdiction", "topic"],
            ),
            requirements(
                "workflow-automation",
                &["Workflow", "Task"],
                &["Case"],
                &["Workflow.tasks", "Task.case"],
                &["workflow.read"],
                &["workflow.write"],
                Minimal,
                true,
                &["create-task", "assign-task", "run-workflow"],
                &["status", "priority"],
            ),
            requirements(
                "integration-management",
                &["Integration"],
                &[],
                &[],
                &["integration.read"],
                &["integration.write"],
                Minimal,
                false,
                &["connect-integration", "sync-now"],
                &["provider", "status"],
            ),
            requirements(
                "entity-management",
                &["Organization", "Client"],
                &["Contract"],
                &["Organization.clients", "Client.contracts"],
                &["entity.read"],
                &["entity.write"],
                Moderate,
                false,
                &["add-client", "merge-entities"],
                &["type"],
            ),
        ])
    }

    #[must_use]
    pub fn lookup(&self, module: &str) -> Option<&ModuleRequirements> {
        self.modules.get(module)
    }

    /// Lookup that fails with `ModuleNotRegistered`.
    pub fn require(&self, module: &str) -> Result<&ModuleRequirements, HubError> {
        self.lookup(module)
            .ok_or_else(|| HubError::ModuleNotRegistered(module.to_string()))
    }

    /// Registered module names in deterministic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleRequirements> {
        self.modules.values()
    }

    /// Check every declared entity and relation path against the schema.
    pub fn validate(&self, entities: &EntityRegistry) -> Result<(), HubError> {
        for requirements in self.modules.values() {
            for entity in requirements.entities() {
                entities.get(entity)?;
            }
            for path in &requirements.relations {
                let (entity, relation) = ModuleRequirements::split_relation(path).ok_or_else(|| {
                    HubError::InvalidSchema(format!(
                        "module {} declares malformed relation '{}'",
                        requirements.module, path
                    ))
                })?;
                entities.resolve_path(entity, relation)?;
            }
        }
        Ok(())
    }
}
