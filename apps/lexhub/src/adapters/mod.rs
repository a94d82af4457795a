//! # Module Adapters
//!
//! Thin translators between the generic contextual response and the shape a
//! module's call sites expect. They own no caching and no business logic.
//!
//! ```text
//! module call site -> ModuleAdapter -> ContextProvider -> DataHub
//!                          |
//!                    ModuleShaper (per-module response shape)
//! ```
//!
//! The [`AdapterFactory`] is built once at startup and is the only way to
//! obtain an adapter.

mod shapes;

pub use shapes::{
    ClientPortalShape, DocumentManagementShape, LegalResearchShape, StandardShape,
    WorkflowAutomationShape, collection_name,
};

use crate::context::{ContextProvider, ModuleAnalytics, ModuleData, SearchOptions, SearchResults};
use lexhub_core::{
    DataContext, Fields, Filters, HubError, MutationResult, TimeRange, UserPreferences,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

fn default_action() -> String {
    "view".to_string()
}

/// What a module call site sends. The role is looked up, never trusted from
/// the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRequest {
    pub user_id: String,
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub filters: Option<Filters>,
    #[serde(default)]
    pub preferences: Option<UserPreferences>,
}

impl ModuleRequest {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            action: default_action(),
            entity_id: None,
            filters: None,
            preferences: None,
        }
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    #[must_use]
    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = Some(filters);
        self
    }
}

/// Reshapes generic responses for one module.
pub trait ModuleShaper: Send + Sync {
    fn module(&self) -> &str;

    /// Response key for records of `kind`.
    fn collection(&self, kind: &str) -> String {
        collection_name(kind)
    }

    fn transform_data(&self, data: ModuleData, request: &ModuleRequest) -> Value;

    fn transform_search_results(&self, results: SearchResults) -> Value;
}

// =============================================================================
// USER DIRECTORY
// =============================================================================

/// User id to role, with a fallback role for unknown users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDirectory {
    roles: BTreeMap<String, String>,
    default_role: String,
}

impl UserDirectory {
    #[must_use]
    pub fn new(roles: BTreeMap<String, String>, default_role: impl Into<String>) -> Self {
        Self {
            roles,
            default_role: default_role.into(),
        }
    }

    #[must_use]
    pub fn role(&self, user_id: &str) -> &str {
        self.roles
            .get(user_id)
            .map_or(self.default_role.as_str(), String::as_str)
    }
}

// =============================================================================
// MODULE ADAPTER
// =============================================================================

/// One module's entry point: shape + provider + role lookup.
#[derive(Clone)]
pub struct ModuleAdapter {
    shaper: Arc<dyn ModuleShaper>,
    provider: Arc<ContextProvider>,
    users: Arc<UserDirectory>,
}

impl std::fmt::Debug for ModuleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleAdapter")
            .field("module", &self.shaper.module())
            .finish_non_exhaustive()
    }
}

impl ModuleAdapter {
    #[must_use]
    pub fn new(
        shaper: Arc<dyn ModuleShaper>,
        provider: Arc<ContextProvider>,
        users: Arc<UserDirectory>,
    ) -> Self {
        Self {
            shaper,
            provider,
            users,
        }
    }

    #[must_use]
    pub fn module(&self) -> &str {
        self.shaper.module()
    }

    #[must_use]
    pub fn get_user_role(&self, user_id: &str) -> &str {
        self.users.role(user_id)
    }

    fn context(&self, request: &ModuleRequest) -> DataContext {
        let mut context = DataContext::new(
            request.user_id.as_str(),
            self.get_user_role(&request.user_id),
            self.module(),
            request.action.as_str(),
        );
        context.entity_id = request.entity_id.clone();
        context.filters = request.filters.clone();
        context.preferences = request.preferences.clone();
        context
    }

    pub fn get_module_data(&self, request: &ModuleRequest) -> Result<Value, HubError> {
        let data = self.provider.get_module_data(&self.context(request))?;
        Ok(self.shaper.transform_data(data, request))
    }

    pub fn update_module_data(
        &self,
        request: &ModuleRequest,
        entity: &str,
        operation: &str,
        data: Fields,
    ) -> Result<MutationResult, HubError> {
        self.provider
            .update_module_data(&self.context(request), entity, operation, data)
    }

    pub fn search_module_data(
        &self,
        request: &ModuleRequest,
        term: &str,
        options: &SearchOptions,
    ) -> Result<Value, HubError> {
        let results = self
            .provider
            .search_across_modules(&self.context(request), term, options)?;
        Ok(self.shaper.transform_search_results(results))
    }

    pub fn get_module_analytics(
        &self,
        request: &ModuleRequest,
        time_range: Option<TimeRange>,
    ) -> Result<ModuleAnalytics, HubError> {
        self.provider
            .get_module_analytics(&self.context(request), time_range)
    }
}

// =============================================================================
// ADAPTER FACTORY
// =============================================================================

/// Shape registered for a module name. Unknown modules get the standard
/// shape.
#[must_use]
pub fn shaper_for(module: &str) -> Arc<dyn ModuleShaper> {
    match module {
        "client-portal" => Arc::new(ClientPortalShape),
        "document-management" => Arc::new(DocumentManagementShape),
        "legal-research" => Arc::new(LegalResearchShape),
        "workflow-automation" => Arc::new(WorkflowAutomationShape),
        other => Arc::new(StandardShape::new(other)),
    }
}

/// Every module's adapter, built once from the provider's module registry.
#[derive(Debug, Clone)]
pub struct AdapterFactory {
    adapters: BTreeMap<String, ModuleAdapter>,
}

impl AdapterFactory {
    #[must_use]
    pub fn new(provider: Arc<ContextProvider>, users: Arc<UserDirectory>) -> Self {
        let adapters = provider
            .modules()
            .names()
            .map(|module| {
                let adapter =
                    ModuleAdapter::new(shaper_for(module), Arc::clone(&provider), Arc::clone(&users));
                (module.to_string(), adapter)
            })
            .collect();
        Self { adapters }
    }

    /// Adapter for `module`, or `ModuleNotRegistered`.
    pub fn adapter(&self, module: &str) -> Result<&ModuleAdapter, HubError> {
        self.adapters
            .get(module)
            .ok_or_else(|| HubError::ModuleNotRegistered(module.to_string()))
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_users_get_default_role() {
        let users = UserDirectory::new(
            BTreeMap::from([("u1".to_string(), "attorney".to_string())]),
            "client",
        );
        assert_eq!(users.role("u1"), "attorney");
        assert_eq!(users.role("stranger"), "client");
    }

    #[test]
    fn shapes_resolve_by_module_name() {
        assert_eq!(shaper_for("legal-research").module(), "legal-research");
        assert_eq!(shaper_for("ai-assistant").module(), "ai-assistant");
    }

    #[test]
    fn request_defaults_to_view() {
        let request: ModuleRequest = serde_json::from_str(r#"{"userId":"u1"}"#).expect("parse");
        assert_eq!(request.action, "view");
        assert!(request.filters.is_none());
    }
}
