//! # Context Provider
//!
//! Permission-scoped, preference-shaped module data on top of the Data Hub.
//!
//! ## Request Flow
//!
//! ```text
//! Received -> PermissionChecked -> PreferencesResolved -> PrimaryFetched
//!          -> SecondaryFetched -> RelatedResolved -> MetadataBuilt
//!          -> (background: PrefetchTriggered) -> Returned
//! ```
//!
//! Any failure aborts the remaining steps and reaches the caller unchanged.
//! The permission check runs before any storage access.
//!
//! ## Background Work
//!
//! Predictive prefetch runs on the tokio blocking pool and is never awaited.
//! Its failures are logged and never touch the originating response.

mod behavior;
mod insights;
mod lru;

pub use behavior::{
    ActionPredictor, BehaviorTracker, MAX_PREDICTIONS, Prediction, TransitionFrequency, Visit,
};
pub use insights::{
    CONCENTRATION_MIN_RECORDS, CONCENTRATION_THRESHOLD, CompositeInsights, ConcentrationAlert,
    EmptyDataRecommendation, Insight, InsightGenerator, InsightInput, InsightKind, VolumeTrend,
};

use crate::config::ContextSettings;
use lexhub_core::primitives::SECONDARY_PAGE_CAP;
use lexhub_core::{
    AccessPolicy, AnalyticsQuery, AnalyticsResult, CacheStrategy, ContextualData, DataContext,
    DataHub, DataMutation, DataQuery, FieldValue, Fields, Filter, Filters, HubError, HubEvent,
    ID_FIELD, ModuleRegistry, ModuleRequirements, MutationOp, MutationOptions, MutationResult,
    Record, SearchHit, TimeRange, UserPreferences, now_millis,
};
use lru::BoundedLru;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// How long a module response is advertised as fresh.
pub const RESPONSE_FRESHNESS_MILLIS: i64 = 60 * 60 * 1000;

/// Per-user, per-module state merged across requests.
pub type ContextState = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// RESPONSE TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub cached: bool,
    pub strategy: CacheStrategy,
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub module: String,
    pub action: String,
    /// Records across every primary entity.
    pub total_count: usize,
    /// Some primary entity filled a whole page. An approximation.
    pub has_more: bool,
    pub page_size: usize,
    pub cache: CacheInfo,
    pub permissions: Vec<String>,
    pub suggested_actions: Vec<String>,
    /// Background prefetches started for predicted next views.
    pub prefetch_scheduled: usize,
    pub generated_at: i64,
}

/// What `get_module_data` returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleData {
    pub primary: ContextualData,
    pub secondary: ContextualData,
    /// Relation path (`Entity.relation`) to the related records.
    pub related: ContextualData,
    pub metadata: ResponseMetadata,
}

/// Options for `search_across_modules`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    /// Entities to search. Defaults to every entity of the calling module.
    #[serde(default)]
    pub entities: Option<Vec<String>>,
    #[serde(default)]
    pub fuzzy: bool,
    /// Hits per entity. Defaults to the user's page size.
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityHits {
    pub count: usize,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub term: String,
    /// Only entities with at least one hit.
    pub results: BTreeMap<String, EntityHits>,
    pub total_found: usize,
    pub searched: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsMetadata {
    pub module: String,
    pub dimensions: Vec<String>,
    pub time_range: Option<TimeRange>,
    pub generated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleAnalytics {
    /// One result per primary entity.
    pub analytics: Vec<AnalyticsResult>,
    pub insights: Vec<Insight>,
    pub metadata: AnalyticsMetadata,
}

// =============================================================================
// READ PLANNING
// =============================================================================

/// The primary and secondary queries a module view issues.
///
/// Prefetch runs the same queries so it warms the keys a later
/// `get_module_data` reads.
fn module_queries(
    requirements: &ModuleRequirements,
    filters: Option<&Filters>,
    preferences: &UserPreferences,
) -> (Vec<DataQuery>, Vec<DataQuery>) {
    let page = preferences.default_page_size;
    let cache = requirements.cache_strategy.caches();
    let shape = |entity: &str, limit: usize| {
        let mut query = DataQuery::new(entity).limit(limit).cached(cache);
        query.order_by = preferences.preferred_order_by.clone();
        query
    };

    let primary = requirements
        .primary
        .iter()
        .map(|entity| {
            let mut query = shape(entity, page);
            if let Some(filters) = filters {
                query.filters = filters.clone();
            }
            query
        })
        .collect();
    let secondary = requirements
        .secondary
        .iter()
        .filter(|entity| !requirements.primary.contains(entity))
        .map(|entity| shape(entity, page.min(SECONDARY_PAGE_CAP)))
        .collect();
    (primary, secondary)
}

/// Remove hidden fields, including from joined records.
fn strip_hidden(records: &mut [Record], hidden: &[String]) {
    if hidden.is_empty() {
        return;
    }
    for record in records {
        for field in hidden {
            record.fields.remove(field);
        }
        for joined in record.related.values_mut() {
            strip_hidden(joined, hidden);
        }
    }
}

/// The range of equal length immediately before `range`, when bounded.
fn previous_range(range: &TimeRange) -> Option<TimeRange> {
    let (from, to) = (range.from?, range.to?);
    let span = to.checked_sub(from)?;
    Some(TimeRange {
        field: range.field.clone(),
        from: Some(from.checked_sub(span)?.checked_sub(1)?),
        to: Some(from.checked_sub(1)?),
    })
}

// =============================================================================
// CONTEXT PROVIDER
// =============================================================================

pub struct ContextProvider {
    hub: Arc<DataHub>,
    modules: Arc<ModuleRegistry>,
    policy: Arc<AccessPolicy>,
    preferences: Mutex<BoundedLru<String, UserPreferences>>,
    contexts: Mutex<BoundedLru<(String, String), ContextState>>,
    behavior: BehaviorTracker,
    predictor: Arc<dyn ActionPredictor>,
    insights: BTreeMap<String, Arc<dyn InsightGenerator>>,
    default_insights: Arc<dyn InsightGenerator>,
}

impl std::fmt::Debug for ContextProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextProvider")
            .field("hub", &self.hub)
            .field("modules", &self.modules)
            .finish_non_exhaustive()
    }
}

impl ContextProvider {
    #[must_use]
    pub fn new(
        hub: Arc<DataHub>,
        modules: Arc<ModuleRegistry>,
        policy: Arc<AccessPolicy>,
        settings: &ContextSettings,
    ) -> Self {
        Self {
            hub,
            modules,
            policy,
            preferences: Mutex::new(BoundedLru::new(settings.preference_capacity)),
            contexts: Mutex::new(BoundedLru::new(settings.context_capacity)),
            behavior: BehaviorTracker::new(settings.behavior_window, settings.preference_capacity),
            predictor: Arc::new(TransitionFrequency),
            insights: BTreeMap::new(),
            default_insights: Arc::new(CompositeInsights::standard()),
        }
    }

    #[must_use]
    pub fn with_predictor(mut self, predictor: Arc<dyn ActionPredictor>) -> Self {
        self.predictor = predictor;
        self
    }

    /// Replace the insight generator of one module.
    #[must_use]
    pub fn with_insights(
        mut self,
        module: impl Into<String>,
        generator: Arc<dyn InsightGenerator>,
    ) -> Self {
        self.insights.insert(module.into(), generator);
        self
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<DataHub> {
        &self.hub
    }

    #[must_use]
    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    #[must_use]
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    // =========================================================================
    // PREFERENCES AND CONTEXT STATE
    // =========================================================================

    /// Stored preferences, materializing defaults on first access.
    pub fn preferences(&self, user_id: &str) -> UserPreferences {
        let page = self.hub.config().default_page_size;
        self.preferences
            .lock()
            .get_or_insert_with(user_id.to_string(), || UserPreferences::defaults(page))
            .clone()
    }

    pub fn set_preferences(&self, user_id: &str, preferences: UserPreferences) {
        self.preferences
            .lock()
            .insert(user_id.to_string(), preferences);
    }

    /// Users with materialized preferences.
    #[must_use]
    pub fn cached_preference_count(&self) -> usize {
        self.preferences.lock().len()
    }

    /// Merged state of one user's view of one module.
    #[must_use]
    pub fn context_state(&self, user_id: &str, module: &str) -> Option<ContextState> {
        self.contexts
            .lock()
            .get(&(user_id.to_string(), module.to_string()))
            .cloned()
    }

    /// New fields overwrite, others are retained.
    fn merge_context(&self, user_id: &str, module: &str, update: ContextState) {
        let mut contexts = self.contexts.lock();
        let state = contexts.get_or_insert_with(
            (user_id.to_string(), module.to_string()),
            ContextState::new,
        );
        for (key, value) in update {
            state.insert(key, value);
        }
    }

    fn effective_preferences(&self, context: &DataContext) -> UserPreferences {
        context
            .preferences
            .clone()
            .unwrap_or_else(|| self.preferences(&context.user_id))
    }

    /// Recent visits of a user, oldest first.
    #[must_use]
    pub fn recent_behavior(&self, user_id: &str) -> Vec<Visit> {
        self.behavior.recent(user_id)
    }

    // =========================================================================
    // MODULE DATA
    // =========================================================================

    /// Assemble a module's view for the caller.
    pub fn get_module_data(&self, context: &DataContext) -> Result<ModuleData, HubError> {
        let requirements = self.modules.require(&context.module)?;
        self.policy
            .check(&context.user_role, &requirements.permissions)?;
        let preferences = self.effective_preferences(context);
        let page = preferences.default_page_size;

        let (primary_queries, secondary_queries) =
            module_queries(requirements, context.filters.as_ref(), &preferences);
        let mut primary = ContextualData::new();
        for query in &primary_queries {
            primary.insert(query.entity.clone(), self.hub.query(query)?);
        }
        let mut secondary = ContextualData::new();
        for query in &secondary_queries {
            secondary.insert(query.entity.clone(), self.hub.query(query)?);
        }
        let mut related = self.resolve_related(requirements, &primary, &secondary);

        for records in primary
            .values_mut()
            .chain(secondary.values_mut())
            .chain(related.values_mut())
        {
            strip_hidden(records, &preferences.hidden_fields);
        }

        self.behavior
            .record(&context.user_id, &context.module, &context.action);
        let prefetch_scheduled = self.schedule_prefetch(context, &preferences);

        let total_count = primary.values().map(Vec::len).sum();
        let has_more = page > 0 && primary.values().any(|records| records.len() == page);
        let generated_at = now_millis();
        let metadata = ResponseMetadata {
            module: context.module.clone(),
            action: context.action.clone(),
            total_count,
            has_more,
            page_size: page,
            cache: CacheInfo {
                cached: requirements.cache_strategy.caches(),
                strategy: requirements.cache_strategy,
                expires_at: generated_at + RESPONSE_FRESHNESS_MILLIS,
            },
            permissions: requirements.permissions.clone(),
            suggested_actions: requirements.suggested_actions.clone(),
            prefetch_scheduled,
            generated_at,
        };

        let mut update = ContextState::new();
        update.insert("lastAction".into(), context.action.clone().into());
        update.insert("lastAccess".into(), generated_at.into());
        update.insert("totalCount".into(), total_count.into());
        if let Some(entity_id) = &context.entity_id {
            update.insert("entityId".into(), entity_id.clone().into());
        }
        if let Some(filters) = &context.filters
            && let Ok(value) = serde_json::to_value(filters)
        {
            update.insert("filters".into(), value);
        }
        self.merge_context(&context.user_id, &context.module, update);

        debug!(
            module = %context.module,
            action = %context.action,
            total_count,
            "module data assembled"
        );
        Ok(ModuleData {
            primary,
            secondary,
            related,
            metadata,
        })
    }

    /// Related records per declared relation path. Best effort: a path that
    /// cannot be resolved yields an empty set.
    fn resolve_related(
        &self,
        requirements: &ModuleRequirements,
        primary: &ContextualData,
        secondary: &ContextualData,
    ) -> ContextualData {
        let mut related = ContextualData::new();
        for path in &requirements.relations {
            related.insert(
                path.clone(),
                self.related_for(requirements, path, primary, secondary),
            );
        }
        related
    }

    fn related_for(
        &self,
        requirements: &ModuleRequirements,
        path: &str,
        primary: &ContextualData,
        secondary: &ContextualData,
    ) -> Vec<Record> {
        let Some((entity, relation)) = ModuleRequirements::split_relation(path) else {
            warn!(module = %requirements.module, path, "malformed relation path");
            return Vec::new();
        };
        let ids: Vec<FieldValue> = primary
            .get(entity)
            .or_else(|| secondary.get(entity))
            .map(|records| records.iter().map(|r| FieldValue::text(&r.id)).collect())
            .unwrap_or_default();
        if ids.is_empty() {
            return Vec::new();
        }

        let query = DataQuery::new(entity)
            .filter(ID_FIELD, Filter::In(ids.clone()))
            .relation(relation)
            .limit(ids.len())
            .cached(requirements.cache_strategy.caches());
        match self.hub.query(&query) {
            Ok(records) => {
                let mut unique: BTreeMap<(String, String), Record> = BTreeMap::new();
                for record in records {
                    for target in record.related.get(relation).into_iter().flatten() {
                        unique
                            .entry((target.kind.clone(), target.id.clone()))
                            .or_insert_with(|| target.clone());
                    }
                }
                unique.into_values().collect()
            }
            Err(e) => {
                warn!(module = %requirements.module, path, error = %e, "related data unavailable");
                Vec::new()
            }
        }
    }

    // =========================================================================
    // PREDICTIVE PREFETCH
    // =========================================================================

    /// Start background prefetches for the predicted next views, shaped by
    /// the same preferences as the current read. Returns how many were
    /// started.
    fn schedule_prefetch(&self, context: &DataContext, preferences: &UserPreferences) -> usize {
        if !self.hub.config().predictive_loading {
            return 0;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime, prefetch skipped");
            return 0;
        };

        let history = self.behavior.recent(&context.user_id);
        let predictions = self.predictor.predict(&history, &context.module);
        let mut scheduled = 0;
        for prediction in predictions.into_iter().take(MAX_PREDICTIONS) {
            let Some(requirements) = self.modules.lookup(&prediction.module) else {
                continue;
            };
            if !requirements.cache_strategy.caches()
                || !self
                    .policy
                    .allows(&context.user_role, &requirements.permissions)
            {
                continue;
            }
            let (primary, secondary) = module_queries(requirements, None, preferences);
            let hub = Arc::clone(&self.hub);
            let module = prediction.module;
            runtime.spawn_blocking(move || {
                for query in primary.iter().chain(&secondary) {
                    if let Err(e) = hub.query(query) {
                        let failure = HubError::PrefetchFailed(e.to_string());
                        warn!(module = %module, entity = %query.entity, error = %failure, "prefetch aborted");
                        return;
                    }
                }
                debug!(module = %module, "prefetch warmed");
            });
            scheduled += 1;
        }
        scheduled
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Write through the hub on behalf of a module, then tell other modules.
    pub fn update_module_data(
        &self,
        context: &DataContext,
        entity: &str,
        operation: &str,
        data: Fields,
    ) -> Result<MutationResult, HubError> {
        let requirements = self.modules.require(&context.module)?;
        self.policy
            .check(&context.user_role, &requirements.write_permissions)?;
        let operation: MutationOp = operation.parse()?;

        let mutation = DataMutation::new(entity, operation, data).with_options(MutationOptions {
            cascade: false,
            validate_relations: true,
            audit_trail: true,
            actor: Some(context.user_id.clone()),
        });
        let result = self.hub.mutate(&mutation).inspect_err(|e| {
            warn!(
                module = %context.module,
                entity,
                operation = %operation,
                error = %e,
                "module update failed"
            );
        })?;

        self.hub.events().publish(HubEvent::CrossModuleUpdate {
            source_module: context.module.clone(),
            entity: entity.to_string(),
            operation,
            result: result.clone(),
            timestamp: now_millis(),
        });

        self.behavior
            .record(&context.user_id, &context.module, &context.action);
        let mut update = ContextState::new();
        update.insert("lastMutation".into(), operation.as_str().into());
        update.insert("lastMutationEntity".into(), entity.into());
        if let Some(id) = result.record_id() {
            update.insert("lastMutationId".into(), id.into());
        }
        self.merge_context(&context.user_id, &context.module, update);
        Ok(result)
    }

    // =========================================================================
    // SEARCH
    // =========================================================================

    /// Search every entity of the caller's module, or an explicit subset of
    /// registered entities. Per-entity failures are logged and skipped.
    pub fn search_across_modules(
        &self,
        context: &DataContext,
        term: &str,
        options: &SearchOptions,
    ) -> Result<SearchResults, HubError> {
        let requirements = self.modules.require(&context.module)?;
        self.policy
            .check(&context.user_role, &requirements.permissions)?;
        if term.trim().is_empty() {
            return Err(HubError::InvalidQuery("search term is empty".to_string()));
        }
        let preferences = self.effective_preferences(context);
        let limit = options.limit.unwrap_or(preferences.default_page_size);

        let searched: Vec<String> = match &options.entities {
            Some(explicit) => explicit
                .iter()
                .filter(|e| self.hub.registry().contains(e))
                .cloned()
                .collect(),
            None => requirements
                .entities()
                .into_iter()
                .map(String::from)
                .collect(),
        };

        let mut results = BTreeMap::new();
        for entity in &searched {
            match self.hub.search(entity, term, options.fuzzy, limit) {
                Ok(mut hits) if !hits.is_empty() => {
                    for hit in &mut hits {
                        strip_hidden(
                            std::slice::from_mut(&mut hit.record),
                            &preferences.hidden_fields,
                        );
                    }
                    results.insert(
                        entity.clone(),
                        EntityHits {
                            count: hits.len(),
                            hits,
                        },
                    );
                }
                Ok(_) => {}
                Err(e) => warn!(entity = %entity, error = %e, "entity search skipped"),
            }
        }
        let total_found = results.values().map(|h| h.count).sum();
        debug!(module = %context.module, total_found, "cross-module search");
        Ok(SearchResults {
            term: term.to_string(),
            results,
            total_found,
            searched,
        })
    }

    // =========================================================================
    // ANALYTICS
    // =========================================================================

    /// Count each primary entity by the module's dimensions and derive
    /// insights.
    pub fn get_module_analytics(
        &self,
        context: &DataContext,
        time_range: Option<TimeRange>,
    ) -> Result<ModuleAnalytics, HubError> {
        let requirements = self.modules.require(&context.module)?;
        self.policy
            .check(&context.user_role, &requirements.permissions)?;

        let run = |range: Option<TimeRange>| -> Result<Vec<AnalyticsResult>, HubError> {
            requirements
                .primary
                .iter()
                .map(|entity| {
                    let mut query =
                        AnalyticsQuery::count_by(entity.as_str(), requirements.dimensions.clone());
                    query.time_range = range.clone();
                    self.hub.analytics(&query)
                })
                .collect()
        };
        let current = run(time_range.clone())?;
        let previous = match time_range.as_ref().and_then(previous_range) {
            Some(range) => run(Some(range))?,
            None => Vec::new(),
        };

        let generator = self
            .insights
            .get(&context.module)
            .unwrap_or(&self.default_insights);
        let insights = generator.generate(&InsightInput {
            module: requirements,
            current: &current,
            previous: &previous,
        });

        Ok(ModuleAnalytics {
            analytics: current,
            insights,
            metadata: AnalyticsMetadata {
                module: context.module.clone(),
                dimensions: requirements.dimensions.clone(),
                time_range,
                generated_at: now_millis(),
            },
        })
    }
}
