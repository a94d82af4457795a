//! # Data Hub
//!
//! The single mediating layer between application modules and storage.
//!
//! ## Responsibilities
//!
//! - Read-through caching of queries, analytics and contextual data
//! - Relation joins with left-outer semantics
//! - Atomic mutations followed by coarse, entity-scoped invalidation
//! - Running performance metrics and data events
//!
//! ## Ordering Guarantee
//!
//! For every mutation: commit, then invalidation, then events, then return.
//! A caller that sees a successful mutation never reads a stale cached value
//! for the mutated entities afterwards.
//!
//! ## Failure Policy
//!
//! Storage and validation errors reach the caller unchanged. Cache errors are
//! logged and degrade to misses or no-ops.

mod join;
mod search;
mod write;

pub use search::{MatchRank, SearchHit};

use crate::analytics::{AnalyticsQuery, AnalyticsResult};
use crate::cache::{CacheKeys, CacheStore, MemoryCache};
use crate::config::HubConfig;
use crate::context::DataContext;
use crate::events::{EventSink, HubEvent, NullSink};
use crate::metrics::{HubMetrics, PerformanceMetrics};
use crate::modules::ModuleRegistry;
use crate::mutation::{DataMutation, MutationResult};
use crate::primitives::{CONTEXT_TTL_SECS, RELATIONSHIP_TTL_SECS, SECONDARY_PAGE_CAP};
use crate::query::DataQuery;
use crate::relationship::DataRelationship;
use crate::schema::EntityRegistry;
use crate::storage::{RecordStore, StoreTxn};
use crate::{HubError, Record};
use join::Scans;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Contextual data: entity name to records.
pub type ContextualData = BTreeMap<String, Vec<Record>>;

/// Builds the generic contextual payload behind
/// [`DataHub::get_contextual_data`].
pub trait ContextAssembler: Send + Sync {
    /// Every entity whose records may appear in the assembled data.
    fn entities(&self, context: &DataContext) -> Result<BTreeSet<String>, HubError>;

    /// Assemble the data, reading through the hub.
    fn assemble(&self, hub: &DataHub, context: &DataContext) -> Result<ContextualData, HubError>;
}

/// Default assembler: one page of each module entity, narrowed by the
/// context's filters.
#[derive(Debug, Clone)]
pub struct RequirementsAssembler {
    modules: Arc<ModuleRegistry>,
}

impl RequirementsAssembler {
    #[must_use]
    pub fn new(modules: Arc<ModuleRegistry>) -> Self {
        Self { modules }
    }
}

impl ContextAssembler for RequirementsAssembler {
    fn entities(&self, context: &DataContext) -> Result<BTreeSet<String>, HubError> {
        let requirements = self.modules.require(&context.module)?;
        Ok(requirements
            .entities()
            .into_iter()
            .map(String::from)
            .collect())
    }

    fn assemble(&self, hub: &DataHub, context: &DataContext) -> Result<ContextualData, HubError> {
        let requirements = self.modules.require(&context.module)?;
        let page = context
            .preferences
            .as_ref()
            .map_or(hub.config().default_page_size, |p| p.default_page_size);

        let mut data = ContextualData::new();
        for entity in &requirements.primary {
            let mut query = DataQuery::new(entity.as_str()).limit(page);
            if let Some(filters) = &context.filters {
                query.filters = filters.clone();
            }
            data.insert(entity.clone(), hub.query(&query)?);
        }
        for entity in &requirements.secondary {
            if data.contains_key(entity) {
                continue;
            }
            let query = DataQuery::new(entity.as_str()).limit(page.min(SECONDARY_PAGE_CAP));
            data.insert(entity.clone(), hub.query(&query)?);
        }
        Ok(data)
    }
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

// =============================================================================
// DATA HUB
// =============================================================================

/// Unified query, mutation and analytics engine.
pub struct DataHub {
    config: HubConfig,
    registry: EntityRegistry,
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn CacheStore>,
    keys: CacheKeys,
    events: Arc<dyn EventSink>,
    metrics: Arc<HubMetrics>,
    assembler: Arc<dyn ContextAssembler>,
}

impl std::fmt::Debug for DataHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataHub")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl DataHub {
    /// Create a hub over `store` with an in-process cache, no event
    /// subscribers and the standard module assembler.
    #[must_use]
    pub fn new(config: HubConfig, registry: EntityRegistry, store: Arc<dyn RecordStore>) -> Self {
        let keys = CacheKeys::new(config.namespace.clone());
        Self {
            config,
            registry,
            store,
            cache: Arc::new(MemoryCache::new()),
            keys,
            events: Arc::new(NullSink),
            metrics: Arc::new(HubMetrics::new()),
            assembler: Arc::new(RequirementsAssembler::new(Arc::new(
                ModuleRegistry::standard(),
            ))),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn with_assembler(mut self, assembler: Arc<dyn ContextAssembler>) -> Self {
        self.assembler = assembler;
        self
    }

    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    #[must_use]
    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    /// The event sink, for layers that publish on the hub's behalf.
    #[must_use]
    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    // =========================================================================
    // CACHE PLUMBING
    // =========================================================================

    fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    fn cache_put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "cache value not serializable, skipping write");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, bytes, ttl) {
            warn!(key, error = %e, "cache write failed");
        }
    }

    /// Drop every cached value that may hold data of `entity`.
    fn invalidate(&self, entity: &str) -> usize {
        let pattern = self.keys.entity_pattern(entity);
        match self.cache.delete_matching(&pattern) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(entity, error = %e, "cache invalidation failed");
                0
            }
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Run a query, reading through the cache unless `cache` is off.
    ///
    /// A read that overlaps a mutation of the same entity may store its
    /// pre-mutation result after that mutation's invalidation ran. The stale
    /// entry lives until its TTL or the next write to the entity.
    pub fn query(&self, query: &DataQuery) -> Result<Vec<Record>, HubError> {
        let started = Instant::now();
        self.metrics.record_request();
        query.validate()?;
        let touched = self
            .registry
            .touched_entities(&query.entity, &query.relations)?;

        let key = query.cache.then(|| self.keys.query(query, &touched));
        if let Some(key) = &key {
            if let Some(records) = self.cache_get::<Vec<Record>>(key) {
                self.metrics.record_hit();
                self.events.publish(HubEvent::accessed(
                    &query.entity,
                    records.len(),
                    millis(started.elapsed()),
                    true,
                ));
                return Ok(records);
            }
            self.metrics.record_miss();
        }

        let mut scans = Scans::new(self.store.as_ref());
        let page = query.apply(scans.get(&query.entity)?.to_vec());
        let records = self.join(page, &query.entity, &query.relations, &mut scans)?;

        let elapsed = started.elapsed();
        self.metrics.record_execution(elapsed);
        if let Some(key) = &key {
            let ttl = query
                .cache_ttl
                .map_or_else(|| self.config.default_ttl(), Duration::from_secs);
            self.cache_put(key, &records, ttl);
        }
        debug!(
            entity = %query.entity,
            count = records.len(),
            latency_ms = millis(elapsed),
            "query executed"
        );
        self.events.publish(HubEvent::accessed(
            &query.entity,
            records.len(),
            millis(elapsed),
            false,
        ));
        Ok(records)
    }

    /// Aggregate an entity. Always cache-first, with the longer analytics TTL.
    pub fn analytics(&self, query: &AnalyticsQuery) -> Result<AnalyticsResult, HubError> {
        let started = Instant::now();
        self.metrics.record_request();
        self.registry.get(&query.entity)?;
        let touched = BTreeSet::from([query.entity.clone()]);
        let key = self.keys.analytics(query, &touched);

        if let Some(result) = self.cache_get::<AnalyticsResult>(&key) {
            self.metrics.record_hit();
            self.events.publish(HubEvent::accessed(
                &query.entity,
                result.rows.len(),
                millis(started.elapsed()),
                true,
            ));
            return Ok(result);
        }
        self.metrics.record_miss();

        let records = self.store.scan(&query.entity)?;
        let result = query.aggregate(&records);
        let elapsed = started.elapsed();
        self.metrics.record_execution(elapsed);
        self.cache_put(&key, &result, self.config.analytics_ttl());
        debug!(
            entity = %query.entity,
            rows = result.rows.len(),
            latency_ms = millis(elapsed),
            "analytics executed"
        );
        self.events.publish(HubEvent::accessed(
            &query.entity,
            result.rows.len(),
            millis(elapsed),
            false,
        ));
        Ok(result)
    }

    /// Generic contextual fetch, cached for 30 minutes.
    pub fn get_contextual_data(&self, context: &DataContext) -> Result<ContextualData, HubError> {
        let touched = self.assembler.entities(context)?;
        let key = self.keys.context(context, &touched);
        if let Some(data) = self.cache_get::<ContextualData>(&key) {
            return Ok(data);
        }
        let data = self.assembler.assemble(self, context)?;
        self.cache_put(&key, &data, Duration::from_secs(CONTEXT_TTL_SECS));
        Ok(data)
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Apply a mutation inside one transaction.
    ///
    /// On success the touched entities' cache entries are gone before this
    /// returns. On failure nothing was written and the error is returned
    /// unchanged.
    pub fn mutate(&self, mutation: &DataMutation) -> Result<MutationResult, HubError> {
        self.registry.get(&mutation.entity)?;
        let report = self
            .store
            .transact(&mut |txn: &mut dyn StoreTxn| self.apply_mutation(txn, mutation))
            .inspect_err(|e| {
                warn!(
                    entity = %mutation.entity,
                    operation = %mutation.operation,
                    error = %e,
                    "mutation rolled back"
                );
            })?;
        self.metrics.record_mutation();

        let mut removed = 0;
        for entity in &report.touched {
            removed += self.invalidate(entity);
        }
        debug!(
            entity = %mutation.entity,
            operation = %mutation.operation,
            invalidated = removed,
            "mutation committed"
        );

        if mutation.options.audit_trail {
            self.write_audit(mutation, &report.result);
        }

        let id = report
            .result
            .record_id()
            .map(String::from)
            .or_else(|| mutation.target_id());
        self.events.publish(HubEvent::Mutated {
            entity: mutation.entity.clone(),
            operation: mutation.operation,
            id: id.clone(),
            invalidated: report.touched.iter().cloned().collect(),
            timestamp: crate::now_millis(),
        });
        if self.config.real_time_sync {
            self.events.publish(HubEvent::RealtimeSync {
                entity: mutation.entity.clone(),
                operation: mutation.operation,
                id,
                timestamp: crate::now_millis(),
            });
        }
        Ok(report.result)
    }

    // =========================================================================
    // RELATIONSHIP HINTS
    // =========================================================================

    /// Record a relationship hint for 24 hours. Best effort: a cache failure
    /// is logged and the call still succeeds.
    pub fn create_relationship(&self, relationship: &DataRelationship) -> Result<(), HubError> {
        self.registry.get(&relationship.from_entity)?;
        self.registry.get(&relationship.to_entity)?;
        let key = self.keys.relationship(
            &relationship.from_entity,
            &relationship.from_id,
            &relationship.kind,
            &relationship.to_entity,
            &relationship.to_id,
        );
        self.cache_put(
            &key,
            relationship,
            Duration::from_secs(RELATIONSHIP_TTL_SECS),
        );
        self.events.publish(HubEvent::RelationshipCreated {
            relationship: relationship.clone(),
            timestamp: crate::now_millis(),
        });
        Ok(())
    }

    /// Live relationship hints originating at a record.
    pub fn relationships_of(
        &self,
        entity: &str,
        id: &str,
    ) -> Result<Vec<DataRelationship>, HubError> {
        self.registry.get(entity)?;
        let pattern = self.keys.relationships_from(entity, id);
        let keys = match self.cache.keys(&pattern) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(entity, id, error = %e, "relationship lookup failed");
                return Ok(Vec::new());
            }
        };
        Ok(keys
            .iter()
            .filter_map(|key| self.cache_get::<DataRelationship>(key))
            .collect())
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Snapshot of the running counters.
    #[must_use]
    pub fn get_performance_metrics(&self) -> PerformanceMetrics {
        self.metrics.snapshot()
    }

    /// Delete cache keys matching `pattern`, or every hub-owned key.
    pub fn clear_cache(&self, pattern: Option<&str>) -> usize {
        let pattern = pattern.map_or_else(|| self.keys.namespace_pattern(), String::from);
        match self.cache.delete_matching(&pattern) {
            Ok(removed) => {
                debug!(pattern = %pattern, removed, "cache cleared");
                removed
            }
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "cache clear failed");
                0
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
