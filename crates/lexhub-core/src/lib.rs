//! # lexhub-core
//!
//! The centralized data-access hub for LexHub - THE LOGIC.
//!
//! Every application module reads and writes through one [`DataHub`] instead
//! of talking to storage directly. The hub unifies querying, mutation,
//! caching, relationship hints and analytics behind one contract.
//!
//! ## Architectural Constraints
//!
//! - Synchronous: NO async, NO network dependencies
//! - The cache is a side-cache: a cache failure is a miss, never an error
//! - Mutations are atomic: commit happens-before invalidation and events
//! - Registries (entities, modules, roles) are built once and never mutated
//!
//! ## Layers Outside This Crate
//!
//! The context provider, module adapters, HTTP API and CLI live in the
//! `lexhub` application crate and consume this one.

// =============================================================================
// MODULES
// =============================================================================

pub mod access;
pub mod analytics;
pub mod cache;
pub mod config;
pub mod context;
pub mod events;
pub mod hub;
pub mod metrics;
pub mod modules;
pub mod mutation;
pub mod primitives;
pub mod query;
pub mod relationship;
pub mod schema;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CREATED_AT_FIELD, FieldValue, Fields, HubError, ID_FIELD, Record, UPDATED_AT_FIELD,
    now_millis,
};

// =============================================================================
// RE-EXPORTS: Requests
// =============================================================================

pub use analytics::{Aggregation, AnalyticsQuery, AnalyticsResult, AnalyticsRow, TimeRange};
pub use context::{DataContext, UserPreferences};
pub use mutation::{DataMutation, MutationOp, MutationOptions, MutationResult};
pub use query::{Comparator, DataQuery, Direction, Filter, Filters, OrderBy};
pub use relationship::DataRelationship;

// =============================================================================
// RE-EXPORTS: Hub and Collaborators
// =============================================================================

pub use access::AccessPolicy;
pub use cache::{CacheError, CacheKeys, CacheStore, MemoryCache};
pub use config::HubConfig;
pub use events::{EventSink, HubEvent, MemorySink, NullSink};
pub use hub::{
    ContextAssembler, ContextualData, DataHub, MatchRank, RequirementsAssembler, SearchHit,
};
pub use metrics::{HubMetrics, PerformanceMetrics};
pub use modules::{CacheStrategy, ModuleRegistry, ModuleRequirements};
pub use schema::{EntityRegistry, EntitySchema, Relation, RelationKind};
pub use storage::{MemoryStore, RecordStore, RedbStore, StoreTxn, TxnBody};
