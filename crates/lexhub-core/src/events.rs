//! # Data Events
//!
//! What the hub announces after reads, writes and relationship hints.
//!
//! Publishing is fire-and-forget: a sink never reports back and the hub
//! never waits for subscribers. The app layer plugs in a broadcast bus;
//! the core only ships a no-op sink and a recording sink for tests and
//! embedding.

use crate::mutation::{MutationOp, MutationResult};
use crate::relationship::DataRelationship;
use crate::now_millis;
use serde::{Deserialize, Serialize};
use parking_lot::Mutex;

/// Every event kind the hub and the context layer emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum HubEvent {
    /// A query or analytics call returned.
    #[serde(rename = "data.accessed")]
    Accessed {
        entity: String,
        result_count: usize,
        latency_ms: f64,
        cached: bool,
        timestamp: i64,
    },

    /// A mutation committed.
    #[serde(rename = "data.mutated")]
    Mutated {
        entity: String,
        operation: MutationOp,
        id: Option<String>,
        /// Entities whose cache entries were invalidated.
        invalidated: Vec<String>,
        timestamp: i64,
    },

    /// A relationship hint was recorded.
    #[serde(rename = "data.relationship.created")]
    RelationshipCreated {
        relationship: DataRelationship,
        timestamp: i64,
    },

    /// A module changed data other modules may be showing.
    #[serde(rename = "data.cross-module.update")]
    CrossModuleUpdate {
        source_module: String,
        entity: String,
        operation: MutationOp,
        result: MutationResult,
        timestamp: i64,
    },

    /// Real-time push after a mutation, when enabled.
    #[serde(rename = "data.realtime.sync")]
    RealtimeSync {
        entity: String,
        operation: MutationOp,
        id: Option<String>,
        timestamp: i64,
    },
}

impl HubEvent {
    #[must_use]
    pub fn accessed(entity: &str, result_count: usize, latency_ms: f64, cached: bool) -> Self {
        Self::Accessed {
            entity: entity.to_string(),
            result_count,
            latency_ms,
            cached,
            timestamp: now_millis(),
        }
    }

    /// Wire name of the event kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Accessed { .. } => "data.accessed",
            Self::Mutated { .. } => "data.mutated",
            Self::RelationshipCreated { .. } => "data.relationship.created",
            Self::CrossModuleUpdate { .. } => "data.cross-module.update",
            Self::RealtimeSync { .. } => "data.realtime.sync",
        }
    }

    /// Entity the event is about.
    #[must_use]
    pub fn entity(&self) -> &str {
        match self {
            Self::Accessed { entity, .. }
            | Self::Mutated { entity, .. }
            | Self::CrossModuleUpdate { entity, .. }
            | Self::RealtimeSync { entity, .. } => entity,
            Self::RelationshipCreated { relationship, .. } => &relationship.from_entity,
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Accessed { timestamp, .. }
            | Self::Mutated { timestamp, .. }
            | Self::RelationshipCreated { timestamp, .. }
            | Self::CrossModuleUpdate { timestamp, .. }
            | Self::RealtimeSync { timestamp, .. } => *timestamp,
        }
    }
}

// =============================================================================
// SINKS
// =============================================================================

/// Destination for hub events.
pub trait EventSink: Send + Sync {
    /// Hand an event off. Must not block and must not fail the caller.
    fn publish(&self, event: HubEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: HubEvent) {}
}

/// Keeps every event in memory, in publish order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<HubEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    #[must_use]
    pub fn events(&self) -> Vec<HubEvent> {
        self.events.lock().clone()
    }

    /// Number of published events with the given wire name.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: HubEvent) {
        self.events.lock().push(event);
    }
}
