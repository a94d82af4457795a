//! # Performance Metrics
//!
//! Running counters owned by one hub instance.
//!
//! Counters only ever grow; they reset when the hub is rebuilt. Every update
//! is a single relaxed atomic operation, so recording never contends with
//! request handling.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Injectable metrics component.
#[derive(Debug, Default)]
pub struct HubMetrics {
    total_queries: AtomicU64,
    executions: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    execution_micros: AtomicU64,
    mutations: AtomicU64,
}

impl HubMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A read (query or analytics) was requested.
    pub fn record_request(&self) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A read reached the primary store and took `elapsed`.
    pub fn record_execution(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.executions.fetch_add(1, Ordering::Relaxed);
        self.execution_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy with derived ratios.
    #[must_use]
    pub fn snapshot(&self) -> PerformanceMetrics {
        let total_queries = self.total_queries.load(Ordering::Relaxed);
        let query_count = self.executions.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let micros = self.execution_micros.load(Ordering::Relaxed);

        let cache_hit_ratio = if total_queries == 0 {
            0.0
        } else {
            cache_hits as f64 / total_queries as f64
        };
        let avg_query_time_ms = if query_count == 0 {
            0.0
        } else {
            micros as f64 / query_count as f64 / 1000.0
        };

        PerformanceMetrics {
            query_count,
            cache_hits,
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            total_queries,
            avg_query_time_ms,
            cache_hit_ratio,
            mutation_count: self.mutations.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot returned by `DataHub::get_performance_metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Reads executed against the primary store.
    pub query_count: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Every read requested, served from cache or not.
    pub total_queries: u64,
    /// Mean store latency over executed reads.
    pub avg_query_time_ms: f64,
    /// `cache_hits / total_queries`, or 0 before the first read.
    pub cache_hit_ratio: f64,
    pub mutation_count: u64,
}
