//! # Hub Primitives
//!
//! Hardcoded constants for the LexHub data hub.
//!
//! Values that operators may tune live in [`crate::HubConfig`]; the ones here
//! are part of the hub's contract and do not change at runtime.

/// Default time-to-live for cached query results, in seconds.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Analytics results live this many times longer than query results.
///
/// Aggregations are more expensive and less volatile than row reads.
pub const ANALYTICS_TTL_MULTIPLIER: u64 = 2;

/// Time-to-live for relationship side-index entries (24 hours).
pub const RELATIONSHIP_TTL_SECS: u64 = 24 * 60 * 60;

/// Time-to-live for contextual data assembled by the hub (30 minutes).
pub const CONTEXT_TTL_SECS: u64 = 30 * 60;

/// Longest lifetime any cache entry may be given (7 days).
pub const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// The in-process cache drops expired entries once per this many writes.
pub const CACHE_SWEEP_INTERVAL: u64 = 64;

/// Default page size when a caller does not supply one.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Upper bound on secondary-entity fetches made for module context.
pub const SECONDARY_PAGE_CAP: usize = 10;

/// Hard ceiling on any single query's `limit`.
///
/// All reads must be bounded.
pub const MAX_QUERY_LIMIT: usize = 1000;

/// Number of hex characters of the BLAKE3 digest kept in cache keys.
pub const KEY_HASH_LEN: usize = 16;

/// Maximum relation path depth (`cases.documents` is depth 2).
pub const MAX_RELATION_DEPTH: usize = 4;

/// Maximum depth followed by cascading deletes.
pub const MAX_CASCADE_DEPTH: usize = 8;

/// Entity name under which audit records are written.
pub const AUDIT_ENTITY: &str = "AuditLog";

/// Characters that may not appear in entity names because cache-key
/// patterns use them.
pub const RESERVED_NAME_CHARS: &[char] = &['|', '*', '?', ':'];
