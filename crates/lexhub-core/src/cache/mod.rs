//! # Cache Store
//!
//! Key/value side-cache with TTL in front of the primary store.
//!
//! The hub only ever talks to the [`CacheStore`] contract. Failures surface
//! as [`CacheError`] and the hub turns them into logged misses or no-ops;
//! a cache outage never fails a request.
//!
//! Patterns use glob syntax (`globset`): `*` matches any run of characters,
//! `?` one character, and `\\` escapes the next one.

mod keys;
mod memory;

pub use keys::{CacheKeys, KeyKind};
pub use memory::MemoryCache;

use globset::{GlobBuilder, GlobMatcher};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached or its state is unusable.
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    /// The key pattern is not valid glob syntax.
    #[error("invalid key pattern: {0}")]
    InvalidPattern(String),
}

/// Contract every cache backend fulfils.
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry. Expired entries read as absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store an entry that expires after `ttl`.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Delete every key matching `pattern`. Returns how many were removed.
    fn delete_matching(&self, pattern: &str) -> Result<usize, CacheError>;

    /// List live keys matching `pattern`.
    fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;
}

/// A compiled key pattern.
///
/// `*` crosses every character, including `:` and `|`.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    matcher: GlobMatcher,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Result<Self, CacheError> {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map_err(|e| CacheError::InvalidPattern(e.to_string()))?;
        Ok(Self {
            matcher: glob.compile_matcher(),
        })
    }

    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.matcher.is_match(key)
    }
}
