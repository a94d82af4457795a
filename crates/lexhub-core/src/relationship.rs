//! Relationship hints.
//!
//! A hint records that two records are related beyond what the schema
//! declares. Hints live in the cache with a long TTL and are never a source
//! of truth.

use crate::Fields;
use serde::{Deserialize, Serialize};

/// A directed relationship between two records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRelationship {
    pub from_entity: String,
    pub from_id: String,
    pub to_entity: String,
    pub to_id: String,
    /// Free-form relation label, e.g. `cites` or `supersedes`.
    pub kind: String,
    #[serde(default)]
    pub metadata: Fields,
}

impl DataRelationship {
    #[must_use]
    pub fn new(from: (&str, &str), kind: &str, to: (&str, &str)) -> Self {
        Self {
            from_entity: from.0.to_string(),
            from_id: from.1.to_string(),
            to_entity: to.0.to_string(),
            to_id: to.1.to_string(),
            kind: kind.to_string(),
            metadata: Fields::new(),
        }
    }
}
