//! # Core Type Definitions
//!
//! This module contains the value types every hub operation speaks:
//! - Field values (`FieldValue`) with numeric cross-type comparison
//! - Records (`Record`) carrying an explicit kind tag
//! - Error types (`HubError`)
//!
//! ## Kind Tags
//!
//! Every record that crosses the hub boundary names its entity in `kind`.
//! Consumers group and reshape results by that tag, never by inspecting
//! the concrete type of a value.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

// =============================================================================
// FIELD VALUES
// =============================================================================

/// A single field value inside a record payload.
///
/// Serialized untagged so the JSON form is the natural one
/// (`"ACTIVE"`, `42`, `[1, 2]`, `null`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Text helper.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Borrow the value as a string slice, if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value. Integers widen to `f64`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Compare two values of compatible kinds.
    ///
    /// Ints and floats compare numerically; text compares lexically;
    /// bools compare `false < true`. Anything else is incomparable.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Equality with numeric widening (`Int(2) == Float(2.0)`).
    #[must_use]
    pub fn loosely_equals(&self, other: &Self) -> bool {
        match self.compare(other) {
            Some(ordering) => ordering == Ordering::Equal,
            None => self == other,
        }
    }

    /// Ordering used for sorting: nulls first, then incomparable values
    /// keep their relative order.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A record payload: field name to value.
pub type Fields = BTreeMap<String, FieldValue>;

// =============================================================================
// RECORD
// =============================================================================

/// Pseudo-field exposing the record id to filters and ordering.
pub const ID_FIELD: &str = "id";
/// Pseudo-field exposing the creation timestamp (unix millis).
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Pseudo-field exposing the last-update timestamp (unix millis).
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// A stored record of some registered entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Entity name this record belongs to.
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub fields: Fields,
    pub created_at: i64,
    pub updated_at: i64,
    /// Joined records per relation path. Left-outer: present even when empty.
    #[serde(default)]
    pub related: BTreeMap<String, Vec<Record>>,
}

impl Record {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(kind: impl Into<String>, id: impl Into<String>, fields: Fields) -> Self {
        let now = now_millis();
        Self {
            kind: kind.into(),
            id: id.into(),
            fields,
            created_at: now,
            updated_at: now,
            related: BTreeMap::new(),
        }
    }

    /// Resolve a field by name, including the `id`/`createdAt`/`updatedAt`
    /// pseudo-fields.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Cow<'_, FieldValue>> {
        match name {
            ID_FIELD => Some(Cow::Owned(FieldValue::Text(self.id.clone()))),
            CREATED_AT_FIELD => Some(Cow::Owned(FieldValue::Int(self.created_at))),
            UPDATED_AT_FIELD => Some(Cow::Owned(FieldValue::Int(self.updated_at))),
            _ => self.fields.get(name).map(Cow::Borrowed),
        }
    }

    /// Text value of a field, if present and textual.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(FieldValue::as_str)
    }
}

/// Current wall-clock time in unix milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the hub.
///
/// Storage and permission errors propagate to callers unchanged so upstream
/// code can branch on the kind. Cache and background errors are absorbed at
/// their origin and only ever logged.
#[derive(Debug, Error)]
pub enum HubError {
    /// The entity has no registered storage accessor.
    #[error("Entity not registered: {0}")]
    EntityNotRegistered(String),

    /// Mutation operation outside create/update/delete/upsert.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The module has no entry in the requirements registry.
    #[error("Module not registered: {0}")]
    ModuleNotRegistered(String),

    /// The caller lacks a required permission. Deliberately carries no detail.
    #[error("Permission denied")]
    PermissionDenied,

    /// The record addressed by a mutation does not exist.
    #[error("Record not found: {entity}/{id}")]
    RecordNotFound { entity: String, id: String },

    /// A create collided with an existing id.
    #[error("Duplicate record: {entity}/{id}")]
    DuplicateRecord { entity: String, id: String },

    /// A payload field references a record that does not exist.
    #[error("Invalid reference: {entity}.{field} -> {target}")]
    InvalidReference {
        entity: String,
        field: String,
        target: String,
    },

    /// The query shape cannot be executed (unknown relation, bad operator).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The mutation is malformed (missing id for update/delete).
    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),

    /// A schema registration was rejected.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// The primary store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The cache could not be reached. Never surfaced to callers.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// A background prefetch failed. Never surfaced to callers.
    #[error("Prefetch failed: {0}")]
    PrefetchFailed(String),

    /// A cross-module notification failed. Never surfaced to callers.
    #[error("Notify failed: {0}")]
    NotifyFailed(String),
}

impl HubError {
    /// Stable snake_case identifier of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EntityNotRegistered(_) => "entity_not_registered",
            Self::UnsupportedOperation(_) => "unsupported_operation",
            Self::ModuleNotRegistered(_) => "module_not_registered",
            Self::PermissionDenied => "permission_denied",
            Self::RecordNotFound { .. } => "record_not_found",
            Self::DuplicateRecord { .. } => "duplicate_record",
            Self::InvalidReference { .. } => "invalid_reference",
            Self::InvalidQuery(_) => "invalid_query",
            Self::InvalidMutation(_) => "invalid_mutation",
            Self::InvalidSchema(_) => "invalid_schema",
            Self::Storage(_) => "storage",
            Self::Serialization(_) => "serialization",
            Self::CacheUnavailable(_) => "cache_unavailable",
            Self::PrefetchFailed(_) => "prefetch_failed",
            Self::NotifyFailed(_) => "notify_failed",
        }
    }
}

impl From<serde_json::Error> for HubError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_compare_across_kinds() {
        assert_eq!(
            FieldValue::Int(2).compare(&FieldValue::Float(2.5)),
            Some(Ordering::Less)
        );
        assert!(FieldValue::Int(3).loosely_equals(&FieldValue::Float(3.0)));
        assert_eq!(FieldValue::text("a").compare(&FieldValue::Int(1)), None);
    }

    #[test]
    fn nulls_sort_first() {
        assert_eq!(
            FieldValue::Null.sort_cmp(&FieldValue::Int(0)),
            Ordering::Less
        );
        assert_eq!(
            FieldValue::text("b").sort_cmp(&FieldValue::Null),
            Ordering::Greater
        );
    }

    #[test]
    fn untagged_json_round_trip_keeps_natural_shape() {
        let json = r#"{"status":"ACTIVE","rate":1.5,"hours":3,"tags":["a"],"closed":null}"#;
        let fields: Fields = serde_json::from_str(json).expect("parse");
        assert_eq!(fields["status"], FieldValue::text("ACTIVE"));
        assert_eq!(fields["hours"], FieldValue::Int(3));
        assert_eq!(fields["rate"], FieldValue::Float(1.5));
        assert_eq!(fields["closed"], FieldValue::Null);
        assert_eq!(
            fields["tags"],
            FieldValue::List(vec![FieldValue::text("a")])
        );
    }

    #[test]
    fn record_exposes_pseudo_fields() {
        let record = Record::new("Client", "c1", Fields::new());
        assert_eq!(
            record.field("id").as_deref(),
            Some(&FieldValue::text("c1"))
        );
        assert_eq!(
            record.field("createdAt").as_deref(),
            Some(&FieldValue::Int(record.created_at))
        );
        assert!(record.field("missing").is_none());
    }

    #[test]
    fn permission_denied_carries_no_detail() {
        assert_eq!(HubError::PermissionDenied.to_string(), "Permission denied");
        assert_eq!(HubError::PermissionDenied.kind(), "permission_denied");
    }
}
