//! # Mutation Types
//!
//! Write requests for the hub. Every mutation runs inside exactly one
//! store transaction; see [`crate::DataHub::mutate`] for the ordering of
//! commit, invalidation and events.

use crate::{Fields, HubError, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// The four supported write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOp {
    Create,
    Update,
    Delete,
    Upsert,
}

impl MutationOp {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Upsert => "upsert",
        }
    }
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationOp {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "upsert" => Ok(Self::Upsert),
            _ => Err(HubError::UnsupportedOperation(s.to_string())),
        }
    }
}

/// Per-mutation switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOptions {
    /// Delete HasMany children along with the record.
    #[serde(default)]
    pub cascade: bool,
    /// Check that BelongsTo references in the payload exist.
    #[serde(default)]
    pub validate_relations: bool,
    /// Append an audit record after commit.
    #[serde(default)]
    pub audit_trail: bool,
    /// Who is mutating, recorded in the audit trail.
    #[serde(default)]
    pub actor: Option<String>,
}

/// A write request against one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMutation {
    pub entity: String,
    pub operation: MutationOp,
    /// Target id. Falls back to a textual `id` field in the payload.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "data")]
    pub payload: Fields,
    #[serde(default)]
    pub options: MutationOptions,
}

impl DataMutation {
    #[must_use]
    pub fn new(entity: impl Into<String>, operation: MutationOp, payload: Fields) -> Self {
        Self {
            entity: entity.into(),
            operation,
            id: None,
            payload,
            options: MutationOptions::default(),
        }
    }

    #[must_use]
    pub fn create(entity: impl Into<String>, payload: Fields) -> Self {
        Self::new(entity, MutationOp::Create, payload)
    }

    #[must_use]
    pub fn update(entity: impl Into<String>, id: impl Into<String>, payload: Fields) -> Self {
        Self::new(entity, MutationOp::Update, payload).with_id(id)
    }

    #[must_use]
    pub fn delete(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(entity, MutationOp::Delete, Fields::new()).with_id(id)
    }

    #[must_use]
    pub fn upsert(entity: impl Into<String>, id: impl Into<String>, payload: Fields) -> Self {
        Self::new(entity, MutationOp::Upsert, payload).with_id(id)
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: MutationOptions) -> Self {
        self.options = options;
        self
    }

    /// The addressed id: explicit `id`, else the payload's textual `id`.
    #[must_use]
    pub fn target_id(&self) -> Option<String> {
        self.id
            .clone()
            .or_else(|| self.payload.get("id").and_then(|v| v.as_str()).map(String::from))
    }

    /// Payload without the `id` key, which lives on the record itself.
    #[must_use]
    pub fn fields(&self) -> Fields {
        let mut fields = self.payload.clone();
        fields.remove("id");
        fields
    }
}

/// What a successful mutation returns to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MutationResult {
    /// The created, updated or upserted record as re-read after the write.
    Record { record: Record },
    /// Number of records removed, cascaded children included.
    Deleted { count: usize },
}

impl MutationResult {
    /// Id of the affected record, if the result carries one.
    #[must_use]
    pub fn record_id(&self) -> Option<&str> {
        match self {
            Self::Record { record } => Some(&record.id),
            Self::Deleted { .. } => None,
        }
    }
}

/// Transaction output: the result plus every entity the body wrote to.
///
/// `touched` drives cache invalidation, so cascades that reach into other
/// entities must record them here.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationReport {
    pub result: MutationResult,
    pub touched: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldValue;

    #[test]
    fn operations_parse_case_insensitively() {
        assert_eq!("CREATE".parse::<MutationOp>().expect("op"), MutationOp::Create);
        assert_eq!(" upsert ".parse::<MutationOp>().expect("op"), MutationOp::Upsert);
    }

    #[test]
    fn archive_is_unsupported() {
        let err = "archive".parse::<MutationOp>().expect_err("unsupported");
        assert!(matches!(err, HubError::UnsupportedOperation(ref op) if op == "archive"));
    }

    #[test]
    fn target_id_falls_back_to_payload() {
        let mut payload = Fields::new();
        payload.insert("id".into(), FieldValue::text("c9"));
        let mutation = DataMutation::new("Client", MutationOp::Update, payload);
        assert_eq!(mutation.target_id().as_deref(), Some("c9"));
        assert!(!mutation.fields().contains_key("id"));
    }

    #[test]
    fn mutation_decodes_data_alias() {
        let json = r#"{"entity":"Case","operation":"create","data":{"clientId":"c1","title":"Matter A"}}"#;
        let mutation: DataMutation = serde_json::from_str(json).expect("parse");
        assert_eq!(mutation.operation, MutationOp::Create);
        assert_eq!(mutation.payload["title"], FieldValue::text("Matter A"));
        assert!(!mutation.options.audit_trail);
    }
}
