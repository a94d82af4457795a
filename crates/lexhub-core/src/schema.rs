//! # Entity Schema Registry
//!
//! Explicit registration of the entities the hub may read and write.
//!
//! An entity name is only a lookup key: the registry knows each entity's
//! relations so the hub can join, validate references, cascade deletes and
//! compute which cache keys a mutation must invalidate. Field schemas are
//! the store's business, not the hub's.

use crate::HubError;
use crate::primitives::{AUDIT_ENTITY, MAX_RELATION_DEPTH, RESERVED_NAME_CHARS};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// RELATIONS
// =============================================================================

/// How a relation links two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RelationKind {
    /// This record holds the target's id in `local_field`.
    BelongsTo { local_field: String },
    /// Target records hold this record's id in `foreign_field`.
    HasMany { foreign_field: String },
}

/// A named relation from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub target: String,
    pub kind: RelationKind,
}

impl Relation {
    #[must_use]
    pub fn belongs_to(name: &str, target: &str, local_field: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            kind: RelationKind::BelongsTo {
                local_field: local_field.to_string(),
            },
        }
    }

    #[must_use]
    pub fn has_many(name: &str, target: &str, foreign_field: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            kind: RelationKind::HasMany {
                foreign_field: foreign_field.to_string(),
            },
        }
    }
}

/// Registered shape of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl EntitySchema {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            relations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Look up a relation by name.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Registry of every entity the hub serves.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    schemas: BTreeMap<String, EntitySchema>,
}

impl EntityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity.
    ///
    /// Names may not contain key-pattern characters; relation targets are
    /// checked lazily when a path is resolved.
    pub fn register(&mut self, schema: EntitySchema) -> Result<(), HubError> {
        if schema.name.is_empty() || schema.name.contains(RESERVED_NAME_CHARS) {
            return Err(HubError::InvalidSchema(format!(
                "entity name '{}' is empty or contains a reserved character",
                schema.name
            )));
        }
        self.schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    /// Fetch a schema or fail with `EntityNotRegistered`.
    pub fn get(&self, entity: &str) -> Result<&EntitySchema, HubError> {
        self.schemas
            .get(entity)
            .ok_or_else(|| HubError::EntityNotRegistered(entity.to_string()))
    }

    #[must_use]
    pub fn contains(&self, entity: &str) -> bool {
        self.schemas.contains_key(entity)
    }

    /// Registered entity names in deterministic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Resolve a dotted relation path starting at `entity` into the chain of
    /// relations it walks.
    pub fn resolve_path(&self, entity: &str, path: &str) -> Result<Vec<&Relation>, HubError> {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() || segments.len() > MAX_RELATION_DEPTH {
            return Err(HubError::InvalidQuery(format!(
                "relation path '{}' must have 1..={} segments",
                path, MAX_RELATION_DEPTH
            )));
        }
        let mut current = self.get(entity)?;
        let mut chain = Vec::with_capacity(segments.len());
        for segment in segments {
            let relation = current.relation(segment).ok_or_else(|| {
                HubError::InvalidQuery(format!(
                    "unknown relation '{}' on {}",
                    segment, current.name
                ))
            })?;
            current = self.get(&relation.target)?;
            chain.push(relation);
        }
        Ok(chain)
    }

    /// Every entity whose data can appear in a read of `entity` joined with
    /// `relations`. Drives cache-key tagging.
    pub fn touched_entities(
        &self,
        entity: &str,
        relations: &[String],
    ) -> Result<BTreeSet<String>, HubError> {
        self.get(entity)?;
        let mut touched = BTreeSet::from([entity.to_string()]);
        for path in relations {
            for relation in self.resolve_path(entity, path)? {
                touched.insert(relation.target.clone());
            }
        }
        Ok(touched)
    }

    /// Entities and relations reached by cascading from `entity`, i.e. every
    /// HasMany relation declared on it.
    #[must_use]
    pub fn children_of(&self, entity: &str) -> Vec<&Relation> {
        self.schemas
            .get(entity)
            .map(|s| {
                s.relations
                    .iter()
                    .filter(|r| matches!(r.kind, RelationKind::HasMany { .. }))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The entity set of a legal practice: clients, matters and the records
    /// hanging off them, plus the audit log.
    #[must_use]
    pub fn legal_defaults() -> Self {
        let schemas = [
            EntitySchema::new("Organization").with(Relation::has_many(
                "clients",
                "Client",
                "organizationId",
            )),
            EntitySchema::new("Client")
                .with(Relation::belongs_to(
                    "organization",
                    "Organization",
                    "organizationId",
                ))
                .with(Relation::has_many("cases", "Case", "clientId"))
                .with(Relation::has_many("contracts", "Contract", "clientId")),
            EntitySchema::new("Case")
                .with(Relation::belongs_to("client", "Client", "clientId"))
                .with(Relation::has_many("documents", "Document", "caseId"))
                .with(Relation::has_many("tasks", "Task", "caseId"))
                .with(Relation::has_many("notes", "ResearchNote", "caseId")),
            EntitySchema::new("Document").with(Relation::belongs_to("case", "Case", "caseId")),
            EntitySchema::new("Contract")
                .with(Relation::belongs_to("client", "Client", "clientId")),
            EntitySchema::new("ResearchNote")
                .with(Relation::belongs_to("case", "Case", "caseId")),
            EntitySchema::new("Workflow").with(Relation::has_many("tasks", "Task", "workflowId")),
            EntitySchema::new("Task")
                .with(Relation::belongs_to("workflow", "Workflow", "workflowId"))
                .with(Relation::belongs_to("case", "Case", "caseId")),
            EntitySchema::new("Integration"),
            EntitySchema::new("Conversation").with(Relation::has_many(
                "messages",
                "Message",
                "conversationId",
            )),
            EntitySchema::new("Message").with(Relation::belongs_to(
                "conversation",
                "Conversation",
                "conversationId",
            )),
            EntitySchema::new(AUDIT_ENTITY),
        ];

        let mut registry = Self::new();
        for schema in schemas {
            registry.schemas.insert(schema.name.clone(), schema);
        }
        registry
    }
}

// =============================================================================
// TESTS
// =============================================================================
