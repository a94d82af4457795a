//! Relation joins.
//!
//! Joins run in the hub, after filtering and pagination, so every store
//! backend only needs full-entity scans. Each entity is scanned at most once
//! per query.

use super::DataHub;
use crate::schema::{Relation, RelationKind};
use crate::storage::RecordStore;
use crate::{FieldValue, HubError, Record};
use std::collections::BTreeMap;

/// Per-execution scan memo.
pub(super) struct Scans<'a> {
    store: &'a dyn RecordStore,
    tables: BTreeMap<String, Vec<Record>>,
}

impl<'a> Scans<'a> {
    pub(super) fn new(store: &'a dyn RecordStore) -> Self {
        Self {
            store,
            tables: BTreeMap::new(),
        }
    }

    pub(super) fn get(&mut self, entity: &str) -> Result<&[Record], HubError> {
        if !self.tables.contains_key(entity) {
            let records = self.store.scan(entity)?;
            self.tables.insert(entity.to_string(), records);
        }
        Ok(self
            .tables
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }
}

/// Records of `relation.target` linked to any of `sources`, in id order.
fn follow(
    sources: &[Record],
    relation: &Relation,
    scans: &mut Scans<'_>,
) -> Result<Vec<Record>, HubError> {
    let targets = scans.get(&relation.target)?;
    let mut linked: BTreeMap<&str, &Record> = BTreeMap::new();
    match &relation.kind {
        RelationKind::BelongsTo { local_field } => {
            let wanted: Vec<&str> = sources
                .iter()
                .filter_map(|s| s.fields.get(local_field).and_then(FieldValue::as_str))
                .collect();
            for target in targets {
                if wanted.contains(&target.id.as_str()) {
                    linked.insert(&target.id, target);
                }
            }
        }
        RelationKind::HasMany { foreign_field } => {
            for target in targets {
                let owner = target.fields.get(foreign_field).and_then(FieldValue::as_str);
                if owner.is_some_and(|owner| sources.iter().any(|s| s.id == owner)) {
                    linked.insert(&target.id, target);
                }
            }
        }
    }
    Ok(linked.into_values().cloned().collect())
}

impl DataHub {
    /// Attach `related[path]` to every record. A record with nothing on the
    /// other side still gets an empty list.
    pub(super) fn join(
        &self,
        mut records: Vec<Record>,
        entity: &str,
        relations: &[String],
        scans: &mut Scans<'_>,
    ) -> Result<Vec<Record>, HubError> {
        for path in relations {
            let chain = self.registry.resolve_path(entity, path)?;
            for record in &mut records {
                let mut frontier = vec![Record {
                    related: BTreeMap::new(),
                    ..record.clone()
                }];
                for relation in &chain {
                    if frontier.is_empty() {
                        break;
                    }
                    frontier = follow(&frontier, relation, scans)?;
                }
                record.related.insert(path.clone(), frontier);
            }
        }
        Ok(records)
    }
}
