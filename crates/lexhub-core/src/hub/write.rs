//! Mutation bodies.
//!
//! Everything here runs inside one store transaction. Returning `Err` from
//! any step rolls the whole mutation back.

use super::DataHub;
use crate::mutation::{DataMutation, MutationOp, MutationReport, MutationResult};
use crate::primitives::{AUDIT_ENTITY, MAX_CASCADE_DEPTH};
use crate::schema::RelationKind;
use crate::storage::StoreTxn;
use crate::{FieldValue, Fields, HubError, Record, now_millis};
use std::collections::BTreeSet;
use tracing::warn;
use uuid::Uuid;

fn required_id(mutation: &DataMutation) -> Result<String, HubError> {
    mutation.target_id().ok_or_else(|| {
        HubError::InvalidMutation(format!(
            "{} on {} requires an id",
            mutation.operation, mutation.entity
        ))
    })
}

fn reread(txn: &dyn StoreTxn, entity: &str, id: &str) -> Result<Record, HubError> {
    txn.fetch(entity, id)?.ok_or_else(|| {
        HubError::Storage(format!("{}/{} missing after write", entity, id))
    })
}

impl DataHub {
    pub(super) fn apply_mutation(
        &self,
        txn: &mut dyn StoreTxn,
        mutation: &DataMutation,
    ) -> Result<MutationReport, HubError> {
        let entity = mutation.entity.as_str();
        let fields = mutation.fields();
        if mutation.options.validate_relations {
            self.validate_references(txn, entity, &fields)?;
        }

        let mut touched = BTreeSet::from([entity.to_string()]);
        let result = match mutation.operation {
            MutationOp::Create => {
                let id = mutation
                    .target_id()
                    .unwrap_or_else(|| Uuid::now_v7().to_string());
                if txn.fetch(entity, &id)?.is_some() {
                    return Err(HubError::DuplicateRecord {
                        entity: entity.to_string(),
                        id,
                    });
                }
                txn.put(&Record::new(entity, id.as_str(), fields))?;
                MutationResult::Record {
                    record: reread(txn, entity, &id)?,
                }
            }
            MutationOp::Update => {
                let id = required_id(mutation)?;
                let mut record =
                    txn.fetch(entity, &id)?
                        .ok_or_else(|| HubError::RecordNotFound {
                            entity: entity.to_string(),
                            id: id.clone(),
                        })?;
                record.fields.extend(fields);
                record.updated_at = now_millis();
                txn.put(&record)?;
                MutationResult::Record {
                    record: reread(txn, entity, &id)?,
                }
            }
            MutationOp::Delete => {
                let id = required_id(mutation)?;
                if txn.fetch(entity, &id)?.is_none() {
                    return Err(HubError::RecordNotFound {
                        entity: entity.to_string(),
                        id,
                    });
                }
                let count = if mutation.options.cascade {
                    self.cascade_delete(txn, entity, &id, 0, &mut touched)?
                } else {
                    usize::from(txn.remove(entity, &id)?)
                };
                MutationResult::Deleted { count }
            }
            MutationOp::Upsert => {
                let id = mutation
                    .target_id()
                    .unwrap_or_else(|| Uuid::now_v7().to_string());
                let record = match txn.fetch(entity, &id)? {
                    Some(existing) => Record {
                        fields,
                        updated_at: now_millis(),
                        ..existing
                    },
                    None => Record::new(entity, id.as_str(), fields),
                };
                txn.put(&record)?;
                MutationResult::Record {
                    record: reread(txn, entity, &id)?,
                }
            }
        };
        Ok(MutationReport { result, touched })
    }

    /// Every BelongsTo field present in `fields` must name an existing record.
    fn validate_references(
        &self,
        txn: &dyn StoreTxn,
        entity: &str,
        fields: &Fields,
    ) -> Result<(), HubError> {
        let schema = self.registry.get(entity)?;
        for relation in &schema.relations {
            let RelationKind::BelongsTo { local_field } = &relation.kind else {
                continue;
            };
            let Some(value) = fields.get(local_field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let exists = match value.as_str() {
                Some(target_id) => txn.fetch(&relation.target, target_id)?.is_some(),
                None => false,
            };
            if !exists {
                return Err(HubError::InvalidReference {
                    entity: entity.to_string(),
                    field: local_field.clone(),
                    target: relation.target.clone(),
                });
            }
        }
        Ok(())
    }

    /// Remove a record and, depth first, every HasMany child. Returns how
    /// many records were removed.
    fn cascade_delete(
        &self,
        txn: &mut dyn StoreTxn,
        entity: &str,
        id: &str,
        depth: usize,
        touched: &mut BTreeSet<String>,
    ) -> Result<usize, HubError> {
        if depth > MAX_CASCADE_DEPTH {
            return Err(HubError::InvalidMutation(format!(
                "cascade from {}/{} exceeds depth {}",
                entity, id, MAX_CASCADE_DEPTH
            )));
        }
        let mut count = 0;
        for relation in self.registry.children_of(entity) {
            let RelationKind::HasMany { foreign_field } = &relation.kind else {
                continue;
            };
            let children: Vec<String> = txn
                .scan(&relation.target)?
                .into_iter()
                .filter(|child| {
                    child.fields.get(foreign_field).and_then(FieldValue::as_str) == Some(id)
                })
                .map(|child| child.id)
                .collect();
            if children.is_empty() {
                continue;
            }
            touched.insert(relation.target.clone());
            for child in children {
                count += self.cascade_delete(txn, &relation.target, &child, depth + 1, touched)?;
            }
        }
        if txn.remove(entity, id)? {
            count += 1;
        }
        Ok(count)
    }

    /// Append an audit record in its own transaction. Failure is logged and
    /// does not affect the committed mutation.
    pub(super) fn write_audit(&self, mutation: &DataMutation, result: &MutationResult) {
        let mut fields = Fields::new();
        fields.insert("entity".into(), FieldValue::text(mutation.entity.as_str()));
        fields.insert(
            "operation".into(),
            FieldValue::text(mutation.operation.as_str()),
        );
        let record_id = result
            .record_id()
            .map(String::from)
            .or_else(|| mutation.target_id());
        fields.insert(
            "recordId".into(),
            record_id.map_or(FieldValue::Null, FieldValue::Text),
        );
        fields.insert(
            "actor".into(),
            mutation
                .options
                .actor
                .clone()
                .map_or(FieldValue::Null, FieldValue::Text),
        );
        if let MutationResult::Deleted { count } = result {
            fields.insert(
                "count".into(),
                FieldValue::Int(i64::try_from(*count).unwrap_or(i64::MAX)),
            );
        }

        let audit = Record::new(AUDIT_ENTITY, Uuid::now_v7().to_string(), fields);
        let outcome = self.store.transact(&mut |txn: &mut dyn StoreTxn| {
            txn.put(&audit)?;
            Ok(MutationReport {
                result: MutationResult::Deleted { count: 0 },
                touched: BTreeSet::from([AUDIT_ENTITY.to_string()]),
            })
        });
        match outcome {
            Ok(_) => {
                self.invalidate(AUDIT_ENTITY);
            }
            Err(e) => warn!(
                entity = %mutation.entity,
                error = %e,
                "audit record could not be written"
            ),
        }
    }
}
