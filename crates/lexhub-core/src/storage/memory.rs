//! In-memory record store.

use super::{RecordStore, StoreTxn, TxnBody};
use crate::mutation::MutationReport;
use crate::{HubError, Record};
use std::collections::BTreeMap;
use parking_lot::RwLock;

type Tables = BTreeMap<String, BTreeMap<String, Record>>;

/// Volatile store backed by nested `BTreeMap`s.
///
/// Transactions stage writes in an overlay and apply them under the write
/// lock only when the body succeeds, so readers never observe a partial
/// mutation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all entities.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.tables.read().values().map(BTreeMap::len).sum()
    }
}

/// Staged writes: `Some` is a put, `None` a removal.
struct MemoryTxn<'a> {
    base: &'a Tables,
    staged: BTreeMap<(String, String), Option<Record>>,
}

impl StoreTxn for MemoryTxn<'_> {
    fn fetch(&self, entity: &str, id: &str) -> Result<Option<Record>, HubError> {
        if let Some(staged) = self.staged.get(&(entity.to_string(), id.to_string())) {
            return Ok(staged.clone());
        }
        Ok(self.base.get(entity).and_then(|t| t.get(id)).cloned())
    }

    fn scan(&self, entity: &str) -> Result<Vec<Record>, HubError> {
        let mut merged: BTreeMap<String, Record> =
            self.base.get(entity).cloned().unwrap_or_default();
        for ((staged_entity, id), change) in &self.staged {
            if staged_entity != entity {
                continue;
            }
            match change {
                Some(record) => {
                    merged.insert(id.clone(), record.clone());
                }
                None => {
                    merged.remove(id);
                }
            }
        }
        Ok(merged.into_values().collect())
    }

    fn put(&mut self, record: &Record) -> Result<(), HubError> {
        self.staged.insert(
            (record.kind.clone(), record.id.clone()),
            Some(record.clone()),
        );
        Ok(())
    }

    fn remove(&mut self, entity: &str, id: &str) -> Result<bool, HubError> {
        let existed = self.fetch(entity, id)?.is_some();
        self.staged.insert((entity.to_string(), id.to_string()), None);
        Ok(existed)
    }
}

impl RecordStore for MemoryStore {
    fn scan(&self, entity: &str) -> Result<Vec<Record>, HubError> {
        Ok(self
            .tables
            .read()
            .get(entity)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }

    fn fetch(&self, entity: &str, id: &str) -> Result<Option<Record>, HubError> {
        Ok(self.tables.read().get(entity).and_then(|t| t.get(id)).cloned())
    }

    fn transact(&self, body: &mut TxnBody<'_>) -> Result<MutationReport, HubError> {
        // Holding the write lock for the whole body serializes mutations.
        let mut tables = self.tables.write();
        let (report, staged) = {
            let mut txn = MemoryTxn {
                base: &tables,
                staged: BTreeMap::new(),
            };
            let report = body(&mut txn)?;
            (report, txn.staged)
        };
        for ((entity, id), change) in staged {
            let table = tables.entry(entity).or_default();
            match change {
                Some(record) => {
                    table.insert(id, record);
                }
                None => {
                    table.remove(&id);
                }
            }
        }
        Ok(report)
    }
}
