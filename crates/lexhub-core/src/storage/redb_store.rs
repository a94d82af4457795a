//! # redb-backed Record Storage
//!
//! A disk-backed record store using the redb embedded database.
//!
//! - ACID transactions (one write transaction per mutation)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Each entity lives in its own table named `entity:<Name>`, keyed by record
//! id, with the record encoded as JSON.

use super::{RecordStore, StoreTxn, TxnBody};
use crate::mutation::MutationReport;
use crate::{HubError, Record};
use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, TableError, WriteTransaction,
};
use std::path::Path;

fn storage_err(e: impl std::fmt::Display) -> HubError {
    HubError::Storage(e.to_string())
}

fn table_name(entity: &str) -> String {
    format!("entity:{}", entity)
}

fn decode(bytes: &[u8]) -> Result<Record, HubError> {
    serde_json::from_slice(bytes).map_err(HubError::from)
}

/// A disk-backed record store.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HubError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;
        Ok(Self { db })
    }
}

/// Write-transaction view handed to mutation bodies.
struct RedbTxn<'a> {
    txn: &'a WriteTransaction,
}

impl StoreTxn for RedbTxn<'_> {
    fn fetch(&self, entity: &str, id: &str) -> Result<Option<Record>, HubError> {
        let name = table_name(entity);
        let table = self
            .txn
            .open_table(TableDefinition::<&str, &[u8]>::new(&name))
            .map_err(storage_err)?;
        let found = table.get(id).map_err(storage_err)?;
        found.map(|guard| decode(guard.value())).transpose()
    }

    fn scan(&self, entity: &str) -> Result<Vec<Record>, HubError> {
        let name = table_name(entity);
        let table = self
            .txn
            .open_table(TableDefinition::<&str, &[u8]>::new(&name))
            .map_err(storage_err)?;
        let mut records = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            records.push(decode(value.value())?);
        }
        Ok(records)
    }

    fn put(&mut self, record: &Record) -> Result<(), HubError> {
        let bytes = serde_json::to_vec(record)?;
        let name = table_name(&record.kind);
        let mut table = self
            .txn
            .open_table(TableDefinition::<&str, &[u8]>::new(&name))
            .map_err(storage_err)?;
        table
            .insert(record.id.as_str(), bytes.as_slice())
            .map_err(storage_err)?;
        Ok(())
    }

    fn remove(&mut self, entity: &str, id: &str) -> Result<bool, HubError> {
        let name = table_name(entity);
        let mut table = self
            .txn
            .open_table(TableDefinition::<&str, &[u8]>::new(&name))
            .map_err(storage_err)?;
        let existed = table.remove(id).map_err(storage_err)?.is_some();
        Ok(existed)
    }
}

impl RecordStore for RedbStore {
    fn scan(&self, entity: &str) -> Result<Vec<Record>, HubError> {
        let name = table_name(entity);
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = match read_txn.open_table(TableDefinition::<&str, &[u8]>::new(&name)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(storage_err(e)),
        };
        let mut records = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            records.push(decode(value.value())?);
        }
        Ok(records)
    }

    fn fetch(&self, entity: &str, id: &str) -> Result<Option<Record>, HubError> {
        let name = table_name(entity);
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = match read_txn.open_table(TableDefinition::<&str, &[u8]>::new(&name)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(storage_err(e)),
        };
        let found = table.get(id).map_err(storage_err)?;
        found.map(|guard| decode(guard.value())).transpose()
    }

    fn transact(&self, body: &mut TxnBody<'_>) -> Result<MutationReport, HubError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let outcome = {
            let mut txn = RedbTxn { txn: &write_txn };
            body(&mut txn)
        };
        match outcome {
            Ok(report) => {
                write_txn.commit().map_err(storage_err)?;
                Ok(report)
            }
            Err(e) => {
                if let Err(abort) = write_txn.abort() {
                    tracing::warn!(error = %abort, "redb abort failed after rollback request");
                }
                Err(e)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
