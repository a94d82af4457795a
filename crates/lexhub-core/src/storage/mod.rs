//! # Primary Store
//!
//! The only storage contract the hub relies on.
//!
//! ## Storage Backends
//!
//! - `MemoryStore`: in-process maps with staged, all-or-nothing commits
//! - `RedbStore`: disk-backed ACID storage, one redb table per entity
//!
//! Reads are full scans per entity; filtering, ordering, pagination and
//! joins are applied by the hub so every backend behaves identically.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::mutation::MutationReport;
use crate::{HubError, Record};

/// Operations available inside one atomic transaction.
pub trait StoreTxn {
    /// Read one record, observing writes made earlier in this transaction.
    fn fetch(&self, entity: &str, id: &str) -> Result<Option<Record>, HubError>;

    /// Read every record of an entity, observing earlier writes.
    fn scan(&self, entity: &str) -> Result<Vec<Record>, HubError>;

    /// Insert or replace a record under its `kind` and `id`.
    fn put(&mut self, record: &Record) -> Result<(), HubError>;

    /// Remove a record. Returns whether it existed.
    fn remove(&mut self, entity: &str, id: &str) -> Result<bool, HubError>;
}

/// Transaction body handed to [`RecordStore::transact`].
pub type TxnBody<'a> = dyn FnMut(&mut dyn StoreTxn) -> Result<MutationReport, HubError> + 'a;

/// Contract every primary store fulfils.
pub trait RecordStore: Send + Sync {
    /// Every record of an entity, in id order. Unknown entities are empty.
    fn scan(&self, entity: &str) -> Result<Vec<Record>, HubError>;

    /// One record by id.
    fn fetch(&self, entity: &str, id: &str) -> Result<Option<Record>, HubError>;

    /// Run `body` inside a single transaction.
    ///
    /// If the body returns `Err`, nothing it wrote becomes visible and the
    /// error is returned unchanged. If it returns `Ok`, all writes commit
    /// before this call returns.
    fn transact(&self, body: &mut TxnBody<'_>) -> Result<MutationReport, HubError>;
}
