//! Record store facade
//!
//! [`RecordStore`] is the single entry point for reading and mutating object
//! stores. Each operation takes an optional transaction:
//!
//! - `None`: the facade opens a transaction scoped to the target store, in
//!   read-only mode for reads and read-write mode for writes, and commits or
//!   aborts it itself.
//! - `Some(txn)`: the operation runs inside the caller's transaction, which is
//!   aborted on failure but never committed here. This is how an upgrade
//!   routine works inside the version change transaction, and how callers
//!   group check-then-act sequences.

use serde_json::Value;
use tracing::warn;

use crate::adapter::settle;
use crate::error::{EngineError, EngineResult, StoreError, StoreResult};
use crate::key::{Key, KeyPath};
use crate::record::{IndexParams, Record, StoreParams, TransactionMode};
use crate::storage::{Database, ObjectStore, Transaction, TransactionOf};

/// Convenience layer over an open database.
#[derive(Debug, Clone)]
pub struct RecordStore<D: Database> {
    db: D,
}

impl<D: Database> RecordStore<D> {
    pub fn new(db: D) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn store_names(&self) -> Vec<String> {
        self.db.store_names()
    }

    /// Start a transaction for callers that want to group operations.
    pub fn transaction(&self, stores: &[&str], mode: TransactionMode) -> StoreResult<TransactionOf<D>> {
        self.db
            .transaction(stores, mode)
            .map_err(|cause| StoreError::operation("begin transaction", cause))
    }

    /// The caller's transaction, or a new self-managed one over `store`.
    /// The flag reports whether the transaction was supplied.
    fn scope(
        &self,
        store: &str,
        mode: TransactionMode,
        action: &'static str,
        txn: Option<&TransactionOf<D>>,
    ) -> StoreResult<(TransactionOf<D>, bool)> {
        match txn {
            Some(txn) => Ok((txn.clone(), true)),
            None => self
                .db
                .transaction(&[store], mode)
                .map(|txn| (txn, false))
                .map_err(|cause| {
                    warn!(action, store, error = %cause, "could not begin transaction");
                    StoreError::operation(action, cause)
                }),
        }
    }

    // ========================================================================
    // Record operations
    // ========================================================================

    /// Insert a record and return its key.
    ///
    /// Fails with a conflict when a record with the same key exists.
    pub async fn create_record(
        &self,
        store: &str,
        record: Record,
        txn: Option<&TransactionOf<D>>,
    ) -> StoreResult<Key> {
        const ACTION: &str = "create record";
        let (txn, supplied) = self.scope(store, TransactionMode::ReadWrite, ACTION, txn)?;
        settle(&txn, ACTION, supplied, txn.add(store, record)).await
    }

    /// Insert a record or fully replace the one with the same key.
    pub async fn upsert_record(
        &self,
        store: &str,
        record: Record,
        txn: Option<&TransactionOf<D>>,
    ) -> StoreResult<Key> {
        const ACTION: &str = "upsert record";
        let (txn, supplied) = self.scope(store, TransactionMode::ReadWrite, ACTION, txn)?;
        settle(&txn, ACTION, supplied, txn.put(store, record)).await
    }

    /// The record stored under `key`, or `None`.
    pub async fn get_record_by_key(
        &self,
        store: &str,
        key: &Key,
        txn: Option<&TransactionOf<D>>,
    ) -> StoreResult<Option<Record>> {
        const ACTION: &str = "get record by key";
        let (txn, supplied) = self.scope(store, TransactionMode::ReadOnly, ACTION, txn)?;
        settle(&txn, ACTION, supplied, txn.get(store, key)).await
    }

    /// Every record in `store`, in key order.
    pub async fn get_all_records(
        &self,
        store: &str,
        txn: Option<&TransactionOf<D>>,
    ) -> StoreResult<Vec<Record>> {
        const ACTION: &str = "get all records";
        let (txn, supplied) = self.scope(store, TransactionMode::ReadOnly, ACTION, txn)?;
        settle(&txn, ACTION, supplied, txn.get_all(store)).await
    }

    pub async fn get_record_count(
        &self,
        store: &str,
        txn: Option<&TransactionOf<D>>,
    ) -> StoreResult<u64> {
        const ACTION: &str = "get record count";
        let (txn, supplied) = self.scope(store, TransactionMode::ReadOnly, ACTION, txn)?;
        settle(&txn, ACTION, supplied, txn.count(store)).await
    }

    /// Every record whose `index` key equals `value`; empty when none match.
    pub async fn get_records_by_index(
        &self,
        store: &str,
        index: &str,
        value: &Key,
        txn: Option<&TransactionOf<D>>,
    ) -> StoreResult<Vec<Record>> {
        const ACTION: &str = "get records by index";
        let (txn, supplied) = self.scope(store, TransactionMode::ReadOnly, ACTION, txn)?;
        settle(&txn, ACTION, supplied, txn.index_get_all(store, index, value)).await
    }

    /// Delete the record under `key`. Deleting a missing key succeeds.
    pub async fn delete_record_by_key(
        &self,
        store: &str,
        key: &Key,
        txn: Option<&TransactionOf<D>>,
    ) -> StoreResult<()> {
        const ACTION: &str = "delete record by key";
        let (txn, supplied) = self.scope(store, TransactionMode::ReadWrite, ACTION, txn)?;
        settle(&txn, ACTION, supplied, txn.delete(store, key)).await
    }

    /// Delete every record whose `index` key equals `value`.
    ///
    /// Lookup and deletes share one transaction, so every record matching at
    /// lookup time is gone afterwards. Returns the number deleted.
    pub async fn delete_records_by_index(
        &self,
        store: &str,
        index: &str,
        value: &Key,
        txn: Option<&TransactionOf<D>>,
    ) -> StoreResult<usize> {
        const ACTION: &str = "delete records by index";
        let (txn, supplied) = self.scope(store, TransactionMode::ReadWrite, ACTION, txn)?;
        let pending = async {
            let key_path = txn.key_path(store)?;
            let records = txn.index_get_all(store, index, value).await?;
            for record in &records {
                let key = primary_key(record, &key_path)?;
                txn.delete(store, &key).await?;
            }
            Ok::<_, EngineError>(records.len())
        };
        settle(&txn, ACTION, supplied, pending).await
    }

    /// Rewrite the indexed attribute from `old_value` to `new_value` on every
    /// matching record, writing each record back in full.
    ///
    /// Matches are collected before the first write, so records leaving the
    /// `old_value` bucket are neither revisited nor skipped. Returns the number
    /// updated; zero matches is not an error.
    pub async fn update_records_by_index(
        &self,
        store: &str,
        index: &str,
        old_value: &Key,
        new_value: impl Into<Value>,
        txn: Option<&TransactionOf<D>>,
    ) -> StoreResult<usize> {
        const ACTION: &str = "update records by index";
        let new_value = new_value.into();
        let (txn, supplied) = self.scope(store, TransactionMode::ReadWrite, ACTION, txn)?;
        let pending = async {
            let key_path = txn.index_key_path(store, index)?;
            let records = txn.index_get_all(store, index, old_value).await?;
            let count = records.len();
            for mut record in records {
                assign(&mut record, &key_path, &new_value)?;
                txn.put(store, record).await?;
            }
            Ok::<_, EngineError>(count)
        };
        settle(&txn, ACTION, supplied, pending).await
    }

    /// Remove every record in `store`.
    pub async fn clear_store(&self, store: &str, txn: Option<&TransactionOf<D>>) -> StoreResult<()> {
        const ACTION: &str = "clear store";
        let (txn, supplied) = self.scope(store, TransactionMode::ReadWrite, ACTION, txn)?;
        settle(&txn, ACTION, supplied, txn.clear(store)).await
    }

    // ========================================================================
    // Schema operations (upgrade routine only)
    // ========================================================================

    /// Create an object store. Only valid inside an upgrade routine.
    pub fn create_store(
        &self,
        name: &str,
        key_path: impl Into<KeyPath>,
        auto_increment: bool,
    ) -> StoreResult<D::ObjectStore> {
        let params = StoreParams::new(key_path, auto_increment);
        schema("create store", self.db.create_object_store(name, &params))
    }

    /// Delete an object store with its records and indexes. Only valid inside
    /// an upgrade routine.
    pub fn delete_store(&self, name: &str) -> StoreResult<()> {
        schema("delete store", self.db.delete_object_store(name))
    }

    /// Schema handle to an existing store, reached through the upgrade
    /// routine's version change transaction.
    pub fn object_store(&self, txn: &TransactionOf<D>, name: &str) -> StoreResult<D::ObjectStore> {
        schema("open store", txn.object_store(name))
    }

    /// Add `index` unless the store already has an index by that name.
    /// Returns whether it was created. Only valid inside an upgrade routine.
    pub fn ensure_index(
        &self,
        store: &D::ObjectStore,
        index: &str,
        key_path: impl Into<KeyPath>,
        unique: bool,
    ) -> StoreResult<bool> {
        if store.index_names().iter().any(|name| name == index) {
            return Ok(false);
        }
        self.create_index(store, index, key_path, unique)?;
        Ok(true)
    }

    /// Add a secondary index on `key_path`. Only valid inside an upgrade routine.
    pub fn create_index(
        &self,
        store: &D::ObjectStore,
        index: &str,
        key_path: impl Into<KeyPath>,
        unique: bool,
    ) -> StoreResult<()> {
        self.create_index_with(store, index, key_path, IndexParams::unique(unique))
    }

    /// [`create_index`](Self::create_index) with full index options.
    pub fn create_index_with(
        &self,
        store: &D::ObjectStore,
        index: &str,
        key_path: impl Into<KeyPath>,
        params: IndexParams,
    ) -> StoreResult<()> {
        schema(
            "create index",
            store.create_index(index, &key_path.into(), params),
        )
    }
}

fn schema<T>(action: &'static str, result: EngineResult<T>) -> StoreResult<T> {
    result.map_err(|cause| {
        warn!(action, error = %cause, "failed to {}", action);
        StoreError::operation(action, cause)
    })
}

fn primary_key(record: &Record, key_path: &KeyPath) -> EngineResult<Key> {
    record
        .key_at(key_path)
        .ok_or_else(|| EngineError::Data(format!("stored record has no key at `{}`", key_path)))
}

/// Write `value` at `key_path`. A compound key path takes an array with one
/// element per attribute.
fn assign(record: &mut Record, key_path: &KeyPath, value: &Value) -> EngineResult<()> {
    match key_path {
        KeyPath::Attribute(name) => {
            record.set(name.clone(), value.clone());
            Ok(())
        }
        KeyPath::Compound(names) => match value {
            Value::Array(items) if items.len() == names.len() => {
                for (name, item) in names.iter().zip(items) {
                    record.set(name.clone(), item.clone());
                }
                Ok(())
            }
            _ => Err(EngineError::Data(format!(
                "compound key path `{}` needs an array of {} values",
                key_path,
                names.len()
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assign_attribute() {
        let mut record = Record::new().with("name", "Snoopy").with("breed", "Beagle");
        assign(&mut record, &"name".into(), &json!("Woodstock")).unwrap();
        assert_eq!(record.get_str("name"), Some("Woodstock"));
        assert_eq!(record.get_str("breed"), Some("Beagle"));
    }

    #[test]
    fn test_assign_compound() {
        let mut record = Record::new().with("first", "A").with("last", "B");
        let path: KeyPath = vec!["first", "last"].into();
        assign(&mut record, &path, &json!(["C", "D"])).unwrap();
        assert_eq!(record.get_str("first"), Some("C"));
        assert_eq!(record.get_str("last"), Some("D"));

        let err = assign(&mut record, &path, &json!("C")).unwrap_err();
        assert!(matches!(err, EngineError::Data(_)));
    }
}
