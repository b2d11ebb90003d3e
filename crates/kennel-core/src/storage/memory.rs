//! In-memory record-store engine
//!
//! A BTreeMap-based engine with ordered keys, key generators, maintained
//! secondary indexes, and transactions that commit or abort as a unit. Useful
//! for:
//! - Unit testing
//! - The native CLI
//! - Hosts without IndexedDB
//!
//! Nothing is persisted; databases live as long as their factory.
//!
//! A read-write transaction buffers its writes and applies them on commit, so
//! other transactions only ever see committed data. Overlapping read-write
//! transactions are not serialized against each other: each commit replays its
//! own writes against the data committed so far and fails, aborting the
//! transaction, if one of them now breaks a key or unique index constraint.

use std::cell::{Cell, RefCell};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::error::{EngineError, EngineResult, StoreResult};
use crate::key::{Key, KeyPath};
use crate::record::{IndexParams, Record, StoreParams, TransactionMode, VersionChange};
use crate::storage::traits::{Database, Factory, ObjectStore, Transaction};

type Shared<T> = Rc<RefCell<T>>;

/// Creates and opens in-memory databases.
///
/// Clones share the same set of databases.
#[derive(Debug, Clone, Default)]
pub struct MemoryFactory {
    databases: Shared<HashMap<String, Shared<DbState>>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the databases that currently exist.
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Stored version of `name`, if it exists.
    pub fn stored_version(&self, name: &str) -> Option<u32> {
        self.databases
            .borrow()
            .get(name)
            .map(|state| state.borrow().version)
    }
}

impl Factory for MemoryFactory {
    type Database = MemoryDatabase;

    async fn open<U, Fut>(&self, name: &str, version: u32, upgrade: U) -> EngineResult<MemoryDatabase>
    where
        U: FnOnce(MemoryDatabase, MemoryTransaction, VersionChange) -> Fut + 'static,
        Fut: Future<Output = StoreResult<()>> + 'static,
    {
        if version == 0 {
            return Err(EngineError::InvalidState(
                "database version must be a positive integer".into(),
            ));
        }

        let existing = self.databases.borrow().get(name).cloned();
        let created = existing.is_none();
        let state = existing.unwrap_or_default();

        let stored = state.borrow().version;
        if version < stored {
            return Err(EngineError::Version {
                requested: version,
                stored,
            });
        }

        let db = MemoryDatabase::new(name, state.clone());
        if version == stored {
            return Ok(db);
        }

        if created {
            self.databases
                .borrow_mut()
                .insert(name.to_string(), state.clone());
        }

        let snapshot = state.borrow().clone();
        {
            let mut s = state.borrow_mut();
            s.version = version;
            s.upgrading = true;
        }
        let txn = MemoryTransaction::version_change(state.clone(), snapshot);
        let change = VersionChange {
            old_version: stored,
            new_version: version,
        };
        debug!(db = name, old = stored, new = version, "running upgrade");

        let outcome = upgrade(db.clone(), txn.clone(), change).await;
        state.borrow_mut().upgrading = false;

        let failure = match outcome {
            Ok(()) if txn.status() == Status::Aborted => {
                Some("upgrade transaction was aborted".to_string())
            }
            Ok(()) => None,
            Err(err) => {
                if txn.status() == Status::Active {
                    txn.abort()?;
                }
                Some(format!("upgrade failed: {}", err))
            }
        };

        match failure {
            Some(reason) => {
                if created {
                    self.databases.borrow_mut().remove(name);
                }
                Err(EngineError::Aborted(reason))
            }
            None => {
                txn.finish();
                Ok(db)
            }
        }
    }

    async fn delete_database(&self, name: &str) -> EngineResult<()> {
        self.databases.borrow_mut().remove(name);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct DbState {
    version: u32,
    upgrading: bool,
    stores: BTreeMap<String, StoreData>,
}

impl DbState {
    fn store(&self, name: &str) -> EngineResult<&StoreData> {
        self.stores
            .get(name)
            .ok_or_else(|| EngineError::NotFound(format!("object store `{}`", name)))
    }

    fn store_mut(&mut self, name: &str) -> EngineResult<&mut StoreData> {
        self.stores
            .get_mut(name)
            .ok_or_else(|| EngineError::NotFound(format!("object store `{}`", name)))
    }

    fn require_upgrade(&self) -> EngineResult<()> {
        if self.upgrading {
            Ok(())
        } else {
            Err(EngineError::InvalidState(
                "schema changes require a version change transaction".into(),
            ))
        }
    }
}

#[derive(Debug, Clone)]
struct StoreData {
    params: StoreParams,
    next_key: i64,
    records: BTreeMap<Key, Record>,
    indexes: BTreeMap<String, IndexData>,
}

impl StoreData {
    fn new(params: StoreParams) -> Self {
        Self {
            params,
            next_key: 1,
            records: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    /// Insert `record`, replacing an existing one only when `overwrite` is set.
    /// Returns the key and the record as stored.
    fn write(&mut self, mut record: Record, overwrite: bool) -> EngineResult<(Key, Record)> {
        let key_path = &self.params.key_path;
        let (key, generated) = match record.key_at(key_path) {
            Some(key) => (key, false),
            None => {
                let absent = key_path.attribute().is_some_and(|name| !record.contains(name));
                if !(self.params.auto_increment && absent) {
                    return Err(EngineError::Data(format!(
                        "record has no valid key at `{}`",
                        key_path
                    )));
                }
                (Key::Number(self.next_key), true)
            }
        };

        if generated {
            if let Some(name) = key_path.attribute() {
                record.set(name, key.to_value());
            }
        }

        if !overwrite && self.records.contains_key(&key) {
            return Err(EngineError::Constraint(format!("key {} already exists", key)));
        }

        let mut index_keys = Vec::with_capacity(self.indexes.len());
        for (name, index) in &self.indexes {
            let keys = index.keys_for(&record);
            if let Some(taken) = index.conflict(&keys, &key) {
                return Err(EngineError::Constraint(format!(
                    "unique index `{}` already holds {}",
                    name, taken
                )));
            }
            index_keys.push(keys);
        }

        if self.params.auto_increment {
            if let Key::Number(n) = key {
                if n >= self.next_key {
                    self.next_key = n.saturating_add(1);
                }
            }
        }

        self.remove(&key);
        for (index, keys) in self.indexes.values_mut().zip(index_keys) {
            index.insert(&keys, &key);
        }
        self.records.insert(key.clone(), record.clone());
        Ok((key, record))
    }

    fn remove(&mut self, key: &Key) -> Option<Record> {
        let record = self.records.remove(key)?;
        for index in self.indexes.values_mut() {
            let keys = index.keys_for(&record);
            index.remove(&keys, key);
        }
        Some(record)
    }

    fn clear(&mut self) {
        for index in self.indexes.values_mut() {
            index.entries.clear();
        }
        self.records.clear();
    }

    fn add_index(&mut self, name: &str, mut index: IndexData) -> EngineResult<()> {
        if self.indexes.contains_key(name) {
            return Err(EngineError::Constraint(format!("index `{}` already exists", name)));
        }
        for (key, record) in &self.records {
            let keys = index.keys_for(record);
            if let Some(taken) = index.conflict(&keys, key) {
                return Err(EngineError::Constraint(format!(
                    "existing records violate unique index `{}` at {}",
                    name, taken
                )));
            }
            index.insert(&keys, key);
        }
        self.indexes.insert(name.to_string(), index);
        Ok(())
    }

    fn index(&self, name: &str) -> EngineResult<&IndexData> {
        self.indexes
            .get(name)
            .ok_or_else(|| EngineError::NotFound(format!("index `{}`", name)))
    }
}

#[derive(Debug, Clone)]
struct IndexData {
    key_path: KeyPath,
    params: IndexParams,
    entries: BTreeMap<Key, BTreeSet<Key>>,
}

impl IndexData {
    fn new(key_path: KeyPath, params: IndexParams) -> Self {
        Self {
            key_path,
            params,
            entries: BTreeMap::new(),
        }
    }

    /// Index keys a record contributes. Records without a valid key at the
    /// index key path are not indexed.
    fn keys_for(&self, record: &Record) -> Vec<Key> {
        if self.params.multi_entry {
            if let Some(Value::Array(items)) = self.key_path.attribute().and_then(|a| record.get(a)) {
                let keys: BTreeSet<Key> = items.iter().filter_map(Key::from_value).collect();
                return keys.into_iter().collect();
            }
        }
        record.key_at(&self.key_path).into_iter().collect()
    }

    /// First index key already held by a record other than `primary`.
    fn conflict(&self, keys: &[Key], primary: &Key) -> Option<Key> {
        if !self.params.unique {
            return None;
        }
        keys.iter()
            .find(|k| {
                self.entries
                    .get(*k)
                    .is_some_and(|owners| owners.iter().any(|owner| owner != primary))
            })
            .cloned()
    }

    fn insert(&mut self, keys: &[Key], primary: &Key) {
        for key in keys {
            self.entries
                .entry(key.clone())
                .or_default()
                .insert(primary.clone());
        }
    }

    fn remove(&mut self, keys: &[Key], primary: &Key) {
        for key in keys {
            if let Some(owners) = self.entries.get_mut(key) {
                owners.remove(primary);
                if owners.is_empty() {
                    self.entries.remove(key);
                }
            }
        }
    }
}

/// A connection to an in-memory database.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    name: Rc<str>,
    state: Shared<DbState>,
    closed: Rc<Cell<bool>>,
}

impl MemoryDatabase {
    fn new(name: &str, state: Shared<DbState>) -> Self {
        Self {
            name: name.into(),
            state,
            closed: Rc::new(Cell::new(false)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

impl Database for MemoryDatabase {
    type Transaction = MemoryTransaction;
    type ObjectStore = MemoryObjectStore;

    fn name(&self) -> String {
        self.name.to_string()
    }

    fn version(&self) -> u32 {
        self.state.borrow().version
    }

    fn store_names(&self) -> Vec<String> {
        self.state.borrow().stores.keys().cloned().collect()
    }

    fn transaction(&self, stores: &[&str], mode: TransactionMode) -> EngineResult<MemoryTransaction> {
        if self.closed.get() {
            return Err(EngineError::InvalidState("connection is closed".into()));
        }
        if mode == TransactionMode::VersionChange {
            return Err(EngineError::InvalidState(
                "version change transactions are only created by open".into(),
            ));
        }
        if stores.is_empty() {
            return Err(EngineError::InvalidState(
                "a transaction needs at least one object store".into(),
            ));
        }

        let state = self.state.borrow();
        if state.upgrading {
            return Err(EngineError::InvalidState(
                "a version change transaction is running".into(),
            ));
        }
        for store in stores {
            state.store(store)?;
        }
        drop(state);

        Ok(MemoryTransaction::new(
            self.state.clone(),
            mode,
            stores.iter().map(|s| s.to_string()).collect(),
        ))
    }

    fn create_object_store(&self, name: &str, params: &StoreParams) -> EngineResult<MemoryObjectStore> {
        let mut state = self.state.borrow_mut();
        state.require_upgrade()?;
        if state.stores.contains_key(name) {
            return Err(EngineError::Constraint(format!(
                "object store `{}` already exists",
                name
            )));
        }
        if params.auto_increment && params.key_path.is_compound() {
            return Err(EngineError::InvalidState(
                "a compound key path cannot use a key generator".into(),
            ));
        }
        state
            .stores
            .insert(name.to_string(), StoreData::new(params.clone()));
        Ok(MemoryObjectStore {
            state: self.state.clone(),
            name: name.to_string(),
        })
    }

    fn delete_object_store(&self, name: &str) -> EngineResult<()> {
        let mut state = self.state.borrow_mut();
        state.require_upgrade()?;
        state
            .stores
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(format!("object store `{}`", name)))
    }

    fn close(&self) {
        self.closed.set(true);
    }
}

/// Schema handle to an in-memory object store.
#[derive(Debug, Clone)]
pub struct MemoryObjectStore {
    state: Shared<DbState>,
    name: String,
}

impl MemoryObjectStore {
    fn with_store<T>(&self, f: impl FnOnce(&StoreData) -> T) -> Option<T> {
        self.state.borrow().stores.get(&self.name).map(f)
    }
}

impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn index_names(&self) -> Vec<String> {
        self.with_store(|s| s.indexes.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn create_index(&self, name: &str, key_path: &KeyPath, params: IndexParams) -> EngineResult<()> {
        let mut state = self.state.borrow_mut();
        state.require_upgrade()?;
        if params.multi_entry && key_path.is_compound() {
            return Err(EngineError::InvalidState(
                "a multi-entry index needs a single attribute key path".into(),
            ));
        }
        state
            .store_mut(&self.name)?
            .add_index(name, IndexData::new(key_path.clone(), params))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Active,
    Committed,
    Aborted,
}

/// A buffered write, replayed against the committed store on commit.
#[derive(Debug)]
enum Pending {
    Add(Record),
    Put(Record),
    Delete(Key),
    Clear,
}

#[derive(Debug)]
struct TxnState {
    status: Status,
    /// Copies of the stores this transaction has written to, with its own
    /// writes applied. Reads of those stores go here.
    working: BTreeMap<String, StoreData>,
    pending: Vec<(String, Pending)>,
    snapshot: Option<DbState>,
}

#[derive(Debug)]
struct TxnInner {
    db: Shared<DbState>,
    mode: TransactionMode,
    scope: Vec<String>,
    state: RefCell<TxnState>,
}

/// A transaction over in-memory object stores.
///
/// Read-write transactions buffer their writes until `commit`; `abort` drops
/// them. A version change transaction runs alone, so it writes through and
/// restores a snapshot of the whole database when aborted. Keys taken from a
/// key generator stay taken either way.
#[derive(Debug, Clone)]
pub struct MemoryTransaction {
    inner: Rc<TxnInner>,
}

impl MemoryTransaction {
    fn new(db: Shared<DbState>, mode: TransactionMode, scope: Vec<String>) -> Self {
        Self::build(db, mode, scope, None)
    }

    fn version_change(db: Shared<DbState>, snapshot: DbState) -> Self {
        Self::build(db, TransactionMode::VersionChange, Vec::new(), Some(snapshot))
    }

    fn build(
        db: Shared<DbState>,
        mode: TransactionMode,
        scope: Vec<String>,
        snapshot: Option<DbState>,
    ) -> Self {
        Self {
            inner: Rc::new(TxnInner {
                db,
                mode,
                scope,
                state: RefCell::new(TxnState {
                    status: Status::Active,
                    working: BTreeMap::new(),
                    pending: Vec::new(),
                    snapshot,
                }),
            }),
        }
    }

    fn status(&self) -> Status {
        self.inner.state.borrow().status
    }

    pub fn is_active(&self) -> bool {
        self.status() == Status::Active
    }

    /// Mark a successful version change transaction as committed.
    fn finish(&self) {
        let mut state = self.inner.state.borrow_mut();
        if state.status == Status::Active {
            state.status = Status::Committed;
            state.snapshot = None;
        }
    }

    fn buffered(&self) -> bool {
        self.inner.mode == TransactionMode::ReadWrite
    }

    fn check(&self, store: &str, write: bool) -> EngineResult<()> {
        if self.status() != Status::Active {
            return Err(EngineError::TransactionInactive);
        }
        if write && !self.inner.mode.can_write() {
            return Err(EngineError::ReadOnly);
        }
        let in_scope = self.inner.mode == TransactionMode::VersionChange
            || self.inner.scope.iter().any(|s| s == store);
        if !in_scope {
            return Err(EngineError::NotFound(format!(
                "object store `{}` is not in this transaction's scope",
                store
            )));
        }
        Ok(())
    }

    /// Apply a write to this transaction's copy of `store` and queue it for
    /// commit.
    fn stage<T>(
        &self,
        store: &str,
        apply: impl FnOnce(&mut StoreData) -> EngineResult<(T, Pending)>,
    ) -> EngineResult<T> {
        let mut db = self.inner.db.borrow_mut();
        let committed = db.store_mut(store)?;
        let mut state = self.inner.state.borrow_mut();
        let state = &mut *state;

        let working = state
            .working
            .entry(store.to_string())
            .or_insert_with(|| committed.clone());
        working.next_key = working.next_key.max(committed.next_key);
        let (value, pending) = apply(working)?;
        committed.next_key = committed.next_key.max(working.next_key);

        state.pending.push((store.to_string(), pending));
        Ok(value)
    }

    fn write(&self, store: &str, record: Record, overwrite: bool) -> EngineResult<Key> {
        self.check(store, true)?;
        if !self.buffered() {
            let (key, _) = self
                .inner
                .db
                .borrow_mut()
                .store_mut(store)?
                .write(record, overwrite)?;
            return Ok(key);
        }
        self.stage(store, |data| {
            let (key, stored) = data.write(record, overwrite)?;
            let pending = if overwrite {
                Pending::Put(stored)
            } else {
                Pending::Add(stored)
            };
            Ok((key, pending))
        })
    }

    fn read<T>(&self, store: &str, f: impl FnOnce(&StoreData) -> EngineResult<T>) -> EngineResult<T> {
        self.check(store, false)?;
        let state = self.inner.state.borrow();
        if let Some(working) = state.working.get(store) {
            return f(working);
        }
        let db = self.inner.db.borrow();
        f(db.store(store)?)
    }

    /// Replay `pending` against the committed stores. Nothing is applied
    /// unless every write succeeds.
    fn apply(&self, pending: Vec<(String, Pending)>) -> EngineResult<()> {
        let mut db = self.inner.db.borrow_mut();
        let mut staged: BTreeMap<String, StoreData> = BTreeMap::new();

        for (store, write) in pending {
            let data = match staged.entry(store) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let copy = db.store(entry.key())?.clone();
                    entry.insert(copy)
                }
            };
            match write {
                Pending::Add(record) => {
                    data.write(record, false)?;
                }
                Pending::Put(record) => {
                    data.write(record, true)?;
                }
                Pending::Delete(key) => {
                    data.remove(&key);
                }
                Pending::Clear => data.clear(),
            }
        }

        db.stores.extend(staged);
        Ok(())
    }
}

impl Transaction for MemoryTransaction {
    type ObjectStore = MemoryObjectStore;

    fn mode(&self) -> TransactionMode {
        self.inner.mode
    }

    fn store_names(&self) -> Vec<String> {
        if self.inner.mode == TransactionMode::VersionChange {
            self.inner.db.borrow().stores.keys().cloned().collect()
        } else {
            self.inner.scope.clone()
        }
    }

    fn object_store(&self, name: &str) -> EngineResult<MemoryObjectStore> {
        self.read(name, |_| Ok(()))?;
        Ok(MemoryObjectStore {
            state: self.inner.db.clone(),
            name: name.to_string(),
        })
    }

    fn key_path(&self, store: &str) -> EngineResult<KeyPath> {
        self.read(store, |s| Ok(s.params.key_path.clone()))
    }

    fn index_key_path(&self, store: &str, index: &str) -> EngineResult<KeyPath> {
        self.read(store, |s| Ok(s.index(index)?.key_path.clone()))
    }

    async fn add(&self, store: &str, record: Record) -> EngineResult<Key> {
        self.write(store, record, false)
    }

    async fn put(&self, store: &str, record: Record) -> EngineResult<Key> {
        self.write(store, record, true)
    }

    async fn get(&self, store: &str, key: &Key) -> EngineResult<Option<Record>> {
        self.read(store, |s| Ok(s.records.get(key).cloned()))
    }

    async fn get_all(&self, store: &str) -> EngineResult<Vec<Record>> {
        self.read(store, |s| Ok(s.records.values().cloned().collect()))
    }

    async fn count(&self, store: &str) -> EngineResult<u64> {
        self.read(store, |s| Ok(s.records.len() as u64))
    }

    async fn delete(&self, store: &str, key: &Key) -> EngineResult<()> {
        self.check(store, true)?;
        if !self.buffered() {
            self.inner.db.borrow_mut().store_mut(store)?.remove(key);
            return Ok(());
        }
        self.stage(store, |data| {
            data.remove(key);
            Ok(((), Pending::Delete(key.clone())))
        })
    }

    async fn clear(&self, store: &str) -> EngineResult<()> {
        self.check(store, true)?;
        if !self.buffered() {
            self.inner.db.borrow_mut().store_mut(store)?.clear();
            return Ok(());
        }
        self.stage(store, |data| {
            data.clear();
            Ok(((), Pending::Clear))
        })
    }

    async fn index_get_all(&self, store: &str, index: &str, value: &Key) -> EngineResult<Vec<Record>> {
        self.read(store, |s| {
            let index = s.index(index)?;
            Ok(index
                .entries
                .get(value)
                .map(|owners| {
                    owners
                        .iter()
                        .filter_map(|key| s.records.get(key).cloned())
                        .collect()
                })
                .unwrap_or_default())
        })
    }

    async fn commit(&self) -> EngineResult<()> {
        let pending = {
            let mut state = self.inner.state.borrow_mut();
            if state.status != Status::Active {
                return Err(EngineError::InvalidState(
                    "transaction has already finished".into(),
                ));
            }
            state.working.clear();
            state.snapshot = None;
            std::mem::take(&mut state.pending)
        };

        let outcome = self.apply(pending);
        self.inner.state.borrow_mut().status = match outcome {
            Ok(()) => Status::Committed,
            Err(_) => Status::Aborted,
        };
        if let Err(err) = &outcome {
            debug!(error = %err, "commit failed, transaction aborted");
        }
        outcome
    }

    fn abort(&self) -> EngineResult<()> {
        let snapshot = {
            let mut state = self.inner.state.borrow_mut();
            if state.status != Status::Active {
                return Err(EngineError::InvalidState(
                    "transaction has already finished".into(),
                ));
            }
            state.status = Status::Aborted;
            state.working.clear();
            state.pending.clear();
            state.snapshot.take()
        };

        if let Some(snapshot) = snapshot {
            *self.inner.db.borrow_mut() = snapshot;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use pretty_assertions::assert_eq;

    fn dog(name: &str, breed: &str) -> Record {
        Record::new().with("name", name).with("breed", breed)
    }

    async fn open_dogs(factory: &MemoryFactory) -> MemoryDatabase {
        factory
            .open("test", 1, |db, _txn, _change| async move {
                let store = db
                    .create_object_store("dogs", &StoreParams::new("id", true))
                    .map_err(|e| StoreError::operation("create store", e))?;
                store
                    .create_index("breed-index", &"breed".into(), IndexParams::default())
                    .map_err(|e| StoreError::operation("create index", e))?;
                store
                    .create_index("name-index", &"name".into(), IndexParams::unique(true))
                    .map_err(|e| StoreError::operation("create index", e))?;
                Ok(())
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_key_generator() {
        let factory = MemoryFactory::new();
        let db = open_dogs(&factory).await;
        let txn = db.transaction(&["dogs"], TransactionMode::ReadWrite).unwrap();

        assert_eq!(txn.add("dogs", dog("Comet", "Whippet")).await.unwrap(), Key::Number(1));
        let explicit = dog("Oscar", "Pointer").with("id", 10);
        assert_eq!(txn.add("dogs", explicit).await.unwrap(), Key::Number(10));
        assert_eq!(txn.add("dogs", dog("Rex", "Pug")).await.unwrap(), Key::Number(11));

        let comet = txn.get("dogs", &Key::Number(1)).await.unwrap().unwrap();
        assert_eq!(comet.get("id"), Some(&Value::from(1)));
    }

    #[tokio::test]
    async fn test_add_duplicate_is_constraint() {
        let factory = MemoryFactory::new();
        let db = open_dogs(&factory).await;
        let txn = db.transaction(&["dogs"], TransactionMode::ReadWrite).unwrap();

        txn.add("dogs", dog("Comet", "Whippet").with("id", 1)).await.unwrap();
        let result = txn.add("dogs", dog("Other", "Whippet").with("id", 1)).await;
        assert!(matches!(result, Err(EngineError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_unique_index_rejects_second_owner() {
        let factory = MemoryFactory::new();
        let db = open_dogs(&factory).await;
        let txn = db.transaction(&["dogs"], TransactionMode::ReadWrite).unwrap();

        let key = txn.add("dogs", dog("Comet", "Whippet")).await.unwrap();
        let result = txn.add("dogs", dog("Comet", "Pug")).await;
        assert!(matches!(result, Err(EngineError::Constraint(_))));

        // Replacing the owner itself is fine
        let replaced = dog("Comet", "Greyhound").with("id", key.to_value());
        txn.put("dogs", replaced).await.unwrap();
        let hits = txn
            .index_get_all("dogs", "breed-index", &Key::from("Greyhound"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_index_follows_put_and_delete() {
        let factory = MemoryFactory::new();
        let db = open_dogs(&factory).await;
        let txn = db.transaction(&["dogs"], TransactionMode::ReadWrite).unwrap();

        let key = txn.add("dogs", dog("Comet", "Whippet")).await.unwrap();
        txn.put("dogs", dog("Comet", "Pug").with("id", key.to_value()))
            .await
            .unwrap();
        let whippets = txn
            .index_get_all("dogs", "breed-index", &Key::from("Whippet"))
            .await
            .unwrap();
        assert!(whippets.is_empty());

        txn.delete("dogs", &key).await.unwrap();
        let pugs = txn
            .index_get_all("dogs", "breed-index", &Key::from("Pug"))
            .await
            .unwrap();
        assert!(pugs.is_empty());
    }

    #[tokio::test]
    async fn test_abort_reverts_writes() {
        let factory = MemoryFactory::new();
        let db = open_dogs(&factory).await;

        let setup = db.transaction(&["dogs"], TransactionMode::ReadWrite).unwrap();
        setup.add("dogs", dog("Comet", "Whippet")).await.unwrap();
        setup.commit().await.unwrap();

        let txn = db.transaction(&["dogs"], TransactionMode::ReadWrite).unwrap();
        txn.add("dogs", dog("Oscar", "Pointer")).await.unwrap();
        txn.put("dogs", dog("Fireball", "Whippet").with("id", 1))
            .await
            .unwrap();
        txn.delete("dogs", &Key::Number(1)).await.unwrap();
        txn.abort().unwrap();

        let check = db.transaction(&["dogs"], TransactionMode::ReadOnly).unwrap();
        let all = check.get_all("dogs").await.unwrap();
        assert_eq!(all, vec![dog("Comet", "Whippet").with("id", 1)]);
        let comets = check
            .index_get_all("dogs", "name-index", &Key::from("Comet"))
            .await
            .unwrap();
        assert_eq!(comets.len(), 1);
    }

    #[tokio::test]
    async fn test_abort_reverts_clear() {
        let factory = MemoryFactory::new();
        let db = open_dogs(&factory).await;

        let setup = db.transaction(&["dogs"], TransactionMode::ReadWrite).unwrap();
        setup.add("dogs", dog("Comet", "Whippet")).await.unwrap();
        setup.add("dogs", dog("Oscar", "Pointer")).await.unwrap();
        setup.commit().await.unwrap();

        let txn = db.transaction(&["dogs"], TransactionMode::ReadWrite).unwrap();
        txn.clear("dogs").await.unwrap();
        assert_eq!(txn.count("dogs").await.unwrap(), 0);
        txn.abort().unwrap();

        let check = db.transaction(&["dogs"], TransactionMode::ReadOnly).unwrap();
        assert_eq!(check.count("dogs").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_commit_conflicting_with_committed_data_aborts() {
        let factory = MemoryFactory::new();
        let db = open_dogs(&factory).await;

        let first = db.transaction(&["dogs"], TransactionMode::ReadWrite).unwrap();
        first.add("dogs", dog("Comet", "Whippet").with("id", 5)).await.unwrap();

        let second = db.transaction(&["dogs"], TransactionMode::ReadWrite).unwrap();
        second.add("dogs", dog("Oscar", "Pointer").with("id", 5)).await.unwrap();
        second.commit().await.unwrap();

        assert!(matches!(first.commit().await, Err(EngineError::Constraint(_))));
        assert!(!first.is_active());

        let check = db.transaction(&["dogs"], TransactionMode::ReadOnly).unwrap();
        let all = check.get_all("dogs").await.unwrap();
        assert_eq!(all, vec![dog("Oscar", "Pointer").with("id", 5)]);
    }

    #[tokio::test]
    async fn test_generated_keys_are_not_reused_across_transactions() {
        let factory = MemoryFactory::new();
        let db = open_dogs(&factory).await;

        let first = db.transaction(&["dogs"], TransactionMode::ReadWrite).unwrap();
        let second = db.transaction(&["dogs"], TransactionMode::ReadWrite).unwrap();
        let a = first.add("dogs", dog("Comet", "Whippet")).await.unwrap();
        let b = second.add("dogs", dog("Oscar", "Pointer")).await.unwrap();
        assert_ne!(a, b);

        first.commit().await.unwrap();
        second.commit().await.unwrap();
        let check = db.transaction(&["dogs"], TransactionMode::ReadOnly).unwrap();
        assert_eq!(check.count("dogs").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_object_store_handle_in_upgrade() {
        let factory = MemoryFactory::new();
        open_dogs(&factory).await.close();

        let db = factory
            .open("test", 2, |_db, txn, _change| async move {
                let store = txn
                    .object_store("dogs")
                    .map_err(|e| StoreError::operation("open store", e))?;
                store
                    .create_index("id-index", &"id".into(), IndexParams::default())
                    .map_err(|e| StoreError::operation("create index", e))
            })
            .await
            .unwrap();

        let txn = db.transaction(&["dogs"], TransactionMode::ReadOnly).unwrap();
        let indexes = txn.object_store("dogs").unwrap().index_names();
        assert_eq!(indexes, vec!["breed-index", "id-index", "name-index"]);
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let factory = MemoryFactory::new();
        let db = open_dogs(&factory).await;
        let txn = db.transaction(&["dogs"], TransactionMode::ReadOnly).unwrap();

        let result = txn.add("dogs", dog("Comet", "Whippet")).await;
        assert_eq!(result, Err(EngineError::ReadOnly));
    }

    #[tokio::test]
    async fn test_finished_transaction_is_inactive() {
        let factory = MemoryFactory::new();
        let db = open_dogs(&factory).await;
        let txn = db.transaction(&["dogs"], TransactionMode::ReadWrite).unwrap();
        txn.commit().await.unwrap();

        assert_eq!(txn.count("dogs").await, Err(EngineError::TransactionInactive));
        assert!(matches!(txn.abort(), Err(EngineError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_unknown_store_and_scope() {
        let factory = MemoryFactory::new();
        let db = open_dogs(&factory).await;

        assert!(matches!(
            db.transaction(&["cats"], TransactionMode::ReadOnly),
            Err(EngineError::NotFound(_))
        ));
        let txn = db.transaction(&["dogs"], TransactionMode::ReadOnly).unwrap();
        assert!(matches!(
            txn.index_get_all("dogs", "age-index", &Key::Number(3)).await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_schema_change_outside_upgrade() {
        let factory = MemoryFactory::new();
        let db = open_dogs(&factory).await;

        let result = db.create_object_store("cats", &StoreParams::new("id", true));
        assert!(matches!(result, Err(EngineError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_multi_entry_index() {
        let factory = MemoryFactory::new();
        let db = factory
            .open("tags", 1, |db, _txn, _change| async move {
                let store = db
                    .create_object_store("posts", &StoreParams::new("id", true))
                    .map_err(|e| StoreError::operation("create store", e))?;
                let params = IndexParams {
                    unique: false,
                    multi_entry: true,
                };
                store
                    .create_index("tags", &"tags".into(), params)
                    .map_err(|e| StoreError::operation("create index", e))
            })
            .await
            .unwrap();

        let txn = db.transaction(&["posts"], TransactionMode::ReadWrite).unwrap();
        let post = Record::new().with("tags", serde_json::json!(["rust", "wasm", "rust"]));
        txn.add("posts", post).await.unwrap();
        txn.add("posts", Record::new().with("tags", serde_json::json!(["go"])))
            .await
            .unwrap();

        let rust = txn.index_get_all("posts", "tags", &Key::from("rust")).await.unwrap();
        assert_eq!(rust.len(), 1);
        let wasm = txn.index_get_all("posts", "tags", &Key::from("wasm")).await.unwrap();
        assert_eq!(wasm.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_key_without_generator() {
        let factory = MemoryFactory::new();
        let db = factory
            .open("keys", 1, |db, _txn, _change| async move {
                db.create_object_store("people", &StoreParams::new("email", false))
                    .map(|_| ())
                    .map_err(|e| StoreError::operation("create store", e))
            })
            .await
            .unwrap();

        let txn = db.transaction(&["people"], TransactionMode::ReadWrite).unwrap();
        let result = txn.add("people", Record::new().with("name", "Ann")).await;
        assert!(matches!(result, Err(EngineError::Data(_))));
    }
}
