//! Engine trait definitions
//!
//! The facade talks to a record-store engine through these traits only. Every
//! handle is a cheap clone of a shared engine object, and every request is a
//! future: the browser engine completes requests through events, the in-memory
//! engine completes them immediately.
//!
//! Futures are not `Send`. Both engines run on a single thread (a browser
//! worker, or a current-thread runtime natively).

#![allow(async_fn_in_trait)]

use std::future::Future;

use crate::error::{EngineResult, StoreResult};
use crate::key::{Key, KeyPath};
use crate::record::{IndexParams, Record, StoreParams, TransactionMode, VersionChange};

/// Opens, migrates and deletes databases.
pub trait Factory {
    type Database: Database;

    /// Open `name` at `version`.
    ///
    /// When the stored version is lower than `version` (a missing database has
    /// version 0), `upgrade` runs inside a version-change transaction and must
    /// finish before `open` resolves. A failing upgrade aborts that transaction,
    /// leaving schema, data and version as they were, and fails the open.
    async fn open<U, Fut>(
        &self,
        name: &str,
        version: u32,
        upgrade: U,
    ) -> EngineResult<Self::Database>
    where
        U: FnOnce(Self::Database, TransactionOf<Self::Database>, VersionChange) -> Fut + 'static,
        Fut: Future<Output = StoreResult<()>> + 'static;

    /// Delete a database. Deleting a database that does not exist succeeds.
    async fn delete_database(&self, name: &str) -> EngineResult<()>;
}

/// Transaction type of a database handle.
pub type TransactionOf<D> = <D as Database>::Transaction;

/// Object store handle type of a database handle.
pub type ObjectStoreOf<D> = <D as Database>::ObjectStore;

/// An open database connection.
pub trait Database: Clone + 'static {
    type Transaction: Transaction<ObjectStore = Self::ObjectStore>;
    type ObjectStore: ObjectStore;

    fn name(&self) -> String;

    fn version(&self) -> u32;

    fn store_names(&self) -> Vec<String>;

    /// Start a read-only or read-write transaction over `stores`.
    fn transaction(&self, stores: &[&str], mode: TransactionMode)
        -> EngineResult<Self::Transaction>;

    /// Create an object store. Only valid while a version-change transaction runs.
    fn create_object_store(
        &self,
        name: &str,
        params: &StoreParams,
    ) -> EngineResult<Self::ObjectStore>;

    /// Delete an object store and its indexes. Only valid while a
    /// version-change transaction runs.
    fn delete_object_store(&self, name: &str) -> EngineResult<()>;

    fn close(&self);
}

/// Schema handle to an object store, used to manage its indexes.
pub trait ObjectStore {
    fn name(&self) -> String;

    fn index_names(&self) -> Vec<String>;

    /// Create an index. Only valid while a version-change transaction runs.
    fn create_index(&self, name: &str, key_path: &KeyPath, params: IndexParams)
        -> EngineResult<()>;
}

/// A transaction over one or more object stores.
pub trait Transaction: Clone + 'static {
    type ObjectStore: ObjectStore;

    fn mode(&self) -> TransactionMode;

    /// Names of the stores this transaction can reach.
    fn store_names(&self) -> Vec<String>;

    /// Schema handle to an existing store in this transaction's scope. An
    /// upgrade routine uses it to add indexes to a store it did not create.
    fn object_store(&self, name: &str) -> EngineResult<Self::ObjectStore>;

    /// Key path of `store`.
    fn key_path(&self, store: &str) -> EngineResult<KeyPath>;

    /// Key path of `index` on `store`.
    fn index_key_path(&self, store: &str, index: &str) -> EngineResult<KeyPath>;

    /// Insert a record, failing with `Constraint` if its key exists.
    async fn add(&self, store: &str, record: Record) -> EngineResult<Key>;

    /// Insert or fully replace a record.
    async fn put(&self, store: &str, record: Record) -> EngineResult<Key>;

    async fn get(&self, store: &str, key: &Key) -> EngineResult<Option<Record>>;

    async fn get_all(&self, store: &str) -> EngineResult<Vec<Record>>;

    async fn count(&self, store: &str) -> EngineResult<u64>;

    /// Delete by key. A missing key is not an error.
    async fn delete(&self, store: &str, key: &Key) -> EngineResult<()>;

    async fn clear(&self, store: &str) -> EngineResult<()>;

    /// Every record whose `index` key equals `value`.
    async fn index_get_all(&self, store: &str, index: &str, value: &Key)
        -> EngineResult<Vec<Record>>;

    /// Commit and wait until the transaction completes.
    async fn commit(&self) -> EngineResult<()>;

    /// Abort, reverting every write made in this transaction.
    fn abort(&self) -> EngineResult<()>;
}
