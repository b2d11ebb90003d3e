//! IndexedDB engine
//!
//! Implements the kennel-core engine traits over web-sys. Every handle wraps
//! the corresponding browser object, so cloning a handle is a JS reference
//! copy.

use std::future::Future;

use js_sys::{Array, Reflect};
use kennel_core::storage::{Database, Factory, ObjectStore, Transaction};
use kennel_core::{
    EngineError, EngineResult, IndexParams, Key, KeyPath, Record, StoreParams, StoreResult,
    TransactionMode, VersionChange,
};
use tracing::debug;
use wasm_bindgen::JsValue;
use web_sys::{
    IdbDatabase, IdbIndexParameters, IdbObjectStore, IdbObjectStoreParameters, IdbTransaction,
    IdbTransactionMode,
};

use crate::convert::{
    key_from_js, key_path_from_js, key_path_to_js, key_to_js, record_from_js, record_to_js,
    records_from_js, string_list,
};
use crate::error::{js_err, IndexedDbError};
use crate::idb;

/// Set a property on a parameters dictionary.
fn set_param(target: &JsValue, name: &str, value: &JsValue) -> EngineResult<()> {
    Reflect::set(target, &JsValue::from_str(name), value)
        .map(|_| ())
        .map_err(js_err)
}

/// The browser's IndexedDB factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedDbFactory;

impl IndexedDbFactory {
    pub fn new() -> Self {
        Self
    }

    /// Whether IndexedDB exists in the current global scope.
    pub fn is_available() -> bool {
        idb::idb_factory().is_ok()
    }
}

impl Factory for IndexedDbFactory {
    type Database = IndexedDbDatabase;

    async fn open<U, Fut>(&self, name: &str, version: u32, upgrade: U) -> EngineResult<IndexedDbDatabase>
    where
        U: FnOnce(IndexedDbDatabase, IndexedDbTransaction, VersionChange) -> Fut + 'static,
        Fut: Future<Output = StoreResult<()>> + 'static,
    {
        if version == 0 {
            return Err(EngineError::InvalidState(
                "database version must be at least 1".into(),
            ));
        }

        let wrap = |db: IdbDatabase, tx: IdbTransaction| {
            (IndexedDbDatabase { db }, IndexedDbTransaction { tx })
        };

        match idb::open_database(name, version, wrap, upgrade).await {
            Ok(db) => Ok(IndexedDbDatabase { db }),
            Err(err) => match EngineError::from(err) {
                EngineError::Version { .. } => {
                    let stored = idb::stored_version(name).await.unwrap_or(0);
                    Err(EngineError::Version {
                        requested: version,
                        stored,
                    })
                }
                other => Err(other),
            },
        }
    }

    async fn delete_database(&self, name: &str) -> EngineResult<()> {
        idb::delete_database(name).await.map_err(EngineError::from)
    }
}

/// An open IndexedDB connection.
#[derive(Debug, Clone)]
pub struct IndexedDbDatabase {
    db: IdbDatabase,
}

impl Database for IndexedDbDatabase {
    type Transaction = IndexedDbTransaction;
    type ObjectStore = IndexedDbObjectStore;

    fn name(&self) -> String {
        self.db.name()
    }

    fn version(&self) -> u32 {
        self.db.version() as u32
    }

    fn store_names(&self) -> Vec<String> {
        string_list(&self.db.object_store_names())
    }

    fn transaction(&self, stores: &[&str], mode: TransactionMode) -> EngineResult<IndexedDbTransaction> {
        let mode = match mode {
            TransactionMode::ReadOnly => IdbTransactionMode::Readonly,
            TransactionMode::ReadWrite => IdbTransactionMode::Readwrite,
            TransactionMode::VersionChange => {
                return Err(EngineError::InvalidState(
                    "version change transactions are started by open".into(),
                ))
            }
        };

        let tx = match stores {
            [single] => self.db.transaction_with_str_and_mode(single, mode),
            _ => {
                let names: Array = stores.iter().map(|s| JsValue::from_str(s)).collect();
                self.db.transaction_with_str_sequence_and_mode(&names, mode)
            }
        }
        .map_err(js_err)?;

        Ok(IndexedDbTransaction { tx })
    }

    fn create_object_store(&self, name: &str, params: &StoreParams) -> EngineResult<IndexedDbObjectStore> {
        let options = IdbObjectStoreParameters::new();
        set_param(&options, "keyPath", &key_path_to_js(&params.key_path))?;
        set_param(&options, "autoIncrement", &JsValue::from_bool(params.auto_increment))?;

        let store = self
            .db
            .create_object_store_with_optional_parameters(name, &options)
            .map_err(js_err)?;
        Ok(IndexedDbObjectStore { store })
    }

    fn delete_object_store(&self, name: &str) -> EngineResult<()> {
        self.db.delete_object_store(name).map_err(js_err)
    }

    fn close(&self) {
        self.db.close();
    }
}

/// Schema handle to an IndexedDB object store.
#[derive(Debug, Clone)]
pub struct IndexedDbObjectStore {
    store: IdbObjectStore,
}

impl ObjectStore for IndexedDbObjectStore {
    fn name(&self) -> String {
        self.store.name()
    }

    fn index_names(&self) -> Vec<String> {
        string_list(&self.store.index_names())
    }

    fn create_index(&self, name: &str, key_path: &KeyPath, params: IndexParams) -> EngineResult<()> {
        let options = IdbIndexParameters::new();
        set_param(&options, "unique", &JsValue::from_bool(params.unique))?;
        set_param(&options, "multiEntry", &JsValue::from_bool(params.multi_entry))?;

        match key_path {
            KeyPath::Attribute(attr) => self
                .store
                .create_index_with_str_and_optional_parameters(name, attr, &options),
            KeyPath::Compound(_) => self
                .store
                .create_index_with_str_sequence_and_optional_parameters(
                    name,
                    &key_path_to_js(key_path),
                    &options,
                ),
        }
        .map(|_| ())
        .map_err(js_err)
    }
}

/// An IndexedDB transaction.
#[derive(Debug, Clone)]
pub struct IndexedDbTransaction {
    tx: IdbTransaction,
}

impl IndexedDbTransaction {
    fn store(&self, name: &str) -> EngineResult<IdbObjectStore> {
        self.tx.object_store(name).map_err(js_err)
    }

    /// Issue a request and wait for its result.
    async fn request(
        &self,
        issue: impl FnOnce() -> Result<web_sys::IdbRequest, JsValue>,
    ) -> EngineResult<JsValue> {
        let req = issue().map_err(js_err)?;
        idb::await_request(&req).await.map_err(EngineError::from)
    }
}

impl Transaction for IndexedDbTransaction {
    type ObjectStore = IndexedDbObjectStore;

    fn mode(&self) -> TransactionMode {
        match self.tx.mode() {
            Ok(IdbTransactionMode::Readwrite) => TransactionMode::ReadWrite,
            Ok(IdbTransactionMode::Versionchange) => TransactionMode::VersionChange,
            _ => TransactionMode::ReadOnly,
        }
    }

    fn store_names(&self) -> Vec<String> {
        string_list(&self.tx.object_store_names())
    }

    fn object_store(&self, name: &str) -> EngineResult<IndexedDbObjectStore> {
        Ok(IndexedDbObjectStore {
            store: self.store(name)?,
        })
    }

    fn key_path(&self, store: &str) -> EngineResult<KeyPath> {
        let path = self.store(store)?.key_path().map_err(js_err)?;
        key_path_from_js(&path).map_err(EngineError::from)
    }

    fn index_key_path(&self, store: &str, index: &str) -> EngineResult<KeyPath> {
        let index = self.store(store)?.index(index).map_err(js_err)?;
        let path = index.key_path().map_err(js_err)?;
        key_path_from_js(&path).map_err(EngineError::from)
    }

    async fn add(&self, store: &str, record: Record) -> EngineResult<Key> {
        let os = self.store(store)?;
        let value = record_to_js(&record)?;
        let key = self.request(|| os.add(&value)).await?;
        Ok(key_from_js(&key)?)
    }

    async fn put(&self, store: &str, record: Record) -> EngineResult<Key> {
        let os = self.store(store)?;
        let value = record_to_js(&record)?;
        let key = self.request(|| os.put(&value)).await?;
        Ok(key_from_js(&key)?)
    }

    async fn get(&self, store: &str, key: &Key) -> EngineResult<Option<Record>> {
        let os = self.store(store)?;
        let result = self.request(|| os.get(&key_to_js(key))).await?;
        if result.is_undefined() || result.is_null() {
            return Ok(None);
        }
        Ok(Some(record_from_js(&result)?))
    }

    async fn get_all(&self, store: &str) -> EngineResult<Vec<Record>> {
        let os = self.store(store)?;
        let result = self.request(|| os.get_all()).await?;
        Ok(records_from_js(&result)?)
    }

    async fn count(&self, store: &str) -> EngineResult<u64> {
        let os = self.store(store)?;
        let result = self.request(|| os.count()).await?;
        result
            .as_f64()
            .map(|n| n as u64)
            .ok_or_else(|| IndexedDbError::JsValue("count is not a number".into()).into())
    }

    async fn delete(&self, store: &str, key: &Key) -> EngineResult<()> {
        let os = self.store(store)?;
        self.request(|| os.delete(&key_to_js(key))).await?;
        Ok(())
    }

    async fn clear(&self, store: &str) -> EngineResult<()> {
        let os = self.store(store)?;
        self.request(|| os.clear()).await?;
        Ok(())
    }

    async fn index_get_all(&self, store: &str, index: &str, value: &Key) -> EngineResult<Vec<Record>> {
        let index = self.store(store)?.index(index).map_err(js_err)?;
        let result = self.request(|| index.get_all_with_key(&key_to_js(value))).await?;
        Ok(records_from_js(&result)?)
    }

    async fn commit(&self) -> EngineResult<()> {
        idb::commit_transaction(&self.tx).await.map_err(EngineError::from)
    }

    fn abort(&self) -> EngineResult<()> {
        debug!("aborting transaction");
        self.tx.abort().map_err(js_err)
    }
}
