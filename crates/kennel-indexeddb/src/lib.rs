//! IndexedDB engine for the kennel record store (browser WASM)
//!
//! This crate implements the kennel-core engine traits on top of the browser's
//! IndexedDB, so the same [`RecordStore`](kennel_core::RecordStore) facade and
//! [`open_db`](kennel_core::open_db) lifecycle run against persistent storage in
//! a window or service worker.
//!
//! Requests and transaction completion are bridged to Rust futures through
//! `js_sys::Promise`. Engine failures arrive as `DOMException`s and are mapped
//! to [`EngineError`](kennel_core::EngineError) by exception name.
//!
//! # Example
//!
//! ```rust,ignore
//! use kennel_core::{open_db, Record, RecordStore};
//! use kennel_indexeddb::IndexedDbFactory;
//!
//! let db = open_db(&IndexedDbFactory::new(), "myDB", 1, |db, _txn, _change| async move {
//!     let store = RecordStore::new(db);
//!     let dogs = store.create_store("dogs", "id", true)?;
//!     store.create_index(&dogs, "breed-index", "breed", false)?;
//!     Ok(())
//! })
//! .await?;
//!
//! let store = RecordStore::new(db);
//! store.create_record("dogs", Record::new().with("name", "Comet"), None).await?;
//! ```

pub mod convert;
pub mod engine;
pub mod error;
pub mod idb;

pub use engine::{IndexedDbDatabase, IndexedDbFactory, IndexedDbObjectStore, IndexedDbTransaction};
pub use error::{IndexedDbError, Result};
