//! Record-store engine abstraction
//!
//! This module defines the traits the facade drives and an in-memory engine.
//! Implementations exist for:
//!
//! - **Memory**: in-process engine for tests, the native CLI and hosts without
//!   IndexedDB (`MemoryFactory`)
//! - **IndexedDB**: browser engine via web-sys (separate crate, WASM only)
//!
//! # Example
//!
//! ```rust
//! use kennel_core::storage::{Database, Factory, MemoryFactory, Transaction};
//! use kennel_core::{Record, StoreParams, TransactionMode};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let factory = MemoryFactory::new();
//! let db = factory
//!     .open("notes", 1, |db, _txn, _change| async move {
//!         db.create_object_store("notes", &StoreParams::new("id", true))
//!             .map(|_| ())
//!             .map_err(|e| kennel_core::StoreError::operation("create store", e))
//!     })
//!     .await
//!     .unwrap();
//!
//! let txn = db.transaction(&["notes"], TransactionMode::ReadWrite).unwrap();
//! let key = txn.add("notes", Record::new().with("text", "hi")).await.unwrap();
//! txn.commit().await.unwrap();
//! assert_eq!(key.as_i64(), Some(1));
//! # });
//! ```

mod memory;
mod traits;

pub use memory::{MemoryDatabase, MemoryFactory, MemoryObjectStore, MemoryTransaction};
pub use traits::{Database, Factory, ObjectStore, ObjectStoreOf, Transaction, TransactionOf};
