//! Kennel record store
//!
//! A thin, typed layer over a transactional key-value record store (IndexedDB in
//! the browser, an in-memory engine everywhere else). It provides:
//!
//! - **adapter**: turns one pending engine request into one awaitable result and
//!   finalizes self-managed transactions
//! - **facade**: [`RecordStore`], create/read/update/delete/count, index lookups,
//!   index-driven bulk delete/update and schema mutation during upgrades
//! - **lifecycle**: [`open_db`], opening and migrating a versioned database
//! - **storage**: the engine traits and the in-memory engine
//!
//! Every operation accepts an optional caller-supplied transaction. Without one,
//! the facade opens a transaction in the minimum access mode, scoped to the
//! target store, and commits or aborts it itself.
//!
//! # Example
//!
//! ```rust
//! use kennel_core::storage::MemoryFactory;
//! use kennel_core::{open_db, Record, RecordStore};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let factory = MemoryFactory::new();
//! let db = open_db(&factory, "myDB", 1, |db, _txn, _change| async move {
//!     let store = RecordStore::new(db);
//!     let dogs = store.create_store("dogs", "id", true)?;
//!     store.create_index(&dogs, "breed-index", "breed", false)?;
//!     Ok(())
//! })
//! .await
//! .unwrap();
//!
//! let store = RecordStore::new(db);
//! let comet = Record::new().with("name", "Comet").with("breed", "Whippet");
//! let key = store.create_record("dogs", comet, None).await.unwrap();
//! let found = store.get_record_by_key("dogs", &key, None).await.unwrap();
//! assert_eq!(found.unwrap().get("name"), Some(&"Comet".into()));
//! # });
//! ```

pub mod adapter;
pub mod error;
pub mod facade;
pub mod key;
pub mod lifecycle;
pub mod record;
pub mod storage;

// Re-export main types at crate root
pub use error::{EngineError, EngineResult, StoreError, StoreResult};
pub use facade::RecordStore;
pub use key::{Key, KeyPath};
pub use lifecycle::{delete_db, open_db};
pub use record::{IndexParams, Record, StoreParams, TransactionMode, VersionChange};
