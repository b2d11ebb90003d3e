//! Transaction adapter
//!
//! Bridges one pending engine request to one awaitable result. On success a
//! self-managed transaction is committed; on failure the transaction is
//! aborted whoever owns it, and the error names the attempted action.

use std::future::Future;

use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult, StoreError, StoreResult};
use crate::storage::Transaction;

/// Await `pending` and finalize `txn` accordingly.
///
/// `supplied` marks a caller-owned transaction: it is never committed here,
/// but it is still aborted when the request fails.
pub async fn settle<T, X, F>(txn: &X, action: &'static str, supplied: bool, pending: F) -> StoreResult<T>
where
    X: Transaction,
    F: Future<Output = EngineResult<T>>,
{
    match pending.await {
        Ok(value) => {
            if !supplied {
                txn.commit()
                    .await
                    .map_err(|cause| fail(txn, action, cause))?;
            }
            debug!(action, supplied, "succeeded");
            Ok(value)
        }
        Err(cause) => Err(fail(txn, action, cause)),
    }
}

/// Abort `txn` and build the error for `action`.
pub(crate) fn fail<X: Transaction>(txn: &X, action: &'static str, cause: EngineError) -> StoreError {
    if let Err(abort_err) = txn.abort() {
        // The engine may already have aborted it when the request failed
        debug!(action, error = %abort_err, "abort after failure did not apply");
    }
    warn!(action, error = %cause, "failed to {}", action);
    StoreError::operation(action, cause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, StoreParams, TransactionMode};
    use crate::storage::{Database, Factory, MemoryDatabase, MemoryFactory};

    async fn open() -> MemoryDatabase {
        MemoryFactory::new()
            .open("adapter", 1, |db, _txn, _change| async move {
                db.create_object_store("items", &StoreParams::new("id", true))
                    .map(|_| ())
                    .map_err(|e| StoreError::operation("create store", e))
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_commits_self_managed() {
        let db = open().await;
        let txn = db.transaction(&["items"], TransactionMode::ReadWrite).unwrap();

        let key = settle(&txn, "create record", false, txn.add("items", Record::new()))
            .await
            .unwrap();
        assert_eq!(key.as_i64(), Some(1));
        // Committed: the transaction no longer accepts requests
        assert_eq!(txn.count("items").await, Err(EngineError::TransactionInactive));
    }

    #[tokio::test]
    async fn test_leaves_supplied_open() {
        let db = open().await;
        let txn = db.transaction(&["items"], TransactionMode::ReadWrite).unwrap();

        settle(&txn, "create record", true, txn.add("items", Record::new()))
            .await
            .unwrap();
        assert_eq!(txn.count("items").await, Ok(1));
    }

    #[tokio::test]
    async fn test_aborts_supplied_on_failure() {
        let db = open().await;
        let txn = db.transaction(&["items"], TransactionMode::ReadWrite).unwrap();
        txn.add("items", Record::new().with("id", 5)).await.unwrap();

        let err = settle(
            &txn,
            "create record",
            true,
            txn.add("items", Record::new().with("id", 5)),
        )
        .await
        .unwrap_err();

        assert_eq!(err.action(), Some("create record"));
        assert!(err.is_conflict());

        // The first write was rolled back with the transaction
        let check = db.transaction(&["items"], TransactionMode::ReadOnly).unwrap();
        assert_eq!(check.count("items").await, Ok(0));
    }
}
