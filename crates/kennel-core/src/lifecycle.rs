//! Database lifecycle
//!
//! A connection moves through `Closed -> Opening -> (Upgrading)? -> Open`.
//! `Upgrading` is entered only when the requested version is above the stored
//! one (a missing database counts as version 0), and the upgrade routine,
//! including every facade call it awaits, finishes before the open resolves.

use std::future::Future;

use tracing::{error, info};

use crate::error::{StoreError, StoreResult};
use crate::record::VersionChange;
use crate::storage::{Database, Factory, TransactionOf};

/// Open `name` at `version`, running `upgrade` once if the stored version is
/// lower.
///
/// The upgrade routine receives the database handle, the version change
/// transaction (pass it to facade calls as the supplied transaction) and the
/// old and new version numbers.
pub async fn open_db<F, U, Fut>(factory: &F, name: &str, version: u32, upgrade: U) -> StoreResult<F::Database>
where
    F: Factory,
    U: FnOnce(F::Database, TransactionOf<F::Database>, VersionChange) -> Fut + 'static,
    Fut: Future<Output = StoreResult<()>> + 'static,
{
    info!(db = name, version, "opening database");

    let db_name = name.to_string();
    let upgrade = move |db: F::Database, txn, change: VersionChange| {
        info!(
            db = %db_name,
            old = change.old_version,
            new = change.new_version,
            "upgrading database"
        );
        upgrade(db, txn, change)
    };

    match factory.open(name, version, upgrade).await {
        Ok(db) => {
            info!(db = name, version = db.version(), "database open");
            Ok(db)
        }
        Err(cause) => {
            error!(db = name, error = %cause, "failed to open database");
            Err(StoreError::Open {
                name: name.to_string(),
                cause,
            })
        }
    }
}

/// Delete the database `name`.
pub async fn delete_db<F: Factory>(factory: &F, name: &str) -> StoreResult<()> {
    factory.delete_database(name).await.map_err(|cause| {
        error!(db = name, error = %cause, "failed to delete database");
        StoreError::Open {
            name: name.to_string(),
            cause,
        }
    })?;
    info!(db = name, "database deleted");
    Ok(())
}
