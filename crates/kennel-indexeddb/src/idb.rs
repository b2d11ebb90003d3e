//! Low-level IndexedDB helpers using web-sys
//!
//! Wraps the callback-based IndexedDB API into Rust futures using
//! `wasm_bindgen_futures::JsFuture` and `js_sys::Promise`. Rejections carry the
//! engine's `DOMException`, so callers can tell a `ConstraintError` from an
//! `AbortError`.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use js_sys::Promise;
use kennel_core::{StoreResult, VersionChange};
use tracing::{debug, error, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{IdbDatabase, IdbFactory, IdbOpenDbRequest, IdbRequest, IdbTransaction};

use crate::error::{IndexedDbError, Result};

/// Type alias for upgrade closure to reduce complexity
type UpgradeClosure = Rc<RefCell<Option<Closure<dyn FnMut(web_sys::IdbVersionChangeEvent)>>>>;

type ClosurePair = (
    Closure<dyn FnMut(web_sys::Event)>,
    Closure<dyn FnMut(web_sys::Event)>,
);

/// Get the global IndexedDB factory (window or worker scope).
pub fn idb_factory() -> Result<IdbFactory> {
    let global = js_sys::global();

    let idb: JsValue = js_sys::Reflect::get(&global, &"indexedDB".into())
        .map_err(|_| IndexedDbError::NotAvailable("no indexedDB on global".into()))?;

    if idb.is_undefined() || idb.is_null() {
        return Err(IndexedDbError::NotAvailable(
            "indexedDB is null/undefined".into(),
        ));
    }

    idb.dyn_into::<IdbFactory>()
        .map_err(|_| IndexedDbError::NotAvailable("indexedDB is not IdbFactory".into()))
}

/// Convert an IdbRequest into a JS Promise that resolves with the request's
/// result and rejects with its `DOMException`.
fn request_to_promise(req: &IdbRequest) -> Promise {
    let req = req.clone();

    Promise::new(&mut move |resolve, reject| {
        // Both closures live until one of them fires
        let closures: Rc<RefCell<Option<ClosurePair>>> = Rc::new(RefCell::new(None));

        let req_s = req.clone();
        let closures_for_success = closures.clone();
        let on_success = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let result = req_s.result().unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::UNDEFINED, &result);
            *closures_for_success.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let req_e = req.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |event: web_sys::Event| {
            let reason = match req_e.error() {
                Ok(Some(dom)) => JsValue::from(dom),
                _ => JsValue::from_str("unknown IDB error"),
            };
            // Abort is left to the caller
            event.prevent_default();
            let _ = reject.call1(&JsValue::UNDEFINED, &reason);
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        req.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        *closures.borrow_mut() = Some((on_success, on_error));
    })
}

/// Convert an IdbTransaction completion into a JS Promise. An aborted
/// transaction rejects with its error, or an `AbortError` when none is set.
fn transaction_to_promise(tx: &IdbTransaction) -> Promise {
    let tx = tx.clone();

    Promise::new(&mut move |resolve, reject| {
        let closures: Rc<RefCell<Option<ClosurePair>>> = Rc::new(RefCell::new(None));

        let closures_for_complete = closures.clone();
        let on_complete = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let _ = resolve.call0(&JsValue::UNDEFINED);
            *closures_for_complete.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let tx_a = tx.clone();
        let closures_for_abort = closures.clone();
        let on_abort = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let reason = match tx_a.error() {
                Some(dom) => JsValue::from(dom),
                None => abort_error("transaction was aborted"),
            };
            let _ = reject.call1(&JsValue::UNDEFINED, &reason);
            *closures_for_abort.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        tx.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
        tx.set_onabort(Some(on_abort.as_ref().unchecked_ref()));

        *closures.borrow_mut() = Some((on_complete, on_abort));
    })
}

/// A `DOMException` named `AbortError`, or a plain string if one cannot be built.
fn abort_error(message: &str) -> JsValue {
    web_sys::DomException::new_with_message_and_name(message, "AbortError")
        .map(JsValue::from)
        .unwrap_or_else(|_| JsValue::from_str(message))
}

/// Await an IdbRequest, resolving to its result JsValue.
pub async fn await_request(req: &IdbRequest) -> Result<JsValue> {
    let promise = request_to_promise(req);
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(IndexedDbError::from)
}

/// Commit `tx` and wait for it to complete.
pub async fn commit_transaction(tx: &IdbTransaction) -> Result<()> {
    // Listen before committing so the complete event cannot be missed
    let promise = transaction_to_promise(tx);
    tx.commit().map_err(IndexedDbError::from)?;
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(IndexedDbError::from)?;
    Ok(())
}

/// Open `db_name` at `version`, running `upgrade` inside the version change
/// transaction when the stored version is lower.
///
/// `wrap` turns the raw connection and version change transaction into the
/// handles the upgrade routine receives. If the upgrade fails, the version
/// change transaction is aborted, which fails the open request with an
/// `AbortError` and leaves the stored database untouched.
pub async fn open_database<D, T, W, U, Fut>(
    db_name: &str,
    version: u32,
    wrap: W,
    upgrade: U,
) -> Result<IdbDatabase>
where
    W: Fn(IdbDatabase, IdbTransaction) -> (D, T) + 'static,
    U: FnOnce(D, T, VersionChange) -> Fut + 'static,
    Fut: Future<Output = StoreResult<()>> + 'static,
{
    let factory = idb_factory()?;

    let open_req: IdbOpenDbRequest = factory
        .open_with_u32(db_name, version)
        .map_err(IndexedDbError::from)?;

    let upgrade_closure: UpgradeClosure = Rc::new(RefCell::new(None));
    let pending: Rc<RefCell<Option<U>>> = Rc::new(RefCell::new(Some(upgrade)));

    let req = open_req.clone();
    let on_upgrade = Closure::wrap(Box::new(move |event: web_sys::IdbVersionChangeEvent| {
        let Some(upgrade) = pending.borrow_mut().take() else {
            return;
        };
        let (db, tx) = match (req.result(), req.transaction()) {
            (Ok(db), Some(tx)) => (db.unchecked_into::<IdbDatabase>(), tx),
            _ => {
                error!("upgradeneeded fired without a database or transaction");
                return;
            }
        };
        let change = VersionChange {
            old_version: event.old_version() as u32,
            new_version: event.new_version().map(|v| v as u32).unwrap_or(version),
        };

        let (db, txn) = wrap(db, tx.clone());
        let future = upgrade(db, txn, change);

        // Microtasks queued here run before the version change transaction
        // goes inactive, so schema calls made by the routine are accepted.
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(err) = future.await {
                error!(error = %err, "upgrade failed, aborting version change");
                if let Err(e) = tx.abort() {
                    debug!(error = ?e, "version change transaction already finished");
                }
            }
        });
    }) as Box<dyn FnMut(web_sys::IdbVersionChangeEvent)>);

    let on_blocked = Closure::wrap(Box::new(move |_event: web_sys::Event| {
        warn!("database open blocked by another connection");
    }) as Box<dyn FnMut(web_sys::Event)>);

    open_req.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));
    open_req.set_onblocked(Some(on_blocked.as_ref().unchecked_ref()));

    // Keep the upgrade closure alive for the duration of the open request
    *upgrade_closure.borrow_mut() = Some(on_upgrade);

    let result = await_request(open_req.unchecked_ref()).await;

    *upgrade_closure.borrow_mut() = None;
    open_req.set_onblocked(None);
    drop(on_blocked);

    let db = result?
        .dyn_into::<IdbDatabase>()
        .map_err(|_| IndexedDbError::JsValue("open result is not IdbDatabase".into()))?;

    // Yield to newer versions opened elsewhere instead of blocking them
    let handle = db.clone();
    let on_version_change = Closure::wrap(Box::new(move |_event: web_sys::Event| {
        warn!(db = %handle.name(), "newer version requested elsewhere, closing connection");
        handle.close();
    }) as Box<dyn FnMut(web_sys::Event)>);
    db.set_onversionchange(Some(on_version_change.as_ref().unchecked_ref()));
    on_version_change.forget();

    Ok(db)
}

/// Current version of an existing database.
pub async fn stored_version(db_name: &str) -> Result<u32> {
    let factory = idb_factory()?;
    let req = factory.open(db_name).map_err(IndexedDbError::from)?;
    let db = await_request(req.unchecked_ref())
        .await?
        .dyn_into::<IdbDatabase>()
        .map_err(|_| IndexedDbError::JsValue("open result is not IdbDatabase".into()))?;
    let version = db.version() as u32;
    db.close();
    Ok(version)
}

/// Delete an IndexedDB database by name.
pub async fn delete_database(db_name: &str) -> Result<()> {
    let factory = idb_factory()?;
    let req = factory
        .delete_database(db_name)
        .map_err(IndexedDbError::from)?;
    await_request(req.unchecked_ref()).await?;
    Ok(())
}
