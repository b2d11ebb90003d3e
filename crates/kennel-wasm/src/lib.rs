//! Kennel service-worker bridge
//!
//! Opens the dog database in IndexedDB once, then answers intercepted fetches
//! for the dog routes. A worker script drives it like this:
//!
//! ```js
//! import init, { open_worker } from './kennel_wasm.js';
//!
//! const ready = init().then(() => open_worker(null, 'info'));
//!
//! self.addEventListener('fetch', event => {
//!   const { pathname } = new URL(event.request.url);
//!   event.respondWith(ready.then(async worker => {
//!     const form = event.request.method === 'POST'
//!       ? JSON.stringify(Object.fromEntries(await event.request.formData()))
//!       : null;
//!     return (await worker.handle(event.request.method, pathname, form)) ?? fetch(event.request);
//!   }));
//! });
//! ```
//!
//! The service is built from the opened database and handed to the worker
//! object; nothing is kept in globals.

pub mod logging;

use std::rc::Rc;

use js_sys::{Promise, Reflect};
use kennel::request::{content_type, parse_method};
use kennel::{start, AppConfig, AppError, DogService, Request, Response};
use kennel_core::storage::Database;
use kennel_indexeddb::{IndexedDbDatabase, IndexedDbFactory};
use serde_json::Value;
use tracing::info;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

fn to_js(err: AppError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Decode the form fields a worker script collected with
/// `JSON.stringify(Object.fromEntries(formData))`.
fn parse_form_json(json: Option<&str>) -> kennel::Result<Vec<(String, String)>> {
    let Some(json) = json else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<Value>(json)? {
        Value::Object(fields) => Ok(fields
            .into_iter()
            .map(|(name, value)| match value {
                Value::String(s) => (name, s),
                other => (name, other.to_string()),
            })
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(AppError::Request(format!("form must be a JSON object, got {}", other))),
    }
}

/// Convert to a fetch `Response`.
fn to_web_response(response: &Response) -> Result<web_sys::Response, JsValue> {
    let headers = web_sys::Headers::new()?;
    headers.set("Content-Type", content_type(response))?;

    let init = web_sys::ResponseInit::new();
    Reflect::set(&init, &"status".into(), &JsValue::from(response.status().as_u16()))?;
    Reflect::set(&init, &"headers".into(), &headers)?;

    web_sys::Response::new_with_opt_str_and_init(Some(response.body().as_str()), &init)
}

/// Open the dog database and build the worker.
///
/// `config_json` is an `AppConfig` object (missing fields take defaults:
/// `{"db_name": "myDB", "db_version": 1, "migration": "recreate"}`).
/// `log_filter` is a tracing filter directive, `"info"` when omitted.
#[wasm_bindgen]
pub async fn open_worker(
    config_json: Option<String>,
    log_filter: Option<String>,
) -> Result<DogWorker, JsValue> {
    // Route Rust panics to console.error instead of "RuntimeError: unreachable"
    console_error_panic_hook::set_once();
    logging::init_with_filter(log_filter.as_deref().unwrap_or("info"));

    let config = match config_json {
        Some(json) => AppConfig::from_json(&json).map_err(to_js)?,
        None => AppConfig::default(),
    };

    let service = start(&IndexedDbFactory::new(), config).await.map_err(to_js)?;
    info!("dog worker ready");

    Ok(DogWorker {
        service: Rc::new(service),
    })
}

/// Answers dog requests from an open IndexedDB database.
#[wasm_bindgen]
pub struct DogWorker {
    service: Rc<DogService<IndexedDbDatabase>>,
}

#[wasm_bindgen]
impl DogWorker {
    /// Whether a dog route handles `method` and `path`.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        parse_method(method).is_ok_and(|m| self.service.matches(&m, path))
    }

    /// Handle a request. The promise resolves to a `Response`, or to `null`
    /// when no dog route matches, so the caller can fall back to the network.
    pub fn handle(&self, method: String, path: String, form_json: Option<String>) -> Promise {
        let service = self.service.clone();

        future_to_promise(async move {
            let Ok(method) = parse_method(&method) else {
                return Ok(JsValue::NULL);
            };
            let form = parse_form_json(form_json.as_deref()).map_err(to_js)?;
            let request = Request::new(method, path).with_form(form);

            match service.handle(&request).await {
                Some(response) => to_web_response(&response).map(JsValue::from),
                None => Ok(JsValue::NULL),
            }
        })
    }

    #[wasm_bindgen(getter)]
    pub fn db_name(&self) -> String {
        self.service.config().db_name.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn db_version(&self) -> u32 {
        self.service.controller().store().database().version()
    }

    /// Close the database connection.
    pub fn close(&self) {
        self.service.controller().store().database().close();
    }
}
