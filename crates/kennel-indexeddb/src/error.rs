//! Error types for the IndexedDB engine

use kennel_core::EngineError;
use thiserror::Error;
use wasm_bindgen::JsCast;

/// Result type for IndexedDB operations
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// Errors that can occur while talking to IndexedDB
#[derive(Debug, Error)]
pub enum IndexedDbError {
    /// IndexedDB is not available in this environment
    #[error("IndexedDB not available: {0}")]
    NotAvailable(String),

    /// A DOMException raised by the engine, e.g. `ConstraintError`
    #[error("{name}: {message}")]
    Dom { name: String, message: String },

    /// Request error that did not carry a DOMException
    #[error("IndexedDB request error: {0}")]
    Request(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JavaScript value conversion error
    #[error("JS conversion error: {0}")]
    JsValue(String),
}

impl From<wasm_bindgen::JsValue> for IndexedDbError {
    fn from(val: wasm_bindgen::JsValue) -> Self {
        if let Some(dom) = val.dyn_ref::<web_sys::DomException>() {
            return IndexedDbError::Dom {
                name: dom.name(),
                message: dom.message(),
            };
        }
        let msg = js_sys::JSON::stringify(&val)
            .map(String::from)
            .unwrap_or_else(|_| format!("{:?}", val));
        IndexedDbError::Request(msg)
    }
}

/// Convert IndexedDbError to the engine error the facade understands
impl From<IndexedDbError> for EngineError {
    fn from(err: IndexedDbError) -> Self {
        match err {
            IndexedDbError::Dom { name, message } => match name.as_str() {
                "ConstraintError" => EngineError::Constraint(message),
                "NotFoundError" => EngineError::NotFound(message),
                "ReadOnlyError" => EngineError::ReadOnly,
                "TransactionInactiveError" => EngineError::TransactionInactive,
                "InvalidStateError" | "InvalidAccessError" => EngineError::InvalidState(message),
                "DataError" => EngineError::Data(message),
                // Versions are filled in by the factory, which knows them
                "VersionError" => EngineError::Version {
                    requested: 0,
                    stored: 0,
                },
                "AbortError" => EngineError::Aborted(message),
                "QuotaExceededError" => EngineError::QuotaExceeded(message),
                _ => EngineError::Backend(format!("{}: {}", name, message)),
            },
            IndexedDbError::NotAvailable(msg) => {
                EngineError::Backend(format!("IndexedDB not available: {}", msg))
            }
            IndexedDbError::Request(msg) => EngineError::Backend(format!("IndexedDB request: {}", msg)),
            IndexedDbError::Json(e) => EngineError::Data(format!("record is not valid JSON: {}", e)),
            IndexedDbError::JsValue(msg) => EngineError::Data(msg),
        }
    }
}

/// Map a thrown JS value straight to an engine error.
pub(crate) fn js_err(val: wasm_bindgen::JsValue) -> EngineError {
    IndexedDbError::from(val).into()
}
