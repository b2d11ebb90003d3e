//! Error types for the record store

use thiserror::Error;

/// Errors reported by a record-store engine.
///
/// Variants follow the exception names of the browser engine so that both the
/// IndexedDB and the in-memory engine fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Duplicate primary key or unique index violation
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Unknown object store or index
    #[error("not found: {0}")]
    NotFound(String),

    /// Write attempted in a read-only transaction
    #[error("transaction is read-only")]
    ReadOnly,

    /// Request issued against a committed or aborted transaction
    #[error("transaction is not active")]
    TransactionInactive,

    /// Operation not allowed in the current state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Missing or invalid key
    #[error("data error: {0}")]
    Data(String),

    /// Requested version is lower than the stored one
    #[error("requested version {requested} is less than stored version {stored}")]
    Version { requested: u32, stored: u32 },

    /// Transaction or upgrade aborted
    #[error("aborted: {0}")]
    Aborted(String),

    /// Storage quota exhausted
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other engine failure
    #[error("engine error: {0}")]
    Backend(String),
}

/// Result type for engine requests
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the record store facade and the lifecycle manager.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The database could not be opened or migrated
    #[error("failed to open database {name}: {cause}")]
    Open { name: String, cause: EngineError },

    /// A single store operation failed; its transaction was aborted
    #[error("failed to {action}: {cause}")]
    Operation {
        action: &'static str,
        cause: EngineError,
    },
}

impl StoreError {
    pub fn operation(action: &'static str, cause: EngineError) -> Self {
        StoreError::Operation { action, cause }
    }

    /// The engine failure underneath this error.
    pub fn cause(&self) -> &EngineError {
        match self {
            StoreError::Open { cause, .. } | StoreError::Operation { cause, .. } => cause,
        }
    }

    /// The action label, for operation failures.
    pub fn action(&self) -> Option<&'static str> {
        match self {
            StoreError::Operation { action, .. } => Some(action),
            StoreError::Open { .. } => None,
        }
    }

    /// True for duplicate keys and unique index violations.
    pub fn is_conflict(&self) -> bool {
        matches!(self.cause(), EngineError::Constraint(_))
    }
}

/// Result type for facade and lifecycle operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_message_names_action() {
        let err = StoreError::operation("create record", EngineError::Constraint("key 1".into()));
        assert_eq!(
            err.to_string(),
            "failed to create record: constraint violated: key 1"
        );
        assert!(err.is_conflict());
        assert_eq!(err.action(), Some("create record"));
    }

    #[test]
    fn test_open_message_names_database() {
        let err = StoreError::Open {
            name: "myDB".into(),
            cause: EngineError::Version {
                requested: 1,
                stored: 2,
            },
        };
        assert_eq!(
            err.to_string(),
            "failed to open database myDB: requested version 1 is less than stored version 2"
        );
        assert!(!err.is_conflict());
        assert_eq!(err.action(), None);
    }
}
