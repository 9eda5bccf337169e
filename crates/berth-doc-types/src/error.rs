//! Error type for document store operations.

use thiserror::Error;

/// Errors returned by a [`DocumentStore`](https://docs.rs/berth-traits) implementation.
///
/// An assertion that does not hold is *not* an error: it is reported through
/// [`TxnResult::conditions_met`](crate::TxnResult) so the caller can rebuild
/// its operations from fresh state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentStoreError {
    #[error("document '{collection}/{id}' not found")]
    NotFound { collection: String, id: String },
    #[error("operation failed: {reason}")]
    Failed { reason: String },
    #[error("document id must not be empty")]
    EmptyId,
    #[error("collection name must not be empty")]
    EmptyCollection,
    #[error("document id size {size} exceeds maximum of {max} bytes")]
    IdTooLarge { size: u32, max: u32 },
    #[error("collection name size {size} exceeds maximum of {max} bytes")]
    CollectionNameTooLarge { size: u32, max: u32 },
    #[error("transaction size {size} exceeds maximum of {max} operations")]
    BatchTooLarge { size: u32, max: u32 },
    #[error("operation on '{id}' has {size} field conditions, maximum is {max}")]
    TooManyConditions { id: String, size: u32, max: u32 },
    #[error("transaction targets '{collection}/{id}' more than once")]
    DuplicateTarget { collection: String, id: String },
    #[error("invalid document '{collection}/{id}': {reason}")]
    InvalidDocument {
        collection: String,
        id: String,
        reason: String,
    },
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}
