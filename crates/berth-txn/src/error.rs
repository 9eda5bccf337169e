//! Error types for the transaction executor.

use berth_doc_types::DocumentStoreError;
use snafu::Snafu;

/// Errors from running transactions against the document store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TxnError {
    /// Every attempt was rejected because an assertion no longer held.
    #[snafu(display("max retries exceeded for {operation}: {attempts} attempts"))]
    MaxRetriesExceeded {
        /// Description of the operation.
        operation: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Sequence numbers exhausted (u64 overflow).
    #[snafu(display("sequence exhausted for '{name}'"))]
    SequenceExhausted {
        /// The sequence name.
        name: String,
    },

    /// Data in storage is corrupted or unparseable.
    #[snafu(display("corrupted data in '{collection}/{id}': {reason}"))]
    CorruptedData {
        /// Collection holding the document.
        collection: String,
        /// Document id.
        id: String,
        /// Description of what went wrong.
        reason: String,
    },

    /// Underlying store error.
    #[snafu(display("storage error: {source}"))]
    Store {
        /// The underlying error.
        source: DocumentStoreError,
    },

    /// JSON serialization/deserialization error.
    #[snafu(display("serialization error: {source}"))]
    Serialization {
        /// The underlying error.
        source: serde_json::Error,
    },
}

impl From<DocumentStoreError> for TxnError {
    fn from(source: DocumentStoreError) -> Self {
        TxnError::Store { source }
    }
}

impl From<serde_json::Error> for TxnError {
    fn from(source: serde_json::Error) -> Self {
        TxnError::Serialization { source }
    }
}
