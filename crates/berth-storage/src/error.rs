//! Error types for storage lifecycle operations.

use berth_doc_types::DocumentStoreError;
use berth_txn::TxnError;
use snafu::Snafu;

/// Errors from storage instance, attachment and constraint operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// The requested entity does not exist.
    #[snafu(display("{what} not found"))]
    NotFound {
        /// Human-readable description of the missing entity.
        what: String,
    },

    /// The entity being created already exists.
    #[snafu(display("{what} already exists"))]
    AlreadyExists {
        /// Human-readable description of the existing entity.
        what: String,
    },

    /// Constraints or arguments failed validation.
    #[snafu(display("{message}"))]
    Validation { message: String },

    /// No pool was given and the environment has no default for the kind.
    #[snafu(display("no storage pool specified and no default available for \"{storage}\" storage"))]
    NoDefaultPool {
        /// Charm storage name that needed a pool.
        storage: String,
    },

    /// The entity is not in a state that permits the operation.
    #[snafu(display("{message}"))]
    Precondition { message: String },

    /// A stored record could not be interpreted.
    #[snafu(display("corrupted record '{collection}/{id}': {reason}"))]
    CorruptedRecord {
        collection: String,
        id: String,
        reason: String,
    },

    /// The request needs a feature that does not exist yet.
    #[snafu(display("{message}"))]
    NotSupported { message: String },

    /// A tag or identifier is malformed.
    #[snafu(display("invalid tag \"{tag}\": {reason}"))]
    InvalidTag { tag: String, reason: String },

    /// Storage instances still exist, so the environment cannot be torn down.
    #[snafu(display(
        "environment cannot be destroyed until all persistent storage has been destroyed; \
         list storage instances to see what remains"
    ))]
    PersistentStorageExists,

    /// Transaction executor failure, including retry exhaustion.
    #[snafu(display("{source}"))]
    Txn { source: TxnError },

    /// Document store failure outside a transaction.
    #[snafu(display("storage error: {source}"))]
    Store { source: DocumentStoreError },

    /// JSON serialization/deserialization error.
    #[snafu(display("serialization error: {source}"))]
    Serialization { source: serde_json::Error },

    /// Another error, annotated with the operation that produced it.
    #[snafu(display("{operation}: {source}"))]
    Operation {
        operation: String,
        source: Box<StorageError>,
    },
}

impl StorageError {
    /// Wrap this error with the name of the failed operation.
    pub fn annotate(self, operation: impl Into<String>) -> Self {
        StorageError::Operation {
            operation: operation.into(),
            source: Box::new(self),
        }
    }

    /// The underlying error with any operation annotations removed.
    pub fn root(&self) -> &StorageError {
        match self {
            StorageError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), StorageError::NotFound { .. })
    }

    /// Whether every attempt of a transaction lost to a concurrent writer.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self.root(), StorageError::Txn {
            source: TxnError::MaxRetriesExceeded { .. }
        })
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self.root(), StorageError::Precondition { .. })
    }

    /// Whether the request was rejected as invalid. Requests for unsupported
    /// features, such as shared storage, count as invalid.
    pub fn is_validation(&self) -> bool {
        matches!(self.root(), StorageError::Validation { .. } | StorageError::NotSupported { .. })
    }
}

impl From<TxnError> for StorageError {
    fn from(source: TxnError) -> Self {
        StorageError::Txn { source }
    }
}

impl From<DocumentStoreError> for StorageError {
    fn from(source: DocumentStoreError) -> Self {
        StorageError::Store { source }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(source: serde_json::Error) -> Self {
        StorageError::Serialization { source }
    }
}
