//! Centralized constants for the berth storage lifecycle crates.
//!
//! Every bound that limits work done against the document store lives here,
//! grouped by concern so callers can find them without grepping.
//!
//! # Modules
//!
//! - [`api`]: Document store request bounds (key sizes, batch sizes, find limits)
//! - [`txn`]: Transaction executor retry and backoff bounds
//! - [`storage`]: Storage domain defaults (sizes, sequence names, provider names)
//!
//! Constants are fixed at compile time; relationships between them are checked
//! by `const` assertions in the private `assertions` module.

pub mod api;
mod assertions;
pub mod storage;
pub mod txn;

/// Prelude module for commonly used constants.
pub mod prelude {
    pub use crate::api::DEFAULT_FIND_LIMIT;
    pub use crate::api::MAX_DOC_ID_SIZE;
    pub use crate::api::MAX_FIND_RESULTS;
    pub use crate::api::MAX_TXN_OPS;
    pub use crate::storage::DEFAULT_STORAGE_SIZE_MIB;
    pub use crate::storage::STORAGE_SEQUENCE;
    pub use crate::txn::DEFAULT_TXN_ATTEMPTS;
    pub use crate::txn::TXN_RETRY_INITIAL_BACKOFF_MS;
    pub use crate::txn::TXN_RETRY_MAX_BACKOFF_MS;
}
