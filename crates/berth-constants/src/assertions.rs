//! Compile-time constant assertions.
//!
//! Each assertion pins a relationship between constants that the runtime
//! code relies on without re-checking.

use super::api::*;
use super::storage::*;
use super::txn::*;

// ============================================================================
// Transaction Retry Bounds
// ============================================================================

const _: () = assert!(DEFAULT_TXN_ATTEMPTS > 0);
const _: () = assert!(DEFAULT_TXN_ATTEMPTS <= MAX_TXN_ATTEMPTS);
const _: () = assert!(TXN_RETRY_INITIAL_BACKOFF_MS > 0);
const _: () = assert!(TXN_RETRY_INITIAL_BACKOFF_MS <= TXN_RETRY_MAX_BACKOFF_MS);

// ============================================================================
// Request Size Limits
// ============================================================================

const _: () = assert!(MAX_COLLECTION_NAME_SIZE < MAX_DOC_ID_SIZE);
const _: () = assert!(MAX_TXN_OPS >= 4);
const _: () = assert!(MAX_FIELD_CONDITIONS > 0);
const _: () = assert!(DEFAULT_FIND_LIMIT <= MAX_FIND_RESULTS);

// ============================================================================
// Storage Defaults
// ============================================================================

const _: () = assert!(DEFAULT_STORAGE_SIZE_MIB > 0);
const _: () = assert!(MAX_LISTED_STORAGE <= MAX_FIND_RESULTS);
const _: () = assert!(MAX_CLEANUP_BATCH <= MAX_FIND_RESULTS);
const _: () = assert!(MAX_INSTANCES_PER_ENTITY > 0);
const _: () = assert!(
    MAX_INSTANCES_PER_ENTITY * OPS_PER_UNIT_INSTANCE as u64 + ENTITY_TXN_OVERHEAD_OPS as u64 <= MAX_TXN_OPS as u64
);
