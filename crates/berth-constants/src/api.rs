//! Document store request bounds.
//!
//! Applied to every request before it reaches a store implementation, so an
//! oversized transaction fails fast instead of being half-evaluated.

// ============================================================================
// Identifier Limits
// ============================================================================

/// Maximum size of a document id in bytes (1 KB).
pub const MAX_DOC_ID_SIZE: u32 = 1024;

/// Maximum size of a collection name in bytes.
pub const MAX_COLLECTION_NAME_SIZE: u32 = 64;

// ============================================================================
// Batch Limits
// ============================================================================

/// Maximum number of operations in a single conditional transaction.
///
/// Provisioning a unit emits two operations per storage instance plus a few
/// bookkeeping operations; 256 leaves room for charms with many stores.
pub const MAX_TXN_OPS: u32 = 256;

/// Maximum number of field conditions attached to one operation.
pub const MAX_FIELD_CONDITIONS: u32 = 16;

// ============================================================================
// Find Limits
// ============================================================================

/// Maximum number of documents returned by a single find.
pub const MAX_FIND_RESULTS: u32 = 10_000;

/// Default number of documents returned by a find if no limit is given.
pub const DEFAULT_FIND_LIMIT: u32 = 1_000;
