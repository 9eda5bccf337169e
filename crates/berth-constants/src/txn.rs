//! Transaction executor bounds.

/// Default number of attempts the transaction executor makes before giving up.
///
/// Each attempt re-reads state and rebuilds the operations, so this bounds
/// how long a caller can be starved by concurrent writers to the same entity.
pub const DEFAULT_TXN_ATTEMPTS: u32 = 5;

/// Upper bound accepted for a configured attempt count.
pub const MAX_TXN_ATTEMPTS: u32 = 10;

/// Initial backoff after an assertion failure, in milliseconds.
pub const TXN_RETRY_INITIAL_BACKOFF_MS: u64 = 1;

/// Maximum backoff between attempts, in milliseconds.
pub const TXN_RETRY_MAX_BACKOFF_MS: u64 = 64;
