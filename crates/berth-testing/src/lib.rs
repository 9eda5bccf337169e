//! Testing infrastructure for berth.
//!
//! - [`DeterministicDocumentStore`]: in-memory, revisioned, atomic store that
//!   records every committed transaction
//! - [`ConflictInjectingStore`]: wrapper that lands foreign writes between a
//!   caller's read and its commit, or forces aborts, to exercise retry paths
//! - [`init_test_tracing`]: idempotent `tracing` setup for tests

mod conflict;
mod store;

pub use conflict::ConflictInjectingStore;
pub use store::DeterministicDocumentStore;

/// Install a test-writer tracing subscriber, ignoring repeat calls.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("berth=debug,warn").with_test_writer().try_init();
}
