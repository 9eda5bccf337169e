//! Optimistic transactions over a berth document store.
//!
//! - [`TxnRunner`]: runs a plan builder, commits its conditional operations
//!   atomically and rebuilds from fresh state when a concurrent writer
//!   invalidated an assertion.
//! - [`SequenceGenerator`]: store-wide counters allocated through the runner.
//!
//! Nothing here holds a lock across a store round trip. Correctness rests
//! entirely on the assertions each builder attaches to its operations.

mod error;
mod runner;
mod sequence;

pub use error::TxnError;
pub use runner::TxnConfig;
pub use runner::TxnPlan;
pub use runner::TxnRunner;
pub use sequence::SEQUENCE_COLLECTION;
pub use sequence::SequenceGenerator;
