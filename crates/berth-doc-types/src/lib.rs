//! Document store types for berth.
//!
//! A berth document store holds JSON documents grouped into named
//! collections. Documents are read by id or by field filter, and written only
//! through conditional transactions: every [`DocOp`] carries a [`DocAssert`]
//! that must hold at commit time, and a transaction applies all of its
//! operations or none of them.
//!
//! ## Module Organization
//!
//! - [`document`]: Stored documents and field-level evaluation
//! - [`ops`]: Conditional operations (assertions and effects)
//! - [`read`]: Point lookups and filtered reads
//! - [`txn`]: Transaction requests and results
//! - [`validation`]: Request bounds checking

pub mod document;
mod error;
pub mod ops;
pub mod read;
pub mod txn;
pub mod validation;

pub use document::Document;
pub use document::apply_updates;
pub use error::DocumentStoreError;
pub use ops::CompareOp;
pub use ops::DocAssert;
pub use ops::DocEffect;
pub use ops::DocOp;
pub use ops::FieldCondition;
pub use ops::FieldUpdate;
pub use read::FindRequest;
pub use read::FindResult;
pub use read::GetRequest;
pub use read::GetResult;
pub use txn::TxnRequest;
pub use txn::TxnResult;
pub use validation::validate_find_request;
pub use validation::validate_txn_request;
