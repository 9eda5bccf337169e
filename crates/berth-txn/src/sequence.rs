//! Store-wide sequence allocator.
//!
//! Each named sequence is a single counter document in the
//! [`SEQUENCE_COLLECTION`] collection. The counter holds the next value to
//! hand out; the document is created lazily on first use, so a fresh store
//! starts every sequence at zero.
//!
//! Values are never reused: every reservation is a conditional write that
//! asserts the counter still holds the value it was computed from.

use std::sync::Arc;

use berth_doc_types::DocAssert;
use berth_doc_types::DocOp;
use berth_doc_types::FieldCondition;
use berth_doc_types::FieldUpdate;
use berth_doc_types::GetRequest;
use berth_traits::DocumentStore;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::error::TxnError;
use crate::runner::TxnConfig;
use crate::runner::TxnPlan;
use crate::runner::TxnRunner;

/// Collection holding sequence counter documents.
pub const SEQUENCE_COLLECTION: &str = "sequence";

#[derive(Debug, Serialize, Deserialize)]
struct SequenceDoc {
    counter: u64,
}

/// Start and new counter value for reserving `count` values from `current`.
///
/// Returns `None` if the reservation would overflow.
fn compute_reservation(current: u64, count: u64) -> Option<(u64, u64)> {
    let end = current.checked_add(count)?;
    Some((current, end))
}

/// Allocates monotonically increasing, never-reused values from a named
/// counter shared by every writer of the store.
pub struct SequenceGenerator<S: DocumentStore + ?Sized> {
    runner: TxnRunner<S>,
    name: String,
}

impl<S: DocumentStore + ?Sized> SequenceGenerator<S> {
    /// Create a generator for the sequence `name` with the default retry policy.
    pub fn new(store: Arc<S>, name: impl Into<String>) -> Self {
        Self::with_runner(TxnRunner::new(store, TxnConfig::default()), name)
    }

    pub fn with_runner(runner: TxnRunner<S>, name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "SEQUENCE: name must not be empty");
        Self { runner, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Allocate the next value.
    pub async fn next(&self) -> Result<u64, TxnError> {
        self.reserve(1).await
    }

    /// Reserve `count` consecutive values and return the first.
    ///
    /// The caller owns `[start, start + count)`.
    pub async fn reserve(&self, count: u64) -> Result<u64, TxnError> {
        assert!(count > 0, "SEQUENCE: reservation count must be positive");

        let operation = format!("reserve {count} from sequence {}", self.name);
        let start = self.runner.run(&operation, |_| self.plan_reservation(count)).await?;

        debug!(sequence = %self.name, start, count, "reserved sequence range");
        Ok(start)
    }

    async fn plan_reservation(&self, count: u64) -> Result<TxnPlan<u64>, TxnError> {
        let observed = self.read_counter().await?;
        let current = observed.unwrap_or(0);
        let (start, end) = compute_reservation(current, count).ok_or_else(|| TxnError::SequenceExhausted {
            name: self.name.clone(),
        })?;

        let op = match observed {
            None => DocOp::insert(SEQUENCE_COLLECTION, &self.name, json!({ "counter": end })),
            Some(current) => DocOp::update(
                SEQUENCE_COLLECTION,
                &self.name,
                DocAssert::Fields(vec![FieldCondition::eq("counter", current)]),
                vec![FieldUpdate::set("counter", end)],
            ),
        };
        Ok(TxnPlan::apply_with(vec![op], start))
    }

    /// The value the next call to [`next`](Self::next) would return.
    pub async fn current(&self) -> Result<u64, TxnError> {
        Ok(self.read_counter().await?.unwrap_or(0))
    }

    async fn read_counter(&self) -> Result<Option<u64>, TxnError> {
        let result = self.runner.store().get(GetRequest::new(SEQUENCE_COLLECTION, &self.name)).await?;
        let Some(doc) = result.doc else {
            return Ok(None);
        };
        let parsed: SequenceDoc = doc.decode().map_err(|e| TxnError::CorruptedData {
            collection: SEQUENCE_COLLECTION.to_string(),
            id: self.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Some(parsed.counter))
    }
}
