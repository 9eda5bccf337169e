//! Optimistic transaction executor.
//!
//! A transaction is described by a *builder*: an async closure that reads
//! whatever state it needs and returns a [`TxnPlan`]. The runner submits the
//! planned operations as one conditional batch. If any assertion fails
//! because another writer got there first, the builder is invoked again with
//! the next attempt number and rebuilds from fresh state.
//!
//! No locks are taken. The assertions carried by each operation are the only
//! concurrency control, so builders must assert on every field their
//! decision depended on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use berth_constants::txn::DEFAULT_TXN_ATTEMPTS;
use berth_constants::txn::MAX_TXN_ATTEMPTS;
use berth_constants::txn::TXN_RETRY_INITIAL_BACKOFF_MS;
use berth_constants::txn::TXN_RETRY_MAX_BACKOFF_MS;
use berth_doc_types::DocOp;
use berth_doc_types::TxnRequest;
use berth_traits::DocumentStore;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::error::TxnError;

/// Retry policy for the transaction executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxnConfig {
    /// Attempts before giving up with [`TxnError::MaxRetriesExceeded`].
    pub max_attempts: u32,
    /// Backoff after the first failed attempt.
    pub initial_backoff_ms: u64,
    /// Ceiling for the exponential backoff.
    pub max_backoff_ms: u64,
}

impl Default for TxnConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_TXN_ATTEMPTS,
            initial_backoff_ms: TXN_RETRY_INITIAL_BACKOFF_MS,
            max_backoff_ms: TXN_RETRY_MAX_BACKOFF_MS,
        }
    }
}

/// What a builder wants done on this attempt.
///
/// `T` is a value handed back to the caller once the plan has been
/// committed (or immediately, for [`TxnPlan::NoOp`]).
#[derive(Debug, Clone, PartialEq)]
pub enum TxnPlan<T = ()> {
    /// Submit these operations atomically.
    Apply { ops: Vec<DocOp>, output: T },
    /// Nothing to do: the target is already in the desired state or gone.
    NoOp(T),
}

impl TxnPlan<()> {
    pub fn apply(ops: Vec<DocOp>) -> Self {
        TxnPlan::Apply { ops, output: () }
    }

    pub fn noop() -> Self {
        TxnPlan::NoOp(())
    }
}

impl<T> TxnPlan<T> {
    pub fn apply_with(ops: Vec<DocOp>, output: T) -> Self {
        TxnPlan::Apply { ops, output }
    }

    /// Operations this plan would submit (empty for a no-op).
    pub fn ops(&self) -> &[DocOp] {
        match self {
            TxnPlan::Apply { ops, .. } => ops,
            TxnPlan::NoOp(_) => &[],
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, TxnPlan::NoOp(_))
    }

    pub fn into_ops(self) -> Vec<DocOp> {
        match self {
            TxnPlan::Apply { ops, .. } => ops,
            TxnPlan::NoOp(_) => Vec::new(),
        }
    }
}

/// Retry-on-conflict driver for conditional transactions.
pub struct TxnRunner<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    config: TxnConfig,
}

impl<S: DocumentStore + ?Sized> Clone for TxnRunner<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: DocumentStore + ?Sized> TxnRunner<S> {
    /// Create a new runner.
    pub fn new(store: Arc<S>, config: TxnConfig) -> Self {
        assert!(config.max_attempts > 0, "TXN: max_attempts must be positive");
        assert!(
            config.max_attempts <= MAX_TXN_ATTEMPTS,
            "TXN: max_attempts must be <= {MAX_TXN_ATTEMPTS}, got {}",
            config.max_attempts
        );
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &TxnConfig {
        &self.config
    }

    /// Run a transaction built by `build`, retrying on assertion failure.
    ///
    /// `build` receives the zero-based attempt number. Errors returned by the
    /// builder abort the run immediately and are never retried. An empty
    /// `Apply` is treated as a no-op.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut build: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<TxnPlan<T>, E>>,
        E: From<TxnError>,
    {
        let mut backoff_ms = self.config.initial_backoff_ms;

        for attempt in 0..self.config.max_attempts {
            let (ops, output) = match build(attempt).await? {
                TxnPlan::NoOp(output) => {
                    debug!(operation, attempt, "transaction not needed");
                    return Ok(output);
                }
                TxnPlan::Apply { ops, output } if ops.is_empty() => {
                    debug!(operation, attempt, "transaction has no operations");
                    return Ok(output);
                }
                TxnPlan::Apply { ops, output } => (ops, output),
            };

            let op_count = ops.len();
            let result = self.store.apply(TxnRequest::new(ops)).await.map_err(|source| TxnError::Store { source })?;

            if result.conditions_met {
                debug!(operation, attempt, op_count, revision = ?result.revision, "transaction applied");
                return Ok(output);
            }

            warn!(
                operation,
                attempt,
                failed_op = ?result.failed_op_index,
                "transaction assertion failed, retrying"
            );

            if attempt + 1 < self.config.max_attempts {
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = backoff_ms.saturating_mul(2).min(self.config.max_backoff_ms);
            }
        }

        Err(TxnError::MaxRetriesExceeded {
            operation: operation.to_string(),
            attempts: self.config.max_attempts,
        }
        .into())
    }
}
