//! Store wrapper that simulates concurrent writers.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use berth_doc_types::DocOp;
use berth_doc_types::DocumentStoreError;
use berth_doc_types::FindRequest;
use berth_doc_types::FindResult;
use berth_doc_types::GetRequest;
use berth_doc_types::GetResult;
use berth_doc_types::TxnRequest;
use berth_doc_types::TxnResult;
use berth_traits::DocumentStore;
use tokio::sync::Mutex;
use tracing::debug;

/// Wraps a store and interleaves foreign writes with the caller's commits.
///
/// Reads pass straight through. Before each `apply`, the next queued
/// interference (if any) is committed to the inner store first, which is
/// exactly what a concurrent agent landing a write between our read and our
/// commit looks like.
pub struct ConflictInjectingStore<S: DocumentStore + ?Sized> {
    inner: Arc<S>,
    interference: Mutex<VecDeque<TxnRequest>>,
    forced_aborts: Mutex<u32>,
}

impl<S: DocumentStore + ?Sized> ConflictInjectingStore<S> {
    pub fn new(inner: Arc<S>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            interference: Mutex::new(VecDeque::new()),
            forced_aborts: Mutex::new(0),
        })
    }

    /// Commit `ops` to the inner store just before the next `apply` call.
    pub async fn interfere_before_next_apply(&self, ops: Vec<DocOp>) {
        self.interference.lock().await.push_back(TxnRequest::new(ops));
    }

    /// Report the next `count` transactions as aborted without applying them.
    pub async fn abort_next_applies(&self, count: u32) {
        *self.forced_aborts.lock().await = count;
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for ConflictInjectingStore<S> {
    async fn get(&self, request: GetRequest) -> Result<GetResult, DocumentStoreError> {
        self.inner.get(request).await
    }

    async fn find(&self, request: FindRequest) -> Result<FindResult, DocumentStoreError> {
        self.inner.find(request).await
    }

    async fn apply(&self, request: TxnRequest) -> Result<TxnResult, DocumentStoreError> {
        {
            let mut aborts = self.forced_aborts.lock().await;
            if *aborts > 0 {
                *aborts -= 1;
                debug!(remaining = *aborts, "forcing transaction abort");
                return Ok(TxnResult::aborted(0));
            }
        }

        let interference = self.interference.lock().await.pop_front();
        if let Some(foreign) = interference {
            let result = self.inner.apply(foreign).await?;
            debug!(conditions_met = result.conditions_met, "applied interfering transaction");
        }

        self.inner.apply(request).await
    }
}

#[cfg(test)]
mod tests {
    use berth_doc_types::DocAssert;
    use serde_json::json;

    use super::*;
    use crate::DeterministicDocumentStore;

    #[tokio::test]
    async fn interference_lands_before_commit() {
        let inner = DeterministicDocumentStore::new();
        let store = ConflictInjectingStore::new(inner.clone());

        store.interfere_before_next_apply(vec![DocOp::insert("units", "mysql/0", json!({}))]).await;
        let result = store
            .apply(TxnRequest::new(vec![DocOp::insert("units", "mysql/0", json!({"mine": true}))]))
            .await
            .unwrap();

        assert!(!result.conditions_met);
        assert_eq!(inner.body("units", "mysql/0").await, Some(json!({})));
    }

    #[tokio::test]
    async fn forced_aborts_are_consumed() {
        let inner = DeterministicDocumentStore::new();
        let store = ConflictInjectingStore::new(inner.clone());
        store.abort_next_applies(1).await;

        let op = DocOp::check("units", "mysql/0", DocAssert::Any);
        assert!(!store.apply(TxnRequest::new(vec![op.clone()])).await.unwrap().conditions_met);
        assert!(store.apply(TxnRequest::new(vec![op])).await.unwrap().conditions_met);
    }
}
