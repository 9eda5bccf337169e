//! Core traits for berth.
//!
//! Defines the document store interface every other crate is written
//! against. Implementations must apply a [`TxnRequest`] atomically: either
//! every assertion holds at commit time and every effect is applied, or
//! nothing changes and the result reports `conditions_met = false`.

use async_trait::async_trait;
use berth_doc_types::DocumentStoreError;
use berth_doc_types::FindRequest;
use berth_doc_types::FindResult;
use berth_doc_types::GetRequest;
use berth_doc_types::GetResult;
use berth_doc_types::TxnRequest;
use berth_doc_types::TxnResult;

/// Shared, multi-writer document store.
///
/// Many agents may hold a handle to the same store; the store serializes
/// conflicting transactions and is the only shared mutable resource.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a single document by id.
    async fn get(&self, request: GetRequest) -> Result<GetResult, DocumentStoreError>;

    /// Read every document in a collection matching a field filter.
    async fn find(&self, request: FindRequest) -> Result<FindResult, DocumentStoreError>;

    /// Apply a batch of conditional operations all-or-nothing.
    async fn apply(&self, request: TxnRequest) -> Result<TxnResult, DocumentStoreError>;
}

// Blanket implementation for Arc<T>
#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<T> {
    async fn get(&self, request: GetRequest) -> Result<GetResult, DocumentStoreError> {
        (**self).get(request).await
    }

    async fn find(&self, request: FindRequest) -> Result<FindResult, DocumentStoreError> {
        (**self).find(request).await
    }

    async fn apply(&self, request: TxnRequest) -> Result<TxnResult, DocumentStoreError> {
        (**self).apply(request).await
    }
}
