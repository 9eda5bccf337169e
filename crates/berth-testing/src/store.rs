//! Deterministic in-memory document store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use berth_doc_types::DocEffect;
use berth_doc_types::Document;
use berth_doc_types::DocumentStoreError;
use berth_doc_types::FindRequest;
use berth_doc_types::FindResult;
use berth_doc_types::GetRequest;
use berth_doc_types::GetResult;
use berth_doc_types::TxnRequest;
use berth_doc_types::TxnResult;
use berth_doc_types::apply_updates;
use berth_doc_types::validate_find_request;
use berth_doc_types::validate_txn_request;
use berth_traits::DocumentStore;
use serde_json::Value;
use tokio::sync::RwLock;

/// Versioned body for tracking revisions.
#[derive(Clone)]
struct VersionedDoc {
    body: Value,
    revision: u64,
}

type DocKey = (String, String);

/// A deterministic in-memory document store for testing.
///
/// Transactions are evaluated and applied under a single write lock, so the
/// store gives the same all-or-nothing guarantee a real backend does. Every
/// committed transaction is recorded so tests can assert on exactly what was
/// written.
pub struct DeterministicDocumentStore {
    /// Internal data storage, ordered by (collection, id).
    data: RwLock<BTreeMap<DocKey, VersionedDoc>>,
    /// Global revision counter.
    revision: RwLock<u64>,
    /// Committed transactions, in commit order.
    committed: RwLock<Vec<TxnRequest>>,
    /// Number of apply calls, including aborted ones.
    apply_calls: RwLock<u64>,
}

impl Default for DeterministicDocumentStore {
    fn default() -> Self {
        Self::new_inner()
    }
}

impl DeterministicDocumentStore {
    /// Create a new deterministic store wrapped in Arc.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::new_inner())
    }

    fn new_inner() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            revision: RwLock::new(0),
            committed: RwLock::new(Vec::new()),
            apply_calls: RwLock::new(0),
        }
    }

    async fn next_revision(&self) -> u64 {
        let mut rev = self.revision.write().await;
        *rev += 1;
        *rev
    }

    /// Every transaction committed so far.
    pub async fn committed_txns(&self) -> Vec<TxnRequest> {
        self.committed.read().await.clone()
    }

    /// The most recently committed transaction, if any.
    pub async fn last_committed(&self) -> Option<TxnRequest> {
        self.committed.read().await.last().cloned()
    }

    /// Number of transactions submitted, whether or not they applied.
    pub async fn apply_calls(&self) -> u64 {
        *self.apply_calls.read().await
    }

    /// Number of documents currently stored in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.data.read().await.keys().filter(|(c, _)| c == collection).count()
    }

    /// Raw body of a document, bypassing the trait.
    pub async fn body(&self, collection: &str, id: &str) -> Option<Value> {
        let key = (collection.to_string(), id.to_string());
        self.data.read().await.get(&key).map(|v| v.body.clone())
    }
}

#[async_trait]
impl DocumentStore for DeterministicDocumentStore {
    async fn get(&self, request: GetRequest) -> Result<GetResult, DocumentStoreError> {
        let data = self.data.read().await;
        let key = (request.collection, request.id);
        let doc = data.get(&key).map(|versioned| Document {
            collection: key.0.clone(),
            id: key.1.clone(),
            body: versioned.body.clone(),
            revision: versioned.revision,
        });
        Ok(GetResult { doc })
    }

    async fn find(&self, request: FindRequest) -> Result<FindResult, DocumentStoreError> {
        validate_find_request(&request)?;
        let data = self.data.read().await;
        let limit = request.effective_limit() as usize;

        let docs: Vec<_> = data
            .iter()
            .filter(|((collection, _), _)| *collection == request.collection)
            .filter(|(_, v)| request.filter.iter().all(|c| c.holds(&v.body)))
            .take(limit + 1)
            .map(|((collection, id), v)| Document {
                collection: collection.clone(),
                id: id.clone(),
                body: v.body.clone(),
                revision: v.revision,
            })
            .collect();

        let (docs, is_truncated) = if docs.len() > limit {
            (docs[..limit].to_vec(), true)
        } else {
            (docs, false)
        };

        Ok(FindResult { docs, is_truncated })
    }

    async fn apply(&self, request: TxnRequest) -> Result<TxnResult, DocumentStoreError> {
        validate_txn_request(&request)?;
        *self.apply_calls.write().await += 1;

        let mut data = self.data.write().await;

        // Check all assertions against the pre-transaction state
        for (index, op) in request.ops.iter().enumerate() {
            let key = (op.collection.clone(), op.id.clone());
            let current = data.get(&key).map(|v| &v.body);
            if !op.assert.holds(current) {
                return Ok(TxnResult::aborted(index as u32));
            }
        }

        // Compute every effect before touching the map so a bad update
        // leaves the store unchanged.
        let revision = *self.revision.read().await + 1;
        let mut staged: Vec<(DocKey, Option<VersionedDoc>)> = Vec::with_capacity(request.ops.len());
        for op in &request.ops {
            let key = (op.collection.clone(), op.id.clone());
            match &op.effect {
                DocEffect::None => {}
                DocEffect::Insert { body } => {
                    staged.push((key, Some(VersionedDoc {
                        body: body.clone(),
                        revision,
                    })));
                }
                DocEffect::Update { updates } => {
                    let Some(current) = data.get(&key) else {
                        return Err(DocumentStoreError::NotFound {
                            collection: op.collection.clone(),
                            id: op.id.clone(),
                        });
                    };
                    let mut body = current.body.clone();
                    apply_updates(&op.collection, &op.id, &mut body, updates)?;
                    staged.push((key, Some(VersionedDoc { body, revision })));
                }
                DocEffect::Remove => {
                    staged.push((key, None));
                }
            }
        }

        let revision = self.next_revision().await;
        for (key, value) in staged {
            match value {
                Some(doc) => {
                    data.insert(key, doc);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
        drop(data);

        self.committed.write().await.push(request);
        Ok(TxnResult::applied(revision))
    }
}

#[cfg(test)]
mod tests {
    use berth_doc_types::DocAssert;
    use berth_doc_types::DocOp;
    use berth_doc_types::FieldCondition;
    use berth_doc_types::FieldUpdate;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn insert_then_get() {
        let store = DeterministicDocumentStore::new();
        let result = store
            .apply(TxnRequest::new(vec![DocOp::insert("units", "mysql/0", json!({"life": "alive"}))]))
            .await
            .unwrap();
        assert!(result.conditions_met);

        let got = store.get(GetRequest::new("units", "mysql/0")).await.unwrap();
        let doc = got.doc.unwrap();
        assert_eq!(doc.body, json!({"life": "alive"}));
        assert_eq!(doc.revision, 1);
    }

    #[tokio::test]
    async fn failed_assertion_applies_nothing() {
        let store = DeterministicDocumentStore::new();
        store
            .apply(TxnRequest::new(vec![DocOp::insert("units", "mysql/0", json!({"n": 1}))]))
            .await
            .unwrap();

        let result = store
            .apply(TxnRequest::new(vec![
                DocOp::insert("units", "mysql/1", json!({"n": 1})),
                DocOp::insert("units", "mysql/0", json!({"n": 2})),
            ]))
            .await
            .unwrap();

        assert!(!result.conditions_met);
        assert_eq!(result.failed_op_index, Some(1));
        assert_eq!(store.count("units").await, 1);
        assert_eq!(store.committed_txns().await.len(), 1);
        assert_eq!(store.apply_calls().await, 2);
    }

    #[tokio::test]
    async fn update_and_remove_with_field_assertions() {
        let store = DeterministicDocumentStore::new();
        store
            .apply(TxnRequest::new(vec![DocOp::insert("si", "data/0", json!({"life": "alive", "count": 1}))]))
            .await
            .unwrap();

        let alive = DocAssert::Fields(vec![FieldCondition::eq("life", "alive"), FieldCondition::gt("count", 0)]);
        let result = store
            .apply(TxnRequest::new(vec![DocOp::update("si", "data/0", alive.clone(), vec![
                FieldUpdate::inc("count", -1),
            ])]))
            .await
            .unwrap();
        assert!(result.conditions_met);
        assert_eq!(store.body("si", "data/0").await.unwrap()["count"], json!(0));

        // count is now 0, so the same assertion fails
        let result = store.apply(TxnRequest::new(vec![DocOp::remove("si", "data/0", alive)])).await.unwrap();
        assert!(!result.conditions_met);

        let result = store.apply(TxnRequest::new(vec![DocOp::remove("si", "data/0", DocAssert::Exists)])).await.unwrap();
        assert!(result.conditions_met);
        assert_eq!(store.count("si").await, 0);
    }

    #[tokio::test]
    async fn find_filters_and_truncates() {
        let store = DeterministicDocumentStore::new();
        let ops = (0..5)
            .map(|i| DocOp::insert("sa", format!("a{i}"), json!({"unit": if i % 2 == 0 { "even" } else { "odd" }})))
            .collect();
        store.apply(TxnRequest::new(ops)).await.unwrap();

        let even = store.find(FindRequest::filtered("sa", vec![FieldCondition::eq("unit", "even")])).await.unwrap();
        assert_eq!(even.docs.len(), 3);
        assert!(!even.is_truncated);

        let limited = store.find(FindRequest::all("sa").with_limit(2)).await.unwrap();
        assert_eq!(limited.docs.len(), 2);
        assert!(limited.is_truncated);
        assert_eq!(limited.docs[0].id, "a0");
    }

    #[tokio::test]
    async fn update_of_missing_document_is_an_error() {
        let store = DeterministicDocumentStore::new();
        let err = store
            .apply(TxnRequest::new(vec![DocOp::update("units", "mysql/0", DocAssert::Any, vec![
                FieldUpdate::inc("storage_attachment_count", -1),
            ])]))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::NotFound { .. }));
        assert_eq!(store.count("units").await, 0);
    }
}
