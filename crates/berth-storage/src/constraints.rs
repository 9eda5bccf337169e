//! Storage constraints and their persisted records.
//!
//! Constraints say how each charm store of an entity is to be provisioned.
//! An empty pool, zero size or zero count means "unspecified" and is filled
//! in by the resolver's defaulting pass.

use std::collections::BTreeMap;

use berth_doc_types::DocAssert;
use berth_doc_types::DocOp;
use berth_doc_types::GetRequest;
use berth_traits::DocumentStore;
use serde::Deserialize;
use serde::Serialize;

use crate::error::StorageError;
use crate::records::STORAGE_CONSTRAINTS;
use crate::records::decode_doc;

/// Provisioning requirements for one charm store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConstraints {
    /// Pool (or provider type) to provision from.
    #[serde(default)]
    pub pool: String,
    /// Size of each instance in MiB.
    #[serde(default)]
    pub size: u64,
    /// Number of instances.
    #[serde(default)]
    pub count: u64,
}

impl StorageConstraints {
    pub fn new(pool: impl Into<String>, size: u64, count: u64) -> Self {
        Self {
            pool: pool.into(),
            size,
            count,
        }
    }
}

/// Constraints for every store of an entity, keyed by store name.
pub type ConstraintsMap = BTreeMap<String, StorageConstraints>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StorageConstraintsDoc {
    constraints: ConstraintsMap,
}

/// Insert the constraints record for the entity with global key `key`.
pub fn create_constraints_op(key: &str, constraints: &ConstraintsMap) -> Result<DocOp, StorageError> {
    let body = serde_json::to_value(StorageConstraintsDoc {
        constraints: constraints.clone(),
    })?;
    Ok(DocOp::insert(STORAGE_CONSTRAINTS, key, body))
}

/// Remove the constraints record for `key`, whether or not it exists.
pub fn remove_constraints_op(key: &str) -> DocOp {
    DocOp::remove(STORAGE_CONSTRAINTS, key, DocAssert::Any)
}

/// Read the constraints recorded for `key`; `None` if there are none.
pub async fn read_constraints<S: DocumentStore + ?Sized>(
    store: &S,
    key: &str,
) -> Result<Option<ConstraintsMap>, StorageError> {
    let result = store
        .get(GetRequest::new(STORAGE_CONSTRAINTS, key))
        .await
        .map_err(|e| StorageError::from(e).annotate(format!("cannot get storage constraints for \"{key}\"")))?;
    match result.doc {
        None => Ok(None),
        Some(doc) => Ok(Some(decode_doc::<StorageConstraintsDoc>(&doc)?.constraints)),
    }
}
