//! Validation functions for store requests.

use std::collections::HashSet;

use berth_constants::api::MAX_COLLECTION_NAME_SIZE;
use berth_constants::api::MAX_DOC_ID_SIZE;
use berth_constants::api::MAX_FIELD_CONDITIONS;
use berth_constants::api::MAX_FIND_RESULTS;
use berth_constants::api::MAX_TXN_OPS;

use crate::DocumentStoreError;
use crate::ops::DocAssert;
use crate::ops::DocEffect;
use crate::read::FindRequest;
use crate::txn::TxnRequest;

fn check_collection(collection: &str) -> Result<(), DocumentStoreError> {
    if collection.is_empty() {
        return Err(DocumentStoreError::EmptyCollection);
    }
    let len = collection.len();
    if len > MAX_COLLECTION_NAME_SIZE as usize {
        return Err(DocumentStoreError::CollectionNameTooLarge {
            size: len as u32,
            max: MAX_COLLECTION_NAME_SIZE,
        });
    }
    Ok(())
}

fn check_id(id: &str) -> Result<(), DocumentStoreError> {
    if id.is_empty() {
        return Err(DocumentStoreError::EmptyId);
    }
    let len = id.len();
    if len > MAX_DOC_ID_SIZE as usize {
        return Err(DocumentStoreError::IdTooLarge {
            size: len as u32,
            max: MAX_DOC_ID_SIZE,
        });
    }
    Ok(())
}

/// Validate a transaction against fixed size limits.
///
/// Also rejects transactions that target the same document twice, since the
/// outcome would depend on evaluation order, and inserts whose body is not a
/// JSON object.
pub fn validate_txn_request(request: &TxnRequest) -> Result<(), DocumentStoreError> {
    if request.ops.len() > MAX_TXN_OPS as usize {
        return Err(DocumentStoreError::BatchTooLarge {
            size: request.ops.len() as u32,
            max: MAX_TXN_OPS,
        });
    }

    let mut targets = HashSet::with_capacity(request.ops.len());
    for op in &request.ops {
        check_collection(&op.collection)?;
        check_id(&op.id)?;

        if let DocAssert::Fields(conditions) = &op.assert
            && conditions.len() > MAX_FIELD_CONDITIONS as usize
        {
            return Err(DocumentStoreError::TooManyConditions {
                id: op.id.clone(),
                size: conditions.len() as u32,
                max: MAX_FIELD_CONDITIONS,
            });
        }

        if let DocEffect::Insert { body } = &op.effect
            && !body.is_object()
        {
            return Err(DocumentStoreError::InvalidDocument {
                collection: op.collection.clone(),
                id: op.id.clone(),
                reason: "inserted body is not an object".to_string(),
            });
        }

        if !targets.insert((op.collection.as_str(), op.id.as_str())) {
            return Err(DocumentStoreError::DuplicateTarget {
                collection: op.collection.clone(),
                id: op.id.clone(),
            });
        }
    }
    Ok(())
}

/// Validate a find request against fixed size limits.
pub fn validate_find_request(request: &FindRequest) -> Result<(), DocumentStoreError> {
    check_collection(&request.collection)?;
    if request.filter.len() > MAX_FIELD_CONDITIONS as usize {
        return Err(DocumentStoreError::TooManyConditions {
            id: request.collection.clone(),
            size: request.filter.len() as u32,
            max: MAX_FIELD_CONDITIONS,
        });
    }
    if let Some(limit) = request.limit
        && limit > MAX_FIND_RESULTS
    {
        return Err(DocumentStoreError::BatchTooLarge {
            size: limit,
            max: MAX_FIND_RESULTS,
        });
    }
    Ok(())
}
