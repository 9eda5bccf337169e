//! Storage attachment transaction planning.
//!
//! Attachments move Alive → Dying → Dead → removed. Removing an attachment
//! also releases its reference on the instance and on the unit, and takes
//! the instance with it when it was the last reference to a Dying instance.

use berth_doc_types::DocAssert;
use berth_doc_types::DocOp;
use berth_doc_types::FieldCondition;
use berth_doc_types::FieldUpdate;
use berth_txn::TxnPlan;

use super::instance::life_is;
use super::instance::remove_instance_op;
use crate::error::StorageError;
use crate::records::FIELD_ATTACHMENT_COUNT;
use crate::records::FIELD_LIFE;
use crate::records::FIELD_STORAGE_ATTACHMENT_COUNT;
use crate::records::Life;
use crate::records::STORAGE_ATTACHMENTS;
use crate::records::STORAGE_INSTANCES;
use crate::records::StorageAttachmentDoc;
use crate::records::StorageInstanceDoc;
use crate::records::UNITS;

fn set_life(attachment_id: &str, assert: FieldCondition, life: Life) -> DocOp {
    DocOp::update(STORAGE_ATTACHMENTS, attachment_id, DocAssert::Fields(vec![assert]), vec![FieldUpdate::set(
        FIELD_LIFE,
        life.as_str(),
    )])
}

/// Alive → Dying. Anything else is left alone.
pub fn plan_destroy_attachment(attachment_id: &str, attachment: Option<&StorageAttachmentDoc>) -> TxnPlan {
    match attachment {
        Some(doc) if doc.life == Life::Alive => {
            TxnPlan::apply(vec![set_life(attachment_id, life_is(Life::Alive), Life::Dying)])
        }
        _ => TxnPlan::noop(),
    }
}

/// Anything short of Dead → Dead.
pub fn plan_ensure_attachment_dead(attachment_id: &str, attachment: Option<&StorageAttachmentDoc>) -> TxnPlan {
    match attachment {
        Some(doc) if doc.life != Life::Dead => TxnPlan::apply(vec![set_life(
            attachment_id,
            FieldCondition::ne(FIELD_LIFE, Life::Dead.as_str()),
            Life::Dead,
        )]),
        _ => TxnPlan::noop(),
    }
}

/// Remove a Dead attachment and release its references.
///
/// A no-op if the attachment or its instance is already gone. Fails if the
/// attachment is not Dead.
pub fn plan_remove_attachment(
    attachment_id: &str,
    attachment: Option<&StorageAttachmentDoc>,
    instance: Option<&StorageInstanceDoc>,
) -> Result<TxnPlan, StorageError> {
    let (Some(attachment), Some(instance)) = (attachment, instance) else {
        return Ok(TxnPlan::noop());
    };
    if attachment.life != Life::Dead {
        return Err(StorageError::Precondition {
            message: "storage attachment is not dead".to_string(),
        });
    }
    if instance.attachment_count < 1 {
        return Err(StorageError::CorruptedRecord {
            collection: STORAGE_INSTANCES.to_string(),
            id: instance.id.clone(),
            reason: format!(
                "attachment {attachment_id} exists but attachment count is {}",
                instance.attachment_count
            ),
        });
    }

    let mut ops = vec![
        DocOp::remove(STORAGE_ATTACHMENTS, attachment_id, DocAssert::Fields(vec![life_is(Life::Dead)])),
        DocOp::update(UNITS, &attachment.unit, DocAssert::Exists, vec![FieldUpdate::inc(
            FIELD_STORAGE_ATTACHMENT_COUNT,
            -1,
        )]),
    ];

    let instance_op = match instance.life {
        Life::Dying if instance.attachment_count == 1 => remove_instance_op(&instance.id, vec![
            life_is(Life::Dying),
            FieldCondition::eq(FIELD_ATTACHMENT_COUNT, 1),
        ]),
        // Concurrent removals may race, but none may take a Dying instance
        // to zero without also removing it.
        Life::Dying => decref(&instance.id, vec![life_is(Life::Dying), FieldCondition::gt(FIELD_ATTACHMENT_COUNT, 1)]),
        // An Alive instance left with no attachments is removed by Destroy.
        Life::Alive => decref(&instance.id, vec![life_is(Life::Alive), FieldCondition::gt(FIELD_ATTACHMENT_COUNT, 0)]),
        Life::Dead => {
            return Err(StorageError::CorruptedRecord {
                collection: STORAGE_INSTANCES.to_string(),
                id: instance.id.clone(),
                reason: "storage instances are never dead".to_string(),
            });
        }
    };
    ops.push(instance_op);
    Ok(TxnPlan::apply(ops))
}

fn decref(instance_id: &str, assert: Vec<FieldCondition>) -> DocOp {
    DocOp::update(STORAGE_INSTANCES, instance_id, DocAssert::Fields(assert), vec![FieldUpdate::inc(
        FIELD_ATTACHMENT_COUNT,
        -1,
    )])
}
