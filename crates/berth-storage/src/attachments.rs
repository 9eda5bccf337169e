//! Storage attachment registry.
//!
//! Teardown of an attachment is three calls, normally made by different
//! agents: [`destroy`](StorageAttachments::destroy) when the unit or the
//! storage is going away, [`ensure_dead`](StorageAttachments::ensure_dead)
//! once the unit has detached, and [`remove`](StorageAttachments::remove)
//! to delete the record and release its references.

use std::sync::Arc;

use berth_constants::storage::MAX_LISTED_STORAGE;
use berth_doc_types::FieldCondition;
use berth_doc_types::FindRequest;
use berth_doc_types::GetRequest;
use berth_traits::DocumentStore;
use berth_txn::TxnConfig;
use berth_txn::TxnPlan;
use berth_txn::TxnRunner;
use tracing::debug;
use tracing::warn;

use crate::error::StorageError;
use crate::instances::read_instance_doc;
use crate::pure::plan_destroy_attachment;
use crate::pure::plan_ensure_attachment_dead;
use crate::pure::plan_remove_attachment;
use crate::records::FIELD_STORAGE_INSTANCE;
use crate::records::FIELD_UNIT;
use crate::records::STORAGE_ATTACHMENTS;
use crate::records::StorageAttachment;
use crate::records::StorageAttachmentDoc;
use crate::records::decode_doc;
use crate::records::storage_attachment_id;
use crate::tags::StorageTag;
use crate::tags::UnitTag;

async fn read_attachment_doc<S: DocumentStore + ?Sized>(
    store: &S,
    id: &str,
) -> Result<Option<StorageAttachmentDoc>, StorageError> {
    let result = store
        .get(GetRequest::new(STORAGE_ATTACHMENTS, id))
        .await
        .map_err(|e| StorageError::from(e).annotate(format!("cannot get storage attachment {id}")))?;
    result.doc.as_ref().map(decode_doc::<StorageAttachmentDoc>).transpose()
}

fn describe(storage: &StorageTag, unit: &UnitTag) -> String {
    format!("{}:{}", storage.id(), unit.id())
}

/// Lookup and lifecycle transitions of storage attachments.
pub struct StorageAttachments<S: DocumentStore + ?Sized> {
    runner: TxnRunner<S>,
}

impl<S: DocumentStore + ?Sized> StorageAttachments<S> {
    pub fn new(store: Arc<S>, txn: TxnConfig) -> Self {
        Self {
            runner: TxnRunner::new(store, txn),
        }
    }

    fn store(&self) -> &S {
        self.runner.store().as_ref()
    }

    /// The attachment of `storage` to `unit`.
    pub async fn get(&self, storage: &StorageTag, unit: &UnitTag) -> Result<StorageAttachment, StorageError> {
        let id = storage_attachment_id(unit, storage);
        match read_attachment_doc(self.store(), &id).await? {
            Some(doc) => StorageAttachment::from_doc(&id, doc),
            None => Err(StorageError::NotFound {
                what: format!("storage attachment {}", describe(storage, unit)),
            }),
        }
    }

    /// Every attachment of `unit`, ordered by id.
    pub async fn for_unit(&self, unit: &UnitTag) -> Result<Vec<StorageAttachment>, StorageError> {
        self.find(FieldCondition::eq(FIELD_UNIT, unit.id()))
            .await
            .map_err(|e: StorageError| e.annotate(format!("cannot get storage attachments for {}", unit.id())))
    }

    /// Every attachment of the instance `storage`, ordered by id.
    pub async fn for_instance(&self, storage: &StorageTag) -> Result<Vec<StorageAttachment>, StorageError> {
        self.find(FieldCondition::eq(FIELD_STORAGE_INSTANCE, storage.id()))
            .await
            .map_err(|e: StorageError| e.annotate(format!("cannot get storage attachments for {}", storage.id())))
    }

    async fn find(&self, condition: FieldCondition) -> Result<Vec<StorageAttachment>, StorageError> {
        let request = FindRequest::filtered(STORAGE_ATTACHMENTS, vec![condition]).with_limit(MAX_LISTED_STORAGE);
        let result = self.store().find(request).await?;
        if result.is_truncated {
            warn!(limit = MAX_LISTED_STORAGE, "storage attachment listing truncated");
        }
        result
            .docs
            .iter()
            .map(|doc| StorageAttachment::from_doc(&doc.id, decode_doc(doc)?))
            .collect()
    }

    /// Mark the attachment Dying. Does nothing unless it is Alive.
    pub async fn destroy(&self, storage: &StorageTag, unit: &UnitTag) -> Result<(), StorageError> {
        let store = self.store();
        let id = storage_attachment_id(unit, storage);
        let id = id.as_str();
        self.runner
            .run(&format!("destroy storage attachment {id}"), move |_| async move {
                let doc = read_attachment_doc(store, id).await?;
                Ok::<_, StorageError>(plan_destroy_attachment(id, doc.as_ref()))
            })
            .await
            .map_err(|e: StorageError| e.annotate(format!("cannot destroy storage attachment {}", describe(storage, unit))))?;
        debug!(storage = %storage.id(), unit = %unit.id(), "destroyed storage attachment");
        Ok(())
    }

    /// Mark the attachment Dead if it exists.
    pub async fn ensure_dead(&self, storage: &StorageTag, unit: &UnitTag) -> Result<(), StorageError> {
        let store = self.store();
        let id = storage_attachment_id(unit, storage);
        let id = id.as_str();
        self.runner
            .run(&format!("ensure storage attachment {id} dead"), move |_| async move {
                let doc = read_attachment_doc(store, id).await?;
                Ok::<_, StorageError>(plan_ensure_attachment_dead(id, doc.as_ref()))
            })
            .await
            .map_err(|e: StorageError| e.annotate(format!("cannot ensure death of storage attachment {}", describe(storage, unit))))?;
        debug!(storage = %storage.id(), unit = %unit.id(), "storage attachment is dead");
        Ok(())
    }

    /// Remove a Dead attachment, decrementing the unit's and the instance's
    /// reference counts, and removing the instance too if this was the last
    /// reference to a Dying instance.
    pub async fn remove(&self, storage: &StorageTag, unit: &UnitTag) -> Result<(), StorageError> {
        let store = self.store();
        let id = storage_attachment_id(unit, storage);
        let id = id.as_str();
        self.runner
            .run(&format!("remove storage attachment {id}"), move |_| async move {
                let Some(attachment) = read_attachment_doc(store, id).await? else {
                    return Ok(TxnPlan::noop());
                };
                let instance = read_instance_doc(store, &attachment.storage_instance).await?;
                plan_remove_attachment(id, Some(&attachment), instance.as_ref())
            })
            .await
            .map_err(|e: StorageError| e.annotate(format!("cannot remove storage attachment {}", describe(storage, unit))))?;
        debug!(storage = %storage.id(), unit = %unit.id(), "removed storage attachment");
        Ok(())
    }
}
