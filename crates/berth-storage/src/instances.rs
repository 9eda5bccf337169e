//! Storage instance registry.

use std::sync::Arc;

use berth_constants::storage::MAX_INSTANCES_PER_ENTITY;
use berth_constants::storage::MAX_LISTED_STORAGE;
use berth_constants::storage::STORAGE_SEQUENCE;
use berth_doc_types::DocOp;
use berth_doc_types::FieldCondition;
use berth_doc_types::FindRequest;
use berth_doc_types::GetRequest;
use berth_traits::DocumentStore;
use berth_txn::SequenceGenerator;
use berth_txn::TxnConfig;
use berth_txn::TxnRunner;
use tracing::debug;
use tracing::warn;

use crate::charm::CharmMeta;
use crate::constraints::ConstraintsMap;
use crate::error::StorageError;
use crate::pure::CreatedStorage;
use crate::pure::create_storage_ops;
use crate::pure::instance_count;
use crate::pure::plan_destroy_instance;
use crate::pure::plan_instance_templates;
use crate::pure::remove_instances_ops;
use crate::records::FIELD_OWNER;
use crate::records::STORAGE_INSTANCES;
use crate::records::StorageInstance;
use crate::records::StorageInstanceDoc;
use crate::records::decode_doc;
use crate::tags::StorageTag;
use crate::tags::Tag;

/// Read an instance record, `None` if it does not exist.
pub(crate) async fn read_instance_doc<S: DocumentStore + ?Sized>(
    store: &S,
    id: &str,
) -> Result<Option<StorageInstanceDoc>, StorageError> {
    let result = store
        .get(GetRequest::new(STORAGE_INSTANCES, id))
        .await
        .map_err(|e| StorageError::from(e).annotate("cannot get storage instance details"))?;
    result.doc.as_ref().map(decode_doc::<StorageInstanceDoc>).transpose()
}

/// Creation, lookup and destruction of storage instances.
pub struct StorageInstances<S: DocumentStore + ?Sized> {
    runner: TxnRunner<S>,
    sequence: SequenceGenerator<S>,
}

impl<S: DocumentStore + ?Sized> StorageInstances<S> {
    pub fn new(store: Arc<S>, txn: TxnConfig) -> Self {
        let runner = TxnRunner::new(store, txn);
        let sequence = SequenceGenerator::with_runner(runner.clone(), STORAGE_SEQUENCE);
        Self { runner, sequence }
    }

    pub fn store(&self) -> &Arc<S> {
        self.runner.store()
    }

    /// Operations creating `owner`'s storage instances (and, for a unit,
    /// its attachments) from already-defaulted `constraints`.
    ///
    /// Instance ids are allocated from the store-wide sequence before the
    /// operations are returned; ids of operations that are never committed
    /// are simply skipped.
    pub async fn create_storage_ops(
        &self,
        owner: &Tag,
        charm: &CharmMeta,
        constraints: &ConstraintsMap,
    ) -> Result<CreatedStorage, StorageError> {
        let templates = plan_instance_templates(owner, charm, constraints)?;
        let total = instance_count(&templates);
        if total > MAX_INSTANCES_PER_ENTITY {
            return Err(StorageError::Validation {
                message: format!(
                    "cannot create {total} storage instances for {owner}, at most {MAX_INSTANCES_PER_ENTITY} fit in one transaction"
                ),
            });
        }
        let first = if total == 0 {
            0
        } else {
            self.sequence
                .reserve(total)
                .await
                .map_err(|e| StorageError::from(e).annotate("cannot generate storage instance name"))?
        };
        create_storage_ops(owner, &templates, first)
    }

    /// The instance with the given tag.
    pub async fn get(&self, tag: &StorageTag) -> Result<StorageInstance, StorageError> {
        match read_instance_doc(self.store().as_ref(), tag.id()).await? {
            Some(doc) => StorageInstance::try_from(doc),
            None => Err(StorageError::NotFound {
                what: format!("storage instance \"{}\"", tag.id()),
            }),
        }
    }

    /// Every storage instance in the store, ordered by id.
    pub async fn all(&self) -> Result<Vec<StorageInstance>, StorageError> {
        let request = FindRequest::all(STORAGE_INSTANCES).with_limit(MAX_LISTED_STORAGE);
        let result = self
            .store()
            .find(request)
            .await
            .map_err(|e| StorageError::from(e).annotate("cannot get all storage instances"))?;
        if result.is_truncated {
            warn!(limit = MAX_LISTED_STORAGE, "storage instance listing truncated");
        }
        result
            .docs
            .iter()
            .map(|doc| decode_doc::<StorageInstanceDoc>(doc).and_then(StorageInstance::try_from))
            .collect()
    }

    /// Ensure the instance and all its attachments will eventually be
    /// removed. An instance with no attachments is removed immediately.
    ///
    /// Destroying a missing or already Dying instance does nothing.
    pub async fn destroy(&self, tag: &StorageTag) -> Result<(), StorageError> {
        let store = self.store();
        let id = tag.id();
        self.runner
            .run(&format!("destroy storage {id}"), move |_| async move {
                let doc = read_instance_doc(store.as_ref(), id).await?;
                plan_destroy_instance(doc.as_ref())
            })
            .await
            .map_err(|e: StorageError| e.annotate(format!("cannot destroy storage \"{id}\"")))?;
        debug!(storage = %id, "destroyed storage instance");
        Ok(())
    }

    /// Operations removing every instance owned by `owner`, unconditionally.
    pub async fn remove_owned_instances_ops(&self, owner: &Tag) -> Result<Vec<DocOp>, StorageError> {
        let request = FindRequest::filtered(STORAGE_INSTANCES, vec![FieldCondition::eq(FIELD_OWNER, owner.to_string())])
            .with_limit(MAX_LISTED_STORAGE);
        let result = self
            .store()
            .find(request)
            .await
            .map_err(|e| StorageError::from(e).annotate(format!("cannot get storage instances for {owner}")))?;
        if result.is_truncated {
            warn!(owner = %owner, limit = MAX_LISTED_STORAGE, "owned storage instance listing truncated");
        }
        Ok(remove_instances_ops(result.docs.iter().map(|doc| doc.id.as_str())))
    }

    /// Fail while any storage instance remains.
    pub async fn ensure_no_persistent_storage(&self) -> Result<(), StorageError> {
        let result = self.store().find(FindRequest::all(STORAGE_INSTANCES).with_limit(1)).await?;
        if result.docs.is_empty() {
            Ok(())
        } else {
            Err(StorageError::PersistentStorageExists)
        }
    }
}
