//! Deferred cleanup of storage being destroyed.
//!
//! Destroying an attached instance cannot tear down its attachments in the
//! same batch, since each attachment is owned by a unit agent. Instead the
//! destroy batch records a cleanup, and [`CleanupRunner`] later destroys
//! the attachments so their units can detach.

use std::fmt;
use std::sync::Arc;

use berth_constants::storage::MAX_CLEANUP_BATCH;
use berth_doc_types::DocAssert;
use berth_doc_types::DocOp;
use berth_doc_types::FindRequest;
use berth_traits::DocumentStore;
use berth_txn::TxnConfig;
use berth_txn::TxnPlan;
use berth_txn::TxnRunner;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::attachments::StorageAttachments;
use crate::error::StorageError;
use crate::records::CLEANUPS;
use crate::records::decode_doc;
use crate::tags::StorageTag;

/// What a cleanup record asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupKind {
    /// Destroy every attachment of the Dying instance named by the prefix.
    AttachmentsForDyingStorage,
}

impl CleanupKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CleanupKind::AttachmentsForDyingStorage => "attachments_for_dying_storage",
        }
    }
}

impl fmt::Display for CleanupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cleanup {
    pub kind: CleanupKind,
    pub prefix: String,
}

fn cleanup_id(kind: CleanupKind, prefix: &str) -> String {
    format!("{kind}#{prefix}")
}

/// Operation scheduling a cleanup, to be committed with the change that
/// needs it.
pub fn new_cleanup_op(kind: CleanupKind, prefix: &str) -> Result<DocOp, StorageError> {
    let body = serde_json::to_value(Cleanup {
        kind,
        prefix: prefix.to_string(),
    })?;
    Ok(DocOp::insert(CLEANUPS, cleanup_id(kind, prefix), body))
}

/// Processes scheduled cleanups.
pub struct CleanupRunner<S: DocumentStore + ?Sized> {
    runner: TxnRunner<S>,
    attachments: StorageAttachments<S>,
}

impl<S: DocumentStore + ?Sized> CleanupRunner<S> {
    pub fn new(store: Arc<S>, txn: TxnConfig) -> Self {
        Self {
            runner: TxnRunner::new(store.clone(), txn.clone()),
            attachments: StorageAttachments::new(store, txn),
        }
    }

    /// Cleanups waiting to run, oldest id first, at most one batch.
    pub async fn pending(&self) -> Result<Vec<Cleanup>, StorageError> {
        let request = FindRequest::all(CLEANUPS).with_limit(MAX_CLEANUP_BATCH);
        let result = self
            .runner
            .store()
            .find(request)
            .await
            .map_err(|e| StorageError::from(e).annotate("cannot read cleanups"))?;
        result.docs.iter().map(decode_doc::<Cleanup>).collect()
    }

    /// Run one batch of pending cleanups, returning how many completed.
    ///
    /// A cleanup that fails is left in place for the next run.
    pub async fn run(&self) -> Result<u32, StorageError> {
        let mut completed = 0u32;
        for cleanup in self.pending().await? {
            match self.process(&cleanup).await {
                Ok(()) => completed += 1,
                Err(e) => warn!(kind = %cleanup.kind, prefix = %cleanup.prefix, error = %e, "cleanup failed"),
            }
        }
        if completed > 0 {
            debug!(completed, "cleanups completed");
        }
        Ok(completed)
    }

    async fn process(&self, cleanup: &Cleanup) -> Result<(), StorageError> {
        match cleanup.kind {
            CleanupKind::AttachmentsForDyingStorage => {
                let storage = StorageTag::new(&cleanup.prefix)?;
                for attachment in self.attachments.for_instance(&storage).await? {
                    self.attachments.destroy(&attachment.storage, &attachment.unit).await?;
                }
            }
        }

        let id = cleanup_id(cleanup.kind, &cleanup.prefix);
        let id = id.as_str();
        self.runner
            .run(&format!("remove cleanup {id}"), move |_| async move {
                Ok::<_, StorageError>(TxnPlan::apply(vec![DocOp::remove(CLEANUPS, id, DocAssert::Any)]))
            })
            .await
            .map_err(|e: StorageError| e.annotate(format!("cannot remove cleanup {id}")))
    }
}
