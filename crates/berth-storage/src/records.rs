//! Persisted record layouts and the collections that hold them.
//!
//! Field names used in assertions are exported as constants so builders and
//! records cannot drift apart.

use std::fmt;

use berth_doc_types::Document;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StorageError;
use crate::tags::StorageTag;
use crate::tags::Tag;
use crate::tags::UnitTag;

// ============================================================================
// Collections
// ============================================================================

pub const STORAGE_INSTANCES: &str = "storageinstances";
pub const STORAGE_ATTACHMENTS: &str = "storageattachments";
pub const STORAGE_CONSTRAINTS: &str = "storageconstraints";
pub const UNITS: &str = "units";
pub const APPLICATIONS: &str = "applications";
pub const CLEANUPS: &str = "cleanups";

// ============================================================================
// Asserted fields
// ============================================================================

pub const FIELD_LIFE: &str = "life";
pub const FIELD_ATTACHMENT_COUNT: &str = "attachment_count";
pub const FIELD_STORAGE_ATTACHMENT_COUNT: &str = "storage_attachment_count";
pub const FIELD_OWNER: &str = "owner";
pub const FIELD_UNIT: &str = "unit";
pub const FIELD_STORAGE_INSTANCE: &str = "storage_instance";

/// Lifecycle stage of an entity. Only ever advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Life {
    #[default]
    Alive,
    Dying,
    Dead,
}

impl Life {
    pub fn as_str(self) -> &'static str {
        match self {
            Life::Alive => "alive",
            Life::Dying => "dying",
            Life::Dead => "dead",
        }
    }
}

impl fmt::Display for Life {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a store is a block device or a filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Unknown,
    Block,
    Filesystem,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageKind::Unknown => "unknown",
            StorageKind::Block => "block",
            StorageKind::Filesystem => "filesystem",
        })
    }
}

/// Storage instance record, keyed by instance id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInstanceDoc {
    pub id: String,
    pub kind: StorageKind,
    pub life: Life,
    /// Owner tag string (`unit-…` or `application-…`).
    pub owner: String,
    pub storage_name: String,
    /// Attachments referencing this instance that have not been removed.
    pub attachment_count: i64,
}

/// Storage attachment record, keyed by [`storage_attachment_id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAttachmentDoc {
    pub unit: String,
    pub storage_instance: String,
    pub life: Life,
}

/// Unit record, keyed by unit id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDoc {
    pub name: String,
    pub application: String,
    pub life: Life,
    pub storage_attachment_count: i64,
}

/// Application record, keyed by application name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDoc {
    pub name: String,
    pub charm: String,
    pub life: Life,
}

/// Id of the attachment between `unit` and `storage`.
pub fn storage_attachment_id(unit: &UnitTag, storage: &StorageTag) -> String {
    format!("{}#{}", unit.global_key(), storage.id())
}

/// Decode a document body, reporting failure as a corrupted record.
pub fn decode_doc<T: DeserializeOwned>(doc: &Document) -> Result<T, StorageError> {
    doc.decode().map_err(|e| StorageError::CorruptedRecord {
        collection: doc.collection.clone(),
        id: doc.id.clone(),
        reason: e.to_string(),
    })
}

fn corrupted(collection: &str, id: &str, reason: impl Into<String>) -> StorageError {
    StorageError::CorruptedRecord {
        collection: collection.to_string(),
        id: id.to_string(),
        reason: reason.into(),
    }
}

/// A storage instance as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageInstance {
    pub tag: StorageTag,
    pub kind: StorageKind,
    pub owner: Tag,
    pub storage_name: String,
    pub life: Life,
    pub attachment_count: i64,
}

impl TryFrom<StorageInstanceDoc> for StorageInstance {
    type Error = StorageError;

    fn try_from(doc: StorageInstanceDoc) -> Result<Self, Self::Error> {
        let tag = StorageTag::new(&doc.id).map_err(|e| corrupted(STORAGE_INSTANCES, &doc.id, e.to_string()))?;
        let owner: Tag = doc
            .owner
            .parse()
            .map_err(|e: StorageError| corrupted(STORAGE_INSTANCES, &doc.id, format!("owner: {e}")))?;
        Ok(Self {
            tag,
            kind: doc.kind,
            owner,
            storage_name: doc.storage_name,
            life: doc.life,
            attachment_count: doc.attachment_count,
        })
    }
}

/// A unit's attachment to a storage instance as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAttachment {
    pub storage: StorageTag,
    pub unit: UnitTag,
    pub life: Life,
}

impl StorageAttachment {
    pub(crate) fn from_doc(id: &str, doc: StorageAttachmentDoc) -> Result<Self, StorageError> {
        let storage = StorageTag::new(doc.storage_instance).map_err(|e| corrupted(STORAGE_ATTACHMENTS, id, e.to_string()))?;
        let unit = UnitTag::new(doc.unit).map_err(|e| corrupted(STORAGE_ATTACHMENTS, id, e.to_string()))?;
        Ok(Self {
            storage,
            unit,
            life: doc.life,
        })
    }
}
