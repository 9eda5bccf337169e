//! Charm storage metadata.
//!
//! Only the parts of a charm's metadata that drive storage provisioning are
//! modelled: the declared stores, their type, sharing, instance count range
//! and minimum size.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::records::StorageKind;

/// Type of a charm-declared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharmStorageType {
    Block,
    Filesystem,
}

impl CharmStorageType {
    pub fn kind(self) -> StorageKind {
        match self {
            CharmStorageType::Block => StorageKind::Block,
            CharmStorageType::Filesystem => StorageKind::Filesystem,
        }
    }
}

/// A single store declared by a charm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharmStorage {
    #[serde(rename = "type")]
    pub storage_type: CharmStorageType,
    /// Shared stores belong to the application; others to each unit.
    #[serde(default)]
    pub shared: bool,
    #[serde(default = "default_count_min")]
    pub count_min: u32,
    /// Upper bound on instances; negative means unbounded.
    #[serde(default = "default_count_max")]
    pub count_max: i32,
    /// Minimum size in MiB; zero means no minimum.
    #[serde(default)]
    pub minimum_size: u64,
}

fn default_count_min() -> u32 {
    1
}

fn default_count_max() -> i32 {
    1
}

impl CharmStorage {
    pub fn new(storage_type: CharmStorageType) -> Self {
        Self {
            storage_type,
            shared: false,
            count_min: default_count_min(),
            count_max: default_count_max(),
            minimum_size: 0,
        }
    }

    pub fn block() -> Self {
        Self::new(CharmStorageType::Block)
    }

    pub fn filesystem() -> Self {
        Self::new(CharmStorageType::Filesystem)
    }

    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    pub fn with_count(mut self, count_min: u32, count_max: i32) -> Self {
        self.count_min = count_min;
        self.count_max = count_max;
        self
    }

    pub fn with_minimum_size(mut self, minimum_size_mib: u64) -> Self {
        self.minimum_size = minimum_size_mib;
        self
    }

    pub fn kind(&self) -> StorageKind {
        self.storage_type.kind()
    }
}

/// Storage-relevant charm metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharmMeta {
    pub name: String,
    #[serde(default)]
    pub storage: BTreeMap<String, CharmStorage>,
}

impl CharmMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage: BTreeMap::new(),
        }
    }

    pub fn with_storage(mut self, name: impl Into<String>, storage: CharmStorage) -> Self {
        self.storage.insert(name.into(), storage);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn metadata_deserializes_with_defaults() {
        let meta: CharmMeta = serde_json::from_value(json!({
            "name": "postgresql",
            "storage": {
                "pgdata": {"type": "filesystem", "minimum_size": 2048},
                "logs": {"type": "block", "count_min": 0, "count_max": -1, "shared": true}
            }
        }))
        .unwrap();

        let pgdata = &meta.storage["pgdata"];
        assert_eq!(pgdata.kind(), StorageKind::Filesystem);
        assert_eq!((pgdata.count_min, pgdata.count_max), (1, 1));
        assert!(!pgdata.shared);

        let logs = &meta.storage["logs"];
        assert!(logs.shared);
        assert_eq!(logs.count_max, -1);
    }
}
