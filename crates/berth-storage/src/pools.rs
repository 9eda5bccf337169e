//! Named storage pools.
//!
//! A pool is a named, configured use of a provider. Pools are looked up by
//! name through [`PoolManager`]; when no pool has the requested name, the
//! constraint resolver falls back to treating the name as a provider type.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::StorageError;
use crate::providers::ProviderType;

/// A named pool backed by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub name: String,
    pub provider: ProviderType,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

impl Pool {
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: ProviderType::new(provider),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }
}

/// Lookup of configured pools.
pub trait PoolManager: Send + Sync {
    /// The pool called `name`, or `None` if there is none.
    fn get(&self, name: &str) -> Result<Option<Pool>, StorageError>;

    /// Every configured pool, ordered by name.
    fn list(&self) -> Result<Vec<Pool>, StorageError>;
}

/// Pools held in memory, typically loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct PoolCatalog {
    pools: BTreeMap<String, Pool>,
}

impl PoolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pool, replacing any pool with the same name.
    pub fn with_pool(mut self, pool: Pool) -> Result<Self, StorageError> {
        if pool.name.is_empty() {
            return Err(StorageError::Validation {
                message: "pool name is required".to_string(),
            });
        }
        if pool.provider.as_str().is_empty() {
            return Err(StorageError::Validation {
                message: format!("pool \"{}\" has no provider type", pool.name),
            });
        }
        self.pools.insert(pool.name.clone(), pool);
        Ok(self)
    }
}

impl PoolManager for PoolCatalog {
    fn get(&self, name: &str) -> Result<Option<Pool>, StorageError> {
        Ok(self.pools.get(name).cloned())
    }

    fn list(&self) -> Result<Vec<Pool>, StorageError> {
        Ok(self.pools.values().cloned().collect())
    }
}
