//! Storage provider capabilities.
//!
//! A provider type (`loop`, `ebs`, …) is described by a closed set of
//! capabilities: which storage kinds it can provision and at what scope.
//! [`ProviderRegistry`] is the query interface the constraint resolver uses;
//! [`BuiltinProviders`] is the stock catalog.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use berth_constants::storage::LOOP_PROVIDER_TYPE;
use serde::Deserialize;
use serde::Serialize;

use crate::records::StorageKind;

/// Name of a storage provider implementation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderType(String);

impl ProviderType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where provisioned storage lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScope {
    /// Tied to a single machine; a machine must be named.
    Machine,
    /// Managed by the environment, attachable to any machine.
    Environ,
}

/// What a provider can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub block: bool,
    pub filesystem: bool,
    pub scope: StorageScope,
}

impl ProviderCapabilities {
    pub fn supports(&self, kind: StorageKind) -> bool {
        match kind {
            StorageKind::Block => self.block,
            StorageKind::Filesystem => self.filesystem,
            StorageKind::Unknown => false,
        }
    }

    /// Whether the provider can back storage of `kind`, counting a
    /// filesystem made on top of a block device.
    pub fn can_provide(&self, kind: StorageKind) -> bool {
        match kind {
            StorageKind::Filesystem => self.block || self.filesystem,
            other => self.supports(other),
        }
    }
}

/// Capability queries over storage providers.
pub trait ProviderRegistry: Send + Sync {
    /// Capabilities of `provider`, or `None` if it is not registered.
    fn capabilities(&self, provider: &ProviderType) -> Option<ProviderCapabilities>;

    /// Whether environments of `env_type` may use `provider`.
    fn is_provider_supported(&self, env_type: &str, provider: &ProviderType) -> bool;
}

/// In-memory provider catalog.
///
/// Providers registered with [`register_common`](Self::register_common) are
/// available in every environment type; others only in the environment
/// types they were registered for.
#[derive(Debug, Clone)]
pub struct BuiltinProviders {
    providers: BTreeMap<ProviderType, ProviderCapabilities>,
    common: BTreeSet<ProviderType>,
    by_env: BTreeMap<String, BTreeSet<ProviderType>>,
}

impl BuiltinProviders {
    /// Catalog with no providers at all.
    pub fn empty() -> Self {
        Self {
            providers: BTreeMap::new(),
            common: BTreeSet::new(),
            by_env: BTreeMap::new(),
        }
    }

    /// The stock catalog: machine-local providers everywhere, plus the
    /// volume services of the clouds that offer them.
    pub fn new() -> Self {
        let machine_block = ProviderCapabilities {
            block: true,
            filesystem: false,
            scope: StorageScope::Machine,
        };
        let machine_fs = ProviderCapabilities {
            block: false,
            filesystem: true,
            scope: StorageScope::Machine,
        };
        let environ_block = ProviderCapabilities {
            block: true,
            filesystem: false,
            scope: StorageScope::Environ,
        };

        Self::empty()
            .register_common(ProviderType::new(LOOP_PROVIDER_TYPE), machine_block)
            .register_common(ProviderType::new("rootfs"), machine_fs)
            .register_common(ProviderType::new("tmpfs"), machine_fs)
            .register_for("ec2", ProviderType::new("ebs"), environ_block)
            .register_for("openstack", ProviderType::new("cinder"), environ_block)
    }

    pub fn register_common(mut self, provider: ProviderType, capabilities: ProviderCapabilities) -> Self {
        self.common.insert(provider.clone());
        self.providers.insert(provider, capabilities);
        self
    }

    pub fn register_for(
        mut self,
        env_type: impl Into<String>,
        provider: ProviderType,
        capabilities: ProviderCapabilities,
    ) -> Self {
        self.by_env.entry(env_type.into()).or_default().insert(provider.clone());
        self.providers.insert(provider, capabilities);
        self
    }
}

impl Default for BuiltinProviders {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry for BuiltinProviders {
    fn capabilities(&self, provider: &ProviderType) -> Option<ProviderCapabilities> {
        self.providers.get(provider).copied()
    }

    fn is_provider_supported(&self, env_type: &str, provider: &ProviderType) -> bool {
        self.common.contains(provider) || self.by_env.get(env_type).is_some_and(|set| set.contains(provider))
    }
}
