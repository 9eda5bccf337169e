//! Storage constraint defaulting and validation.
//!
//! Constraints arrive partially specified. [`ConstraintResolver::apply_defaults`]
//! fills in pools, sizes and counts from the charm and the environment, then
//! [`ConstraintResolver::validate`] checks the result against the charm's
//! declarations and the pool/provider registries.
//!
//! With the storage feature switched off the resolver is
//! [`ConstraintResolver::Disabled`] and both steps pass everything through.

use std::sync::Arc;

use tracing::debug;

use crate::charm::CharmMeta;
use crate::config::ConfigError;
use crate::config::EnvironConfig;
use crate::config::StorageConfig;
use crate::constraints::ConstraintsMap;
use crate::error::StorageError;
use crate::pools::PoolManager;
use crate::providers::BuiltinProviders;
use crate::providers::ProviderCapabilities;
use crate::providers::ProviderRegistry;
use crate::providers::ProviderType;
use crate::providers::StorageScope;
use crate::pure::check_instance_total;
use crate::pure::check_store_constraints;
use crate::pure::constraints_with_defaults;
use crate::pure::missing_required_store;
use crate::records::StorageKind;

/// A pool name resolved to the provider that backs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPool {
    pub name: String,
    pub provider: ProviderType,
    pub capabilities: ProviderCapabilities,
}

/// Defaulting and validation against live registries.
#[derive(Clone)]
pub struct EnforcingResolver {
    environ: EnvironConfig,
    pools: Arc<dyn PoolManager>,
    providers: Arc<dyn ProviderRegistry>,
}

impl EnforcingResolver {
    pub fn new(environ: EnvironConfig, pools: Arc<dyn PoolManager>, providers: Arc<dyn ProviderRegistry>) -> Self {
        Self {
            environ,
            pools,
            providers,
        }
    }

    pub fn environ(&self) -> &EnvironConfig {
        &self.environ
    }

    fn apply_defaults(&self, constraints: &mut ConstraintsMap, charm: &CharmMeta) -> Result<(), StorageError> {
        for (name, charm_storage) in &charm.storage {
            let given = constraints.get(name).cloned().unwrap_or_default();
            let filled = constraints_with_defaults(&self.environ, charm_storage, &given)
                .ok_or_else(|| StorageError::NoDefaultPool { storage: name.clone() })?;
            constraints.insert(name.clone(), filled);
        }
        Ok(())
    }

    fn validate(&self, constraints: &ConstraintsMap, charm: &CharmMeta) -> Result<(), StorageError> {
        for (name, cons) in constraints {
            let Some(charm_storage) = charm.storage.get(name) else {
                return Err(StorageError::Validation {
                    message: format!("charm \"{}\" has no store called \"{name}\"", charm.name),
                });
            };
            check_store_constraints(&charm.name, name, charm_storage, cons)?;
            self.validate_pool(&cons.pool, charm_storage.kind())
                .map_err(|e| e.annotate(format!("charm \"{}\" store \"{name}\"", charm.name)))?;
        }
        if let Some(name) = missing_required_store(constraints, charm) {
            return Err(StorageError::Validation {
                message: format!("no constraints specified for store \"{name}\""),
            });
        }
        check_instance_total(&charm.name, constraints)
    }

    /// Resolve `name` as a configured pool, or failing that as a provider
    /// type used directly. If neither exists the pool lookup error is
    /// reported.
    pub fn resolve_pool(&self, name: &str) -> Result<ResolvedPool, StorageError> {
        if let Some(pool) = self.pools.get(name)? {
            let capabilities = self.providers.capabilities(&pool.provider).ok_or_else(|| StorageError::NotFound {
                what: format!("storage provider \"{}\" of pool \"{name}\"", pool.provider),
            })?;
            return Ok(ResolvedPool {
                name: pool.name,
                provider: pool.provider,
                capabilities,
            });
        }

        let provider = ProviderType::new(name);
        match self.providers.capabilities(&provider) {
            Some(capabilities) => {
                debug!(pool = %name, "no pool by that name, using it as a provider type");
                Ok(ResolvedPool {
                    name: name.to_string(),
                    provider,
                    capabilities,
                })
            }
            None => Err(StorageError::NotFound {
                what: format!("pool \"{name}\""),
            }),
        }
    }

    /// Check that `pool` can provide storage of `kind` in this environment.
    pub fn validate_pool(&self, pool: &str, kind: StorageKind) -> Result<ResolvedPool, StorageError> {
        if pool.is_empty() {
            return Err(StorageError::Validation {
                message: "pool name is required".to_string(),
            });
        }
        let resolved = self.resolve_pool(pool)?;
        if !resolved.capabilities.can_provide(kind) {
            return Err(StorageError::Validation {
                message: format!("pool \"{pool}\" does not support {kind} storage"),
            });
        }
        if !self.providers.is_provider_supported(&self.environ.env_type, &resolved.provider) {
            return Err(StorageError::Validation {
                message: format!(
                    "pool \"{pool}\" uses storage provider \"{}\" which is not supported for environments of type \"{}\"",
                    resolved.provider, self.environ.env_type
                ),
            });
        }
        Ok(resolved)
    }

    fn validate_pool_for_machine(
        &self,
        pool: &str,
        kind: StorageKind,
        machine: &str,
    ) -> Result<Option<String>, StorageError> {
        let resolved = self.validate_pool(pool, kind)?;
        match resolved.capabilities.scope {
            StorageScope::Machine if machine.is_empty() => Err(StorageError::Validation {
                message: format!("machine-scoped storage provider \"{}\" requires a machine", resolved.provider),
            }),
            StorageScope::Machine => Ok(Some(machine.to_string())),
            StorageScope::Environ => Ok(None),
        }
    }
}

/// Constraint handling, enforced or switched off by configuration.
#[derive(Clone)]
pub enum ConstraintResolver {
    Enforcing(EnforcingResolver),
    Disabled,
}

impl ConstraintResolver {
    /// Pick the variant from `config.feature_enabled`.
    pub fn new(config: &StorageConfig, pools: Arc<dyn PoolManager>, providers: Arc<dyn ProviderRegistry>) -> Self {
        if config.feature_enabled {
            Self::enforcing(config.environ.clone(), pools, providers)
        } else {
            Self::disabled()
        }
    }

    /// Resolver over the pools declared in `config` and the built-in
    /// providers.
    pub fn from_config(config: &StorageConfig) -> Result<Self, ConfigError> {
        let pools = Arc::new(config.pool_catalog()?);
        Ok(Self::new(config, pools, Arc::new(BuiltinProviders::new())))
    }

    pub fn enforcing(environ: EnvironConfig, pools: Arc<dyn PoolManager>, providers: Arc<dyn ProviderRegistry>) -> Self {
        Self::Enforcing(EnforcingResolver::new(environ, pools, providers))
    }

    pub fn disabled() -> Self {
        Self::Disabled
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enforcing(_))
    }

    /// Fill every unspecified pool, size and count for each store the charm
    /// declares, adding entries for stores that have none.
    pub fn apply_defaults(&self, constraints: &mut ConstraintsMap, charm: &CharmMeta) -> Result<(), StorageError> {
        match self {
            Self::Enforcing(resolver) => resolver.apply_defaults(constraints, charm),
            Self::Disabled => Ok(()),
        }
    }

    /// Check `constraints` against the charm's storage declarations.
    pub fn validate(&self, constraints: &ConstraintsMap, charm: &CharmMeta) -> Result<(), StorageError> {
        match self {
            Self::Enforcing(resolver) => resolver.validate(constraints, charm),
            Self::Disabled => Ok(()),
        }
    }

    /// Validate `pool` for storage of `kind` on `machine`, returning the
    /// machine the storage is bound to. Environment-scoped providers are
    /// bound to no machine.
    pub fn validate_pool_for_machine(
        &self,
        pool: &str,
        kind: StorageKind,
        machine: &str,
    ) -> Result<Option<String>, StorageError> {
        match self {
            Self::Enforcing(resolver) => resolver.validate_pool_for_machine(pool, kind, machine),
            Self::Disabled => Ok((!machine.is_empty()).then(|| machine.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charm::CharmStorage;
    use crate::constraints::StorageConstraints;
    use crate::pools::Pool;
    use crate::pools::PoolCatalog;

    fn resolver_for(env_type: &str, pools: PoolCatalog) -> ConstraintResolver {
        let environ = EnvironConfig {
            env_type: env_type.to_string(),
            ..EnvironConfig::default()
        };
        ConstraintResolver::enforcing(environ, Arc::new(pools), Arc::new(BuiltinProviders::new()))
    }

    fn enforcing(resolver: &ConstraintResolver) -> &EnforcingResolver {
        match resolver {
            ConstraintResolver::Enforcing(inner) => inner,
            ConstraintResolver::Disabled => panic!("expected an enforcing resolver"),
        }
    }

    fn mysql() -> CharmMeta {
        CharmMeta::new("mysql").with_storage("data", CharmStorage::block().with_count(1, 3))
    }

    #[test]
    fn defaults_then_validate() {
        let resolver = resolver_for("dummy", PoolCatalog::new());
        let mut cons = ConstraintsMap::new();
        resolver.apply_defaults(&mut cons, &mysql()).unwrap();

        assert_eq!(cons["data"], StorageConstraints::new("loop", 1024, 1));
        resolver.validate(&cons, &mysql()).unwrap();
    }

    #[test]
    fn filesystem_without_default_pool_names_the_store() {
        let resolver = resolver_for("dummy", PoolCatalog::new());
        let charm = CharmMeta::new("wiki").with_storage("cache", CharmStorage::filesystem());
        let mut cons = ConstraintsMap::new();

        let err = resolver.apply_defaults(&mut cons, &charm).unwrap_err();
        assert!(matches!(err, StorageError::NoDefaultPool { ref storage } if storage == "cache"));
    }

    #[test]
    fn undeclared_store_is_rejected() {
        let resolver = resolver_for("dummy", PoolCatalog::new());
        let cons = ConstraintsMap::from([
            ("data".to_string(), StorageConstraints::new("loop", 1024, 1)),
            ("logs".to_string(), StorageConstraints::new("loop", 1024, 1)),
        ]);
        let err = resolver.validate(&cons, &mysql()).unwrap_err();
        assert_eq!(err.to_string(), "charm \"mysql\" has no store called \"logs\"");
    }

    #[test]
    fn required_store_without_constraints_is_rejected() {
        let resolver = resolver_for("dummy", PoolCatalog::new());
        let err = resolver.validate(&ConstraintsMap::new(), &mysql()).unwrap_err();
        assert_eq!(err.to_string(), "no constraints specified for store \"data\"");
    }

    #[test]
    fn pool_name_falls_back_to_provider_type() {
        let resolver = resolver_for("dummy", PoolCatalog::new());
        let resolved = enforcing(&resolver).resolve_pool("tmpfs").unwrap();
        assert_eq!(resolved.provider, ProviderType::new("tmpfs"));

        let err = enforcing(&resolver).resolve_pool("nope").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "pool \"nope\" not found");
    }

    #[test]
    fn named_pool_wins_over_provider_type() {
        let pools = PoolCatalog::new().with_pool(Pool::new("loop", "tmpfs")).unwrap();
        let resolver = resolver_for("dummy", pools);
        assert_eq!(enforcing(&resolver).resolve_pool("loop").unwrap().provider, ProviderType::new("tmpfs"));
    }

    #[test]
    fn provider_must_support_kind_and_environment() {
        let pools = PoolCatalog::new().with_pool(Pool::new("fast", "ebs")).unwrap();

        let resolver = resolver_for("dummy", pools.clone());
        let err = enforcing(&resolver).validate_pool("fast", StorageKind::Block).unwrap_err();
        assert_eq!(
            err.to_string(),
            "pool \"fast\" uses storage provider \"ebs\" which is not supported for environments of type \"dummy\""
        );

        let resolver = resolver_for("ec2", pools);
        enforcing(&resolver).validate_pool("fast", StorageKind::Block).unwrap();
        // A filesystem can be made on an EBS volume.
        enforcing(&resolver).validate_pool("fast", StorageKind::Filesystem).unwrap();

        let err = enforcing(&resolver).validate_pool("rootfs", StorageKind::Block).unwrap_err();
        assert!(err.is_validation());
        let err = enforcing(&resolver).validate_pool("", StorageKind::Block).unwrap_err();
        assert_eq!(err.to_string(), "pool name is required");
    }

    #[test]
    fn machine_scope() {
        let pools = PoolCatalog::new().with_pool(Pool::new("fast", "ebs")).unwrap();
        let resolver = resolver_for("ec2", pools);

        assert_eq!(resolver.validate_pool_for_machine("loop", StorageKind::Block, "0").unwrap(), Some("0".to_string()));
        assert!(resolver.validate_pool_for_machine("loop", StorageKind::Block, "").unwrap_err().is_validation());
        assert_eq!(resolver.validate_pool_for_machine("fast", StorageKind::Block, "0").unwrap(), None);
    }

    #[test]
    fn disabled_resolver_passes_everything() {
        let config = StorageConfig {
            feature_enabled: false,
            ..StorageConfig::default()
        };
        let resolver = ConstraintResolver::from_config(&config).unwrap();
        assert!(!resolver.is_enabled());

        let mut cons = ConstraintsMap::new();
        resolver.apply_defaults(&mut cons, &mysql()).unwrap();
        assert!(cons.is_empty());
        resolver.validate(&cons, &mysql()).unwrap();
        assert_eq!(resolver.validate_pool_for_machine("", StorageKind::Unknown, "").unwrap(), None);
    }
}
