//! Constraint defaulting and charm-level checks.
//!
//! Pool resolution needs the pool and provider registries and lives in the
//! resolver; everything that depends only on the charm declaration and the
//! environment settings is here.

use berth_constants::storage::DEFAULT_STORAGE_SIZE_MIB;
use berth_constants::storage::LOOP_PROVIDER_TYPE;
use berth_constants::storage::MAX_INSTANCES_PER_ENTITY;
use bytesize::ByteSize;

use crate::charm::CharmMeta;
use crate::charm::CharmStorage;
use crate::config::EnvironConfig;
use crate::constraints::ConstraintsMap;
use crate::constraints::StorageConstraints;
use crate::error::StorageError;
use crate::records::StorageKind;

/// The environment's default pool for `kind`, if it has one.
///
/// Block storage falls back to the loop provider; there is no fallback for
/// filesystems.
pub fn default_pool(environ: &EnvironConfig, kind: StorageKind) -> Option<String> {
    match kind {
        StorageKind::Block => {
            Some(environ.default_block_pool.clone().unwrap_or_else(|| LOOP_PROVIDER_TYPE.to_string()))
        }
        StorageKind::Filesystem => environ.default_filesystem_pool.clone(),
        StorageKind::Unknown => None,
    }
}

/// `cons` with every unspecified field filled in.
///
/// Returns `None` if a pool is needed and the environment has no default.
pub fn constraints_with_defaults(
    environ: &EnvironConfig,
    charm_storage: &CharmStorage,
    cons: &StorageConstraints,
) -> Option<StorageConstraints> {
    let mut filled = cons.clone();
    if filled.pool.is_empty() {
        filled.pool = default_pool(environ, charm_storage.kind())?;
    }
    if filled.size == 0 {
        filled.size = if charm_storage.minimum_size > 0 {
            charm_storage.minimum_size
        } else {
            DEFAULT_STORAGE_SIZE_MIB
        };
    }
    if filled.count == 0 {
        filled.count = u64::from(charm_storage.count_min);
    }
    Some(filled)
}

fn human_mib(mib: u64) -> String {
    ByteSize::mib(mib).to_string()
}

/// Check one store's constraints against its charm declaration.
///
/// Pool validity is not checked here.
pub fn check_store_constraints(
    charm_name: &str,
    store: &str,
    charm_storage: &CharmStorage,
    cons: &StorageConstraints,
) -> Result<(), StorageError> {
    if charm_storage.shared {
        return Err(StorageError::NotSupported {
            message: format!("charm \"{charm_name}\" store \"{store}\": shared storage support not implemented"),
        });
    }
    let count_min = u64::from(charm_storage.count_min);
    if cons.count < count_min {
        return Err(StorageError::Validation {
            message: format!(
                "charm \"{charm_name}\" store \"{store}\": {count_min} instances required, {} specified",
                cons.count
            ),
        });
    }
    if let Ok(count_max) = u64::try_from(charm_storage.count_max)
        && cons.count > count_max
    {
        return Err(StorageError::Validation {
            message: format!(
                "charm \"{charm_name}\" store \"{store}\": at most {count_max} instances supported, {} specified",
                cons.count
            ),
        });
    }
    if charm_storage.minimum_size > 0 && cons.size < charm_storage.minimum_size {
        return Err(StorageError::Validation {
            message: format!(
                "charm \"{charm_name}\" store \"{store}\": minimum storage size is {}, {} specified",
                human_mib(charm_storage.minimum_size),
                human_mib(cons.size)
            ),
        });
    }
    Ok(())
}

/// Check that every instance `constraints` asks for can be created in the
/// same transaction as its owner.
///
/// Stores are counted in name order and the store that crosses the limit is
/// the one reported.
pub fn check_instance_total(charm_name: &str, constraints: &ConstraintsMap) -> Result<(), StorageError> {
    let mut total = 0u64;
    for (store, cons) in constraints {
        total = total.saturating_add(cons.count);
        if total > MAX_INSTANCES_PER_ENTITY {
            return Err(StorageError::Validation {
                message: format!(
                    "charm \"{charm_name}\" store \"{store}\": {} instances specified, at most \
                     {MAX_INSTANCES_PER_ENTITY} instances in total can be created at once",
                    cons.count
                ),
            });
        }
    }
    Ok(())
}

/// First charm store that needs instances but has no constraints entry.
pub fn missing_required_store<'a>(cons: &ConstraintsMap, charm: &'a CharmMeta) -> Option<&'a str> {
    charm
        .storage
        .iter()
        .find(|(name, storage)| storage.count_min > 0 && !cons.contains_key(name.as_str()))
        .map(|(name, _)| name.as_str())
}
