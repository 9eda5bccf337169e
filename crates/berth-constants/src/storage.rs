//! Storage domain defaults.

use crate::api::MAX_TXN_OPS;

/// Size used for a store whose constraints and charm metadata give no size (1 GiB).
pub const DEFAULT_STORAGE_SIZE_MIB: u64 = 1024;

/// Name of the store-wide counter used to number storage instances.
pub const STORAGE_SEQUENCE: &str = "stores";

/// Provider type used for block storage when no default block pool is configured.
pub const LOOP_PROVIDER_TYPE: &str = "loop";

/// Maximum number of storage instances listed in one read.
pub const MAX_LISTED_STORAGE: u32 = 10_000;

/// Maximum number of cleanup records processed in one cleanup pass.
pub const MAX_CLEANUP_BATCH: u32 = 100;

/// Operations an entity-creating transaction carries besides its storage:
/// the owner record, its constraints record and the application liveness
/// check made when adding a unit.
pub const ENTITY_TXN_OVERHEAD_OPS: u32 = 3;

/// Operations per unit-owned storage instance: the instance and its attachment.
pub const OPS_PER_UNIT_INSTANCE: u32 = 2;

/// Maximum number of storage instances created together with one entity,
/// so that the whole creation fits in a single transaction.
pub const MAX_INSTANCES_PER_ENTITY: u64 =
    ((MAX_TXN_OPS - ENTITY_TXN_OVERHEAD_OPS) / OPS_PER_UNIT_INSTANCE) as u64;
