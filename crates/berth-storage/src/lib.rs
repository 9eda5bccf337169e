//! Storage instance and attachment lifecycle.
//!
//! Storage instances are provisioned for units and applications according
//! to their charm's storage declarations, and attached to the units that use
//! them. Many agents change these records concurrently through a shared
//! document store; every change is an optimistic transaction whose
//! assertions keep the reference counts exact and life monotonic.
//!
//! - `ConstraintResolver` - defaulting and validation of storage constraints
//! - `StorageInstances` - instance creation, listing and destruction
//! - `StorageAttachments` - attachment destroy / ensure-dead / remove
//! - `CleanupRunner` - deferred destruction of attachments of dying storage
//! - `Provisioner` - adding and removing units and applications with storage
//!
//! ## Example
//!
//! ```ignore
//! use berth_storage::{ConstraintsMap, Provisioner, StorageConfig, UnitTag};
//!
//! let config = StorageConfig::load()?;
//! let provisioner = Provisioner::from_config(store.clone(), &config)?;
//! let unit = UnitTag::new("mysql/0")?;
//! let created = provisioner.add_unit(&unit, &charm, ConstraintsMap::new()).await?;
//!
//! // Later, when the unit goes away:
//! let attachments = StorageAttachments::new(store, config.txn.clone());
//! for storage in &created.instances {
//!     attachments.destroy(storage, &unit).await?;
//!     attachments.ensure_dead(storage, &unit).await?;
//!     attachments.remove(storage, &unit).await?;
//! }
//! ```

mod attachments;
mod charm;
mod cleanup;
pub mod config;
mod constraints;
mod error;
mod instances;
mod pools;
mod providers;
mod provisioner;
pub mod pure;
mod records;
mod resolver;
mod tags;

pub use attachments::StorageAttachments;
pub use charm::CharmMeta;
pub use charm::CharmStorage;
pub use charm::CharmStorageType;
pub use cleanup::Cleanup;
pub use cleanup::CleanupKind;
pub use cleanup::CleanupRunner;
pub use cleanup::new_cleanup_op;
pub use config::ConfigError;
pub use config::EnvironConfig;
pub use config::StorageConfig;
pub use constraints::ConstraintsMap;
pub use constraints::StorageConstraints;
pub use constraints::create_constraints_op;
pub use constraints::read_constraints;
pub use constraints::remove_constraints_op;
pub use error::StorageError;
pub use instances::StorageInstances;
pub use pools::Pool;
pub use pools::PoolCatalog;
pub use pools::PoolManager;
pub use providers::BuiltinProviders;
pub use providers::ProviderCapabilities;
pub use providers::ProviderRegistry;
pub use providers::ProviderType;
pub use providers::StorageScope;
pub use provisioner::Provisioner;
pub use records::APPLICATIONS;
pub use records::ApplicationDoc;
pub use records::CLEANUPS;
pub use records::Life;
pub use records::STORAGE_ATTACHMENTS;
pub use records::STORAGE_CONSTRAINTS;
pub use records::STORAGE_INSTANCES;
pub use records::StorageAttachment;
pub use records::StorageAttachmentDoc;
pub use records::StorageInstance;
pub use records::StorageInstanceDoc;
pub use records::StorageKind;
pub use records::UNITS;
pub use records::UnitDoc;
pub use records::storage_attachment_id;
pub use resolver::ConstraintResolver;
pub use resolver::EnforcingResolver;
pub use resolver::ResolvedPool;
pub use tags::ApplicationTag;
pub use tags::StorageTag;
pub use tags::Tag;
pub use tags::UnitTag;
